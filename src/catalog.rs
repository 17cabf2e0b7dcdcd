//! # Catalog Module
//!
//! Read-only product catalog consulted by the conversation. Products are grouped in
//! categories and numbered continuously across categories, in category order, so the
//! number shown to the customer is exactly the index accepted by [`Catalog::lookup_by_index`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::session::Price;

/// Extra descriptive attribute of a product (e.g. "Tamanhos" → "P, M, G")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetail {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub details: Vec<ProductDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Display name, emoji included
    pub name: String,
    pub products: Vec<Product>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub categories: Vec<Category>,
}

impl Catalog {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    /// Load a catalog from a JSON file with the same shape as this struct
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file {}", path.display()))?;
        let catalog: Catalog = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse catalog file {}", path.display()))?;
        Ok(catalog)
    }

    /// All products in display order
    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.categories.iter().flat_map(|c| c.products.iter())
    }

    pub fn len(&self) -> usize {
        self.products().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve a 1-based product number to its name
    pub fn lookup_by_index(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.products().nth(i))
            .map(|p| p.name.as_str())
    }

    pub fn product(&self, name: &str) -> Option<&Product> {
        self.products().find(|p| p.name == name)
    }

    pub fn price_of(&self, name: &str) -> Option<Price> {
        self.product(name).map(|p| p.price)
    }

    pub fn details_of(&self, name: &str) -> &[ProductDetail] {
        self.product(name)
            .map(|p| p.details.as_slice())
            .unwrap_or(&[])
    }
}

fn product(name: &str, cents: u64, details: &[(&str, &str)]) -> Product {
    Product {
        name: name.to_string(),
        price: Price::from_cents(cents),
        details: details
            .iter()
            .map(|(label, value)| ProductDetail {
                label: label.to_string(),
                value: value.to_string(),
            })
            .collect(),
    }
}

fn category(name: &str, products: Vec<Product>) -> Category {
    Category {
        name: name.to_string(),
        products,
    }
}

/// The shop's built-in catalog
impl Default for Catalog {
    fn default() -> Self {
        let shirt_sizes = [
            ("Tamanhos", "P, M, G"),
            ("Variantes", "Baby look (P, M, G)"),
            ("Observações", "Disponível em tamanhos P, M, G e Baby look"),
        ];

        Catalog::new(vec![
            category(
                "👕 Vestuário",
                vec![
                    product("Camisa Branca", 4000, &shirt_sizes),
                    product("Camisa Colorida Clara", 4000, &shirt_sizes),
                    product(
                        "Camisa Escura (Impressão DTF)",
                        5000,
                        &[("Observações", "Impressão DTF para melhor qualidade em tecidos escuros")],
                    ),
                    product("Body Infantil Personalizado", 3500, &[]),
                    product("Boné Forrado", 3500, &[]),
                    product("Boné Telado Personalizado", 4000, &[]),
                    product("Chinelo Personalizado", 3500, &[]),
                ],
            ),
            category(
                "☕ Canecas e Xícaras",
                vec![
                    product("Caneca de Porcelana 325ml", 3500, &[]),
                    product("Caneca Chopp de Vidro Jateado", 6000, &[]),
                    product("Xícara 180ml", 3500, &[]),
                    product("Xícara sem Pires 150ml", 3000, &[]),
                    product(
                        "Torre de Xícaras Personalizadas",
                        12000,
                        &[
                            ("Composição", "Torre + Xícaras"),
                            ("Observações", "Conjunto completo para presente especial"),
                        ],
                    ),
                ],
            ),
            category(
                "🏠 Decoração",
                vec![
                    product(
                        "Almofada Personalizada 40x40",
                        4500,
                        &[
                            ("Tamanho", "40x40 cm"),
                            ("Observações", "Tamanho padrão de almofada decorativa"),
                        ],
                    ),
                    product(
                        "Almofada Personalizada 25x25",
                        4000,
                        &[
                            ("Tamanho", "25x25 cm"),
                            ("Observações", "Tamanho compacto ideal para detalhes"),
                        ],
                    ),
                    product(
                        "Azulejo Personalizado 15x15",
                        3500,
                        &[
                            ("Tamanho", "15x15 cm"),
                            ("Observações", "Perfeito para decoração de cozinhas ou lembranças"),
                        ],
                    ),
                    product(
                        "Quebra-cabeça 45 peças",
                        2500,
                        &[
                            ("Peças", "45"),
                            ("Observações", "Ideal para crianças e presente personalizado"),
                        ],
                    ),
                    product(
                        "Quebra-cabeça 12 peças",
                        2000,
                        &[
                            ("Peças", "12"),
                            ("Observações", "Perfeito para crianças pequenas"),
                        ],
                    ),
                ],
            ),
            category(
                "🛍️ Utilidades",
                vec![
                    product("Ecobag Personalizada", 3500, &[]),
                    product(
                        "Mouse Pad Personalizado",
                        2300,
                        &[
                            ("Opções", "Quadrado, Redondo"),
                            ("Observações", "Escolha entre formato quadrado ou redondo"),
                        ],
                    ),
                    product(
                        "Squeeze de Alumínio 600ml",
                        5000,
                        &[
                            ("Capacidade", "600ml"),
                            ("Material", "Alumínio"),
                            ("Observações", "Garrafa térmica de alumínio personalizada"),
                        ],
                    ),
                ],
            ),
            category(
                "🎁 Kits",
                vec![
                    product(
                        "Kit 10 Canetas Personalizadas (Azul)",
                        3000,
                        &[
                            ("Cor da tinta", "Azul"),
                            ("Quantidade", "10"),
                            ("Observações", "Kit com 10 canetas personalizadas, tinta azul"),
                        ],
                    ),
                    product(
                        "Kit 10 Chaveiros Personalizados",
                        4500,
                        &[
                            ("Quantidade", "10"),
                            ("Observações", "Kit com 10 chaveiros personalizados"),
                        ],
                    ),
                ],
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_lookup_is_continuous_across_categories() {
        let catalog = Catalog::default();

        assert_eq!(catalog.lookup_by_index(1), Some("Camisa Branca"));
        assert_eq!(catalog.lookup_by_index(8), Some("Caneca de Porcelana 325ml"));
        assert_eq!(
            catalog.lookup_by_index(catalog.len()),
            Some("Kit 10 Chaveiros Personalizados")
        );
        assert_eq!(catalog.lookup_by_index(0), None);
        assert_eq!(catalog.lookup_by_index(catalog.len() + 1), None);
    }

    #[test]
    fn test_price_and_details() {
        let catalog = Catalog::default();

        assert_eq!(
            catalog.price_of("Mouse Pad Personalizado"),
            Some(Price::from_cents(2300))
        );
        assert_eq!(catalog.price_of("Produto Inexistente"), None);
        assert_eq!(catalog.details_of("Mouse Pad Personalizado").len(), 2);
        assert!(catalog.details_of("Boné Forrado").is_empty());
    }

    #[test]
    fn test_load_from_json_file() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(
            file,
            r#"{{"categories":[{{"name":"☕ Canecas","products":[{{"name":"Caneca de Porcelana 325ml","price":3500}}]}}]}}"#
        )?;

        let catalog = Catalog::from_json_file(file.path())?;
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.lookup_by_index(1), Some("Caneca de Porcelana 325ml"));
        assert_eq!(catalog.price_of("Caneca de Porcelana 325ml"), Some(Price::from_cents(3500)));
        Ok(())
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        assert!(Catalog::from_json_file("/non/existent/catalog.json").is_err());
    }
}

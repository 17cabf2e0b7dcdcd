//! # Configuration Module
//!
//! All runtime settings, built once at startup and passed by reference to the components
//! that need them. Nothing below the binary reads the environment directly.

use anyhow::{bail, Context, Result};
use chrono::{Duration as ChronoDuration, FixedOffset, Offset, Utc};
use std::collections::HashSet;
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::business_hours::WeeklySchedule;
use crate::outbound::RenderMode;

/// People and channels named in customer-facing messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attendants {
    /// Handles quotes and checkout
    pub quote: String,
    /// Handles order follow-up
    pub tracking: String,
    /// General human handoff
    pub general: String,
    /// Direct contact number shown off-hours and on errors
    pub whatsapp: String,
}

impl Default for Attendants {
    fn default() -> Self {
        Self {
            quote: "Equipe de Orçamentos".to_string(),
            tracking: "Equipe de Acompanhamento".to_string(),
            general: "Equipe de Atendimento".to_string(),
            whatsapp: "+55 27 99997-5339".to_string(),
        }
    }
}

/// Shop branding used by the message builders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopProfile {
    pub name: String,
    pub instagram_handle: String,
    pub instagram_url: String,
    pub catalog_url: String,
    pub attendants: Attendants,
}

impl Default for ShopProfile {
    fn default() -> Self {
        Self {
            name: "CRIEARTES PERSONALIZADOS".to_string(),
            instagram_handle: "@cacrieartes".to_string(),
            instagram_url: "https://www.instagram.com/cacrieartes/".to_string(),
            catalog_url: "https://wa.me/c/5527999975339".to_string(),
            attendants: Attendants::default(),
        }
    }
}

/// Where sessions, orders, off-hours messages and the whitelist live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres { url: String },
    File { dir: PathBuf },
    Memory,
}

impl Default for StorageBackend {
    fn default() -> Self {
        StorageBackend::File {
            dir: PathBuf::from("./data"),
        }
    }
}

/// Per-customer outbound cap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Sends allowed per customer within `window`
    pub max_per_window: usize,
    pub window: Duration,
    /// How long a customer stays blocked once the cap is hit
    pub lockout: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_per_window: 15,
            window: Duration::from_secs(60),
            lockout: Duration::from_secs(60),
        }
    }
}

/// Inclusive range of milliseconds a delay is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub const ZERO: DelayRange = DelayRange::new(0, 0);
}

/// Human-like pacing of outbound sends
#[derive(Debug, Clone, PartialEq)]
pub struct PacingConfig {
    pub menu: DelayRange,
    pub text: DelayRange,
    pub complex: DelayRange,
    pub error: DelayRange,
    /// Chance of an extra long pause before a send
    pub extended_pause_probability: f64,
    pub extended_pause: DelayRange,
    /// Chance of an extra short jitter before a send
    pub jitter_probability: f64,
    pub jitter: DelayRange,
    /// Wait before retrying a message the rate limiter deferred
    pub requeue_delay: Duration,
    /// Pause after the transport reports rate limiting
    pub transport_cooldown: Duration,
}

impl PacingConfig {
    /// No delays at all; used when anti-abuse is disabled and in tests
    pub fn immediate() -> Self {
        Self {
            menu: DelayRange::ZERO,
            text: DelayRange::ZERO,
            complex: DelayRange::ZERO,
            error: DelayRange::ZERO,
            extended_pause_probability: 0.0,
            extended_pause: DelayRange::ZERO,
            jitter_probability: 0.0,
            jitter: DelayRange::ZERO,
            ..Self::default()
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            menu: DelayRange::new(1_500, 3_500),
            text: DelayRange::new(1_000, 2_500),
            complex: DelayRange::new(2_500, 5_000),
            error: DelayRange::new(800, 1_500),
            extended_pause_probability: 0.05,
            extended_pause: DelayRange::new(4_000, 8_000),
            jitter_probability: 0.10,
            jitter: DelayRange::new(200, 1_200),
            requeue_delay: Duration::from_secs(1),
            transport_cooldown: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaperConfig {
    /// Sessions idle longer than this are deleted
    pub session_ttl: ChronoDuration,
    /// `last_nudge_at` stamps older than this are cleared
    pub nudge_flag_ttl: ChronoDuration,
    pub interval: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            session_ttl: ChronoDuration::hours(48),
            nudge_flag_ttl: ChronoDuration::hours(6),
            interval: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NudgeConfig {
    pub enabled: bool,
    /// Minimum inactivity since the last message or nudge
    pub idle_after: ChronoDuration,
    pub max_nudges: u32,
    pub interval: Duration,
}

impl Default for NudgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            idle_after: ChronoDuration::minutes(5),
            max_nudges: 2,
            interval: Duration::from_secs(60),
        }
    }
}

/// Complete bot configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub shop: ShopProfile,
    pub schedule: WeeklySchedule,
    /// Local offset used for business hours, greetings and order-id dates
    pub utc_offset: FixedOffset,
    pub render_mode: RenderMode,
    /// Enables pacing and per-customer rate limiting of outbound sends
    pub anti_abuse: bool,
    pub storage: StorageBackend,
    /// JSON catalog; the built-in catalog is used when unset
    pub catalog_path: Option<PathBuf>,
    pub admin_ids: HashSet<String>,
    /// When non-empty, only these customers get automated replies
    pub allowed_customers: HashSet<String>,
    pub rate_limit: RateLimitConfig,
    pub pacing: PacingConfig,
    pub reaper: ReaperConfig,
    pub nudge: NudgeConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            shop: ShopProfile::default(),
            schedule: WeeklySchedule::default(),
            utc_offset: default_offset(),
            render_mode: RenderMode::Text,
            anti_abuse: true,
            storage: StorageBackend::default(),
            catalog_path: None,
            admin_ids: HashSet::new(),
            allowed_customers: HashSet::new(),
            rate_limit: RateLimitConfig::default(),
            pacing: PacingConfig::default(),
            reaper: ReaperConfig::default(),
            nudge: NudgeConfig::default(),
        }
    }
}

fn default_offset() -> FixedOffset {
    FixedOffset::west_opt(3 * 3600).unwrap_or_else(|| Utc.fix())
}

impl BotConfig {
    /// Build the configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup, e.g. a map in tests
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let shop_defaults = ShopProfile::default();
        let attendant_defaults = Attendants::default();
        let shop = ShopProfile {
            name: var("SHOP_NAME").unwrap_or(shop_defaults.name),
            instagram_handle: var("INSTAGRAM_HANDLE").unwrap_or(shop_defaults.instagram_handle),
            instagram_url: var("INSTAGRAM_URL").unwrap_or(shop_defaults.instagram_url),
            catalog_url: var("CATALOG_URL").unwrap_or(shop_defaults.catalog_url),
            attendants: Attendants {
                quote: var("ATENDENTE_ORCAMENTO").unwrap_or(attendant_defaults.quote),
                tracking: var("ATENDENTE_ACOMPANHAMENTO").unwrap_or(attendant_defaults.tracking),
                general: var("ATENDENTE_GERAL").unwrap_or(attendant_defaults.general),
                whatsapp: var("WHATSAPP_CONTATO").unwrap_or(attendant_defaults.whatsapp),
            },
        };

        let schedule = match var("BUSINESS_HOURS") {
            Some(rules) => WeeklySchedule::parse(&rules).context("Invalid BUSINESS_HOURS")?,
            None => defaults.schedule,
        };

        let offset_minutes: i32 = parse_or(var("UTC_OFFSET_MINUTES"), "UTC_OFFSET_MINUTES", -180)?;
        let utc_offset = FixedOffset::east_opt(offset_minutes * 60)
            .with_context(|| format!("UTC_OFFSET_MINUTES out of range: {offset_minutes}"))?;

        let render_mode = match var("RENDER_MODE") {
            Some(mode) => mode
                .parse::<RenderMode>()
                .map_err(anyhow::Error::msg)
                .context("Invalid RENDER_MODE")?,
            None => defaults.render_mode,
        };

        let storage = match var("STORAGE_BACKEND").map(|b| b.to_lowercase()) {
            Some(backend) if backend == "postgres" => StorageBackend::Postgres {
                url: var("DATABASE_URL")
                    .context("STORAGE_BACKEND=postgres requires DATABASE_URL")?,
            },
            Some(backend) if backend == "file" => StorageBackend::File {
                dir: var("DATA_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("./data")),
            },
            Some(backend) if backend == "memory" => StorageBackend::Memory,
            Some(other) => bail!("Invalid STORAGE_BACKEND '{other}' (expected postgres, file or memory)"),
            None => match var("DATABASE_URL") {
                Some(url) => StorageBackend::Postgres { url },
                None => StorageBackend::File {
                    dir: var("DATA_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("./data")),
                },
            },
        };

        let rate_limit = RateLimitConfig {
            max_per_window: parse_or(var("RATE_LIMIT_PER_MINUTE"), "RATE_LIMIT_PER_MINUTE", 15)?,
            window: Duration::from_secs(60),
            lockout: Duration::from_secs(parse_or(
                var("RATE_LIMIT_LOCKOUT_SECS"),
                "RATE_LIMIT_LOCKOUT_SECS",
                60,
            )?),
        };
        if rate_limit.max_per_window == 0 {
            bail!("RATE_LIMIT_PER_MINUTE must be at least 1");
        }

        let reaper = ReaperConfig {
            session_ttl: ChronoDuration::hours(parse_or(var("SESSION_TTL_HOURS"), "SESSION_TTL_HOURS", 48)?),
            interval: Duration::from_secs(parse_or(
                var("REAPER_INTERVAL_SECS"),
                "REAPER_INTERVAL_SECS",
                3600,
            )?),
            ..ReaperConfig::default()
        };

        let nudge = NudgeConfig {
            enabled: parse_bool(var("RESCUE_ENABLED"), "RESCUE_ENABLED", true)?,
            idle_after: ChronoDuration::seconds(parse_or(var("NUDGE_AFTER_SECS"), "NUDGE_AFTER_SECS", 300)?),
            max_nudges: parse_or(var("NUDGE_MAX"), "NUDGE_MAX", 2)?,
            interval: Duration::from_secs(parse_or(var("NUDGE_INTERVAL_SECS"), "NUDGE_INTERVAL_SECS", 60)?),
        };

        Ok(Self {
            shop,
            schedule,
            utc_offset,
            render_mode,
            anti_abuse: parse_bool(var("ANTI_ABUSE"), "ANTI_ABUSE", true)?,
            storage,
            catalog_path: var("CATALOG_PATH").map(PathBuf::from),
            admin_ids: parse_id_list(var("ADMIN_IDS")),
            allowed_customers: parse_id_list(var("ALLOWED_CUSTOMERS")),
            rate_limit,
            pacing: defaults.pacing,
            reaper,
            nudge,
        })
    }

    pub fn is_admin(&self, customer_id: &str) -> bool {
        self.admin_ids.contains(customer_id)
    }

    /// Whether automated handling is enabled for this customer
    pub fn is_allowed(&self, customer_id: &str) -> bool {
        self.allowed_customers.is_empty()
            || self.allowed_customers.contains(customer_id)
            || self.is_admin(customer_id)
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match value {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid {key} '{raw}': {e}")),
        None => Ok(default),
    }
}

fn parse_bool(value: Option<String>, key: &str, default: bool) -> Result<bool> {
    match value.map(|v| v.to_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on" | "enabled") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off" | "disabled") => Ok(false),
        Some(v) => bail!("Invalid {key} '{v}': expected true or false"),
    }
}

fn parse_id_list(value: Option<String>) -> HashSet<String> {
    value
        .map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

//! Idle-session reaper
//!
//! Deletes sessions that have been quiet longer than the session TTL and clears stale
//! `last_nudge_at` stamps. Runs on its own timer and races with inbound turns; each
//! session record is replaced as a whole, so the worst case is a slightly stale decision.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::ReaperConfig;
use crate::error::StoreError;
use crate::store::SessionStore;

/// Outcome of one reaper pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub removed: usize,
    pub nudge_stamps_cleared: usize,
}

/// One pass over every stored session
pub async fn sweep_idle_sessions(
    sessions: &dyn SessionStore,
    config: &ReaperConfig,
    now: DateTime<Utc>,
) -> Result<ReapReport, StoreError> {
    let mut report = ReapReport::default();

    for mut session in sessions.list_all().await? {
        if now - session.last_interaction_at > config.session_ttl {
            if sessions.delete(&session.customer_id).await? {
                report.removed += 1;
                debug!(customer_id = %session.customer_id, "Idle session removed");
            }
            continue;
        }

        let stale_stamp = session
            .last_nudge_at
            .is_some_and(|nudged| now - nudged > config.nudge_flag_ttl);
        if stale_stamp {
            session.last_nudge_at = None;
            sessions.put(&session).await?;
            report.nudge_stamps_cleared += 1;
        }
    }

    if report.removed > 0 || report.nudge_stamps_cleared > 0 {
        info!(
            removed = report.removed,
            nudge_stamps_cleared = report.nudge_stamps_cleared,
            "Idle session sweep finished"
        );
    }

    Ok(report)
}

/// Run [`sweep_idle_sessions`] forever on the configured interval
pub async fn run_reaper(sessions: Arc<dyn SessionStore>, config: ReaperConfig) {
    let mut ticker = tokio::time::interval(config.interval);
    info!(
        interval_secs = config.interval.as_secs(),
        ttl_hours = config.session_ttl.num_hours(),
        "Session reaper started"
    );

    loop {
        ticker.tick().await;
        if let Err(e) = sweep_idle_sessions(sessions.as_ref(), &config, Utc::now()).await {
            error!(error = %e, "Session reaper pass failed");
        }
    }
}

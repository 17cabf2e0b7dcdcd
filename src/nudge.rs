//! Re-engagement of customers idling in the main menu
//!
//! A session qualifies when it sits in `Menu`, no human operator took over, it has not
//! exhausted its nudges, and nothing happened for `idle_after` since the later of its last
//! message and its last nudge. Each nudge is persisted before it is queued.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::NudgeConfig;
use crate::dialogue::Stage;
use crate::error::StoreError;
use crate::messages;
use crate::outbound::RenderMode;
use crate::scheduler::OutboundScheduler;
use crate::session::Session;
use crate::store::SessionStore;

fn is_due(session: &Session, config: &NudgeConfig, now: DateTime<Utc>) -> bool {
    session.stage == Stage::Menu
        && !session.human_override_active
        && !session.nudge_exhausted
        && session.nudge_count < config.max_nudges
        && now - session.last_activity_at() >= config.idle_after
}

/// Stamp every due session and return the customers to nudge
pub async fn sweep_nudges(
    sessions: &dyn SessionStore,
    config: &NudgeConfig,
    now: DateTime<Utc>,
) -> Result<Vec<String>, StoreError> {
    let mut nudged = Vec::new();

    for candidate in sessions.list_all().await? {
        if !is_due(&candidate, config, now) {
            continue;
        }

        // An inbound turn may have landed since the listing
        let Some(mut session) = sessions.get(&candidate.customer_id).await? else {
            continue;
        };
        if !is_due(&session, config, now) {
            continue;
        }

        session.nudge_count += 1;
        session.last_nudge_at = Some(now);
        if session.nudge_count >= config.max_nudges {
            session.nudge_exhausted = true;
        }
        sessions.put(&session).await?;

        debug!(
            customer_id = %session.customer_id,
            nudge_count = session.nudge_count,
            exhausted = session.nudge_exhausted,
            "Nudging idle customer"
        );
        nudged.push(session.customer_id);
    }

    Ok(nudged)
}

/// Run [`sweep_nudges`] forever, queueing the nudge text for each customer it returns
pub async fn run_nudges(
    sessions: Arc<dyn SessionStore>,
    scheduler: Arc<OutboundScheduler>,
    config: NudgeConfig,
    render_mode: RenderMode,
) {
    let mut ticker = tokio::time::interval(config.interval);
    info!(
        interval_secs = config.interval.as_secs(),
        idle_after_secs = config.idle_after.num_seconds(),
        max_nudges = config.max_nudges,
        "Re-engagement sweep started"
    );

    loop {
        ticker.tick().await;
        match sweep_nudges(sessions.as_ref(), &config, Utc::now()).await {
            Ok(customers) => {
                for customer_id in customers {
                    scheduler.enqueue(&customer_id, vec![messages::nudge().rendered(render_mode)]);
                }
            }
            Err(e) => error!(error = %e, "Re-engagement sweep failed"),
        }
    }
}

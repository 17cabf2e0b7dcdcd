//! # Sweep Tests
//!
//! Idle-session reaping and re-engagement nudges against the in-memory store.

use chrono::{Duration, Utc};
use order_intake::config::{NudgeConfig, ReaperConfig};
use order_intake::dialogue::Stage;
use order_intake::nudge::sweep_nudges;
use order_intake::reaper::sweep_idle_sessions;
use order_intake::session::Session;
use order_intake::store::Storage;

#[tokio::test]
async fn test_reaper_removes_only_expired_sessions() {
    let storage = Storage::in_memory();
    let now = Utc::now();

    storage
        .sessions
        .put(&Session::new("old@telegram", now - Duration::hours(49)))
        .await
        .unwrap();
    storage
        .sessions
        .put(&Session::new("recent@telegram", now - Duration::hours(47)))
        .await
        .unwrap();

    let report = sweep_idle_sessions(storage.sessions.as_ref(), &ReaperConfig::default(), now)
        .await
        .unwrap();

    assert_eq!(report.removed, 1);
    assert!(storage.sessions.get("old@telegram").await.unwrap().is_none());
    assert!(storage.sessions.get("recent@telegram").await.unwrap().is_some());
}

#[tokio::test]
async fn test_reaper_clears_stale_nudge_stamps_only() {
    let storage = Storage::in_memory();
    let now = Utc::now();

    let mut session = Session::new("a@telegram", now - Duration::hours(10));
    session.stage = Stage::Menu;
    session.nudge_count = 2;
    session.nudge_exhausted = true;
    session.last_nudge_at = Some(now - Duration::hours(7));
    storage.sessions.put(&session).await.unwrap();

    let report = sweep_idle_sessions(storage.sessions.as_ref(), &ReaperConfig::default(), now)
        .await
        .unwrap();
    assert_eq!(report.nudge_stamps_cleared, 1);

    let session = storage.sessions.get("a@telegram").await.unwrap().unwrap();
    assert_eq!(session.last_nudge_at, None);
    assert_eq!(session.nudge_count, 2);
    assert!(session.nudge_exhausted);
}

#[tokio::test]
async fn test_nudges_stop_after_the_maximum() {
    let storage = Storage::in_memory();
    let config = NudgeConfig::default();
    let start = Utc::now();

    let mut session = Session::new("idle@telegram", start);
    session.stage = Stage::Menu;
    storage.sessions.put(&session).await.unwrap();

    // Not idle long enough yet
    let nudged = sweep_nudges(storage.sessions.as_ref(), &config, start + Duration::minutes(4))
        .await
        .unwrap();
    assert!(nudged.is_empty());

    let first = start + Duration::minutes(5);
    let nudged = sweep_nudges(storage.sessions.as_ref(), &config, first).await.unwrap();
    assert_eq!(nudged, vec!["idle@telegram".to_string()]);

    // Counted from the nudge, not from the last message
    let nudged = sweep_nudges(storage.sessions.as_ref(), &config, first + Duration::minutes(4))
        .await
        .unwrap();
    assert!(nudged.is_empty());

    let second = first + Duration::minutes(5);
    let nudged = sweep_nudges(storage.sessions.as_ref(), &config, second).await.unwrap();
    assert_eq!(nudged.len(), 1);

    let third = second + Duration::minutes(5);
    let nudged = sweep_nudges(storage.sessions.as_ref(), &config, third).await.unwrap();
    assert!(nudged.is_empty());

    let session = storage.sessions.get("idle@telegram").await.unwrap().unwrap();
    assert_eq!(session.nudge_count, 2);
    assert!(session.nudge_exhausted);
    assert_eq!(session.last_nudge_at, Some(second));
}

#[tokio::test]
async fn test_nudges_skip_other_stages_and_overrides() {
    let storage = Storage::in_memory();
    let config = NudgeConfig::default();
    let start = Utc::now();

    let mut browsing = Session::new("browsing@telegram", start);
    browsing.stage = Stage::ProductBrowse;
    storage.sessions.put(&browsing).await.unwrap();

    let mut overridden = Session::new("human@telegram", start);
    overridden.stage = Stage::Menu;
    overridden.human_override_active = true;
    storage.sessions.put(&overridden).await.unwrap();

    let nudged = sweep_nudges(storage.sessions.as_ref(), &config, start + Duration::hours(1))
        .await
        .unwrap();
    assert!(nudged.is_empty());
}

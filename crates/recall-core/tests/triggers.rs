mod common;

use std::time::Duration;

use common::{create_note_op, wait_until, Harness};
use recall_core::SyncConfig;

/// Config with the startup flush pushed out of the way.
fn quiet_startup() -> SyncConfig {
    SyncConfig {
        startup_delay: Duration::from_secs(10_000),
        ..SyncConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_flushes_everything_queued_offline_in_order() {
    let h = Harness::new(false).await;
    h.engine.start();
    for id in ["a", "b", "c"] {
        h.engine.queue_operation(create_note_op(id)).await.unwrap();
    }
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(h.remote.calls().is_empty());

    h.monitor.set_online(true);
    wait_until(|| h.engine.status().queue_length == 0).await;

    assert_eq!(h.inserted_ids(), vec!["a", "b", "c"]);
    assert!(h.engine.status().last_sync_time.is_some());
    h.engine.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_and_enqueue_flush_without_start() {
    let h = Harness::with_config(false, SyncConfig::default()).await;
    h.engine.queue_operation(create_note_op("a")).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(h.remote.calls().is_empty());

    h.monitor.set_online(true);
    wait_until(|| h.engine.status().queue_length == 0).await;

    h.engine.queue_operation(create_note_op("b")).await.unwrap();
    wait_until(|| h.engine.status().queue_length == 0).await;
    assert_eq!(h.inserted_ids(), vec!["a", "b"]);
    h.engine.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_enqueue_while_online_flushes_immediately() {
    let h = Harness::with_config(true, quiet_startup()).await;
    h.engine.start();

    h.engine.queue_operation(create_note_op("n1")).await.unwrap();
    wait_until(|| h.engine.status().queue_length == 0).await;

    assert_eq!(h.inserted_ids(), vec!["n1"]);
    h.engine.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_periodic_timer_retries_pending_operations() {
    let h = Harness::with_config(true, quiet_startup()).await;
    h.engine.start();
    h.remote.fail_next(1);

    h.engine.queue_operation(create_note_op("n1")).await.unwrap();
    wait_until(|| h.remote.write_calls() == 1).await;
    assert_eq!(h.engine.status().queue_length, 1);

    tokio::time::sleep(Duration::from_secs(290)).await;
    assert_eq!(h.remote.write_calls(), 1);

    tokio::time::sleep(Duration::from_secs(15)).await;
    wait_until(|| h.engine.status().queue_length == 0).await;
    assert_eq!(h.remote.write_calls(), 2);
    h.engine.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_zero_flush_interval_falls_back_to_minimum() {
    let config = SyncConfig {
        flush_interval: Duration::ZERO,
        ..quiet_startup()
    };
    let h = Harness::with_config(true, config).await;
    h.engine.start();
    h.remote.fail_next(1);

    h.engine.queue_operation(create_note_op("n1")).await.unwrap();
    wait_until(|| h.remote.write_calls() == 1).await;
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(h.remote.write_calls(), 1);

    tokio::time::sleep(Duration::from_millis(600)).await;
    wait_until(|| h.engine.status().queue_length == 0).await;
    assert_eq!(h.remote.write_calls(), 2);
    h.engine.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_periodic_timer_skips_an_empty_queue() {
    let h = Harness::with_config(true, quiet_startup()).await;
    h.engine.start();

    tokio::time::sleep(Duration::from_secs(301)).await;

    assert!(h.remote.calls().is_empty());
    assert_eq!(h.engine.status().last_sync_time, None);
    h.engine.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_visibility_flush_waits_for_settle_delay() {
    let h = Harness::with_config(true, quiet_startup()).await;
    h.engine.start();
    h.remote.fail_next(1);
    h.engine.queue_operation(create_note_op("n1")).await.unwrap();
    wait_until(|| h.remote.write_calls() == 1).await;

    h.engine.notify_visibility(false);
    h.engine.notify_visibility(true);
    tokio::time::sleep(Duration::from_millis(900)).await;
    assert_eq!(h.remote.write_calls(), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    wait_until(|| h.engine.status().queue_length == 0).await;
    assert_eq!(h.remote.write_calls(), 2);
    h.engine.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_focus_flush_waits_for_shorter_settle_delay() {
    let h = Harness::with_config(true, quiet_startup()).await;
    h.engine.start();
    h.remote.fail_next(1);
    h.engine.queue_operation(create_note_op("n1")).await.unwrap();
    wait_until(|| h.remote.write_calls() == 1).await;

    h.engine.notify_focus();
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(h.remote.write_calls(), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    wait_until(|| h.engine.status().queue_length == 0).await;
    h.engine.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_startup_flush_runs_after_grace_period() {
    let h = Harness::new(true).await;
    h.engine.queue_operation(create_note_op("n1")).await.unwrap();

    h.engine.start();
    tokio::time::sleep(Duration::from_millis(1_900)).await;
    assert!(h.remote.calls().is_empty());

    tokio::time::sleep(Duration::from_millis(200)).await;
    wait_until(|| h.engine.status().queue_length == 0).await;
    h.engine.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_passive_triggers_skip_without_user() {
    let h = Harness::new(true).await;
    h.engine.queue_operation(create_note_op("n1")).await.unwrap();
    h.identity.sign_out();

    h.engine.start();
    h.engine.notify_focus();
    tokio::time::sleep(Duration::from_secs(400)).await;

    assert!(h.remote.calls().is_empty());
    assert_eq!(h.engine.status().queue_length, 1);
    h.engine.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_timers_and_reconnect() {
    let h = Harness::new(false).await;
    h.engine.start();
    h.engine.queue_operation(create_note_op("n1")).await.unwrap();

    h.engine.shutdown();
    h.monitor.set_online(true);
    h.engine.notify_focus();
    tokio::time::sleep(Duration::from_secs(600)).await;

    assert!(h.remote.calls().is_empty());
    assert_eq!(h.engine.pending_operations().await.len(), 1);

    // Explicit flushes still work after shutdown
    assert_eq!(h.engine.process_queue().await.unwrap().applied, 1);
}

mod support;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::{EngineCommand, EngineState};
use engine::{Cadence, Scheduler};
use support::*;
use tokio_util::sync::CancellationToken;

const EURUSD: &str = "frxEURUSD";

fn cadence() -> Cadence {
    Cadence {
        heartbeat: Duration::from_secs(30 * 60),
        scan: Duration::from_secs(5 * 60),
        reconcile: Duration::from_secs(60),
    }
}

#[tokio::test(start_paused = true)]
async fn boot_sends_heartbeat_and_scans_immediately() {
    let source = ScriptedSource::new();
    let notifier = RecordingNotifier::new();
    source.set(EURUSD, bullish_window(Utc::now()));
    let engine = Arc::new(engine(&[EURUSD], source.clone(), notifier.clone()));

    let shutdown = CancellationToken::new();
    let (scheduler, handle) = Scheduler::new(engine, cadence(), shutdown.clone());
    let task = tokio::spawn(scheduler.run());

    tokio::time::sleep(Duration::from_secs(1)).await;
    let messages = notifier.messages();
    assert_eq!(messages.len(), 2, "{messages:?}");
    assert!(messages[0].contains("Heartbeat"));
    assert!(messages[1].contains("SIGNAL DETECTED"));
    assert_eq!(handle.state().await, EngineState::Running);
    assert_eq!(handle.open_signals().await.len(), 1);

    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn reconcile_tick_resolves_due_signal() {
    let source = ScriptedSource::new();
    let notifier = RecordingNotifier::new();
    source.set(EURUSD, bullish_window(Utc::now()));
    let engine = Arc::new(engine(&[EURUSD], source.clone(), notifier.clone()));

    let shutdown = CancellationToken::new();
    let (scheduler, handle) = Scheduler::new(engine, cadence(), shutdown.clone());
    let task = tokio::spawn(scheduler.run());

    tokio::time::sleep(Duration::from_secs(1)).await;
    source.set(EURUSD, latest_close(Utc::now() + chrono::Duration::minutes(1), 1.1070));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(handle.open_signals().await.is_empty());
    assert_eq!(notifier.count_containing("✅ Win"), 1);

    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn pause_suspends_scanning_but_not_reconciliation() {
    let source = ScriptedSource::new();
    let notifier = RecordingNotifier::new();
    source.set(EURUSD, bullish_window(Utc::now()));
    let engine = Arc::new(engine(&[EURUSD], source.clone(), notifier.clone()));

    let shutdown = CancellationToken::new();
    let (scheduler, handle) = Scheduler::new(engine, cadence(), shutdown.clone());
    let task = tokio::spawn(scheduler.run());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(source.calls(), 1);
    source.set(EURUSD, latest_close(Utc::now() + chrono::Duration::minutes(1), 1.1070));

    handle.send(EngineCommand::Pause).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(handle.state().await, EngineState::Paused);

    // Reconcile at 1 min still fetches; the scan at 5 min does not.
    tokio::time::sleep(Duration::from_secs(6 * 60)).await;
    assert_eq!(source.calls(), 2);
    assert!(handle.open_signals().await.is_empty());

    handle.send(EngineCommand::Resume).await;
    tokio::time::sleep(Duration::from_secs(5 * 60)).await;
    assert_eq!(handle.state().await, EngineState::Running);
    // The two-candle feed is too short to evaluate, but the scan did fetch.
    assert_eq!(source.calls(), 3, "scan at 10 min runs again after resume");

    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_the_loop() {
    let source = ScriptedSource::new();
    let notifier = RecordingNotifier::new();
    let engine = Arc::new(engine(&[EURUSD], source.clone(), notifier.clone()));

    let shutdown = CancellationToken::new();
    let (scheduler, handle) = Scheduler::new(engine, cadence(), shutdown.clone());
    let task = tokio::spawn(scheduler.run());

    tokio::time::sleep(Duration::from_secs(1)).await;
    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("scheduler did not stop")
        .unwrap();
    assert_eq!(handle.state().await, EngineState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn signal_from_periodic_scan_resolves_on_next_reconcile_tick() {
    let source = ScriptedSource::new();
    let notifier = RecordingNotifier::new();
    // Unavailable at boot; turns bullish before the 5 min scan.
    source.fail(EURUSD);
    let engine = Arc::new(engine(&[EURUSD], source.clone(), notifier.clone()));

    let shutdown = CancellationToken::new();
    let (scheduler, handle) = Scheduler::new(engine, cadence(), shutdown.clone());
    let task = tokio::spawn(scheduler.run());

    tokio::time::sleep(Duration::from_secs(290)).await;
    source.set(EURUSD, bullish_window(Utc::now()));

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(handle.open_signals().await.len(), 1);
    source.set(EURUSD, latest_close(Utc::now() + chrono::Duration::minutes(1), 1.1070));

    // 310 s -> 365 s crosses exactly one reconcile tick (360 s).
    tokio::time::sleep(Duration::from_secs(55)).await;
    assert!(handle.open_signals().await.is_empty());
    assert_eq!(notifier.count_containing("✅ Win"), 1);

    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn slow_reconcile_on_shared_tick_does_not_delay_next_resolution() {
    const USDJPY: &str = "frxUSDJPY";
    let source = ScriptedSource::new();
    let notifier = RecordingNotifier::new();
    source.fail(EURUSD);
    source.set(USDJPY, bullish_window(Utc::now()));
    let engine = Arc::new(engine(&[EURUSD, USDJPY], source.clone(), notifier.clone()));

    let shutdown = CancellationToken::new();
    let (scheduler, handle) = Scheduler::new(engine, cadence(), shutdown.clone());
    let task = tokio::spawn(scheduler.run());

    // USDJPY opens at boot, then its reconcile fetches fail until 5 min.
    tokio::time::sleep(Duration::from_secs(1)).await;
    source.fail(USDJPY);

    tokio::time::sleep(Duration::from_secs(289)).await;
    assert_eq!(handle.open_signals().await.len(), 1);
    source.set(EURUSD, bullish_window(Utc::now()));
    // The 5 min reconcile pass runs before the scan and takes 50 ms.
    source.set(USDJPY, latest_close(Utc::now() + chrono::Duration::minutes(1), 1.1070));
    source.slow(USDJPY, Duration::from_millis(50));

    tokio::time::sleep(Duration::from_secs(20)).await;
    let open = handle.open_signals().await;
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].symbol, EURUSD);
    source.set(EURUSD, latest_close(Utc::now() + chrono::Duration::minutes(1), 1.1070));

    tokio::time::sleep(Duration::from_secs(55)).await;
    assert!(handle.open_signals().await.is_empty());
    assert_eq!(notifier.count_containing("✅ Win"), 2);

    shutdown.cancel();
    task.await.unwrap();
}

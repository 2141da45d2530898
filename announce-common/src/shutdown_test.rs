//! Unit tests for shutdown signalling.

use super::shutdown::shutdown_channel;
use std::time::Duration;

#[test]
fn test_listener_starts_untriggered() {
    let (_tx, rx) = shutdown_channel();
    assert!(!rx.is_triggered());
}

#[test]
fn test_trigger_is_idempotent() {
    let (tx, rx) = shutdown_channel();
    tx.trigger();
    tx.trigger();
    assert!(rx.is_triggered());
}

#[tokio::test]
async fn test_all_listeners_wake() {
    let (tx, rx) = shutdown_channel();
    let mut first = rx.clone();
    let mut second = tx.subscribe();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.trigger();
    });

    tokio::time::timeout(Duration::from_secs(1), first.wait())
        .await
        .expect("first listener should wake");
    tokio::time::timeout(Duration::from_secs(1), second.wait())
        .await
        .expect("second listener should wake");
}

#[tokio::test]
async fn test_wait_after_trigger_returns_immediately() {
    let (tx, mut rx) = shutdown_channel();
    tx.trigger();
    tokio::time::timeout(Duration::from_millis(100), rx.wait())
        .await
        .expect("already-triggered listener should not block");
}

#[tokio::test]
async fn test_dropped_trigger_releases_listener() {
    let (tx, mut rx) = shutdown_channel();
    drop(tx);
    tokio::time::timeout(Duration::from_millis(100), rx.wait())
        .await
        .expect("dropping the trigger should release listeners");
}

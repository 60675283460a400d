//! Debouncer tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pose_sync::sync::Debouncer;

fn counter_action(count: &Arc<AtomicUsize>) -> impl FnOnce() + Send + 'static {
    let count = count.clone();
    move || {
        count.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn rapid_schedules_fire_once() {
    let debouncer = Debouncer::new(Duration::from_millis(30));
    let fired = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
        assert!(debouncer.schedule(counter_action(&fired)));
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(fired.load(Ordering::SeqCst), 0);
    assert!(debouncer.is_armed());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(!debouncer.is_armed());
}

#[tokio::test]
async fn cancel_prevents_firing() {
    let debouncer = Debouncer::new(Duration::from_millis(20));
    let fired = Arc::new(AtomicUsize::new(0));

    debouncer.schedule(counter_action(&fired));
    assert!(debouncer.cancel());
    assert!(!debouncer.cancel());

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[test]
fn schedule_without_runtime_reports_false() {
    let debouncer = Debouncer::new(Duration::from_millis(1));
    let fired = Arc::new(AtomicUsize::new(0));
    assert!(!debouncer.schedule(counter_action(&fired)));
    assert!(!debouncer.is_armed());
}

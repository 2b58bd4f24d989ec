//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};

use pollwatch::{Event, EventKind, Watcher};
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Route `tracing` output through the test harness. Enable with e.g.
/// `RUST_LOG=pollwatch=debug cargo test`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

/// Every event a watcher delivered, in delivery order.
pub type Recorded = Arc<Mutex<Vec<Event>>>;

/// Register one recording listener per event kind.
pub fn record_events(watcher: &Watcher) -> Recorded {
    let recorded: Recorded = Arc::default();
    for kind in EventKind::ALL {
        let recorded = recorded.clone();
        watcher.register(kind, move |event: Event| {
            let recorded = recorded.clone();
            async move {
                recorded.lock().unwrap().push(event);
                anyhow::Ok(())
            }
        });
    }
    recorded
}

/// Drain what was recorded so far.
pub fn take(recorded: &Recorded) -> Vec<Event> {
    std::mem::take(&mut *recorded.lock().unwrap())
}

pub fn kinds(events: &[Event]) -> Vec<EventKind> {
    events.iter().map(|event| event.kind).collect()
}

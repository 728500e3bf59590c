//! Helpers shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

/// Counts events at `INFO` or more severe emitted on the current thread.
#[derive(Clone, Default)]
pub struct EventCounter {
    info: Arc<AtomicUsize>,
    error: Arc<AtomicUsize>,
}

impl EventCounter {
    /// Install the counter as the thread-local subscriber until the guard drops.
    pub fn install() -> (Self, DefaultGuard) {
        let counter = Self::default();
        let subscriber = tracing_subscriber::registry().with(counter.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (counter, guard)
    }

    pub fn info_or_above(&self) -> usize {
        self.info.load(Ordering::SeqCst)
    }

    pub fn errors(&self) -> usize {
        self.error.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for EventCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        if level <= Level::INFO {
            self.info.fetch_add(1, Ordering::SeqCst);
        }
        if level == Level::ERROR {
            self.error.fetch_add(1, Ordering::SeqCst);
        }
    }
}

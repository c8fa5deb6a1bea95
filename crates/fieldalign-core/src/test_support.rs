use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

struct WarningCounter(Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for WarningCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Runs `run` under a thread-local subscriber and counts the `WARN` events it emits.
pub(crate) fn count_warnings<T>(run: impl FnOnce() -> T) -> (T, usize) {
    let warnings = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(WarningCounter(Arc::clone(&warnings)));
    let output = tracing::subscriber::with_default(subscriber, run);
    (output, warnings.load(Ordering::SeqCst))
}

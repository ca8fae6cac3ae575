//! Common test fixtures for ibctx integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ibctx::test_utils::{FakeDispatcher, FakeVerbs};
use ibctx::{ClockMode, ContextConfig, DeviceContext};

/// The async event fd reported by `FakeVerbs`.
pub const FAKE_FD: i32 = 7;

/// A fake device and dispatcher pair.
pub fn fakes() -> (Arc<FakeVerbs>, Arc<FakeDispatcher>) {
    (Arc::new(FakeVerbs::new()), Arc::new(FakeDispatcher::new()))
}

/// Construct a context over the given fakes with default config and
/// disabled timestamping.
pub fn context(verbs: &Arc<FakeVerbs>, dispatcher: &Arc<FakeDispatcher>) -> DeviceContext {
    DeviceContext::new(
        verbs.clone(),
        dispatcher.clone(),
        ClockMode::Disabled,
        ContextConfig::default(),
    )
    .expect("context construction")
}

/// Per-severity event counts observed by [`counting_subscriber`].
#[derive(Default)]
pub struct LogCounts {
    pub errors: AtomicUsize,
    pub warnings: AtomicUsize,
    pub infos: AtomicUsize,
}

struct CountingSubscriber {
    counts: Arc<LogCounts>,
}

impl tracing::Subscriber for CountingSubscriber {
    fn enabled(&self, _metadata: &tracing::Metadata<'_>) -> bool {
        true
    }

    fn new_span(&self, _attrs: &tracing::span::Attributes<'_>) -> tracing::span::Id {
        tracing::span::Id::from_u64(1)
    }

    fn record(&self, _span: &tracing::span::Id, _values: &tracing::span::Record<'_>) {}

    fn record_follows_from(&self, _span: &tracing::span::Id, _follows: &tracing::span::Id) {}

    fn event(&self, event: &tracing::Event<'_>) {
        match *event.metadata().level() {
            tracing::Level::ERROR => self.counts.errors.fetch_add(1, Ordering::SeqCst),
            tracing::Level::WARN => self.counts.warnings.fetch_add(1, Ordering::SeqCst),
            tracing::Level::INFO => self.counts.infos.fetch_add(1, Ordering::SeqCst),
            _ => 0,
        };
    }

    fn enter(&self, _span: &tracing::span::Id) {}

    fn exit(&self, _span: &tracing::span::Id) {}
}

/// Run `f` with a subscriber that counts log events by severity and
/// return the counts.
pub fn with_counted_logs<R>(f: impl FnOnce() -> R) -> (R, Arc<LogCounts>) {
    let counts = Arc::new(LogCounts::default());
    let subscriber = CountingSubscriber {
        counts: counts.clone(),
    };
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, counts)
}

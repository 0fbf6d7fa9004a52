//! Pipeline counters, logged and zeroed every 60s by a background task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const REPORT_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
pub struct Stats {
    pub partials_received: AtomicU64,
    pub translated: AtomicU64,
    pub published: AtomicU64,
    pub held: AtomicU64,
    pub skipped_change: AtomicU64,
    /// Declared for parity with the reference counters; nothing increments
    /// it today — see the pipeline module notes.
    pub skipped_sentence: AtomicU64,
}

impl Stats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn snapshot_and_reset(&self) -> [u64; 6] {
        [
            self.partials_received.swap(0, Ordering::Relaxed),
            self.translated.swap(0, Ordering::Relaxed),
            self.published.swap(0, Ordering::Relaxed),
            self.held.swap(0, Ordering::Relaxed),
            self.skipped_change.swap(0, Ordering::Relaxed),
            self.skipped_sentence.swap(0, Ordering::Relaxed),
        ]
    }
}

/// Spawn the periodic stats reporter. Returns its `JoinHandle` so callers
/// can abort it on shutdown.
pub fn spawn_reporter(stats: Arc<Stats>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(REPORT_INTERVAL);
        interval.tick().await; // first tick fires immediately, skip it
        loop {
            interval.tick().await;
            let [partials_received, translated, published, held, skipped_change, skipped_sentence] =
                stats.snapshot_and_reset();
            tracing::info!(
                partials_received,
                translated,
                published,
                held,
                skipped_change,
                skipped_sentence,
                "pipeline stats (last 60s)"
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_resets_counters() {
        let stats = Stats::new();
        stats.partials_received.fetch_add(5, Ordering::Relaxed);
        stats.translated.fetch_add(2, Ordering::Relaxed);
        let snap = stats.snapshot_and_reset();
        assert_eq!(snap[0], 5);
        assert_eq!(snap[1], 2);
        assert_eq!(stats.partials_received.load(Ordering::Relaxed), 0);
        assert_eq!(stats.translated.load(Ordering::Relaxed), 0);
    }
}

//! The orchestrator: per-triple state, debounce/hold timers, independent
//! translation dispatch, and publish decisions.

use crate::config::Config;
use crate::gates::{change_gate, sentence_gate, stability_gate};
use crate::provider::TranslationProvider;
use crate::stats::Stats;
use crate::types::{PublishAction, TranscriptionEvent, TranslationPayload, TripleKey};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::Duration;

/// What the pipeline needs from the bus adapter. Defined here (the
/// consumer) rather than in `bus`, so the pipeline stays testable with a
/// recording double and no live broker.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        session_id: &str,
        channel_id: &str,
        action: PublishAction,
        payload: TranslationPayload,
    );
}

/// Per-triple mutable state. One `Mutex<SegmentState>` per triple, not a
/// single global lock, so unrelated triples never contend.
#[derive(Default)]
struct SegmentState {
    last_translated_source: String,
    last_published_text: String,
    last_sentence_count: usize,
    has_published: bool,
    consecutive_holds: u32,
    held_translation: Option<String>,
    debounce_handle: Option<JoinHandle<()>>,
    hold_handle: Option<JoinHandle<()>>,
}

/// Tracks outstanding independent translation dispatch tasks so `stop()`
/// can wait for them to drain instead of leaking. Debounce and hold
/// timers are *not* registered here — they're routinely cancelled via
/// their own `JoinHandle::abort()`, which would never reach a matching
/// `end()` and would leave the counter stuck above zero forever.
#[derive(Default)]
struct TaskRegistry {
    count: AtomicI64,
    notify: Notify,
}

impl TaskRegistry {
    fn begin(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn end(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notify.notify_waiters();
        }
    }

    async fn drain(&self) {
        loop {
            let notified = self.notify.notified();
            if self.count.load(Ordering::SeqCst) <= 0 {
                return;
            }
            notified.await;
        }
    }
}

pub struct Pipeline {
    provider: Arc<dyn TranslationProvider>,
    publisher: Arc<dyn Publisher>,
    stats: Arc<Stats>,
    change_threshold: f64,
    min_new_chars: usize,
    partial_debounce_ms: u64,
    stability_threshold: f64,
    max_hold_seconds: f64,
    max_consecutive_holds: u32,
    states: Mutex<HashMap<TripleKey, Arc<Mutex<SegmentState>>>>,
    tasks: TaskRegistry,
}

impl Pipeline {
    pub fn new(
        config: &Config,
        provider: Arc<dyn TranslationProvider>,
        publisher: Arc<dyn Publisher>,
        stats: Arc<Stats>,
    ) -> Arc<Self> {
        Arc::new(Self {
            provider,
            publisher,
            stats,
            change_threshold: config.change_threshold,
            min_new_chars: config.min_new_chars,
            partial_debounce_ms: config.partial_debounce_ms,
            stability_threshold: config.stability_threshold,
            max_hold_seconds: config.max_hold_seconds,
            max_consecutive_holds: config.max_consecutive_holds,
            states: Mutex::new(HashMap::new()),
            tasks: TaskRegistry::default(),
        })
    }

    /// A partial transcription event, gated and (maybe) dispatched
    /// independently per target language.
    pub async fn handle_partial(
        self: &Arc<Self>,
        session_id: &str,
        channel_id: &str,
        event: TranscriptionEvent,
        matching_targets: &[String],
    ) {
        for target_lang in matching_targets {
            self.stats.partials_received.fetch_add(1, Ordering::Relaxed);

            let key = TripleKey::new(session_id, channel_id, target_lang.clone());
            let state_arc = self.get_or_create_state(key.clone()).await;

            let mut state = state_arc.lock().await;

            if change_gate::should_skip(
                &state.last_translated_source,
                &event.text,
                self.change_threshold,
                self.min_new_chars,
            ) {
                self.stats.skipped_change.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            let lang_for_sentence = event.lang.as_deref();
            let (new_boundary, new_count) =
                sentence_gate::has_new_sentence(&event.text, lang_for_sentence, state.last_sentence_count);
            state.last_sentence_count = new_count;

            if let Some(handle) = state.debounce_handle.take() {
                handle.abort();
            }

            if new_boundary {
                self.spawn_dispatch(key, state_arc.clone(), event.clone(), target_lang.clone());
            } else {
                let pipeline = self.clone();
                let key2 = key.clone();
                let state_arc2 = state_arc.clone();
                let event2 = event.clone();
                let target2 = target_lang.clone();
                let debounce_ms = self.partial_debounce_ms;

                // Not registered in `self.tasks`: this timer is routinely
                // `abort()`'d by a later partial, which would never reach
                // `tasks.end()` and would leave `drain()` hanging forever.
                // Only the independent dispatch it spawns is tracked.
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(debounce_ms)).await;
                    pipeline.spawn_dispatch(key2, state_arc2, event2, target2);
                });
                state.debounce_handle = Some(handle);
            }
        }
    }

    /// A final transcription event. Bypasses every gate, translates all
    /// matching targets in parallel, publishes every success, then drops
    /// the triple's state.
    pub async fn handle_final(
        self: &Arc<Self>,
        session_id: &str,
        channel_id: &str,
        event: TranscriptionEvent,
        matching_targets: &[String],
    ) {
        let mut join_set = tokio::task::JoinSet::new();

        for target_lang in matching_targets {
            let key = TripleKey::new(session_id, channel_id, target_lang.clone());

            if let Some(state_arc) = {
                let mut states = self.states.lock().await;
                states.remove(&key)
            } {
                let mut state = state_arc.lock().await;
                if let Some(h) = state.debounce_handle.take() {
                    h.abort();
                }
                if let Some(h) = state.hold_handle.take() {
                    h.abort();
                }
            }

            let provider = self.provider.clone();
            let event_clone = event.clone();
            let target_clone = target_lang.clone();
            let source_lang = event.lang.clone().unwrap_or_default();

            join_set.spawn(async move {
                let result = provider.translate(&event_clone.text, &source_lang, &target_clone).await;
                (key, event_clone, target_clone, result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            let Ok((key, event_clone, target_clone, result)) = joined else {
                continue;
            };
            match result {
                Ok(translated) => {
                    self.stats.translated.fetch_add(1, Ordering::Relaxed);
                    let payload = TranslationPayload::build(&event_clone, translated, &target_clone);
                    self.publisher
                        .publish(&key.session_id, &key.channel_id, PublishAction::Final, payload)
                        .await;
                    self.stats.published.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    tracing::error!(target_lang = %target_clone, error = %err, "final translation failed");
                }
            }
        }
    }

    /// Cancel all pending timers and wait (best-effort) for outstanding
    /// independent tasks to finish.
    pub async fn stop(&self) {
        let mut states = self.states.lock().await;
        for state_arc in states.values() {
            let mut state = state_arc.lock().await;
            if let Some(h) = state.debounce_handle.take() {
                h.abort();
            }
            if let Some(h) = state.hold_handle.take() {
                h.abort();
            }
        }
        states.clear();
        drop(states);
        self.tasks.drain().await;
    }

    async fn get_or_create_state(&self, key: TripleKey) -> Arc<Mutex<SegmentState>> {
        let mut states = self.states.lock().await;
        states.entry(key).or_insert_with(|| Arc::new(Mutex::new(SegmentState::default()))).clone()
    }

    /// Register and spawn an independent translation dispatch task. Not
    /// owned by the debounce timer that may have triggered it: once this
    /// runs, no later partial can cancel it.
    fn spawn_dispatch(
        self: &Arc<Self>,
        key: TripleKey,
        state_arc: Arc<Mutex<SegmentState>>,
        event: TranscriptionEvent,
        target_lang: String,
    ) {
        self.tasks.begin();
        let pipeline = self.clone();
        tokio::spawn(async move {
            pipeline.dispatch_translation(key, state_arc, event, target_lang).await;
            pipeline.tasks.end();
        });
    }

    async fn is_current(&self, key: &TripleKey, expected: &Arc<Mutex<SegmentState>>) -> bool {
        let states = self.states.lock().await;
        states.get(key).map(|s| Arc::ptr_eq(s, expected)).unwrap_or(false)
    }

    async fn dispatch_translation(
        self: Arc<Self>,
        key: TripleKey,
        state_arc: Arc<Mutex<SegmentState>>,
        event: TranscriptionEvent,
        target_lang: String,
    ) {
        let source_lang = event.lang.clone().unwrap_or_default();
        let result = self.provider.translate(&event.text, &source_lang, &target_lang).await;

        // Staleness check: a final may have cleared this triple's state
        // while the RPC was in flight. Discard silently, no publish.
        if !self.is_current(&key, &state_arc).await {
            return;
        }

        let translated = match result {
            Ok(t) => t,
            Err(err) => {
                tracing::error!(target_lang = %target_lang, error = %err, "translation failed");
                return;
            }
        };

        let mut state = state_arc.lock().await;
        state.last_translated_source = event.text.clone();
        self.stats.translated.fetch_add(1, Ordering::Relaxed);

        let (is_stable, _ratio) =
            stability_gate::check_stability(&state.last_published_text, &translated, self.stability_threshold);

        if is_stable || !state.has_published {
            self.publish_and_settle(&key, &event, &translated, &target_lang, &mut state).await;
        } else {
            state.consecutive_holds += 1;
            state.held_translation = Some(translated.clone());
            self.stats.held.fetch_add(1, Ordering::Relaxed);

            if state.consecutive_holds >= self.max_consecutive_holds {
                self.publish_and_settle(&key, &event, &translated, &target_lang, &mut state).await;
            } else {
                if let Some(h) = state.hold_handle.take() {
                    h.abort();
                }
                self.arm_hold_timer(key, state_arc.clone(), event, target_lang, &mut state);
            }
        }
    }

    /// Publish `translated` as the triple's new display text and reset
    /// the hold bookkeeping. Shared by the stable-path publish and both
    /// force-publish escape hatches.
    async fn publish_and_settle(
        &self,
        key: &TripleKey,
        event: &TranscriptionEvent,
        translated: &str,
        target_lang: &str,
        state: &mut SegmentState,
    ) {
        let payload = TranslationPayload::build(event, translated.to_string(), target_lang);
        self.publisher
            .publish(&key.session_id, &key.channel_id, PublishAction::Partial, payload)
            .await;

        state.last_published_text = translated.to_string();
        state.has_published = true;
        state.consecutive_holds = 0;
        state.held_translation = None;
        if let Some(h) = state.hold_handle.take() {
            h.abort();
        }
        self.stats.published.fetch_add(1, Ordering::Relaxed);
    }

    /// Arm (re-arm) the hold timer for `maxHoldSeconds`. Fires a
    /// force-publish of whatever translation is still held when it goes
    /// off, unless a later publish already cleared it.
    fn arm_hold_timer(
        self: &Arc<Self>,
        key: TripleKey,
        state_arc: Arc<Mutex<SegmentState>>,
        event: TranscriptionEvent,
        target_lang: String,
        state: &mut SegmentState,
    ) {
        let pipeline = self.clone();
        let max_hold = self.max_hold_seconds;

        // Same reasoning as the debounce timer above: re-arming aborts the
        // previous handle, so this must stay outside `self.tasks`.
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs_f64(max_hold)).await;
            pipeline.fire_hold_timer(key, state_arc, event, target_lang).await;
        });
        state.hold_handle = Some(handle);
    }

    async fn fire_hold_timer(
        self: Arc<Self>,
        key: TripleKey,
        state_arc: Arc<Mutex<SegmentState>>,
        event: TranscriptionEvent,
        target_lang: String,
    ) {
        if !self.is_current(&key, &state_arc).await {
            return;
        }
        let mut state = state_arc.lock().await;
        state.hold_handle = None;
        if let Some(held) = state.held_translation.take() {
            self.publish_and_settle(&key, &event, &held, &target_lang, &mut state).await;
        }
    }
}

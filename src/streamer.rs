//! Progress streamer.
//!
//! Each subscription owns its own interval and a receiver on the run state.
//! While the run state is [`RunState::Running`], every tick reads the status
//! file and emits the completed-cycles counter. While it is not, the
//! subscription parks on the run state's change notification and does no
//! ticking at all. Dropping the stream drops both, so no further reads happen
//! after a consumer leaves.

use std::{pin::Pin, time::Duration};

use futures::stream;
use tokio::{
    sync::watch,
    time::{Instant, Interval, MissedTickBehavior, interval_at},
};
use tracing::{debug, warn};

use crate::{
    codec::SettingsTable,
    state::RunStateHandle,
    store::seed_defaults,
    traits::StatusStore,
    types::{RunState, Setting, StatusError},
};

/// Default interval between progress ticks.
pub const DEFAULT_STREAM_INTERVAL: Duration = Duration::from_millis(1000);

/// A stream of completed-cycle counter values.
///
/// Unbounded: it only ends when dropped.
pub type ProgressStream = Pin<Box<dyn futures::Stream<Item = String> + Send>>;

/// Streams the `CC_COMPLETE` counter to subscribers.
#[derive(Debug, Clone)]
pub struct ProgressStreamer<S: StatusStore> {
    store: S,
    run_state: RunStateHandle,
    interval: Duration,
}

impl<S: StatusStore> ProgressStreamer<S> {
    /// Creates a streamer over `store`, gated on `run_state`.
    pub const fn new(store: S, run_state: RunStateHandle, interval: Duration) -> Self {
        Self { store, run_state, interval }
    }

    /// Seeds the status file with defaults if it does not exist yet.
    pub async fn ensure_seeded(&self) -> Result<bool, StatusError> {
        seed_defaults(&self.store).await
    }

    /// Opens a new subscription.
    ///
    /// The first tick fires one interval after this call, or one interval
    /// after the rig starts running. Ticks where the file cannot be read or
    /// decoded emit nothing. The stream ends once every run state handle is
    /// gone.
    pub fn subscribe(&self) -> ProgressStream {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let tick = Tick {
            ticker,
            store: self.store.clone(),
            run_state: self.run_state.subscribe(),
        };

        Box::pin(stream::unfold(tick, |mut tick| async move {
            loop {
                if !running(&tick.run_state) {
                    let started = tick.run_state.wait_for(|state| state.is_running()).await.is_ok();
                    if !started {
                        debug!("run state closed, ending progress stream");
                        return None;
                    }
                    tick.ticker.reset();
                }

                tick.ticker.tick().await;
                if !running(&tick.run_state) {
                    continue;
                }
                if let Some(value) = sample(&tick.store).await {
                    return Some((value, tick));
                }
            }
        }))
    }

    /// Returns the tick interval.
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

/// Per-subscription state carried through the stream.
struct Tick<S> {
    ticker: Interval,
    store: S,
    run_state: watch::Receiver<RunState>,
}

fn running(run_state: &watch::Receiver<RunState>) -> bool {
    run_state.borrow().is_running()
}

async fn sample<S: StatusStore>(store: &S) -> Option<String> {
    match read_counter(store).await {
        Ok(value) => {
            debug!(value = %value, "progress tick");
            Some(value)
        }
        Err(e) => {
            warn!(location = %store.location(), error = %e, "skipping progress tick");
            None
        }
    }
}

async fn read_counter<S: StatusStore>(store: &S) -> Result<String, StatusError> {
    let raw = store.read().await?;
    let table = SettingsTable::decode(&raw)?;
    Ok(table.get_or(Setting::CompletedCycles, "0").trim().to_string())
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use tokio::time::timeout;

    use super::*;
    use crate::{
        codec::StatusRecord,
        store::MemoryStatusStore,
        writer::{StatusUpdate, StatusWriter, TaskSnapshot},
    };

    const TICK: Duration = Duration::from_millis(20);

    fn record_with_counter(counter: &str) -> String {
        StatusRecord { current_cycle: counter.to_string(), ..StatusRecord::default() }.encode()
    }

    fn task(current: &str, total: &str) -> TaskSnapshot {
        TaskSnapshot {
            current_cycle: Some(current.into()),
            total_cycle: Some(total.into()),
            ..TaskSnapshot::default()
        }
    }

    #[tokio::test]
    async fn test_emits_counter_while_running() {
        let store = MemoryStatusStore::with_contents(record_with_counter(" 7 "));
        let streamer = ProgressStreamer::new(store, RunStateHandle::new(RunState::Running), TICK);

        let mut stream = streamer.subscribe();
        let value = timeout(TICK * 10, stream.next()).await.unwrap();
        assert_eq!(value.as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn test_silent_while_stopped() {
        let store = MemoryStatusStore::with_contents(record_with_counter("3"));
        let streamer = ProgressStreamer::new(store.clone(), RunStateHandle::default(), TICK);

        let mut stream = streamer.subscribe();
        assert!(timeout(TICK * 5, stream.next()).await.is_err());
        assert_eq!(store.reads(), 0);
    }

    #[tokio::test]
    async fn test_missing_counter_streams_fallback() {
        let store = MemoryStatusStore::with_contents("Setting,Value\nJOINT,Part 1\n");
        let streamer = ProgressStreamer::new(store, RunStateHandle::new(RunState::Running), TICK);

        let value = timeout(TICK * 10, streamer.subscribe().next()).await.unwrap();
        assert_eq!(value.as_deref(), Some("0"));
    }

    #[tokio::test]
    async fn test_malformed_ticks_are_skipped() {
        let store = MemoryStatusStore::with_contents("garbage");
        let streamer =
            ProgressStreamer::new(store.clone(), RunStateHandle::new(RunState::Running), TICK);

        let mut stream = streamer.subscribe();
        assert!(timeout(TICK * 4, stream.next()).await.is_err());
        assert!(store.reads() >= 1);

        store.replace(record_with_counter("2")).await.unwrap();
        let value = timeout(TICK * 10, stream.next()).await.unwrap();
        assert_eq!(value.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_pause_and_resume_follow_writes() {
        let store = MemoryStatusStore::new();
        let run_state = RunStateHandle::default();
        let writer = StatusWriter::new(store.clone(), run_state.clone());
        let streamer = ProgressStreamer::new(store, run_state, TICK);
        let mut stream = streamer.subscribe();

        writer.write(StatusUpdate::new("running", task("4", "10"))).await.unwrap();
        let value = timeout(TICK * 10, stream.next()).await.unwrap();
        assert_eq!(value.as_deref(), Some("4"));

        writer.write(StatusUpdate::new("pause", task("5", "10"))).await.unwrap();
        assert!(timeout(TICK * 5, stream.next()).await.is_err());

        writer.write(StatusUpdate::new("running", task("6", "10"))).await.unwrap();
        let value = timeout(TICK * 10, stream.next()).await.unwrap();
        assert_eq!(value.as_deref(), Some("6"));
    }

    #[tokio::test]
    async fn test_drop_stops_reads() {
        let store = MemoryStatusStore::with_contents(record_with_counter("1"));
        let streamer =
            ProgressStreamer::new(store.clone(), RunStateHandle::new(RunState::Running), TICK);

        let mut stream = streamer.subscribe();
        timeout(TICK * 10, stream.next()).await.unwrap();
        drop(stream);

        let reads = store.reads();
        tokio::time::sleep(TICK * 5).await;
        assert_eq!(store.reads(), reads);
    }

    #[tokio::test]
    async fn test_subscriptions_are_independent() {
        let store = MemoryStatusStore::with_contents(record_with_counter("9"));
        let streamer =
            ProgressStreamer::new(store.clone(), RunStateHandle::new(RunState::Running), TICK);

        let mut first = streamer.subscribe();
        let mut second = streamer.subscribe();

        assert_eq!(timeout(TICK * 10, first.next()).await.unwrap().as_deref(), Some("9"));
        assert_eq!(timeout(TICK * 10, second.next()).await.unwrap().as_deref(), Some("9"));
        assert!(store.reads() >= 2);
    }

    #[tokio::test]
    async fn test_start_wakes_stopped_subscription() {
        let store = MemoryStatusStore::with_contents(record_with_counter("12"));
        let run_state = RunStateHandle::default();
        let streamer = ProgressStreamer::new(store.clone(), run_state.clone(), TICK);

        let mut stream = streamer.subscribe();
        assert!(timeout(TICK * 3, stream.next()).await.is_err());
        assert_eq!(store.reads(), 0);

        run_state.set(RunState::Running);
        let value = timeout(TICK * 10, stream.next()).await.unwrap();
        assert_eq!(value.as_deref(), Some("12"));
    }

    #[tokio::test]
    async fn test_stream_ends_with_run_state() {
        let run_state = RunStateHandle::default();
        let streamer = ProgressStreamer::new(MemoryStatusStore::new(), run_state, TICK);

        let mut stream = streamer.subscribe();
        drop(streamer);

        let end = timeout(TICK * 10, stream.next()).await.unwrap();
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_ensure_seeded_once() {
        let store = MemoryStatusStore::new();
        let streamer = ProgressStreamer::new(store.clone(), RunStateHandle::default(), TICK);

        assert!(streamer.ensure_seeded().await.unwrap());
        assert!(!streamer.ensure_seeded().await.unwrap());
        assert_eq!(store.snapshot(), Some(StatusRecord::default().encode()));
    }
}

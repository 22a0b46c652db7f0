//! Simulated rig controller.
//!
//! Stands in for the hardware controller process that consumes the status
//! file. Every cycle it reads `R_STATUS` and, while running, advances
//! `CC_COMPLETE` by one until `C2COMPLETE` is reached, then writes
//! `R_STATUS,stop`. Updates are read-modify-write of the whole file, the same
//! way the real controller rewrites it, so they race with the web writer
//! (last write wins).

use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::{
    codec::SettingsTable,
    traits::StatusStore,
    types::{RUNNING_ACTION, Setting, StatusError},
};

/// Status value the controller writes once the cycle target is reached.
pub const STOP_STATUS: &str = "stop";

/// Configuration for the simulated controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Time taken by one simulated motion cycle.
    pub cycle_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self { cycle_interval: Duration::from_millis(1000) }
    }
}

/// Outcome of a single controller step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerStep {
    /// One cycle was completed; holds the new completed count.
    Advanced(u64),
    /// The cycle target is reached and the status was set to `stop`.
    Finished(u64),
    /// The rig is stopped.
    Idle,
    /// The rig is paused.
    Paused,
    /// `R_STATUS` holds a value the controller does not understand.
    Unknown(String),
}

/// Simulated controller driving a [`StatusStore`].
#[derive(Debug, Clone)]
pub struct SimulatedController<S: StatusStore> {
    store: S,
    config: ControllerConfig,
}

impl<S: StatusStore> SimulatedController<S> {
    /// Creates a controller over `store`.
    pub const fn new(store: S, config: ControllerConfig) -> Self {
        Self { store, config }
    }

    /// Spawns the controller loop as a background task.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Runs the controller loop forever.
    async fn run(&self) {
        info!(
            location = %self.store.location(),
            cycle_ms = self.config.cycle_interval.as_millis() as u64,
            "simulated controller started"
        );

        let mut ticker = interval(self.config.cycle_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.step().await {
                Ok(ControllerStep::Advanced(done)) => debug!(completed = done, "cycle completed"),
                Ok(ControllerStep::Finished(done)) => {
                    info!(completed = done, "cycle target reached, stopping");
                }
                Ok(ControllerStep::Unknown(status)) => {
                    warn!(status = %status, "unknown run status, waiting");
                }
                Ok(ControllerStep::Idle | ControllerStep::Paused) => {}
                Err(e) => warn!(error = %e, "controller step failed"),
            }
        }
    }

    /// Performs one controller cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, decoded or rewritten, or
    /// if the cycle counters are not whole numbers.
    pub async fn step(&self) -> Result<ControllerStep, StatusError> {
        let raw = self.store.read().await?;
        let mut table = SettingsTable::decode(&raw)?;

        let status = table.get_or(Setting::RunStatus, Setting::RunStatus.default_value());
        match status.trim().to_lowercase().as_str() {
            RUNNING_ACTION => {}
            STOP_STATUS => return Ok(ControllerStep::Idle),
            "pause" => return Ok(ControllerStep::Paused),
            _ => return Ok(ControllerStep::Unknown(status.to_string())),
        }

        let target = counter(&table, Setting::TargetCycles)?;
        let mut done = counter(&table, Setting::CompletedCycles)?;

        if done < target {
            done += 1;
            table.update(Setting::CompletedCycles, done.to_string());
        }

        let step = if done >= target {
            table.update(Setting::RunStatus, STOP_STATUS);
            ControllerStep::Finished(done)
        } else {
            ControllerStep::Advanced(done)
        };

        self.store.replace(table.encode()).await?;
        Ok(step)
    }
}

fn counter(table: &SettingsTable, setting: Setting) -> Result<u64, StatusError> {
    let raw = table.get_or(setting, "0").trim();
    raw.parse()
        .map_err(|_| StatusError::Malformed(format!("{setting} is not a cycle count: {raw:?}")))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::{codec::StatusRecord, store::MemoryStatusStore};

    fn controller(
        action: &str,
        done: &str,
        target: &str,
    ) -> SimulatedController<MemoryStatusStore> {
        let record = StatusRecord {
            action: action.to_string(),
            current_cycle: done.to_string(),
            total_cycle: target.to_string(),
            ..StatusRecord::default()
        };
        SimulatedController::new(
            MemoryStatusStore::with_contents(record.encode()),
            ControllerConfig::default(),
        )
    }

    fn stored(controller: &SimulatedController<MemoryStatusStore>) -> StatusRecord {
        let raw = controller.store.snapshot().unwrap();
        StatusRecord::from_table(&SettingsTable::decode(&raw).unwrap())
    }

    #[tokio::test]
    async fn test_running_advances_counter() {
        let controller = controller("running", "3", "10");

        assert_eq!(controller.step().await.unwrap(), ControllerStep::Advanced(4));

        let record = stored(&controller);
        assert_eq!(record.current_cycle, "4");
        assert_eq!(record.action, "running");
    }

    #[tokio::test]
    async fn test_last_cycle_stops_rig() {
        let controller = controller("running", "9", "10");

        assert_eq!(controller.step().await.unwrap(), ControllerStep::Finished(10));

        let record = stored(&controller);
        assert_eq!(record.current_cycle, "10");
        assert_eq!(record.action, "stop");
        assert_eq!(controller.step().await.unwrap(), ControllerStep::Idle);
    }

    #[tokio::test]
    async fn test_already_complete_stops_without_counting() {
        let controller = controller("running", "20", "20");

        assert_eq!(controller.step().await.unwrap(), ControllerStep::Finished(20));
        assert_eq!(stored(&controller).current_cycle, "20");
    }

    #[rstest]
    #[case::stop("stop", ControllerStep::Idle)]
    #[case::default_stop("STOP", ControllerStep::Idle)]
    #[case::pause("pause", ControllerStep::Paused)]
    #[case::unknown("homing", ControllerStep::Unknown("homing".to_string()))]
    #[tokio::test]
    async fn non_running_status_leaves_file(
        #[case] action: &str,
        #[case] expected: ControllerStep,
    ) {
        let controller = controller(action, "1", "5");
        let before = controller.store.snapshot();

        assert_eq!(controller.step().await.unwrap(), expected);
        assert_eq!(controller.store.snapshot(), before);
    }

    #[tokio::test]
    async fn test_non_numeric_counter_fails() {
        let controller = controller("running", "1.5", "5");
        let err = controller.step().await.unwrap_err();
        assert!(matches!(err, StatusError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_spawned_loop_runs_to_target() {
        let store = MemoryStatusStore::with_contents(
            StatusRecord {
                action: "running".to_string(),
                total_cycle: "3".to_string(),
                ..StatusRecord::default()
            }
            .encode(),
        );
        let handle = SimulatedController::new(
            store.clone(),
            ControllerConfig { cycle_interval: Duration::from_millis(5) },
        )
        .spawn();

        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.abort();

        let table = SettingsTable::decode(&store.snapshot().unwrap()).unwrap();
        let record = StatusRecord::from_table(&table);
        assert_eq!(record.current_cycle, "3");
        assert_eq!(record.action, "stop");
    }
}

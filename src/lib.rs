#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod codec;
pub use codec::{SettingsTable, StatusRecord};

mod controller;
pub use controller::{ControllerConfig, ControllerStep, STOP_STATUS, SimulatedController};

mod state;
pub use state::RunStateHandle;

mod store;
pub use store::{CsvFileStore, MemoryStatusStore, seed_defaults};

mod streamer;
pub use streamer::{DEFAULT_STREAM_INTERVAL, ProgressStream, ProgressStreamer};

mod traits;
pub use traits::StatusStore;

mod types;
pub use types::{
    DEFAULT_STATUS_PATH, RUNNING_ACTION, RunState, STATUS_HEADER, Setting, StatusError,
};

mod writer;
pub use writer::{SettingValue, StatusUpdate, StatusWriter, TaskSnapshot};

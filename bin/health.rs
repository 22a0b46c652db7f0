//! Health endpoint.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use rigbridge::{RunState, RunStateHandle};
use serde::{Deserialize, Serialize};

/// Health status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Location of the status file.
    pub status_file: String,
    /// Current in-memory run state.
    pub run_state: RunState,
}

/// Shared state for the health endpoint.
#[derive(Debug, Clone)]
pub struct HealthState {
    /// Location of the status file.
    pub status_file: String,
    /// Authoritative run state.
    pub run_state: RunStateHandle,
}

impl HealthState {
    /// Creates a new health state.
    pub fn new(status_file: String, run_state: RunStateHandle) -> Self {
        Self { status_file, run_state }
    }

    /// Builds the current health status.
    pub fn status(&self) -> HealthStatus {
        HealthStatus {
            healthy: true,
            status_file: self.status_file.clone(),
            run_state: self.run_state.get(),
        }
    }
}

/// Health endpoint handler.
pub async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.status()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_tracks_run_state() {
        let run_state = RunStateHandle::default();
        let state = HealthState::new("data/hardware_settings.csv".to_string(), run_state.clone());

        assert_eq!(state.status().run_state, RunState::Stopped);

        run_state.set(RunState::Running);
        let status = state.status();
        assert!(status.healthy);
        assert_eq!(status.run_state, RunState::Running);
    }

    #[test]
    fn test_health_status_serde() {
        let status = HealthStatus {
            healthy: true,
            status_file: "data/hardware_settings.csv".to_string(),
            run_state: RunState::Running,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["statusFile"], "data/hardware_settings.csv");
        assert_eq!(json["runState"], "RUNNING");
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    Activated,
    Running,
    Paused,
    Destroyed,
}

impl SessionState {
    pub fn name(self) -> &'static str {
        match self {
            SessionState::Created => "created",
            SessionState::Activated => "activated",
            SessionState::Running => "running",
            SessionState::Paused => "paused",
            SessionState::Destroyed => "destroyed",
        }
    }

    /// States in which the sensor is programmed and may be measured.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionState::Activated | SessionState::Running | SessionState::Paused
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

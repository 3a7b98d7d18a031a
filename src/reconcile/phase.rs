//! Update cycle phases

use std::fmt;

/// Where the loop is within one update cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    CheckingUpdate,
    NoUpdate,
    Decoding,
    Applying,
    AwaitingReady,
    Committing,
    ReportingError,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::CheckingUpdate => "CheckingUpdate",
            Phase::NoUpdate => "NoUpdate",
            Phase::Decoding => "Decoding",
            Phase::Applying => "Applying",
            Phase::AwaitingReady => "AwaitingReady",
            Phase::Committing => "Committing",
            Phase::ReportingError => "ReportingError",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a completed cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    NoUpdate,
    Updated { version: String },
}

//! One fetch-then-ingest run.
//!
//! ```text
//! Idle -> Fetching -> FetchFailed
//!                  -> Fetched -> Done (no data)
//!                             -> Ingesting -> IngestFailed
//!                                          -> Done
//! ```
//!
//! A run never retries or resumes. Failures end the run and are reported
//! through [`RunOutcome`], which maps to a process exit status.

use std::fmt;

use serde::Serialize;
use tracing::{debug, error, info};

use crate::fetch::{FetchOutcome, Fetcher};
use crate::ingest::{IngestResult, Ingestor};

/// Exit status for a run that failed while fetching.
pub const EXIT_FETCH_FAILED: i32 = 2;
/// Exit status for a run that failed while writing the store.
pub const EXIT_INGEST_FAILED: i32 = 3;

/// Position in the per-run state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Fetching,
    FetchFailed,
    Fetched,
    Ingesting,
    IngestFailed,
    Done,
}

impl RunState {
    /// Returns true if no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::FetchFailed | RunState::IngestFailed | RunState::Done
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Fetching => "fetching",
            RunState::FetchFailed => "fetch failed",
            RunState::Fetched => "fetched",
            RunState::Ingesting => "ingesting",
            RunState::IngestFailed => "ingest failed",
            RunState::Done => "done",
        };
        f.write_str(name)
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The batch was persisted.
    Done(IngestResult),
    /// The upstream returned no records; the store was not touched.
    NoData,
    /// The fetch failed.
    FetchFailed { message: String },
    /// Writing the store failed.
    IngestFailed { message: String },
}

impl RunOutcome {
    /// Process exit status for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Done(_) | RunOutcome::NoData => 0,
            RunOutcome::FetchFailed { .. } => EXIT_FETCH_FAILED,
            RunOutcome::IngestFailed { .. } => EXIT_INGEST_FAILED,
        }
    }

    /// Returns true for the failure outcomes.
    pub fn is_failure(&self) -> bool {
        self.exit_code() != 0
    }
}

/// Result of [`run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Terminal state reached.
    pub state: RunState,
    /// Records fetched (0 on failure).
    pub fetched: usize,
    #[serde(flatten)]
    pub outcome: RunOutcome,
}

impl RunReport {
    /// Process exit status for this run.
    pub fn exit_code(&self) -> i32 {
        self.outcome.exit_code()
    }
}

struct Machine {
    state: RunState,
}

impl Machine {
    fn advance(&mut self, next: RunState) {
        debug!("Run state: {} -> {}", self.state, next);
        self.state = next;
    }
}

/// Fetch one batch and ingest it.
///
/// Never returns an error; failures are logged and reported in the
/// [`RunReport`].
pub async fn run(fetcher: &Fetcher, ingestor: &Ingestor) -> RunReport {
    let mut machine = Machine {
        state: RunState::Idle,
    };

    machine.advance(RunState::Fetching);
    let batch = match fetcher.fetch().await {
        Ok(FetchOutcome::Records(batch)) => batch,
        Ok(FetchOutcome::Empty) => {
            machine.advance(RunState::Fetched);
            info!("No records to process. Exiting.");
            machine.advance(RunState::Done);
            return RunReport {
                state: machine.state,
                fetched: 0,
                outcome: RunOutcome::NoData,
            };
        }
        Err(e) => {
            error!("Error fetching data: {}", e);
            machine.advance(RunState::FetchFailed);
            return RunReport {
                state: machine.state,
                fetched: 0,
                outcome: RunOutcome::FetchFailed {
                    message: e.to_string(),
                },
            };
        }
    };
    machine.advance(RunState::Fetched);

    let fetched = batch.len();
    machine.advance(RunState::Ingesting);
    let outcome = match ingestor.ingest(&batch) {
        Ok(result) => {
            machine.advance(RunState::Done);
            RunOutcome::Done(result)
        }
        Err(e) => {
            error!("Error saving data: {}", e);
            machine.advance(RunState::IngestFailed);
            RunOutcome::IngestFailed {
                message: e.to_string(),
            }
        }
    };

    RunReport {
        state: machine.state,
        fetched,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunOutcome::Done(IngestResult::default()).exit_code(), 0);
        assert_eq!(RunOutcome::NoData.exit_code(), 0);
        assert_eq!(
            RunOutcome::FetchFailed {
                message: "x".to_string()
            }
            .exit_code(),
            2
        );
        assert_eq!(
            RunOutcome::IngestFailed {
                message: "x".to_string()
            }
            .exit_code(),
            3
        );
        assert!(!RunOutcome::NoData.is_failure());
    }

    #[test]
    fn test_terminal_states() {
        assert!(RunState::Done.is_terminal());
        assert!(RunState::FetchFailed.is_terminal());
        assert!(RunState::IngestFailed.is_terminal());
        assert!(!RunState::Fetched.is_terminal());
        assert!(!RunState::Idle.is_terminal());
    }

    #[test]
    fn test_report_json_shape() {
        let report = RunReport {
            state: RunState::FetchFailed,
            fetched: 0,
            outcome: RunOutcome::FetchFailed {
                message: "boom".to_string(),
            },
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["state"], "fetch_failed");
        assert_eq!(value["outcome"], "fetch_failed");
        assert_eq!(value["message"], "boom");
    }
}

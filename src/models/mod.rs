//! Core data model: wallets, transactions, alerts, attempts, health samples.

pub mod alert;
pub mod attempt;
pub mod health;
pub mod transaction;
pub mod wallet;

use serde::Serialize;

/// Overall status of a batch operation, reported in structured results
/// instead of process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every item succeeded.
    Ok,
    /// Some items succeeded, some failed.
    Partial,
    /// Nothing succeeded.
    Failed,
}

impl RunStatus {
    /// Derives a status from success/failure counts.
    pub fn from_counts(succeeded: usize, failed: usize) -> Self {
        match (succeeded, failed) {
            (_, 0) => RunStatus::Ok,
            (0, _) => RunStatus::Failed,
            _ => RunStatus::Partial,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_from_counts() {
        assert_eq!(RunStatus::from_counts(3, 0), RunStatus::Ok);
        assert_eq!(RunStatus::from_counts(0, 0), RunStatus::Ok);
        assert_eq!(RunStatus::from_counts(2, 1), RunStatus::Partial);
        assert_eq!(RunStatus::from_counts(0, 2), RunStatus::Failed);
    }
}

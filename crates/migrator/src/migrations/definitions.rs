//! Migration Definitions - Core types and structures for migrations
//!
//! Defines the ledger vocabulary (statuses, entries) and the summaries
//! returned by apply and rollback runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MigrationError;

/// Outcome of the last `up` attempt recorded for a migration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MigrationStatus {
    Success,
    Failed,
    RolledBack,
}

impl MigrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStatus::Success => "success",
            MigrationStatus::Failed => "failed",
            MigrationStatus::RolledBack => "rolled-back",
        }
    }
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MigrationStatus {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(MigrationStatus::Success),
            "failed" => Ok(MigrationStatus::Failed),
            "rolled-back" => Ok(MigrationStatus::RolledBack),
            other => Err(MigrationError::Ledger(format!("unknown status '{}'", other))),
        }
    }
}

/// Outcome of the last rollback attempt recorded for a migration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RollbackStatus {
    Success,
    Failed,
    /// The migration source was gone, so bookkeeping was updated without running `down`
    Skipped,
}

impl RollbackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RollbackStatus::Success => "success",
            RollbackStatus::Failed => "failed",
            RollbackStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for RollbackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RollbackStatus {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(RollbackStatus::Success),
            "failed" => Ok(RollbackStatus::Failed),
            "skipped" => Ok(RollbackStatus::Skipped),
            other => Err(MigrationError::Ledger(format!(
                "unknown rollback status '{}'",
                other
            ))),
        }
    }
}

/// Derived lifecycle state of a recorded migration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MigrationState {
    /// Effects present, bookkeeping consistent
    Active,
    /// Effects removed (or rollback skipped), eligible for reapplication
    RolledBack,
    /// `up` failed; not retried automatically
    Failed,
    /// Still marked active but the last `down` failed part way
    Divergent,
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MigrationState::Active => "active",
            MigrationState::RolledBack => "rolled-back",
            MigrationState::Failed => "failed",
            MigrationState::Divergent => "divergent",
        };
        f.write_str(label)
    }
}

/// A row of the migration ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub name: String,
    pub version: i64,
    pub applied_at: DateTime<Utc>,
    pub status: MigrationStatus,
    pub error_message: Option<String>,
    pub rollback_status: Option<RollbackStatus>,
    pub is_active: bool,
}

impl LedgerEntry {
    pub fn state(&self) -> MigrationState {
        if self.is_active {
            if self.rollback_status == Some(RollbackStatus::Failed) {
                MigrationState::Divergent
            } else {
                MigrationState::Active
            }
        } else if self.status == MigrationStatus::Failed {
            MigrationState::Failed
        } else {
            MigrationState::RolledBack
        }
    }

    /// Whether a later `apply_pending` call will reapply this entry
    pub fn is_reapplicable(&self) -> bool {
        self.status == MigrationStatus::RolledBack && !self.is_active
    }
}

/// Result of applying pending migrations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplySummary {
    /// Number of migrations applied or reapplied
    pub applied: usize,
    /// 0 or 1; the run stops at the first failure
    pub failed: usize,
    /// Names of the migrations applied, in execution order
    pub applied_migrations: Vec<String>,
    /// Name of the migration that failed, if any
    pub failed_migration: Option<String>,
}

impl ApplySummary {
    pub fn is_noop(&self) -> bool {
        self.applied == 0 && self.failed == 0
    }
}

/// Result of rolling back migrations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RollbackSummary {
    /// Number of ledger entries rolled back, including skipped ones
    pub rolled_back: usize,
    /// 0 or 1; the run stops at the first failure
    pub failed: usize,
    /// Names of the migrations rolled back, in execution order
    pub rolled_back_migrations: Vec<String>,
    /// Entries marked rolled back without running `down`
    pub skipped_migrations: Vec<String>,
    /// Name of the migration whose rollback failed, if any
    pub failed_migration: Option<String>,
}

impl RollbackSummary {
    pub fn is_noop(&self) -> bool {
        self.rolled_back == 0 && self.failed == 0
    }
}

/// Migration direction for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationDirection {
    Up,
    Down,
}

impl fmt::Display for MigrationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationDirection::Up => f.write_str("up"),
            MigrationDirection::Down => f.write_str("down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(status: MigrationStatus, rollback: Option<RollbackStatus>, active: bool) -> LedgerEntry {
        LedgerEntry {
            id: 1,
            name: "create_users".to_string(),
            version: 1,
            applied_at: Utc::now(),
            status,
            error_message: None,
            rollback_status: rollback,
            is_active: active,
        }
    }

    #[test]
    fn test_status_strings() {
        for status in [
            MigrationStatus::Success,
            MigrationStatus::Failed,
            MigrationStatus::RolledBack,
        ] {
            assert_eq!(status.as_str().parse::<MigrationStatus>().unwrap(), status);
        }
        assert_eq!(MigrationStatus::RolledBack.to_string(), "rolled-back");
        assert!("pending".parse::<MigrationStatus>().is_err());
        assert_eq!("skipped".parse::<RollbackStatus>().unwrap(), RollbackStatus::Skipped);
        assert!("partial".parse::<RollbackStatus>().is_err());
    }

    #[test]
    fn test_derived_state() {
        assert_eq!(
            entry(MigrationStatus::Success, None, true).state(),
            MigrationState::Active
        );
        assert_eq!(
            entry(MigrationStatus::Success, Some(RollbackStatus::Failed), true).state(),
            MigrationState::Divergent
        );
        assert_eq!(
            entry(MigrationStatus::RolledBack, Some(RollbackStatus::Success), false).state(),
            MigrationState::RolledBack
        );
        assert_eq!(
            entry(MigrationStatus::Failed, None, false).state(),
            MigrationState::Failed
        );
    }

    #[test]
    fn test_reapplicable_only_when_rolled_back_and_inactive() {
        assert!(entry(MigrationStatus::RolledBack, Some(RollbackStatus::Skipped), false).is_reapplicable());
        assert!(!entry(MigrationStatus::Failed, None, false).is_reapplicable());
        assert!(!entry(MigrationStatus::Success, None, true).is_reapplicable());
    }

    #[test]
    fn test_status_serializes_kebab_case() {
        let json = serde_json::to_string(&MigrationStatus::RolledBack).unwrap();
        assert_eq!(json, "\"rolled-back\"");
    }
}

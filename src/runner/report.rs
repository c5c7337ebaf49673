//! Outcomes reported for cases and groups.

use std::fmt;

use crate::error::{CaseError, GroupError, ServerError};

/// How a single case ended.
#[derive(Debug)]
pub enum CaseOutcome {
    /// Every step succeeded.
    Passed,
    /// A step failed; this is the primary error of the case.
    Failed(CaseError),
    /// The case never ran because the group was not running.
    Skipped,
}

/// Result of running one case.
#[derive(Debug)]
pub struct CaseReport {
    /// Name of the case.
    pub name: String,
    /// Primary outcome.
    pub outcome: CaseOutcome,
    /// Secondary failures raised while cleaning up the case: client close
    /// and hook detach errors.
    pub suppressed: Vec<CaseError>,
}

impl CaseReport {
    pub(crate) fn skipped(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            outcome: CaseOutcome::Skipped,
            suppressed: Vec::new(),
        }
    }

    /// Whether the case passed.
    #[must_use]
    pub fn is_passed(&self) -> bool { matches!(self.outcome, CaseOutcome::Passed) }

    /// Whether the case failed.
    #[must_use]
    pub fn is_failed(&self) -> bool { matches!(self.outcome, CaseOutcome::Failed(_)) }

    /// Whether the case was skipped.
    #[must_use]
    pub fn is_skipped(&self) -> bool { matches!(self.outcome, CaseOutcome::Skipped) }

    /// Primary error of a failed case.
    #[must_use]
    pub fn error(&self) -> Option<&CaseError> {
        match &self.outcome {
            CaseOutcome::Failed(error) => Some(error),
            CaseOutcome::Passed | CaseOutcome::Skipped => None,
        }
    }
}

impl fmt::Display for CaseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            CaseOutcome::Passed => write!(f, "case {} passed", self.name)?,
            CaseOutcome::Failed(error) => write!(f, "case {} failed: {error}", self.name)?,
            CaseOutcome::Skipped => write!(f, "case {} skipped", self.name)?,
        }
        for error in &self.suppressed {
            write!(f, "\n    suppressed: {error}")?;
        }
        Ok(())
    }
}

/// How a group ended.
#[derive(Debug)]
pub enum GroupOutcome {
    /// The server started and every case ran.
    Completed(Vec<CaseReport>),
    /// The group failed before any case ran.
    Aborted {
        /// Reason the group was aborted.
        error: GroupError,
        /// Cases that were not run.
        skipped: Vec<String>,
    },
}

/// Result of running a whole group.
#[derive(Debug)]
pub struct GroupReport {
    /// Name of the group.
    pub group: String,
    /// Primary outcome.
    pub outcome: GroupOutcome,
    /// Failure to stop the server. Never replaces a case outcome.
    pub teardown: Option<ServerError>,
}

impl GroupReport {
    /// Whether the group failed before running any case.
    #[must_use]
    pub fn is_aborted(&self) -> bool { matches!(self.outcome, GroupOutcome::Aborted { .. }) }

    /// Reports of the cases that ran.
    #[must_use]
    pub fn cases(&self) -> &[CaseReport] {
        match &self.outcome {
            GroupOutcome::Completed(cases) => cases,
            GroupOutcome::Aborted { .. } => &[],
        }
    }

    /// Number of cases that ran.
    #[must_use]
    pub fn cases_run(&self) -> usize {
        self.cases()
            .iter()
            .filter(|case| !case.is_skipped())
            .count()
    }

    /// Reports of the failed cases.
    pub fn failures(&self) -> impl Iterator<Item = &CaseReport> {
        self.cases().iter().filter(|case| case.is_failed())
    }

    /// Whether the group completed, every case passed and teardown succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.is_aborted()
            && self.teardown.is_none()
            && self.cases().iter().all(CaseReport::is_passed)
    }
}

impl fmt::Display for GroupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            GroupOutcome::Aborted { error, skipped } => write!(
                f,
                "group {} aborted, 0 cases ran ({} not run): {error}",
                self.group,
                skipped.len()
            )?,
            GroupOutcome::Completed(cases) => {
                let failed = cases.iter().filter(|case| case.is_failed()).count();
                write!(
                    f,
                    "group {}: {} cases ran, {failed} failed",
                    self.group,
                    self.cases_run()
                )?;
                for case in cases {
                    write!(f, "\n  {case}")?;
                }
            }
        }
        if let Some(error) = &self.teardown {
            write!(f, "\n  teardown: {error}")?;
        }
        Ok(())
    }
}

//! Append-only record of the steps a deployment ran.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    Pending,
    Done,
    Failed,
    Skipped,
}

impl StepOutcome {
    /// Suffix appended to the step description when rendered.
    pub fn suffix(&self) -> Option<&'static str> {
        match self {
            StepOutcome::Pending => None,
            StepOutcome::Done => Some("Done"),
            StepOutcome::Failed => Some("Error"),
            StepOutcome::Skipped => Some("Skipped"),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, StepOutcome::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentStep {
    pub description: String,
    pub outcome: StepOutcome,
}

impl fmt::Display for DeploymentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome.suffix() {
            Some(suffix) => write!(f, "{} {}", self.description, suffix),
            None => write!(f, "{}", self.description),
        }
    }
}

/// Ordered step entries. Entries are only appended, except that a `Pending`
/// entry may be resolved once through the index `begin` returned.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct StepLog {
    entries: Vec<DeploymentStep>,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pending entry; returns its 1-based index.
    pub fn begin(&mut self, description: impl Into<String>) -> usize {
        self.entries.push(DeploymentStep {
            description: description.into(),
            outcome: StepOutcome::Pending,
        });
        self.entries.len()
    }

    /// Resolve the pending entry at `index` (1-based, as returned by `begin`).
    ///
    /// Returns false when that entry does not exist or is already resolved.
    pub fn resolve(&mut self, index: usize, outcome: StepOutcome) -> bool {
        if !outcome.is_terminal() || index == 0 {
            return false;
        }
        match self.entries.get_mut(index - 1) {
            Some(step) if step.outcome == StepOutcome::Pending => {
                step.outcome = outcome;
                true
            }
            _ => false,
        }
    }

    /// Append an already-resolved entry; returns its 1-based index.
    pub fn push(&mut self, description: impl Into<String>, outcome: StepOutcome) -> usize {
        self.entries.push(DeploymentStep {
            description: description.into(),
            outcome,
        });
        self.entries.len()
    }

    pub fn entries(&self) -> &[DeploymentStep] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&DeploymentStep> {
        self.entries.last()
    }

    /// One rendered line per entry.
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(|s| s.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_suffix_per_outcome() {
        let mut log = StepLog::new();
        log.push("Creating build directory...", StepOutcome::Done);
        log.push("Updating file permissions...", StepOutcome::Failed);
        log.push("Running beforeDeploy hook...", StepOutcome::Skipped);
        log.begin("Activating build...");

        assert_eq!(
            log.lines(),
            vec![
                "Creating build directory... Done",
                "Updating file permissions... Error",
                "Running beforeDeploy hook... Skipped",
                "Activating build...",
            ]
        );
    }

    #[test]
    fn resolve_is_single_shot() {
        let mut log = StepLog::new();
        assert!(!log.resolve(1, StepOutcome::Done));

        let index = log.begin("Exporting repository...");
        assert_eq!(index, 1);
        assert!(log.resolve(index, StepOutcome::Done));
        assert!(!log.resolve(index, StepOutcome::Failed));
        assert!(!log.resolve(0, StepOutcome::Failed));
        assert_eq!(log.last().unwrap().outcome, StepOutcome::Done);
    }

    #[test]
    fn resolve_skips_over_sub_steps() {
        let mut log = StepLog::new();
        let index = log.begin("Running afterDeploy hook...");
        log.push("Notifying monitoring...", StepOutcome::Done);
        assert!(log.resolve(index, StepOutcome::Done));
        assert_eq!(
            log.lines(),
            vec![
                "Running afterDeploy hook... Done",
                "Notifying monitoring... Done"
            ]
        );
    }

    #[test]
    fn unresolved_sub_step_does_not_capture_outer_resolution() {
        let mut log = StepLog::new();
        let outer = log.begin("Running afterDeploy hook...");
        log.begin("Warming cache...");

        assert!(log.resolve(outer, StepOutcome::Done));
        assert_eq!(
            log.lines(),
            vec!["Running afterDeploy hook... Done", "Warming cache..."]
        );
    }

    #[test]
    fn resolve_rejects_pending_as_target() {
        let mut log = StepLog::new();
        let index = log.begin("Synchronizing repository...");
        assert!(!log.resolve(index, StepOutcome::Pending));
        assert_eq!(log.last().unwrap().outcome, StepOutcome::Pending);
    }

    #[test]
    fn serializes_as_plain_array() {
        let mut log = StepLog::new();
        log.push("Activating build...", StepOutcome::Done);
        let value = serde_json::to_value(&log).unwrap();
        assert_eq!(value[0]["description"], "Activating build...");
        assert_eq!(value[0]["outcome"], "done");
    }
}

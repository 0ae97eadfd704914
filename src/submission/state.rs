//! Submission lifecycle state machine.
//!
//! A submission moves through `idle -> preparing -> submitting -> streaming ->
//! completing -> success`, with `error` reachable from any active state. The
//! transition table is a pure reducer so every consumer observes identical
//! semantics.

/// Lifecycle phase of the current submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionStatus {
    #[default]
    Idle,
    Preparing,
    Submitting,
    Streaming,
    Completing,
    Success,
    Error,
}

/// Every event that can advance the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionAction {
    SubmitStart,
    Preparing,
    Submitting,
    Streaming,
    ContentReceived,
    StreamComplete,
    GeneratingTitle,
    Complete,
    Abort,
    Error(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionState {
    pub status: SubmissionStatus,
    pub error: Option<String>,
    pub aborted: bool,
}

impl SubmissionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one action. `SubmitStart` resets the error and aborted flags so
    /// a new submission never carries stale failure state.
    pub fn apply(&mut self, action: SubmissionAction) {
        match action {
            SubmissionAction::SubmitStart => {
                self.status = SubmissionStatus::Preparing;
                self.error = None;
                self.aborted = false;
            }
            SubmissionAction::Preparing => self.status = SubmissionStatus::Preparing,
            SubmissionAction::Submitting => self.status = SubmissionStatus::Submitting,
            SubmissionAction::Streaming | SubmissionAction::ContentReceived => {
                self.status = SubmissionStatus::Streaming;
            }
            SubmissionAction::StreamComplete | SubmissionAction::GeneratingTitle => {
                self.status = SubmissionStatus::Completing;
            }
            SubmissionAction::Complete => self.status = SubmissionStatus::Success,
            SubmissionAction::Abort => {
                self.status = SubmissionStatus::Idle;
                self.aborted = true;
            }
            SubmissionAction::Error(message) => {
                self.status = SubmissionStatus::Error;
                self.error = Some(message);
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status == SubmissionStatus::Idle
    }

    /// True while a submission is in flight, in any of its active phases.
    pub fn is_submitting(&self) -> bool {
        matches!(
            self.status,
            SubmissionStatus::Preparing
                | SubmissionStatus::Submitting
                | SubmissionStatus::Streaming
                | SubmissionStatus::Completing
        )
    }

    pub fn is_error(&self) -> bool {
        self.status == SubmissionStatus::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut state = SubmissionState::new();
        assert!(state.is_idle());

        state.apply(SubmissionAction::SubmitStart);
        assert_eq!(state.status, SubmissionStatus::Preparing);
        assert!(state.is_submitting());

        state.apply(SubmissionAction::Submitting);
        assert_eq!(state.status, SubmissionStatus::Submitting);

        state.apply(SubmissionAction::Streaming);
        state.apply(SubmissionAction::ContentReceived);
        assert_eq!(state.status, SubmissionStatus::Streaming);

        state.apply(SubmissionAction::StreamComplete);
        assert_eq!(state.status, SubmissionStatus::Completing);

        state.apply(SubmissionAction::GeneratingTitle);
        assert_eq!(state.status, SubmissionStatus::Completing);

        state.apply(SubmissionAction::Complete);
        assert_eq!(state.status, SubmissionStatus::Success);
        assert!(!state.is_submitting());
    }

    #[test]
    fn test_abort_returns_to_idle_with_flag() {
        let mut state = SubmissionState::new();
        state.apply(SubmissionAction::SubmitStart);
        state.apply(SubmissionAction::Streaming);

        state.apply(SubmissionAction::Abort);
        assert!(state.is_idle());
        assert!(state.aborted);
    }

    #[test]
    fn test_error_captures_message() {
        let mut state = SubmissionState::new();
        state.apply(SubmissionAction::SubmitStart);
        state.apply(SubmissionAction::Error("boom".to_string()));

        assert!(state.is_error());
        assert_eq!(state.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_submit_start_clears_previous_failure() {
        let mut state = SubmissionState::new();
        state.apply(SubmissionAction::Error("boom".to_string()));
        state.apply(SubmissionAction::SubmitStart);

        assert_eq!(state.status, SubmissionStatus::Preparing);
        assert!(state.error.is_none());
        assert!(!state.aborted);

        let mut aborted = SubmissionState::new();
        aborted.apply(SubmissionAction::Abort);
        aborted.apply(SubmissionAction::SubmitStart);
        assert!(!aborted.aborted);
    }
}

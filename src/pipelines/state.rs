//! Lifecycle of one signing batch.

use crate::infra::error::{SigningError, SigningResult};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SigningState {
    #[default]
    Idle,
    /// Placeholders reserved and digests computed
    DigestReady,
    RequestSent,
    /// Response received, not yet applied
    ResponsePending,
    Signed,
    RevocationMerged,
    Failed,
}

impl SigningState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, SigningState::RevocationMerged | SigningState::Failed)
    }

    #[must_use]
    pub fn can_advance_to(self, next: SigningState) -> bool {
        use SigningState::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Idle, DigestReady)
            | (DigestReady, RequestSent)
            | (RequestSent, ResponsePending)
            | (ResponsePending, Signed)
            | (Signed, RevocationMerged) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SigningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SigningState::Idle => "idle",
            SigningState::DigestReady => "digest ready",
            SigningState::RequestSent => "request sent",
            SigningState::ResponsePending => "response pending",
            SigningState::Signed => "signed",
            SigningState::RevocationMerged => "revocation merged",
            SigningState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Current state plus the transition check.
#[derive(Debug, Default)]
pub struct StateMachine {
    state: SigningState,
}

impl StateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> SigningState {
        self.state
    }

    pub fn advance(&mut self, next: SigningState) -> SigningResult<()> {
        if !self.state.can_advance_to(next) {
            return Err(SigningError::StateError(format!(
                "cannot move from {} to {next}",
                self.state
            )));
        }
        log::debug!("Batch state: {} -> {next}", self.state);
        self.state = next;
        Ok(())
    }

    /// Move to `Failed` unless already terminal.
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            log::debug!("Batch state: {} -> failed", self.state);
            self.state = SigningState::Failed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut machine = StateMachine::new();
        for next in [
            SigningState::DigestReady,
            SigningState::RequestSent,
            SigningState::ResponsePending,
            SigningState::Signed,
            SigningState::RevocationMerged,
        ] {
            machine.advance(next).unwrap();
        }
        assert!(machine.state().is_terminal());
    }

    #[test]
    fn test_skipping_a_step_is_rejected() {
        let mut machine = StateMachine::new();
        assert!(matches!(
            machine.advance(SigningState::RequestSent),
            Err(SigningError::StateError(_))
        ));
        assert_eq!(machine.state(), SigningState::Idle);
    }

    #[test]
    fn test_failed_is_reachable_until_terminal() {
        let mut machine = StateMachine::new();
        machine.advance(SigningState::DigestReady).unwrap();
        machine.advance(SigningState::Failed).unwrap();
        assert!(machine.advance(SigningState::Failed).is_err());
        assert!(machine.advance(SigningState::DigestReady).is_err());
        machine.fail();
        assert_eq!(machine.state(), SigningState::Failed);
    }

    #[test]
    fn test_signed_without_revocation_may_still_fail() {
        assert!(SigningState::Signed.can_advance_to(SigningState::Failed));
        assert!(!SigningState::RevocationMerged.can_advance_to(SigningState::Failed));
        assert!(!SigningState::Signed.can_advance_to(SigningState::ResponsePending));
    }
}

//! Error types for billing flows
//!
//! Every failure aborts the flow that raised it and reaches the caller
//! unchanged. Nothing is retried inside the flows; [`FlowError::is_retryable`]
//! tells the caller whether starting over from a fresh record lookup can help.

use crate::ledger::{SecureHash, StateRef, UniqueIdentifier};
use thiserror::Error;

pub type FlowResult<T> = Result<T, FlowError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// Local validation rejected the proposed transition
    ///
    /// Raised before any session is opened or any message sent. Retrying
    /// with the same inputs gives the same answer.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// A counter-party declined to endorse
    #[error("Endorsement refused by {party}: {reason}")]
    EndorsementRefused { party: String, reason: String },

    /// Session could not be opened, broke, timed out or violated the protocol
    #[error("Session failure with {party}: {reason}")]
    SessionFailure { party: String, reason: String },

    /// The notary saw at least one input consumed by another transaction
    ///
    /// The input handle is permanently stale after this.
    #[error("Consensus rejected transaction, inputs already consumed: {}", format_refs(.conflicts))]
    ConsensusRejected { conflicts: Vec<StateRef> },

    /// The notary signed and the transaction is recorded locally, but a
    /// counter-party did not acknowledge it
    ///
    /// The inputs are consumed. Rerunning the flow would only hit
    /// [`FlowError::ConsensusRejected`]; redistribute `tx_id` instead.
    #[error("Transaction {tx_id} committed but distribution failed: {reason}")]
    DistributionFailed { tx_id: SecureHash, reason: String },

    /// No unspent version exists for the linear id
    #[error("No unspent billing state with id {0}")]
    RecordNotFound(UniqueIdentifier),

    /// Record registry failure
    #[error("Registry error: {0}")]
    Registry(String),

    /// Invalid node configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_refs(refs: &[StateRef]) -> String {
    refs.iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl FlowError {
    /// Whether rerunning the whole flow from a fresh lookup might succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::SessionFailure { .. } => true,
            Self::Registry(_) => true,

            Self::InvalidTransition(_) => false,
            Self::EndorsementRefused { .. } => false,
            Self::ConsensusRejected { .. } => false,
            Self::DistributionFailed { .. } => false,
            Self::RecordNotFound(_) => false,
            Self::Configuration(_) => false,
            Self::Internal(_) => false,
        }
    }

    /// Stable label for metrics
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidTransition(_) => "invalid_transition",
            Self::EndorsementRefused { .. } => "endorsement_refused",
            Self::SessionFailure { .. } => "session_failure",
            Self::ConsensusRejected { .. } => "consensus_rejected",
            Self::DistributionFailed { .. } => "distribution_failed",
            Self::RecordNotFound(_) => "record_not_found",
            Self::Registry(_) => "registry",
            Self::Configuration(_) => "config",
            Self::Internal(_) => "internal",
        }
    }
}

// Convenience constructors
impl FlowError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidTransition(reason.into())
    }

    pub fn refused(party: impl ToString, reason: impl Into<String>) -> Self {
        Self::EndorsementRefused {
            party: party.to_string(),
            reason: reason.into(),
        }
    }

    pub fn session(party: impl ToString, reason: impl Into<String>) -> Self {
        Self::SessionFailure {
            party: party.to_string(),
            reason: reason.into(),
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FlowError::refused("Issuer", "contract rejected");
        assert_eq!(
            err.to_string(),
            "Endorsement refused by Issuer: contract rejected"
        );

        let err = FlowError::invalid("Input billing state should be active");
        assert_eq!(
            err.to_string(),
            "Invalid transition: Input billing state should be active"
        );

        let state_ref = StateRef::new(SecureHash::from_bytes([0u8; 32]), 3);
        let err = FlowError::ConsensusRejected {
            conflicts: vec![state_ref],
        };
        assert!(err.to_string().ends_with("0000(3)"));
    }

    #[test]
    fn test_error_retryability() {
        assert!(FlowError::session("Issuer", "timeout").is_retryable());
        assert!(FlowError::Registry("down".to_string()).is_retryable());

        assert!(!FlowError::invalid("x").is_retryable());
        assert!(!FlowError::refused("Issuer", "no").is_retryable());
        assert!(!FlowError::ConsensusRejected { conflicts: vec![] }.is_retryable());
        assert!(!FlowError::internal("x").is_retryable());
        assert!(!FlowError::DistributionFailed {
            tx_id: SecureHash::from_bytes([1u8; 32]),
            reason: "closed".to_string(),
        }
        .is_retryable());
    }

    #[test]
    fn test_distribution_failure_names_committed_transaction() {
        let tx_id = SecureHash::from_bytes([0xab; 32]);
        let err = FlowError::DistributionFailed {
            tx_id,
            reason: "Session failure with Issuer: session closed".to_string(),
        };
        assert_eq!(err.category(), "distribution_failed");
        assert_eq!(
            err.to_string(),
            format!(
                "Transaction {} committed but distribution failed: Session failure with Issuer: session closed",
                tx_id
            )
        );
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(FlowError::invalid("x").category(), "invalid_transition");
        assert_eq!(
            FlowError::session("Issuer", "closed").category(),
            "session_failure"
        );
        assert_eq!(
            FlowError::ConsensusRejected { conflicts: vec![] }.category(),
            "consensus_rejected"
        );
    }
}

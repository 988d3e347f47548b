//! State machine contract for lifecycle status enums.
//!
//! Payment and subscription statuses both implement this trait; the
//! persistence layer relies on `can_transition_to` to build conditional
//! updates, so the rules here are the single source of truth.

use super::ValidationError;

/// Trait for status enums that represent state machines.
///
/// ```ignore
/// let next = PaymentStatus::Pending.transition_to(PaymentStatus::Completed)?;
/// assert!(next.is_terminal());
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "status",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
        }
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Ticket {
        Open,
        Resolved,
        Closed,
    }

    impl StateMachine for Ticket {
        fn can_transition_to(&self, target: &Self) -> bool {
            self.valid_transitions().contains(target)
        }

        fn valid_transitions(&self) -> Vec<Self> {
            match self {
                Ticket::Open => vec![Ticket::Resolved, Ticket::Closed],
                Ticket::Resolved => vec![Ticket::Closed],
                Ticket::Closed => vec![],
            }
        }
    }

    #[test]
    fn transition_to_succeeds_for_valid_transition() {
        assert_eq!(Ticket::Open.transition_to(Ticket::Resolved), Ok(Ticket::Resolved));
    }

    #[test]
    fn transition_to_reports_both_states() {
        let err = Ticket::Closed.transition_to(Ticket::Open).unwrap_err();
        assert_eq!(err.field(), "status");
        assert!(err.to_string().contains("Closed"));
        assert!(err.to_string().contains("Open"));
    }

    #[test]
    fn terminal_state_has_no_transitions() {
        assert!(Ticket::Closed.is_terminal());
        assert!(!Ticket::Resolved.is_terminal());
    }
}

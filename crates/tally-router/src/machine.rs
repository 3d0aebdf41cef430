//! The per-client workflow state machine.
//!
//! A strict linear chain: each state has exactly one mutating action that
//! advances it, and `payment_received` loops on `payment` to allow partial
//! payments. `report` and `status` are legal everywhere and never mutate.

use tally_types::{Action, WorkflowState};

/// The single mutating action legal from `state`.
pub fn legal_next(state: WorkflowState) -> Action {
    match state {
        WorkflowState::Idle => Action::Onboard,
        WorkflowState::IntakeCompleted => Action::Meet,
        WorkflowState::MeetingScheduled => Action::FollowUp,
        WorkflowState::FollowUpSent => Action::Invoice,
        WorkflowState::InvoiceIssued | WorkflowState::PaymentReceived => Action::Payment,
    }
}

pub fn is_legal(state: WorkflowState, action: Action) -> bool {
    action.is_read_only() || legal_next(state) == action
}

/// The state a legal mutating action moves the client into.
pub fn transition(state: WorkflowState, action: Action) -> Option<WorkflowState> {
    if action.is_read_only() || !is_legal(state, action) {
        return None;
    }
    action.transaction_type().map(|kind| kind.resulting_state())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MUTATING: [Action; 5] = [
        Action::Onboard,
        Action::Meet,
        Action::FollowUp,
        Action::Invoice,
        Action::Payment,
    ];

    #[test]
    fn happy_path_walks_the_chain() {
        let mut state = WorkflowState::Idle;
        for action in MUTATING {
            state = transition(state, action).unwrap();
        }
        assert_eq!(state, WorkflowState::PaymentReceived);
        assert_eq!(
            transition(state, Action::Payment),
            Some(WorkflowState::PaymentReceived)
        );
    }

    #[test]
    fn exactly_one_mutating_action_per_state() {
        for state in WorkflowState::ALL {
            let legal: Vec<_> = MUTATING.into_iter().filter(|a| is_legal(state, *a)).collect();
            assert_eq!(legal, vec![legal_next(state)], "state {state}");
        }
    }

    #[test]
    fn read_only_actions_are_always_legal_and_never_transition() {
        for state in WorkflowState::ALL {
            for action in [Action::Report, Action::Status] {
                assert!(is_legal(state, action));
                assert_eq!(transition(state, action), None);
            }
        }
    }

    #[test]
    fn skipping_is_illegal() {
        assert!(!is_legal(WorkflowState::Idle, Action::Invoice));
        assert!(!is_legal(WorkflowState::IntakeCompleted, Action::FollowUp));
        assert!(!is_legal(WorkflowState::FollowUpSent, Action::Payment));
        assert!(!is_legal(WorkflowState::PaymentReceived, Action::Onboard));
    }
}

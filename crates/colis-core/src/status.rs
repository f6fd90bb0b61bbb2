//! Explicit status transition table for parcels.
//!
//! Pending    -> InTransit | Cancelled
//! InTransit  -> Delivered | Returned
//! Delivered, Returned, Cancelled are terminal.

use colis_store::ParcelStatus;

/// True if a parcel may move from `from` to `to`.
pub fn can_transition(from: ParcelStatus, to: ParcelStatus) -> bool {
    use ParcelStatus::*;
    matches!(
        (from, to),
        (Pending, InTransit) | (Pending, Cancelled) | (InTransit, Delivered) | (InTransit, Returned)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ParcelStatus::*;

    const ALL: [ParcelStatus; 5] = [Pending, InTransit, Delivered, Returned, Cancelled];

    #[test]
    fn legal_transitions() {
        assert!(can_transition(Pending, InTransit));
        assert!(can_transition(Pending, Cancelled));
        assert!(can_transition(InTransit, Delivered));
        assert!(can_transition(InTransit, Returned));
    }

    #[test]
    fn terminal_states_accept_nothing() {
        for terminal in [Delivered, Returned, Cancelled] {
            for target in ALL {
                assert!(!can_transition(terminal, target));
            }
        }
    }

    #[test]
    fn regressions_are_rejected() {
        assert!(!can_transition(InTransit, Pending));
        assert!(!can_transition(Pending, Delivered));
        assert!(!can_transition(Pending, Returned));
        assert!(!can_transition(InTransit, Cancelled));
    }

    #[test]
    fn self_transitions_are_rejected() {
        for status in ALL {
            assert!(!can_transition(status, status));
        }
    }
}

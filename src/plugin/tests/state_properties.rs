//! State Machine Properties

use proptest::prelude::*;

use crate::plugin::{PluginError, PluginState};

fn any_state() -> impl Strategy<Value = PluginState> {
    prop::sample::select(PluginState::ALL.to_vec())
}

proptest! {
    #[test]
    fn only_the_successor_is_accepted(current in any_state(), next in any_state()) {
        let result = current.validate("prop", next);
        prop_assert_eq!(result.is_ok(), next == current.successor());
        if let Err(PluginError::IllegalStateTransition { current: reported, attempted, .. }) = result {
            prop_assert_eq!(reported, current);
            prop_assert_eq!(attempted, next);
        }
    }

    #[test]
    fn no_state_accepts_itself(state in any_state()) {
        prop_assert!(state.validate("prop", state).is_err());
    }

    #[test]
    fn registered_is_never_a_target(state in any_state()) {
        prop_assert!(!state.can_advance_to(PluginState::Registered));
    }

    #[test]
    fn four_steps_return_to_the_cycle_start(steps in 1usize..20) {
        // Registered is left once; the remaining four states form the cycle
        let mut state = PluginState::Enabled;
        for _ in 0..steps * 4 {
            state = state.successor();
        }
        prop_assert_eq!(state, PluginState::Enabled);
    }
}

// tests/lifecycle_properties.rs

use proptest::prelude::*;
use stackrun::lifecycle::{validate_sequence, StackLifecycle};
use stackrun::types::LifecycleState;

fn state_strategy() -> impl Strategy<Value = LifecycleState> {
    prop::sample::select(LifecycleState::ALL.to_vec())
}

fn terminal_strategy() -> impl Strategy<Value = LifecycleState> {
    prop::sample::select(vec![
        LifecycleState::Ok,
        LifecycleState::Failed,
        LifecycleState::Canceled,
    ])
}

proptest! {
    /// Whatever is thrown at the machine, the accepted history is always a
    /// prefix of pending -> running -> terminal.
    #[test]
    fn accepted_history_is_always_a_legal_prefix(attempts in prop::collection::vec(state_strategy(), 0..20)) {
        let mut lc = StackLifecycle::new("s");
        for next in attempts {
            let before = lc.states();
            match lc.transition(next) {
                Ok(t) => {
                    prop_assert_eq!(t.position, before.len());
                    prop_assert_eq!(t.state, next);
                }
                Err(_) => prop_assert_eq!(lc.states(), before),
            }
        }

        let states = lc.states();
        prop_assert!(states.len() <= 3);
        prop_assert!(validate_sequence("s", &states).is_ok());
        if let Some(first) = states.first() {
            prop_assert_eq!(*first, LifecycleState::Pending);
        }
    }

    /// Once terminal, no further transition is accepted.
    #[test]
    fn terminal_states_are_final(terminal in terminal_strategy(), extra in prop::collection::vec(state_strategy(), 1..10)) {
        let mut lc = StackLifecycle::new("s");
        lc.transition(LifecycleState::Pending).unwrap();
        lc.transition(LifecycleState::Running).unwrap();
        lc.transition(terminal).unwrap();

        for next in extra {
            prop_assert!(lc.transition(next).is_err());
        }
        prop_assert_eq!(lc.states(), vec![LifecycleState::Pending, LifecycleState::Running, terminal]);
        prop_assert!(lc.is_terminal());
    }

    /// Timestamps never go backwards.
    #[test]
    fn timestamps_are_monotonic(terminal in terminal_strategy()) {
        let mut lc = StackLifecycle::new("s");
        for next in [LifecycleState::Pending, LifecycleState::Running, terminal] {
            lc.transition(next).unwrap();
        }
        let history = lc.history();
        prop_assert!(history.windows(2).all(|w| w[0].at <= w[1].at));
    }
}

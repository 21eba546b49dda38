// ============================================================================
// Field State
// Tri-state freshness flag tracked for every cached field
// ============================================================================

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Freshness of one cached field.
///
/// Transitions: `NotInitialised -> Modified` on first value arrival;
/// `Modified -> NotModified` during the reset pass at the start of the next
/// message, unless the field is overwritten again within that message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FieldState {
    /// No value has ever arrived for this field.
    #[default]
    NotInitialised,
    /// A value is cached but did not change on the last message.
    NotModified,
    /// The field changed on the message currently being reported.
    Modified,
}

impl FieldState {
    /// The reset pass: a modified field becomes unmodified; the other states
    /// are left alone.
    pub fn decay(&mut self) {
        if *self == FieldState::Modified {
            *self = FieldState::NotModified;
        }
    }

    pub fn is_modified(&self) -> bool {
        *self == FieldState::Modified
    }

    pub fn is_initialised(&self) -> bool {
        *self != FieldState::NotInitialised
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::quickcheck;

    #[test]
    fn test_decay() {
        let mut state = FieldState::Modified;
        state.decay();
        assert_eq!(state, FieldState::NotModified);

        let mut state = FieldState::NotInitialised;
        state.decay();
        assert_eq!(state, FieldState::NotInitialised);

        let mut state = FieldState::NotModified;
        state.decay();
        assert_eq!(state, FieldState::NotModified);
    }

    #[test]
    fn test_default_is_uninitialised() {
        assert_eq!(FieldState::default(), FieldState::NotInitialised);
        assert!(!FieldState::default().is_initialised());
    }

    quickcheck! {
        // Decay never resurrects an uninitialised field and is idempotent.
        fn prop_decay_idempotent(modified: bool, initialised: bool) -> bool {
            let mut state = match (initialised, modified) {
                (false, _) => FieldState::NotInitialised,
                (true, false) => FieldState::NotModified,
                (true, true) => FieldState::Modified,
            };
            let was_initialised = state.is_initialised();
            state.decay();
            let once = state;
            state.decay();
            once == state && state.is_initialised() == was_initialised
        }
    }
}

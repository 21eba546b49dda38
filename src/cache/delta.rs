// ============================================================================
// Delta Field
// One cached value plus its freshness state
// ============================================================================

use crate::fields::FieldState;

/// A cached field value together with its [`FieldState`].
///
/// The merge contract: an incoming value overwrites the cache and flags the
/// field `Modified` only when it differs from the cached value, or when no
/// value has arrived before. Identical re-published values produce no state
/// change, so at most one `Modified` flag is raised per genuinely changed
/// field per message. Prices and floats compare by exact equality, strings
/// by ordinal equality.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeltaField<T> {
    value: T,
    state: FieldState,
}

impl<T> DeltaField<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            state: FieldState::NotInitialised,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn state(&self) -> FieldState {
        self.state
    }

    pub fn is_modified(&self) -> bool {
        self.state.is_modified()
    }

    pub fn is_initialised(&self) -> bool {
        self.state.is_initialised()
    }

    /// The reset pass run at the start of each message.
    pub fn decay(&mut self) {
        self.state.decay();
    }

    /// Unconditional overwrite, always flagging `Modified`. For values the
    /// listener derives itself (gap bounds, event-time overrides) rather
    /// than merges from a message field.
    pub fn force(&mut self, value: T) {
        self.value = value;
        self.state = FieldState::Modified;
    }
}

impl<T: Copy> DeltaField<T> {
    pub fn get(&self) -> T {
        self.value
    }
}

impl<T: PartialEq> DeltaField<T> {
    /// Compare-then-set merge. Returns whether the field was flagged
    /// `Modified`.
    pub fn update(&mut self, value: T) -> bool {
        if self.value != value || !self.state.is_initialised() {
            self.value = value;
            self.state = FieldState::Modified;
            true
        } else {
            false
        }
    }
}

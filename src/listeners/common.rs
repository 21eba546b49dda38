// ============================================================================
// Common Field Support
// The descriptor fields every entity shares, and the process-wide registry
// each listener type keeps its resolved set in
// ============================================================================

use crate::fields::{dictionary, Dictionary, FieldAliases, FieldDescriptor};
use parking_lot::RwLock;
use std::sync::Arc;

/// Descriptors for the fields common to every entity schema: identity,
/// participant and the feed/line timestamps.
#[derive(Debug, Clone, Default)]
pub struct CommonFieldSet {
    pub symbol: Option<Arc<FieldDescriptor>>,
    pub issue_symbol: Option<Arc<FieldDescriptor>>,
    pub part_id: Option<Arc<FieldDescriptor>>,
    pub src_time: Option<Arc<FieldDescriptor>>,
    pub activity_time: Option<Arc<FieldDescriptor>>,
    pub line_time: Option<Arc<FieldDescriptor>>,
    pub send_time: Option<Arc<FieldDescriptor>>,
    pub pub_id: Option<Arc<FieldDescriptor>>,
}

impl CommonFieldSet {
    /// Resolve the common names against the dictionary, honoring aliases.
    /// Unresolved names stay `None` and simply never dispatch.
    pub fn resolve(dictionary_: &Dictionary, aliases: Option<&FieldAliases>) -> Self {
        let lookup = |name| dictionary::lookup(dictionary_, aliases, name);
        Self {
            symbol: lookup("wSymbol"),
            issue_symbol: lookup("wIssueSymbol"),
            part_id: lookup("wPartId"),
            src_time: lookup("wSrcTime"),
            activity_time: lookup("wActivityTime"),
            line_time: lookup("wLineTime"),
            send_time: lookup("wSendTime"),
            pub_id: lookup("wPubId"),
        }
    }
}

/// Process-wide holder for one listener type's resolved field set.
///
/// Population is idempotent: the first `set_with` wins, later calls are
/// no-ops, so a second dictionary with different mappings leaves the first
/// in effect. `reset` clears the set (an updater table already published
/// from it is not rebuilt).
pub struct SharedFieldSet<T> {
    slot: RwLock<Option<Arc<T>>>,
}

impl<T> SharedFieldSet<T> {
    pub const fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    pub fn set_with(&self, build: impl FnOnce() -> T) {
        let mut guard = self.slot.write();
        if guard.is_none() {
            *guard = Some(Arc::new(build()));
        }
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.slot.read().clone()
    }

    pub fn is_set(&self) -> bool {
        self.slot.read().is_some()
    }

    pub fn reset(&self) {
        *self.slot.write() = None;
    }
}

impl<T> Default for SharedFieldSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

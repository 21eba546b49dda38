// ============================================================================
// Message
// Owned field map delivered by the transport, iterated field-by-field
// ============================================================================

use super::{FieldValue, MsgStatus, MsgType};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An inbound message: a classification, a status, and an ordered set of
/// `fid -> value` fields.
///
/// Feeds publish deltas, so any subset of a schema's fields may be present.
/// Field order is preserved as published.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Msg {
    msg_type: MsgType,
    status: MsgStatus,
    fields: Vec<(u16, FieldValue)>,
}

impl Msg {
    pub fn new(msg_type: MsgType) -> Self {
        Self {
            msg_type,
            status: MsgStatus::Ok,
            fields: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: MsgStatus) -> Self {
        self.status = status;
        self
    }

    /// Append a field. Feeds never publish the same fid twice in one message.
    pub fn with_field(mut self, fid: u16, value: impl Into<FieldValue>) -> Self {
        self.fields.push((fid, value.into()));
        self
    }

    pub fn msg_type(&self) -> MsgType {
        self.msg_type
    }

    pub fn status(&self) -> MsgStatus {
        self.status
    }

    /// Direct lookup of one field.
    pub fn field(&self, fid: u16) -> Option<&FieldValue> {
        self.fields.iter().find(|(f, _)| *f == fid).map(|(_, v)| v)
    }

    /// Iterate the message's fields in publication order.
    pub fn fields(&self) -> impl Iterator<Item = (u16, &FieldValue)> {
        self.fields.iter().map(|(fid, value)| (*fid, value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

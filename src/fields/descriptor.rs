// ============================================================================
// Field Descriptor
// Resolved identity of one named field within a message schema
// ============================================================================

use crate::domain::FieldType;
use std::fmt;

/// A resolved field: numeric id plus the name and type the schema declares
/// for it. Immutable after resolution and shared for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    fid: u16,
    name: String,
    field_type: FieldType,
}

impl FieldDescriptor {
    pub fn new(fid: u16, name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            fid,
            name: name.into(),
            field_type,
        }
    }

    pub fn fid(&self) -> u16 {
        self.fid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (fid {})", self.name, self.fid)
    }
}

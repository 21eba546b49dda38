// ============================================================================
// Fields Module
// Schema dictionary resolution and per-field freshness state
// ============================================================================

pub mod descriptor;
pub mod dictionary;
pub mod state;

pub use descriptor::FieldDescriptor;
pub use dictionary::{Dictionary, FieldAliases};
pub use state::FieldState;

// ============================================================================
// Cache Module
// Generic delta-tracked record support shared by every listener type
// ============================================================================

pub mod delta;
pub mod dispatch;

pub use delta::DeltaField;
pub use dispatch::{FieldUpdater, UpdaterTable, UpdaterTableBuilder};

// ============================================================================
// Domain Models Module
// Boundary types delivered by the (external) market data transport
// ============================================================================

pub mod msg;
pub mod msg_type;
pub mod quality;
pub mod value;

pub use msg::Msg;
pub use msg_type::{MsgStatus, MsgType};
pub use quality::Quality;
pub use value::{FieldType, FieldValue};

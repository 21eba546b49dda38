// ============================================================================
// Message Classification
// Platform-defined message type and status enumerations
// ============================================================================

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Classification of an inbound message.
///
/// The numeric wire values are assigned by the publishing platform; listeners
/// only branch on the classification, never on the raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MsgType {
    /// Generic delta update (stocks, order imbalances on aggregated feeds)
    Update,
    /// Initial image sent in response to a new subscription
    Initial,
    /// Trade cancel
    Cancel,
    /// Trade error
    Error,
    /// Trade correction
    Correction,
    /// Closing summary
    Closing,
    /// Refresh of all fields, unsolicited or requested
    Recap,
    /// Symbol deleted from the feed
    Delete,
    /// Subscription expired
    Expire,
    /// Response to a snapshot request, no updates follow
    Snapshot,
    /// Pre-opening indication
    PreOpening,
    /// Quote update
    Quote,
    /// Trade update
    Trade,
    /// Order update
    Order,
    /// Order book delta
    BookUpdate,
    /// Not permissioned for this symbol
    NotPermissioned,
    /// Symbol not found
    NotFound,
    /// Marker that all initial values have been sent
    EndOfInitials,
    /// Security status update
    SecStatus,
    /// Classification not known to this library
    Unknown(u16),
}

impl MsgType {
    /// Map a raw platform value onto the classification.
    pub fn from_wire(value: u16) -> Self {
        match value {
            0 => MsgType::Update,
            1 => MsgType::Initial,
            2 => MsgType::Cancel,
            3 => MsgType::Error,
            4 => MsgType::Correction,
            5 => MsgType::Closing,
            6 => MsgType::Recap,
            7 => MsgType::Delete,
            8 => MsgType::Expire,
            9 => MsgType::Snapshot,
            12 => MsgType::PreOpening,
            13 => MsgType::Quote,
            14 => MsgType::Trade,
            15 => MsgType::Order,
            17 => MsgType::BookUpdate,
            21 => MsgType::NotPermissioned,
            22 => MsgType::NotFound,
            23 => MsgType::EndOfInitials,
            26 => MsgType::SecStatus,
            other => MsgType::Unknown(other),
        }
    }

    /// True for the classifications that carry a full image rather than a
    /// delta.
    pub fn is_image(&self) -> bool {
        matches!(
            self,
            MsgType::Initial | MsgType::Recap | MsgType::Snapshot | MsgType::PreOpening
        )
    }
}

/// Per-message status delivered alongside the classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MsgStatus {
    Ok,
    /// The feed line is down
    LineDown,
    /// No publisher is answering for the subscribed symbol
    NoSubscribers,
    /// The symbol is unknown to the feed
    BadSymbol,
    /// The subscription expired
    Expired,
    /// No response within the subscription timeout
    Timeout,
    Misc,
    /// Data is known to be stale
    Stale,
    PlatformStatus,
    NotEntitled,
    NotFound,
    PossiblyDuplicate,
    PossiblyStale,
    NotPermissioned,
    TopicChange,
    BandwidthExceeded,
    Duplicate,
    Unknown(u16),
}

impl MsgStatus {
    /// Map a raw platform value onto the status.
    pub fn from_wire(value: u16) -> Self {
        match value {
            0 => MsgStatus::Ok,
            1 => MsgStatus::LineDown,
            2 => MsgStatus::NoSubscribers,
            3 => MsgStatus::BadSymbol,
            4 => MsgStatus::Expired,
            5 => MsgStatus::Timeout,
            6 => MsgStatus::Misc,
            7 => MsgStatus::Stale,
            8 => MsgStatus::PlatformStatus,
            9 => MsgStatus::NotEntitled,
            10 => MsgStatus::NotFound,
            11 => MsgStatus::PossiblyDuplicate,
            12 => MsgStatus::PossiblyStale,
            13 => MsgStatus::NotPermissioned,
            14 => MsgStatus::TopicChange,
            15 => MsgStatus::BandwidthExceeded,
            16 => MsgStatus::Duplicate,
            other => MsgStatus::Unknown(other),
        }
    }

    /// Statuses that terminate a subscription outright.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MsgStatus::BadSymbol | MsgStatus::Expired | MsgStatus::Timeout
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msg_type_roundtrip() {
        assert_eq!(MsgType::from_wire(1), MsgType::Initial);
        assert_eq!(MsgType::from_wire(13), MsgType::Quote);
        assert_eq!(MsgType::from_wire(26), MsgType::SecStatus);
        assert_eq!(MsgType::from_wire(200), MsgType::Unknown(200));
    }

    #[test]
    fn test_image_classification() {
        assert!(MsgType::Initial.is_image());
        assert!(MsgType::Recap.is_image());
        assert!(!MsgType::Quote.is_image());
        assert!(!MsgType::Update.is_image());
    }

    #[test]
    fn test_fatal_status() {
        assert!(MsgStatus::BadSymbol.is_fatal());
        assert!(MsgStatus::Timeout.is_fatal());
        assert!(!MsgStatus::Stale.is_fatal());
        assert!(!MsgStatus::Ok.is_fatal());
    }
}

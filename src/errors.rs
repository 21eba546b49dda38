// ============================================================================
// Error Taxonomy
// Platform error codes, severities, and the data-shape exception
// ============================================================================

use crate::domain::MsgStatus;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Subscription-level error conditions, re-exposed from the messaging
/// platform. Delivered to [`ErrorListener`](crate::interfaces::ErrorListener)
/// implementations, decoupled from normal message delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ErrorCode {
    NoError,
    LineDown,
    NoSubscribers,
    BadSymbol,
    Expired,
    Timeout,
    Misc,
    Stale,
    PossiblyStale,
    NotEntitled,
    NotPermissioned,
    NotFound,
    TopicChange,
    BandwidthExceeded,
    Delete,
    PlatformStatus,
}

impl ErrorCode {
    /// Map a message status onto the corresponding error code.
    pub fn from_status(status: MsgStatus) -> Self {
        match status {
            MsgStatus::Ok => ErrorCode::NoError,
            MsgStatus::LineDown => ErrorCode::LineDown,
            MsgStatus::NoSubscribers => ErrorCode::NoSubscribers,
            MsgStatus::BadSymbol => ErrorCode::BadSymbol,
            MsgStatus::Expired => ErrorCode::Expired,
            MsgStatus::Timeout => ErrorCode::Timeout,
            MsgStatus::Misc => ErrorCode::Misc,
            MsgStatus::Stale => ErrorCode::Stale,
            MsgStatus::PossiblyStale => ErrorCode::PossiblyStale,
            MsgStatus::NotEntitled => ErrorCode::NotEntitled,
            MsgStatus::NotPermissioned => ErrorCode::NotPermissioned,
            MsgStatus::NotFound => ErrorCode::NotFound,
            MsgStatus::TopicChange => ErrorCode::TopicChange,
            MsgStatus::BandwidthExceeded => ErrorCode::BandwidthExceeded,
            _ => ErrorCode::PlatformStatus,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ErrorCode::NoError => "no error",
            ErrorCode::LineDown => "feed line down",
            ErrorCode::NoSubscribers => "no feed subscribers for symbol",
            ErrorCode::BadSymbol => "bad symbol",
            ErrorCode::Expired => "subscription expired",
            ErrorCode::Timeout => "subscription timed out",
            ErrorCode::Misc => "miscellaneous error",
            ErrorCode::Stale => "data is stale",
            ErrorCode::PossiblyStale => "data is possibly stale",
            ErrorCode::NotEntitled => "not entitled to symbol",
            ErrorCode::NotPermissioned => "not permissioned for symbol",
            ErrorCode::NotFound => "symbol not found",
            ErrorCode::TopicChange => "topic changed",
            ErrorCode::BandwidthExceeded => "bandwidth exceeded",
            ErrorCode::Delete => "symbol deleted",
            ErrorCode::PlatformStatus => "platform status error",
        };
        f.write_str(text)
    }
}

/// Severity attached to an [`ErrorCode`] when reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ErrorSeverity {
    Ok,
    Low,
    High,
}

impl ErrorSeverity {
    /// Severity the platform assigns to each code.
    pub fn for_code(code: ErrorCode) -> Self {
        match code {
            ErrorCode::NoError => ErrorSeverity::Ok,
            ErrorCode::Stale | ErrorCode::PossiblyStale | ErrorCode::TopicChange => {
                ErrorSeverity::Low
            }
            _ => ErrorSeverity::High,
        }
    }
}

/// Error raised when a message field does not have the shape the listener
/// expects.
///
/// Raised during field extraction; it aborts processing of the remaining
/// fields of the offending message and, because dispatch is an unguarded
/// iteration, of any listeners not yet invoked for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataError {
    fid: u16,
    expected: &'static str,
    found: &'static str,
}

impl DataError {
    pub fn new(expected: &'static str, found: &'static str) -> Self {
        Self {
            fid: 0,
            expected,
            found,
        }
    }

    /// Attach the offending field id once it is known at dispatch time.
    pub fn with_fid(mut self, fid: u16) -> Self {
        self.fid = fid;
        self
    }

    pub fn fid(&self) -> u16 {
        self.fid
    }
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "data error: field {} expected {}, found {}",
            self.fid, self.expected, self.found
        )
    }
}

impl std::error::Error for DataError {}

// ============================================================================
// Interfaces Module
// Contracts between the subscription and the listeners attached to it
// ============================================================================

use crate::domain::{Msg, MsgType, Quality};
use crate::errors::{DataError, ErrorCode, ErrorSeverity};
use crate::subscription::SubscriptionInfo;

/// A listener for regular messages on a subscription. Implemented by every
/// typed listener in [`listeners`](crate::listeners).
///
/// Returning `Err` aborts dispatch to any listener not yet invoked for the
/// same message; delivery is an unguarded iteration with no error isolation
/// between listeners.
pub trait MsgListener: Send {
    fn on_msg(
        &mut self,
        subscription: &SubscriptionInfo,
        msg: &Msg,
        msg_type: MsgType,
    ) -> Result<(), DataError>;
}

/// A listener for subscription-level error events, decoupled from normal
/// message delivery.
pub trait ErrorListener: Send {
    fn on_error(
        &mut self,
        subscription: &SubscriptionInfo,
        severity: ErrorSeverity,
        code: ErrorCode,
        description: &str,
    );
}

/// A listener for changes in data quality (staleness) on a subscription.
pub trait QualityListener: Send {
    fn on_quality(&mut self, subscription: &SubscriptionInfo, quality: Quality);
}

/// No-op message listener for testing.
pub struct NoOpMsgListener;

impl MsgListener for NoOpMsgListener {
    fn on_msg(
        &mut self,
        _subscription: &SubscriptionInfo,
        _msg: &Msg,
        _msg_type: MsgType,
    ) -> Result<(), DataError> {
        Ok(())
    }
}

/// Error listener that forwards everything to the log.
pub struct LoggingErrorListener;

impl ErrorListener for LoggingErrorListener {
    fn on_error(
        &mut self,
        subscription: &SubscriptionInfo,
        severity: ErrorSeverity,
        code: ErrorCode,
        description: &str,
    ) {
        tracing::warn!(
            symbol = subscription.symbol(),
            ?severity,
            ?code,
            description,
            "subscription error"
        );
    }
}

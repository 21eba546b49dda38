// ============================================================================
// Subscription
// Registers interest in a (source, symbol) pair and fans messages out to
// the listeners attached to it
// ============================================================================

use crate::domain::{Msg, MsgStatus, MsgType, Quality};
use crate::errors::{DataError, ErrorCode, ErrorSeverity};
use crate::interfaces::{ErrorListener, MsgListener, QualityListener};
use smallvec::SmallVec;
use std::time::Duration;

/// Identity and parameters of a subscription, handed to every listener
/// callback.
#[derive(Debug, Clone)]
pub struct SubscriptionInfo {
    source: String,
    symbol: String,
    require_initial: bool,
    timeout: Duration,
    retries: u32,
}

impl SubscriptionInfo {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn require_initial(&self) -> bool {
        self.require_initial
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }
}

/// A subscription to one instrument on one source.
///
/// Multiple listeners can be attached, so an application can combine the
/// specialized listeners (say, a [`QuoteListener`](crate::listeners::QuoteListener)
/// and a [`TradeListener`](crate::listeners::TradeListener)) on a single
/// subscription. Listeners are invoked in registration order; dispatch stops
/// at the first listener that returns an error.
///
/// Message delivery is single-threaded by contract: one subscription, one
/// delivery thread.
pub struct Subscription {
    info: SubscriptionInfo,
    active: bool,
    msg_listeners: SmallVec<[Box<dyn MsgListener>; 2]>,
    error_listeners: SmallVec<[Box<dyn ErrorListener>; 1]>,
    quality_listeners: SmallVec<[Box<dyn QualityListener>; 1]>,
}

impl Subscription {
    pub fn new(source: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            info: SubscriptionInfo {
                source: source.into(),
                symbol: symbol.into(),
                require_initial: true,
                timeout: Duration::from_secs(10),
                retries: 3,
            },
            active: false,
            msg_listeners: SmallVec::new(),
            error_listeners: SmallVec::new(),
            quality_listeners: SmallVec::new(),
        }
    }

    /// Builder method: whether an initial image is required.
    pub fn with_require_initial(mut self, require: bool) -> Self {
        self.info.require_initial = require;
        self
    }

    /// Builder method: response timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.info.timeout = timeout;
        self
    }

    /// Builder method: retry count before the subscription times out.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.info.retries = retries;
        self
    }

    pub fn info(&self) -> &SubscriptionInfo {
        &self.info
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Add a listener for regular messages.
    pub fn add_msg_listener(&mut self, listener: Box<dyn MsgListener>) {
        self.msg_listeners.push(listener);
    }

    /// Add a listener for error events.
    pub fn add_error_listener(&mut self, listener: Box<dyn ErrorListener>) {
        self.error_listeners.push(listener);
    }

    /// Add a listener for changes in data quality.
    pub fn add_quality_listener(&mut self, listener: Box<dyn QualityListener>) {
        self.quality_listeners.push(listener);
    }

    /// Activate the subscription. Until this is invoked no messages are
    /// dispatched.
    pub fn activate(&mut self) {
        if !self.active {
            self.active = true;
            tracing::debug!(
                source = self.info.source.as_str(),
                symbol = self.info.symbol.as_str(),
                "subscription activated"
            );
        }
    }

    /// Deactivate the subscription; no more messages are dispatched unless
    /// [`activate`](Self::activate) is invoked again.
    pub fn deactivate(&mut self) {
        if self.active {
            self.active = false;
            tracing::debug!(
                source = self.info.source.as_str(),
                symbol = self.info.symbol.as_str(),
                "subscription deactivated"
            );
        }
    }

    /// Deliver one message to every attached msg listener, in registration
    /// order.
    ///
    /// `Delete`/`Expire` classifications and fatal statuses (bad symbol,
    /// expired, timed out) deactivate the subscription without dispatching.
    /// An error from listener N prevents listener N+1 from running.
    pub fn process_msg(&mut self, msg: &Msg) -> Result<(), DataError> {
        if !self.active {
            return Ok(());
        }

        let msg_type = msg.msg_type();
        if matches!(msg_type, MsgType::Delete | MsgType::Expire) {
            self.deactivate();
            return Ok(());
        }
        if msg.status().is_fatal() {
            tracing::warn!(
                symbol = self.info.symbol.as_str(),
                status = ?msg.status(),
                "fatal status, deactivating subscription"
            );
            self.deactivate();
            return Ok(());
        }

        for listener in self.msg_listeners.iter_mut() {
            listener.on_msg(&self.info, msg, msg_type)?;
        }
        Ok(())
    }

    /// Report a transport-level error, mapped to the platform taxonomy and
    /// fanned out to the error listeners.
    pub fn report_error(&mut self, status: MsgStatus) {
        let code = ErrorCode::from_status(status);
        let severity = ErrorSeverity::for_code(code);
        let description = code.to_string();
        for listener in self.error_listeners.iter_mut() {
            listener.on_error(&self.info, severity, code, &description);
        }
    }

    /// Report a change in data quality to the quality listeners.
    pub fn report_quality(&mut self, quality: Quality) {
        for listener in self.quality_listeners.iter_mut() {
            listener.on_quality(&self.info, quality);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counter {
        count: Arc<AtomicUsize>,
        fail: bool,
    }

    impl MsgListener for Counter {
        fn on_msg(
            &mut self,
            _subscription: &SubscriptionInfo,
            _msg: &Msg,
            _msg_type: MsgType,
        ) -> Result<(), DataError> {
            self.count.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(DataError::new("price", "string"))
            } else {
                Ok(())
            }
        }
    }

    struct ErrorProbe {
        seen: Arc<AtomicUsize>,
    }

    impl ErrorListener for ErrorProbe {
        fn on_error(
            &mut self,
            _subscription: &SubscriptionInfo,
            severity: ErrorSeverity,
            code: ErrorCode,
            _description: &str,
        ) {
            assert_eq!(severity, ErrorSeverity::High);
            assert_eq!(code, ErrorCode::BadSymbol);
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_inactive_subscription_drops_messages() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut sub = Subscription::new("FEED", "IBM");
        sub.add_msg_listener(Box::new(Counter {
            count: count.clone(),
            fail: false,
        }));

        sub.process_msg(&Msg::new(MsgType::Update)).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);

        sub.activate();
        sub.process_msg(&Msg::new(MsgType::Update)).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delete_deactivates() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut sub = Subscription::new("FEED", "IBM");
        sub.add_msg_listener(Box::new(Counter {
            count: count.clone(),
            fail: false,
        }));
        sub.activate();

        sub.process_msg(&Msg::new(MsgType::Delete)).unwrap();
        assert!(!sub.is_active());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_fatal_status_deactivates() {
        let mut sub = Subscription::new("FEED", "IBM");
        sub.activate();
        sub.process_msg(&Msg::new(MsgType::Update).with_status(MsgStatus::BadSymbol))
            .unwrap();
        assert!(!sub.is_active());
    }

    #[test]
    fn test_error_in_listener_stops_dispatch() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut sub = Subscription::new("FEED", "IBM");
        sub.add_msg_listener(Box::new(Counter {
            count: first.clone(),
            fail: true,
        }));
        sub.add_msg_listener(Box::new(Counter {
            count: second.clone(),
            fail: false,
        }));
        sub.activate();

        assert!(sub.process_msg(&Msg::new(MsgType::Update)).is_err());
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_error_reporting() {
        let seen = Arc::new(AtomicUsize::new(0));
        let mut sub = Subscription::new("FEED", "IBM");
        sub.add_error_listener(Box::new(ErrorProbe { seen: seen.clone() }));
        sub.report_error(MsgStatus::BadSymbol);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}

// ============================================================================
// mamda
// Field-caching market data listeners with typed callback dispatch
// ============================================================================

//! # mamda
//!
//! Field-caching listeners for delta-published market data feeds.
//!
//! Feeds publish deltas, not full images. Each listener here keeps a
//! per-subscription cache of last-known field values with a tri-state
//! freshness flag per field, merges inbound messages through a fid-indexed
//! dispatch table built once per listener type, and fans typed
//! recap/update/gap/correction callbacks out to application handlers.
//!
//! ## Features
//!
//! - **Schema resolution once per process**: logical field names (with
//!   feed-specific renaming) resolve to descriptors a single time
//! - **Delta-tracked caches**: handlers cheaply ask "did X change on this
//!   tick?" via per-field [`FieldState`](fields::FieldState) flags
//! - **Typed listeners** for quotes, trades, auctions, security status,
//!   order imbalances and fundamentals
//! - **Lock-free dispatch** after first-message table construction
//!
//! ## Example
//!
//! ```rust
//! use mamda::prelude::*;
//! use rust_decimal::Decimal;
//!
//! struct Ticker;
//!
//! impl QuoteHandler for Ticker {
//!     fn on_quote_recap(&mut self, sub: &SubscriptionInfo, _msg: &Msg, recap: &QuoteCache) {
//!         println!("{}: bid {}", sub.symbol(), recap.bid_price.get());
//!     }
//!
//!     fn on_quote_update(&mut self, sub: &SubscriptionInfo, _msg: &Msg, quote: &QuoteCache) {
//!         if quote.bid_price.is_modified() {
//!             println!("{}: bid -> {}", sub.symbol(), quote.bid_price.get());
//!         }
//!     }
//! }
//!
//! // The transport layer supplies the schema dictionary; resolve it once.
//! let dictionary = Dictionary::from_entries([
//!     (107u16, "wBidPrice", FieldType::Price),
//!     (108, "wBidSize", FieldType::F64),
//! ]);
//! QuoteFields::set_dictionary(&dictionary, None);
//!
//! let mut listener = QuoteListener::new();
//! listener.add_handler(Box::new(Ticker));
//!
//! let mut subscription = Subscription::new("FEED", "IBM");
//! subscription.add_msg_listener(Box::new(listener));
//! subscription.activate();
//!
//! // The transport would deliver messages; one is synthesized here.
//! let msg = Msg::new(MsgType::Initial).with_field(107, Decimal::new(1005, 1));
//! subscription.process_msg(&msg)?;
//! # Ok::<(), mamda::errors::DataError>(())
//! ```

pub mod cache;
pub mod domain;
pub mod errors;
pub mod fields;
pub mod interfaces;
pub mod listeners;
pub mod subscription;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenience
pub mod prelude {
    pub use crate::cache::{DeltaField, FieldUpdater, UpdaterTable, UpdaterTableBuilder};
    pub use crate::domain::{FieldType, FieldValue, Msg, MsgStatus, MsgType, Quality};
    pub use crate::errors::{DataError, ErrorCode, ErrorSeverity};
    pub use crate::fields::{Dictionary, FieldAliases, FieldDescriptor, FieldState};
    pub use crate::interfaces::{ErrorListener, MsgListener, QualityListener};
    pub use crate::listeners::auction::AuctionFields;
    pub use crate::listeners::fundamentals::FundamentalFields;
    pub use crate::listeners::order_imbalance::OrderImbalanceFields;
    pub use crate::listeners::security_status::SecurityStatusFields;
    pub use crate::listeners::{
        AuctionCache, AuctionHandler, AuctionListener, FundamentalCache, FundamentalHandler,
        FundamentalListener, ImbalanceSide, ImbalanceType, OrderImbalanceCache,
        OrderImbalanceHandler, OrderImbalanceListener, QuoteCache, QuoteFields, QuoteHandler,
        QuoteListener, SecurityStatus, SecurityStatusCache, SecurityStatusHandler,
        SecurityStatusListener, SecurityStatusQual, SeqGap, TradeCache, TradeFields, TradeHandler,
        TradeListener, UncrossPriceInd,
    };
    pub use crate::subscription::{Subscription, SubscriptionInfo};
}

#[cfg(test)]
mod integration_tests {
    use super::prelude::*;
    use crate::testing;
    use parking_lot::Mutex;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    enum Seen {
        QuoteRecap {
            price: Decimal,
            volume: f64,
            price_state: FieldState,
            volume_state: FieldState,
        },
        QuoteUpdate {
            price_state: FieldState,
            volume_state: FieldState,
        },
        TradeReport {
            price: Decimal,
        },
    }

    #[derive(Clone, Default)]
    struct QuoteProbe {
        seen: Arc<Mutex<Vec<Seen>>>,
    }

    impl QuoteHandler for QuoteProbe {
        fn on_quote_recap(&mut self, _sub: &SubscriptionInfo, _msg: &Msg, recap: &QuoteCache) {
            self.seen.lock().push(Seen::QuoteRecap {
                price: recap.bid_price.get(),
                volume: recap.bid_size.get(),
                price_state: recap.bid_price.state(),
                volume_state: recap.bid_size.state(),
            });
        }

        fn on_quote_update(&mut self, _sub: &SubscriptionInfo, _msg: &Msg, quote: &QuoteCache) {
            self.seen.lock().push(Seen::QuoteUpdate {
                price_state: quote.bid_price.state(),
                volume_state: quote.bid_size.state(),
            });
        }
    }

    #[derive(Clone, Default)]
    struct TradeProbe {
        seen: Arc<Mutex<Vec<Seen>>>,
    }

    impl TradeHandler for TradeProbe {
        fn on_trade_recap(&mut self, _sub: &SubscriptionInfo, _msg: &Msg, _recap: &TradeCache) {}

        fn on_trade_report(&mut self, _sub: &SubscriptionInfo, _msg: &Msg, trade: &TradeCache) {
            self.seen.lock().push(Seen::TradeReport {
                price: trade.trade_price.get(),
            });
        }
    }

    /// The full path: dictionary resolution, subscription fan-out, cache
    /// merge, recap/update classification, per-field change flags.
    #[test]
    fn test_end_to_end_quote_flow() {
        testing::resolve_all_fields();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let mut quote_listener = QuoteListener::new();
        quote_listener.add_handler(Box::new(QuoteProbe { seen: seen.clone() }));

        let mut subscription = Subscription::new("FEED", "IBM");
        subscription.add_msg_listener(Box::new(quote_listener));
        subscription.activate();

        let initial = Msg::new(MsgType::Initial)
            .with_field(testing::fid("wBidPrice"), Decimal::from(10u64))
            .with_field(testing::fid("wBidSize"), 100.0);
        subscription.process_msg(&initial).unwrap();

        let update = Msg::new(MsgType::Quote)
            .with_field(testing::fid("wBidPrice"), Decimal::from(10u64))
            .with_field(testing::fid("wBidSize"), 150.0);
        subscription.process_msg(&update).unwrap();

        let seen = seen.lock();
        assert_eq!(
            seen.as_slice(),
            &[
                Seen::QuoteRecap {
                    price: Decimal::from(10u64),
                    volume: 100.0,
                    price_state: FieldState::Modified,
                    volume_state: FieldState::Modified,
                },
                Seen::QuoteUpdate {
                    price_state: FieldState::NotModified,
                    volume_state: FieldState::Modified,
                },
            ]
        );
    }

    /// Multiple specialized listeners share one subscription; each reacts
    /// only to its own classifications.
    #[test]
    fn test_combined_listeners_on_one_subscription() {
        testing::resolve_all_fields();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let mut quote_listener = QuoteListener::new();
        quote_listener.add_handler(Box::new(QuoteProbe { seen: seen.clone() }));
        let mut trade_listener = TradeListener::new();
        trade_listener.add_handler(Box::new(TradeProbe { seen: seen.clone() }));

        let mut subscription = Subscription::new("FEED", "MSFT");
        subscription.add_msg_listener(Box::new(quote_listener));
        subscription.add_msg_listener(Box::new(trade_listener));
        subscription.activate();

        let quote = Msg::new(MsgType::Quote)
            .with_field(testing::fid("wBidPrice"), Decimal::from(20u64))
            .with_field(testing::fid("wBidSize"), 10.0);
        subscription.process_msg(&quote).unwrap();

        let trade = Msg::new(MsgType::Trade)
            .with_field(testing::fid("wTradePrice"), Decimal::from(21u64))
            .with_field(testing::fid("wTradeVolume"), 500.0);
        subscription.process_msg(&trade).unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(matches!(seen[0], Seen::QuoteUpdate { .. }));
        assert_eq!(
            seen[1],
            Seen::TradeReport {
                price: Decimal::from(21u64)
            }
        );
    }

    /// An unknown classification reaches the listeners and is ignored by
    /// all of them.
    #[test]
    fn test_unknown_classification_end_to_end() {
        testing::resolve_all_fields();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let mut quote_listener = QuoteListener::new();
        quote_listener.add_handler(Box::new(QuoteProbe { seen: seen.clone() }));

        let mut subscription = Subscription::new("FEED", "IBM");
        subscription.add_msg_listener(Box::new(quote_listener));
        subscription.activate();

        let msg = Msg::new(MsgType::Unknown(77))
            .with_field(testing::fid("wBidPrice"), Decimal::from(10u64));
        subscription.process_msg(&msg).unwrap();

        assert!(seen.lock().is_empty());
    }
}

// ============================================================================
// Listeners Module
// Typed field-caching listeners, one per market data entity
// ============================================================================

pub mod auction;
pub mod common;
pub mod fundamentals;
pub mod order_imbalance;
pub mod quote;
pub mod security_status;
pub mod trade;

pub use auction::{AuctionCache, AuctionHandler, AuctionListener, UncrossPriceInd};
pub use common::{CommonFieldSet, SharedFieldSet};
pub use fundamentals::{FundamentalCache, FundamentalHandler, FundamentalListener};
pub use order_imbalance::{
    ImbalanceSide, ImbalanceType, OrderImbalanceCache, OrderImbalanceHandler,
    OrderImbalanceListener,
};
pub use quote::{QuoteCache, QuoteFields, QuoteHandler, QuoteListener};
pub use security_status::{
    SecurityStatus, SecurityStatusCache, SecurityStatusHandler, SecurityStatusListener,
    SecurityStatusQual,
};
pub use trade::{TradeCache, TradeFields, TradeHandler, TradeListener};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A detected gap in an event count sequence, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SeqGap {
    pub begin: u64,
    pub end: u64,
}

impl SeqGap {
    pub fn new(begin: u64, end: u64) -> Self {
        Self { begin, end }
    }

    /// Number of missing events in the gap.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.begin) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.begin
    }
}

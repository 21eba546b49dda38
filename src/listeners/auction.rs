// ============================================================================
// Auction Listener
// Caches auction uncross fields and dispatches recap/update callbacks
// ============================================================================

use crate::cache::{DeltaField, UpdaterTable, UpdaterTableBuilder};
use crate::domain::{FieldValue, Msg, MsgType};
use crate::errors::DataError;
use crate::fields::{dictionary, Dictionary, FieldAliases, FieldDescriptor};
use crate::interfaces::MsgListener;
use crate::listeners::common::{CommonFieldSet, SharedFieldSet};
use crate::subscription::SubscriptionInfo;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use smallvec::SmallVec;
use std::sync::{Arc, OnceLock};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Qualifies an uncross price: whether the auction price is indicative or
/// firm. Published numerically or as a string depending on the feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UncrossPriceInd {
    #[default]
    None,
    Indicative,
    Firm,
    Insufficient,
    Crossing,
    Unknown,
}

impl UncrossPriceInd {
    pub fn from_wire(value: u64) -> Self {
        match value {
            0 => UncrossPriceInd::None,
            1 => UncrossPriceInd::Indicative,
            2 => UncrossPriceInd::Firm,
            3 => UncrossPriceInd::Insufficient,
            4 => UncrossPriceInd::Crossing,
            _ => UncrossPriceInd::Unknown,
        }
    }

    pub fn parse(text: &str) -> Self {
        match text {
            "None" | "" => UncrossPriceInd::None,
            "I" | "Indicative" => UncrossPriceInd::Indicative,
            "F" | "Firm" => UncrossPriceInd::Firm,
            "Insufficient" => UncrossPriceInd::Insufficient,
            "C" | "Crossing" => UncrossPriceInd::Crossing,
            other => match other.parse::<u64>() {
                Ok(value) => UncrossPriceInd::from_wire(value),
                Err(_) => UncrossPriceInd::Unknown,
            },
        }
    }
}

/// Handler interface for auction events.
pub trait AuctionHandler: Send {
    /// Full refresh of the auction image.
    fn on_auction_recap(&mut self, subscription: &SubscriptionInfo, msg: &Msg, recap: &AuctionCache);

    /// An auction delta arrived.
    fn on_auction_update(
        &mut self,
        subscription: &SubscriptionInfo,
        msg: &Msg,
        auction: &AuctionCache,
    );
}

// ============================================================================
// Field set
// ============================================================================

/// Resolved descriptors for the auction schema.
#[derive(Debug, Clone, Default)]
pub struct AuctionFieldSet {
    pub common: CommonFieldSet,
    pub uncross_price: Option<Arc<FieldDescriptor>>,
    pub uncross_volume: Option<Arc<FieldDescriptor>>,
    pub uncross_price_ind: Option<Arc<FieldDescriptor>>,
    pub auction_time: Option<Arc<FieldDescriptor>>,
    pub seq_num: Option<Arc<FieldDescriptor>>,
    pub max_fid: u16,
}

impl AuctionFieldSet {
    fn resolve(dict: &Dictionary, aliases: Option<&FieldAliases>) -> Self {
        let lookup = |name| dictionary::lookup(dict, aliases, name);
        Self {
            common: CommonFieldSet::resolve(dict, aliases),
            uncross_price: lookup("wUncrossPrice"),
            uncross_volume: lookup("wUncrossVolume"),
            uncross_price_ind: lookup("wUncrossPriceInd"),
            auction_time: lookup("wAuctionTime"),
            seq_num: lookup("wSeqNum"),
            max_fid: dict.max_fid(),
        }
    }
}

static AUCTION_FIELDS: SharedFieldSet<AuctionFieldSet> = SharedFieldSet::new();
static AUCTION_UPDATERS: OnceLock<UpdaterTable<AuctionCache>> = OnceLock::new();

/// Process-wide cache of auction field descriptors.
pub struct AuctionFields;

impl AuctionFields {
    /// Resolve the schema against a dictionary. Idempotent.
    pub fn set_dictionary(dictionary: &Dictionary, aliases: Option<&FieldAliases>) {
        AUCTION_FIELDS.set_with(|| AuctionFieldSet::resolve(dictionary, aliases));
    }

    pub fn is_set() -> bool {
        AUCTION_FIELDS.is_set()
    }

    pub fn reset() {
        AUCTION_FIELDS.reset();
    }

    pub fn get() -> Option<Arc<AuctionFieldSet>> {
        AUCTION_FIELDS.get()
    }
}

// ============================================================================
// Cache
// ============================================================================

/// Last-known value and freshness state for every tracked auction field.
#[derive(Debug, Clone, Default)]
pub struct AuctionCache {
    pub symbol: DeltaField<String>,
    pub part_id: DeltaField<String>,
    pub src_time: DeltaField<Option<DateTime<Utc>>>,
    pub activity_time: DeltaField<Option<DateTime<Utc>>>,
    pub line_time: DeltaField<Option<DateTime<Utc>>>,
    pub send_time: DeltaField<Option<DateTime<Utc>>>,

    pub uncross_price: DeltaField<Decimal>,
    pub uncross_volume: DeltaField<f64>,
    pub uncross_price_ind: DeltaField<UncrossPriceInd>,
    pub auction_time: DeltaField<Option<DateTime<Utc>>>,
    pub event_seq_num: DeltaField<u64>,
}

impl AuctionCache {
    fn decay_states(&mut self) {
        self.symbol.decay();
        self.part_id.decay();
        self.src_time.decay();
        self.activity_time.decay();
        self.line_time.decay();
        self.send_time.decay();
        self.uncross_price.decay();
        self.uncross_volume.decay();
        self.uncross_price_ind.decay();
        self.auction_time.decay();
        self.event_seq_num.decay();
    }
}

// ============================================================================
// Updater table
// ============================================================================

fn build_updaters(fields: &AuctionFieldSet) -> UpdaterTable<AuctionCache> {
    let mut b: UpdaterTableBuilder<AuctionCache> = UpdaterTableBuilder::new(fields.max_fid);

    b.add(fields.common.symbol.as_ref(), |c, v| {
        c.symbol.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.common.issue_symbol.as_ref(), |c, v| {
        c.symbol.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.common.part_id.as_ref(), |c, v| {
        c.part_id.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.common.src_time.as_ref(), |c, v| {
        c.src_time.update(Some(v.try_datetime()?));
        Ok(())
    });
    b.add(fields.common.activity_time.as_ref(), |c, v| {
        c.activity_time.update(Some(v.try_datetime()?));
        Ok(())
    });
    b.add(fields.common.line_time.as_ref(), |c, v| {
        c.line_time.update(Some(v.try_datetime()?));
        Ok(())
    });
    b.add(fields.common.send_time.as_ref(), |c, v| {
        c.send_time.update(Some(v.try_datetime()?));
        Ok(())
    });

    b.add(fields.uncross_price.as_ref(), |c, v| {
        c.uncross_price.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.uncross_volume.as_ref(), |c, v| {
        c.uncross_volume.update(v.try_f64()?);
        Ok(())
    });
    b.add(fields.uncross_price_ind.as_ref(), |c, v| {
        let ind = match v {
            FieldValue::String(s) => UncrossPriceInd::parse(&s),
            other => UncrossPriceInd::from_wire(other.try_u64()?),
        };
        c.uncross_price_ind.update(ind);
        Ok(())
    });
    b.add(fields.auction_time.as_ref(), |c, v| {
        c.auction_time.update(Some(v.try_datetime()?));
        Ok(())
    });
    b.add(fields.seq_num.as_ref(), |c, v| {
        c.event_seq_num.update(v.try_u64()?);
        Ok(())
    });

    b.build()
}

fn auction_updaters() -> Option<&'static UpdaterTable<AuctionCache>> {
    if let Some(table) = AUCTION_UPDATERS.get() {
        return Some(table);
    }
    let fields = AuctionFields::get()?;
    Some(AUCTION_UPDATERS.get_or_init(|| build_updaters(&fields)))
}

// ============================================================================
// Listener
// ============================================================================

/// A listener that specializes in auction uncross updates.
#[derive(Default)]
pub struct AuctionListener {
    cache: AuctionCache,
    handlers: SmallVec<[Box<dyn AuctionHandler>; 2]>,
}

impl AuctionListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an auction handler; handlers are invoked in registration order.
    pub fn add_handler(&mut self, handler: Box<dyn AuctionHandler>) {
        self.handlers.push(handler);
    }

    /// The cached auction image.
    pub fn auction(&self) -> &AuctionCache {
        &self.cache
    }
}

impl MsgListener for AuctionListener {
    fn on_msg(
        &mut self,
        subscription: &SubscriptionInfo,
        msg: &Msg,
        msg_type: MsgType,
    ) -> Result<(), DataError> {
        let Some(updaters) = auction_updaters() else {
            tracing::warn!(
                symbol = subscription.symbol(),
                "auction dictionary not resolved, dropping message"
            );
            return Ok(());
        };

        match msg_type {
            MsgType::Initial | MsgType::Recap => {
                self.cache.decay_states();
                updaters.merge(&mut self.cache, msg)?;
                let cache = &self.cache;
                for handler in self.handlers.iter_mut() {
                    handler.on_auction_recap(subscription, msg, cache);
                }
            }
            MsgType::Update | MsgType::Quote => {
                self.cache.decay_states();
                updaters.merge(&mut self.cache, msg)?;
                let cache = &self.cache;
                for handler in self.handlers.iter_mut() {
                    handler.on_auction_update(subscription, msg, cache);
                }
            }
            _ => {}
        }
        Ok(())
    }
}

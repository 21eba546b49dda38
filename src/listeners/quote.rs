// ============================================================================
// Quote Listener
// Caches quote-related fields and dispatches recap/update/gap/closing
// callbacks to registered handlers
// ============================================================================

use crate::cache::{DeltaField, UpdaterTable, UpdaterTableBuilder};
use crate::domain::{Msg, MsgType};
use crate::errors::DataError;
use crate::fields::{dictionary, Dictionary, FieldAliases, FieldDescriptor};
use crate::interfaces::MsgListener;
use crate::listeners::common::{CommonFieldSet, SharedFieldSet};
use crate::listeners::SeqGap;
use crate::subscription::SubscriptionInfo;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use smallvec::SmallVec;
use std::sync::{Arc, OnceLock};

/// Handler interface for quote events. Implementations receive the full
/// cached image; per-field [`FieldState`](crate::fields::FieldState) flags
/// identify what changed on the reported message.
pub trait QuoteHandler: Send {
    /// Full refresh of the quote image (initial value or recap).
    fn on_quote_recap(&mut self, subscription: &SubscriptionInfo, msg: &Msg, recap: &QuoteCache);

    /// A quote delta arrived.
    fn on_quote_update(&mut self, subscription: &SubscriptionInfo, msg: &Msg, quote: &QuoteCache);

    /// A gap in the quote count sequence was detected.
    fn on_quote_gap(
        &mut self,
        subscription: &SubscriptionInfo,
        msg: &Msg,
        gap: SeqGap,
        recap: &QuoteCache,
    ) {
        let _ = (subscription, msg, gap, recap);
    }

    /// Closing quote summary.
    fn on_quote_closing(&mut self, subscription: &SubscriptionInfo, msg: &Msg, recap: &QuoteCache) {
        let _ = (subscription, msg, recap);
    }
}

// ============================================================================
// Field set
// ============================================================================

/// Resolved descriptors for the quote schema.
#[derive(Debug, Clone, Default)]
pub struct QuoteFieldSet {
    pub common: CommonFieldSet,
    pub bid_price: Option<Arc<FieldDescriptor>>,
    pub bid_size: Option<Arc<FieldDescriptor>>,
    pub bid_part_id: Option<Arc<FieldDescriptor>>,
    pub bid_depth: Option<Arc<FieldDescriptor>>,
    pub bid_close_price: Option<Arc<FieldDescriptor>>,
    pub bid_close_date: Option<Arc<FieldDescriptor>>,
    pub bid_prev_close_price: Option<Arc<FieldDescriptor>>,
    pub bid_prev_close_date: Option<Arc<FieldDescriptor>>,
    pub bid_high: Option<Arc<FieldDescriptor>>,
    pub bid_low: Option<Arc<FieldDescriptor>>,
    pub ask_price: Option<Arc<FieldDescriptor>>,
    pub ask_size: Option<Arc<FieldDescriptor>>,
    pub ask_part_id: Option<Arc<FieldDescriptor>>,
    pub ask_depth: Option<Arc<FieldDescriptor>>,
    pub ask_close_price: Option<Arc<FieldDescriptor>>,
    pub ask_close_date: Option<Arc<FieldDescriptor>>,
    pub ask_prev_close_price: Option<Arc<FieldDescriptor>>,
    pub ask_prev_close_date: Option<Arc<FieldDescriptor>>,
    pub ask_high: Option<Arc<FieldDescriptor>>,
    pub ask_low: Option<Arc<FieldDescriptor>>,
    pub quote_seq_num: Option<Arc<FieldDescriptor>>,
    pub quote_time: Option<Arc<FieldDescriptor>>,
    pub quote_date: Option<Arc<FieldDescriptor>>,
    pub quote_qual: Option<Arc<FieldDescriptor>>,
    pub quote_qual_native: Option<Arc<FieldDescriptor>>,
    pub quote_count: Option<Arc<FieldDescriptor>>,
    pub conflate_count: Option<Arc<FieldDescriptor>>,
    pub short_sale_bid_tick: Option<Arc<FieldDescriptor>>,
    pub bid_tick: Option<Arc<FieldDescriptor>>,
    pub short_sale_circuit_breaker: Option<Arc<FieldDescriptor>>,
    pub ask_time: Option<Arc<FieldDescriptor>>,
    pub bid_time: Option<Arc<FieldDescriptor>>,
    pub ask_indicator: Option<Arc<FieldDescriptor>>,
    pub bid_indicator: Option<Arc<FieldDescriptor>>,
    pub ask_update_count: Option<Arc<FieldDescriptor>>,
    pub bid_update_count: Option<Arc<FieldDescriptor>>,
    pub ask_yield: Option<Arc<FieldDescriptor>>,
    pub bid_yield: Option<Arc<FieldDescriptor>>,
    pub max_fid: u16,
}

impl QuoteFieldSet {
    fn resolve(dict: &Dictionary, aliases: Option<&FieldAliases>) -> Self {
        let lookup = |name| dictionary::lookup(dict, aliases, name);
        Self {
            common: CommonFieldSet::resolve(dict, aliases),
            bid_price: lookup("wBidPrice"),
            bid_size: lookup("wBidSize"),
            bid_part_id: lookup("wBidPartId"),
            bid_depth: lookup("wBidDepth"),
            bid_close_price: lookup("wBidClose"),
            bid_close_date: lookup("wBidCloseDate"),
            bid_prev_close_price: lookup("wPrevBidClose"),
            bid_prev_close_date: lookup("wPrevBidCloseDate"),
            bid_high: lookup("wBidHigh"),
            bid_low: lookup("wBidLow"),
            ask_price: lookup("wAskPrice"),
            ask_size: lookup("wAskSize"),
            ask_part_id: lookup("wAskPartId"),
            ask_depth: lookup("wAskDepth"),
            ask_close_price: lookup("wAskClose"),
            ask_close_date: lookup("wAskCloseDate"),
            ask_prev_close_price: lookup("wPrevAskClose"),
            ask_prev_close_date: lookup("wPrevAskCloseDate"),
            ask_high: lookup("wAskHigh"),
            ask_low: lookup("wAskLow"),
            quote_seq_num: lookup("wQuoteSeqNum"),
            quote_time: lookup("wQuoteTime"),
            quote_date: lookup("wQuoteDate"),
            quote_qual: lookup("wQuoteQualifier"),
            quote_qual_native: lookup("wCondition"),
            quote_count: lookup("wQuoteCount"),
            conflate_count: lookup("wConflateQuoteCount"),
            short_sale_bid_tick: lookup("wShortSaleBidTick"),
            bid_tick: lookup("wBidTick"),
            short_sale_circuit_breaker: lookup("wShortSaleCircuitBreaker"),
            ask_time: lookup("wAskTime"),
            bid_time: lookup("wBidTime"),
            ask_indicator: lookup("wAskIndicator"),
            bid_indicator: lookup("wBidIndicator"),
            ask_update_count: lookup("wAskUpdateCount"),
            bid_update_count: lookup("wBidUpdateCount"),
            ask_yield: lookup("wAskYield"),
            bid_yield: lookup("wBidYield"),
            max_fid: dict.max_fid(),
        }
    }
}

static QUOTE_FIELDS: SharedFieldSet<QuoteFieldSet> = SharedFieldSet::new();
static QUOTE_UPDATERS: OnceLock<UpdaterTable<QuoteCache>> = OnceLock::new();

/// Process-wide cache of quote field descriptors. Must be populated before
/// quote listeners can process messages.
pub struct QuoteFields;

impl QuoteFields {
    /// Resolve the quote schema against a dictionary, with optional
    /// feed-specific renaming. Idempotent: once resolved, further calls are
    /// no-ops.
    pub fn set_dictionary(dictionary: &Dictionary, aliases: Option<&FieldAliases>) {
        QUOTE_FIELDS.set_with(|| QuoteFieldSet::resolve(dictionary, aliases));
    }

    pub fn is_set() -> bool {
        QUOTE_FIELDS.is_set()
    }

    pub fn reset() {
        QUOTE_FIELDS.reset();
    }

    pub fn get() -> Option<Arc<QuoteFieldSet>> {
        QUOTE_FIELDS.get()
    }
}

// ============================================================================
// Cache
// ============================================================================

/// Last-known value and freshness state for every tracked quote field.
/// One per listener instance; handlers receive it as the recap view.
#[derive(Debug, Clone, Default)]
pub struct QuoteCache {
    pub symbol: DeltaField<String>,
    pub part_id: DeltaField<String>,
    pub pub_id: DeltaField<String>,
    pub src_time: DeltaField<Option<DateTime<Utc>>>,
    pub activity_time: DeltaField<Option<DateTime<Utc>>>,
    pub line_time: DeltaField<Option<DateTime<Utc>>>,
    pub send_time: DeltaField<Option<DateTime<Utc>>>,

    pub bid_price: DeltaField<Decimal>,
    pub bid_size: DeltaField<f64>,
    pub bid_depth: DeltaField<f64>,
    pub bid_part_id: DeltaField<String>,
    pub bid_close_price: DeltaField<Decimal>,
    pub bid_close_date: DeltaField<Option<NaiveDate>>,
    pub bid_prev_close_price: DeltaField<Decimal>,
    pub bid_prev_close_date: DeltaField<Option<NaiveDate>>,
    pub bid_high: DeltaField<Decimal>,
    pub bid_low: DeltaField<Decimal>,

    pub ask_price: DeltaField<Decimal>,
    pub ask_size: DeltaField<f64>,
    pub ask_depth: DeltaField<f64>,
    pub ask_part_id: DeltaField<String>,
    pub ask_close_price: DeltaField<Decimal>,
    pub ask_close_date: DeltaField<Option<NaiveDate>>,
    pub ask_prev_close_price: DeltaField<Decimal>,
    pub ask_prev_close_date: DeltaField<Option<NaiveDate>>,
    pub ask_high: DeltaField<Decimal>,
    pub ask_low: DeltaField<Decimal>,

    pub event_seq_num: DeltaField<u64>,
    pub event_time: DeltaField<Option<DateTime<Utc>>>,
    pub quote_date: DeltaField<Option<NaiveDate>>,
    pub quote_qual: DeltaField<String>,
    pub quote_qual_native: DeltaField<String>,
    pub quote_count: DeltaField<u64>,
    pub short_sale_bid_tick: DeltaField<char>,
    pub short_sale_circuit_breaker: DeltaField<char>,

    pub ask_time: DeltaField<Option<DateTime<Utc>>>,
    pub bid_time: DeltaField<Option<DateTime<Utc>>>,
    pub ask_indicator: DeltaField<String>,
    pub bid_indicator: DeltaField<String>,
    pub ask_update_count: DeltaField<u64>,
    pub bid_update_count: DeltaField<u64>,
    pub ask_yield: DeltaField<f64>,
    pub bid_yield: DeltaField<f64>,

    // Merge scratch, valid for the message currently being processed.
    tmp_quote_count: u64,
    conflate_count: u64,
    got_bid_price: bool,
    got_ask_price: bool,
    got_bid_size: bool,
    got_ask_size: bool,
    got_bid_depth: bool,
    got_ask_depth: bool,
    got_part_id: bool,
    got_bid_part_id: bool,
    got_ask_part_id: bool,
    got_quote_count: bool,
}

impl QuoteCache {
    /// Mid price, when both sides of the quote are present.
    pub fn mid_price(&self) -> Option<Decimal> {
        let bid = self.bid_price.get();
        let ask = self.ask_price.get();
        if bid > Decimal::ZERO && ask > Decimal::ZERO {
            Some((bid + ask) / Decimal::from(2u8))
        } else {
            None
        }
    }

    fn begin_merge(&mut self) {
        self.got_bid_price = false;
        self.got_ask_price = false;
        self.got_bid_size = false;
        self.got_ask_size = false;
        self.got_bid_depth = false;
        self.got_ask_depth = false;
        self.got_part_id = false;
        self.got_bid_part_id = false;
        self.got_ask_part_id = false;
        self.got_quote_count = false;
    }

    /// Whether the message carried any quote-side field; generic updates
    /// only count as quotes when this holds.
    fn saw_quote_fields(&self) -> bool {
        self.got_bid_price
            || self.got_ask_price
            || self.got_bid_size
            || self.got_ask_size
            || self.got_bid_depth
            || self.got_ask_depth
            || self.got_bid_part_id
            || self.got_ask_part_id
    }

    /// No explicit participant id in the message, but the symbol may carry
    /// one as a dotted suffix.
    fn derive_part_id(&mut self) {
        if self.got_part_id || !self.symbol.is_initialised() {
            return;
        }
        if let Some((_, part)) = self.symbol.value().split_once('.') {
            if !part.is_empty() {
                let part = part.to_string();
                self.part_id.force(part);
                self.got_part_id = true;
            }
        }
    }

    fn decay_states(&mut self) {
        self.symbol.decay();
        self.part_id.decay();
        self.pub_id.decay();
        self.src_time.decay();
        self.activity_time.decay();
        self.line_time.decay();
        self.send_time.decay();
        self.bid_price.decay();
        self.bid_size.decay();
        self.bid_depth.decay();
        self.bid_part_id.decay();
        self.bid_close_price.decay();
        self.bid_close_date.decay();
        self.bid_prev_close_price.decay();
        self.bid_prev_close_date.decay();
        self.bid_high.decay();
        self.bid_low.decay();
        self.ask_price.decay();
        self.ask_size.decay();
        self.ask_depth.decay();
        self.ask_part_id.decay();
        self.ask_close_price.decay();
        self.ask_close_date.decay();
        self.ask_prev_close_price.decay();
        self.ask_prev_close_date.decay();
        self.ask_high.decay();
        self.ask_low.decay();
        self.event_seq_num.decay();
        self.event_time.decay();
        self.quote_date.decay();
        self.quote_qual.decay();
        self.quote_qual_native.decay();
        self.quote_count.decay();
        self.short_sale_bid_tick.decay();
        self.short_sale_circuit_breaker.decay();
        self.ask_time.decay();
        self.bid_time.decay();
        self.ask_indicator.decay();
        self.bid_indicator.decay();
        self.ask_update_count.decay();
        self.bid_update_count.decay();
        self.ask_yield.decay();
        self.bid_yield.decay();
    }
}

// ============================================================================
// Updater table
// ============================================================================

fn build_updaters(fields: &QuoteFieldSet) -> UpdaterTable<QuoteCache> {
    let mut b: UpdaterTableBuilder<QuoteCache> = UpdaterTableBuilder::new(fields.max_fid);

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
        c.got_part_id = true;
        Ok(())
    });
    b.add(fields.common.pub_id.as_ref(), |c, v| {
        c.pub_id.update(v.try_str()?.to_string());
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

    b.add(fields.bid_price.as_ref(), |c, v| {
        if c.bid_price.update(v.try_price()?) {
            c.got_bid_price = true;
        }
        Ok(())
    });
    b.add(fields.bid_size.as_ref(), |c, v| {
        if c.bid_size.update(v.try_f64()?) {
            c.got_bid_size = true;
        }
        Ok(())
    });
    b.add(fields.bid_depth.as_ref(), |c, v| {
        if c.bid_depth.update(v.try_f64()?) {
            c.got_bid_depth = true;
        }
        Ok(())
    });
    b.add(fields.bid_part_id.as_ref(), |c, v| {
        if c.bid_part_id.update(v.try_str()?.to_string()) {
            c.got_bid_part_id = true;
        }
        Ok(())
    });
    b.add(fields.bid_close_price.as_ref(), |c, v| {
        c.bid_close_price.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.bid_close_date.as_ref(), |c, v| {
        c.bid_close_date.update(Some(v.try_date()?));
        Ok(())
    });
    b.add(fields.bid_prev_close_price.as_ref(), |c, v| {
        c.bid_prev_close_price.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.bid_prev_close_date.as_ref(), |c, v| {
        c.bid_prev_close_date.update(Some(v.try_date()?));
        Ok(())
    });
    b.add(fields.bid_high.as_ref(), |c, v| {
        c.bid_high.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.bid_low.as_ref(), |c, v| {
        c.bid_low.update(v.try_price()?);
        Ok(())
    });

    b.add(fields.ask_price.as_ref(), |c, v| {
        if c.ask_price.update(v.try_price()?) {
            c.got_ask_price = true;
        }
        Ok(())
    });
    b.add(fields.ask_size.as_ref(), |c, v| {
        if c.ask_size.update(v.try_f64()?) {
            c.got_ask_size = true;
        }
        Ok(())
    });
    b.add(fields.ask_depth.as_ref(), |c, v| {
        if c.ask_depth.update(v.try_f64()?) {
            c.got_ask_depth = true;
        }
        Ok(())
    });
    b.add(fields.ask_part_id.as_ref(), |c, v| {
        if c.ask_part_id.update(v.try_str()?.to_string()) {
            c.got_ask_part_id = true;
        }
        Ok(())
    });
    b.add(fields.ask_close_price.as_ref(), |c, v| {
        c.ask_close_price.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.ask_close_date.as_ref(), |c, v| {
        c.ask_close_date.update(Some(v.try_date()?));
        Ok(())
    });
    b.add(fields.ask_prev_close_price.as_ref(), |c, v| {
        c.ask_prev_close_price.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.ask_prev_close_date.as_ref(), |c, v| {
        c.ask_prev_close_date.update(Some(v.try_date()?));
        Ok(())
    });
    b.add(fields.ask_high.as_ref(), |c, v| {
        c.ask_high.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.ask_low.as_ref(), |c, v| {
        c.ask_low.update(v.try_price()?);
        Ok(())
    });

    b.add(fields.quote_seq_num.as_ref(), |c, v| {
        c.event_seq_num.update(v.try_u64()?);
        Ok(())
    });
    b.add(fields.quote_time.as_ref(), |c, v| {
        c.event_time.update(Some(v.try_datetime()?));
        Ok(())
    });
    b.add(fields.quote_date.as_ref(), |c, v| {
        c.quote_date.update(Some(v.try_date()?));
        Ok(())
    });
    b.add(fields.quote_qual.as_ref(), |c, v| {
        c.quote_qual.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.quote_qual_native.as_ref(), |c, v| {
        c.quote_qual_native.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.quote_count.as_ref(), |c, v| {
        c.tmp_quote_count = v.try_u64()?;
        c.got_quote_count = true;
        Ok(())
    });
    b.add(fields.conflate_count.as_ref(), |c, v| {
        c.conflate_count = v.try_u64()?;
        Ok(())
    });
    // Some feeds publish the short-sale tick under the plain bid-tick name.
    b.add(fields.short_sale_bid_tick.as_ref(), |c, v| {
        c.short_sale_bid_tick.update(v.try_char()?);
        Ok(())
    });
    b.add(fields.bid_tick.as_ref(), |c, v| {
        c.short_sale_bid_tick.update(v.try_char()?);
        Ok(())
    });
    b.add(fields.short_sale_circuit_breaker.as_ref(), |c, v| {
        c.short_sale_circuit_breaker.update(v.try_char()?);
        Ok(())
    });

    b.add(fields.ask_time.as_ref(), |c, v| {
        c.ask_time.update(Some(v.try_datetime()?));
        Ok(())
    });
    b.add(fields.bid_time.as_ref(), |c, v| {
        c.bid_time.update(Some(v.try_datetime()?));
        Ok(())
    });
    b.add(fields.ask_indicator.as_ref(), |c, v| {
        c.ask_indicator.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.bid_indicator.as_ref(), |c, v| {
        c.bid_indicator.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.ask_update_count.as_ref(), |c, v| {
        c.ask_update_count.update(v.try_u64()?);
        Ok(())
    });
    b.add(fields.bid_update_count.as_ref(), |c, v| {
        c.bid_update_count.update(v.try_u64()?);
        Ok(())
    });
    b.add(fields.ask_yield.as_ref(), |c, v| {
        c.ask_yield.update(v.try_f64()?);
        Ok(())
    });
    b.add(fields.bid_yield.as_ref(), |c, v| {
        c.bid_yield.update(v.try_f64()?);
        Ok(())
    });

    b.build()
}

/// Fast path once published; first caller builds the table, and messages
/// arriving before the dictionary is resolved are dropped by returning
/// `None`.
fn quote_updaters() -> Option<&'static UpdaterTable<QuoteCache>> {
    if let Some(table) = QUOTE_UPDATERS.get() {
        return Some(table);
    }
    let fields = QuoteFields::get()?;
    Some(QUOTE_UPDATERS.get_or_init(|| build_updaters(&fields)))
}

// ============================================================================
// Listener
// ============================================================================

/// A listener that specializes in quote updates.
///
/// Caches quote-related field values so complete callbacks can be delivered
/// even when the publisher only sends deltas of modified fields.
#[derive(Default)]
pub struct QuoteListener {
    cache: QuoteCache,
    handlers: SmallVec<[Box<dyn QuoteHandler>; 2]>,
    gap_begin: DeltaField<u64>,
    gap_end: DeltaField<u64>,
    ignore_update: bool,
    last_generic_msg_was_quote: bool,
}

impl QuoteListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a quote handler; handlers are invoked in registration order.
    pub fn add_handler(&mut self, handler: Box<dyn QuoteHandler>) {
        self.handlers.push(handler);
    }

    /// The cached quote image.
    pub fn quote(&self) -> &QuoteCache {
        &self.cache
    }

    pub fn gap_begin(&self) -> &DeltaField<u64> {
        &self.gap_begin
    }

    pub fn gap_end(&self) -> &DeltaField<u64> {
        &self.gap_end
    }

    fn handle_recap(
        &mut self,
        subscription: &SubscriptionInfo,
        msg: &Msg,
        updaters: &UpdaterTable<QuoteCache>,
    ) -> Result<(), DataError> {
        self.update_quote_fields(msg, updaters)?;
        self.check_quote_count(subscription, msg, false);

        let cache = &self.cache;
        for handler in self.handlers.iter_mut() {
            handler.on_quote_recap(subscription, msg, cache);
        }
        Ok(())
    }

    fn handle_quote(
        &mut self,
        subscription: &SubscriptionInfo,
        msg: &Msg,
        updaters: &UpdaterTable<QuoteCache>,
    ) -> Result<(), DataError> {
        self.update_quote_fields(msg, updaters)?;
        self.check_quote_count(subscription, msg, true);

        if self.ignore_update {
            self.ignore_update = false;
            return Ok(());
        }

        let cache = &self.cache;
        for handler in self.handlers.iter_mut() {
            handler.on_quote_update(subscription, msg, cache);
        }
        Ok(())
    }

    fn handle_generic_update(
        &mut self,
        subscription: &SubscriptionInfo,
        msg: &Msg,
        updaters: &UpdaterTable<QuoteCache>,
    ) -> Result<(), DataError> {
        self.update_quote_fields(msg, updaters)?;
        if !self.last_generic_msg_was_quote {
            return Ok(());
        }
        self.last_generic_msg_was_quote = false;

        self.check_quote_count(subscription, msg, true);
        if self.ignore_update {
            self.ignore_update = false;
            return Ok(());
        }

        let cache = &self.cache;
        for handler in self.handlers.iter_mut() {
            handler.on_quote_update(subscription, msg, cache);
        }
        Ok(())
    }

    fn handle_closing(
        &mut self,
        subscription: &SubscriptionInfo,
        msg: &Msg,
        updaters: &UpdaterTable<QuoteCache>,
    ) -> Result<(), DataError> {
        self.update_quote_fields(msg, updaters)?;

        let cache = &self.cache;
        for handler in self.handlers.iter_mut() {
            handler.on_quote_closing(subscription, msg, cache);
        }
        Ok(())
    }

    fn update_quote_fields(
        &mut self,
        msg: &Msg,
        updaters: &UpdaterTable<QuoteCache>,
    ) -> Result<(), DataError> {
        self.gap_begin.decay();
        self.gap_end.decay();
        self.cache.decay_states();
        self.last_generic_msg_was_quote = false;
        self.cache.begin_merge();

        updaters.merge(&mut self.cache, msg)?;

        if self.cache.saw_quote_fields() {
            self.last_generic_msg_was_quote = true;
        }
        self.cache.derive_part_id();
        Ok(())
    }

    /// Gap and duplicate detection on the quote count sequence. Only engages
    /// when the feed actually publishes a quote count.
    fn check_quote_count(&mut self, subscription: &SubscriptionInfo, msg: &Msg, check_for_gap: bool) {
        self.ignore_update = false;
        if !self.cache.got_quote_count {
            return;
        }

        let tmp = self.cache.tmp_quote_count;
        let count = self.cache.quote_count.get();
        let conflate = self.cache.conflate_count;

        if check_for_gap && count > 0 && tmp > count + conflate {
            self.gap_begin.force(count + conflate);
            self.gap_end.force(tmp - 1);
            self.cache.quote_count.force(tmp);
            let gap = SeqGap::new(self.gap_begin.get(), self.gap_end.get());
            tracing::debug!(
                symbol = subscription.symbol(),
                begin = gap.begin,
                end = gap.end,
                "quote gap detected"
            );
            let cache = &self.cache;
            for handler in self.handlers.iter_mut() {
                handler.on_quote_gap(subscription, msg, gap, cache);
            }
        }

        // Duplicate quote: the count did not advance. A gap message also
        // lands here once its count is rolled forward, so a gap is reported
        // through the gap callback alone.
        let current = self.cache.quote_count.get();
        if current > 0 && tmp == current {
            tracing::debug!(
                symbol = subscription.symbol(),
                count = tmp,
                "quote count did not advance, suppressing update"
            );
            self.ignore_update = true;
        }

        self.cache.quote_count.update(tmp);
    }
}

impl MsgListener for QuoteListener {
    fn on_msg(
        &mut self,
        subscription: &SubscriptionInfo,
        msg: &Msg,
        msg_type: MsgType,
    ) -> Result<(), DataError> {
        let Some(updaters) = quote_updaters() else {
            tracing::warn!(
                symbol = subscription.symbol(),
                "quote dictionary not resolved, dropping message"
            );
            return Ok(());
        };

        self.cache.conflate_count = 1;

        match msg_type {
            MsgType::Initial | MsgType::Recap | MsgType::PreOpening | MsgType::Snapshot => {
                self.handle_recap(subscription, msg, updaters)
            }
            MsgType::Quote => self.handle_quote(subscription, msg, updaters),
            MsgType::Update | MsgType::Trade => {
                self.handle_generic_update(subscription, msg, updaters)
            }
            MsgType::Closing => self.handle_closing(subscription, msg, updaters),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldState;
    use crate::subscription::Subscription;
    use crate::testing;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Recap {
            bid_price: Decimal,
            bid_size: f64,
            bid_price_state: FieldState,
            bid_size_state: FieldState,
        },
        Update {
            bid_price_state: FieldState,
            bid_size_state: FieldState,
        },
        Gap(SeqGap),
        Closing,
    }

    #[derive(Clone, Default)]
    struct Collector {
        tag: u8,
        events: Arc<Mutex<Vec<(u8, Event)>>>,
    }

    impl QuoteHandler for Collector {
        fn on_quote_recap(&mut self, _sub: &SubscriptionInfo, _msg: &Msg, recap: &QuoteCache) {
            self.events.lock().push((
                self.tag,
                Event::Recap {
                    bid_price: recap.bid_price.get(),
                    bid_size: recap.bid_size.get(),
                    bid_price_state: recap.bid_price.state(),
                    bid_size_state: recap.bid_size.state(),
                },
            ));
        }

        fn on_quote_update(&mut self, _sub: &SubscriptionInfo, _msg: &Msg, quote: &QuoteCache) {
            self.events.lock().push((
                self.tag,
                Event::Update {
                    bid_price_state: quote.bid_price.state(),
                    bid_size_state: quote.bid_size.state(),
                },
            ));
        }

        fn on_quote_gap(
            &mut self,
            _sub: &SubscriptionInfo,
            _msg: &Msg,
            gap: SeqGap,
            _recap: &QuoteCache,
        ) {
            self.events.lock().push((self.tag, Event::Gap(gap)));
        }

        fn on_quote_closing(&mut self, _sub: &SubscriptionInfo, _msg: &Msg, _recap: &QuoteCache) {
            self.events.lock().push((self.tag, Event::Closing));
        }
    }

    fn listener_with_collector() -> (QuoteListener, Arc<Mutex<Vec<(u8, Event)>>>) {
        testing::resolve_all_fields();
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut listener = QuoteListener::new();
        listener.add_handler(Box::new(Collector {
            tag: 0,
            events: events.clone(),
        }));
        (listener, events)
    }

    fn sub() -> Subscription {
        Subscription::new("FEED", "IBM.N")
    }

    #[test]
    fn test_set_dictionary_is_idempotent() {
        testing::resolve_all_fields();
        let original = QuoteFields::get().unwrap();
        let original_fid = original.bid_price.as_ref().unwrap().fid();

        // A second dictionary with shifted fids must not take effect.
        let mut shifted = testing::dictionary();
        shifted.add(9000, "wBidPrice", crate::domain::FieldType::Price);
        QuoteFields::set_dictionary(&shifted, None);

        let current = QuoteFields::get().unwrap();
        assert_eq!(current.bid_price.as_ref().unwrap().fid(), original_fid);
    }

    #[test]
    fn test_initial_then_partial_update() {
        let (mut listener, events) = listener_with_collector();
        let sub = sub();

        // Initial image: price 10.0, size 100.
        let initial = Msg::new(MsgType::Initial)
            .with_field(testing::fid("wBidPrice"), Decimal::from(10u64))
            .with_field(testing::fid("wBidSize"), 100.0);
        listener.on_msg(sub.info(), &initial, MsgType::Initial).unwrap();

        // Update: price unchanged, size changed.
        let update = Msg::new(MsgType::Quote)
            .with_field(testing::fid("wBidPrice"), Decimal::from(10u64))
            .with_field(testing::fid("wBidSize"), 150.0);
        listener.on_msg(sub.info(), &update, MsgType::Quote).unwrap();

        let events = events.lock();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0].1,
            Event::Recap {
                bid_price: Decimal::from(10u64),
                bid_size: 100.0,
                bid_price_state: FieldState::Modified,
                bid_size_state: FieldState::Modified,
            }
        );
        assert_eq!(
            events[1].1,
            Event::Update {
                bid_price_state: FieldState::NotModified,
                bid_size_state: FieldState::Modified,
            }
        );
    }

    #[test]
    fn test_two_handlers_in_registration_order() {
        testing::resolve_all_fields();
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut listener = QuoteListener::new();
        listener.add_handler(Box::new(Collector {
            tag: 1,
            events: events.clone(),
        }));
        listener.add_handler(Box::new(Collector {
            tag: 2,
            events: events.clone(),
        }));
        let sub = sub();

        let msg = Msg::new(MsgType::Recap)
            .with_field(testing::fid("wBidPrice"), Decimal::from(12u64))
            .with_field(testing::fid("wBidSize"), 70.0);
        listener.on_msg(sub.info(), &msg, MsgType::Recap).unwrap();

        let events = events.lock();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, 1);
        assert_eq!(events[1].0, 2);
        assert_eq!(events[0].1, events[1].1);
    }

    #[test]
    fn test_unknown_classification_is_ignored() {
        let (mut listener, events) = listener_with_collector();
        let sub = sub();

        let msg = Msg::new(MsgType::Order).with_field(testing::fid("wBidPrice"), Decimal::ONE);
        listener.on_msg(sub.info(), &msg, MsgType::Order).unwrap();

        assert!(events.lock().is_empty());
        assert!(!listener.quote().bid_price.is_initialised());
    }

    #[test]
    fn test_untracked_field_stays_uninitialised() {
        let (mut listener, _events) = listener_with_collector();
        let sub = sub();

        let msg = Msg::new(MsgType::Quote).with_field(testing::fid("wBidPrice"), Decimal::ONE);
        listener.on_msg(sub.info(), &msg, MsgType::Quote).unwrap();

        assert!(!listener.quote().ask_price.is_initialised());
        assert!(!listener.quote().quote_qual.is_initialised());
    }

    #[test]
    fn test_quote_count_gap_fires_gap_handler() {
        let (mut listener, events) = listener_with_collector();
        let sub = sub();

        let first = Msg::new(MsgType::Quote)
            .with_field(testing::fid("wBidPrice"), Decimal::from(10u64))
            .with_field(testing::fid("wQuoteCount"), 1u64);
        listener.on_msg(sub.info(), &first, MsgType::Quote).unwrap();

        // Count jumps from 1 to 5: quotes 2..=4 were missed.
        let second = Msg::new(MsgType::Quote)
            .with_field(testing::fid("wBidPrice"), Decimal::from(11u64))
            .with_field(testing::fid("wQuoteCount"), 5u64);
        listener.on_msg(sub.info(), &second, MsgType::Quote).unwrap();

        let events = events.lock();
        assert!(events
            .iter()
            .any(|(_, e)| *e == Event::Gap(SeqGap::new(2, 4))));
        assert_eq!(listener.gap_begin().get(), 2);
        assert_eq!(listener.gap_end().get(), 4);
    }

    #[test]
    fn test_duplicate_quote_count_suppresses_update() {
        let (mut listener, events) = listener_with_collector();
        let sub = sub();

        let msg = Msg::new(MsgType::Quote)
            .with_field(testing::fid("wBidPrice"), Decimal::from(10u64))
            .with_field(testing::fid("wQuoteCount"), 3u64);
        listener.on_msg(sub.info(), &msg, MsgType::Quote).unwrap();
        assert_eq!(events.lock().len(), 1);

        // Same count again: a re-published duplicate, no callback.
        let dup = Msg::new(MsgType::Quote)
            .with_field(testing::fid("wBidPrice"), Decimal::from(11u64))
            .with_field(testing::fid("wQuoteCount"), 3u64);
        listener.on_msg(sub.info(), &dup, MsgType::Quote).unwrap();
        assert_eq!(events.lock().len(), 1);
    }

    #[test]
    fn test_generic_update_without_quote_fields_is_silent() {
        let (mut listener, events) = listener_with_collector();
        let sub = sub();

        let msg = Msg::new(MsgType::Update)
            .with_field(testing::fid("wQuoteQualifier"), "normal");
        listener.on_msg(sub.info(), &msg, MsgType::Update).unwrap();
        assert!(events.lock().is_empty());

        let msg = Msg::new(MsgType::Update)
            .with_field(testing::fid("wAskPrice"), Decimal::from(20u64));
        listener.on_msg(sub.info(), &msg, MsgType::Update).unwrap();
        assert_eq!(events.lock().len(), 1);
    }

    #[test]
    fn test_part_id_derived_from_symbol() {
        let (mut listener, _events) = listener_with_collector();
        let sub = sub();

        let msg = Msg::new(MsgType::Initial).with_field(testing::fid("wSymbol"), "IBM.N");
        listener.on_msg(sub.info(), &msg, MsgType::Initial).unwrap();

        assert_eq!(listener.quote().part_id.value(), "N");
        assert!(listener.quote().part_id.is_modified());
    }

    #[test]
    fn test_mid_price_requires_both_sides() {
        let (mut listener, _events) = listener_with_collector();
        let sub = sub();

        let msg = Msg::new(MsgType::Quote).with_field(testing::fid("wBidPrice"), Decimal::from(10u64));
        listener.on_msg(sub.info(), &msg, MsgType::Quote).unwrap();
        assert_eq!(listener.quote().mid_price(), None);

        let msg = Msg::new(MsgType::Quote).with_field(testing::fid("wAskPrice"), Decimal::from(12u64));
        listener.on_msg(sub.info(), &msg, MsgType::Quote).unwrap();
        assert_eq!(listener.quote().mid_price(), Some(Decimal::from(11u64)));
    }

    #[test]
    fn test_closing_dispatch() {
        let (mut listener, events) = listener_with_collector();
        let sub = sub();

        let msg = Msg::new(MsgType::Closing)
            .with_field(testing::fid("wBidClose"), Decimal::from(15u64));
        listener.on_msg(sub.info(), &msg, MsgType::Closing).unwrap();

        assert_eq!(events.lock().as_slice(), &[(0, Event::Closing)]);
        assert_eq!(listener.quote().bid_close_price.get(), Decimal::from(15u64));
    }
}

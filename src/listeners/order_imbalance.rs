// ============================================================================
// Order Imbalance Listener
// Caches auction imbalance fields and dispatches recap/imbalance/no-imbalance
// callbacks
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

/// Imbalance classification, published through the security status qualifier
/// slot. The wire values are shared with
/// [`SecurityStatusQual`](crate::listeners::SecurityStatusQual).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ImbalanceType {
    MarketImbalanceBuy,
    MarketImbalanceSell,
    NoMarketImbalance,
    MocImbalanceBuy,
    MocImbalanceSell,
    NoMocImbalance,
    OrderImb,
    OrderInf,
    OrderImbalanceBuy,
    OrderImbalanceSell,
    NoOrderImbalance,
    #[default]
    Unknown,
}

impl ImbalanceType {
    pub fn from_wire(value: u64) -> Self {
        match value {
            16 => ImbalanceType::MarketImbalanceBuy,
            17 => ImbalanceType::MarketImbalanceSell,
            18 => ImbalanceType::NoMarketImbalance,
            19 => ImbalanceType::MocImbalanceBuy,
            20 => ImbalanceType::MocImbalanceSell,
            21 => ImbalanceType::NoMocImbalance,
            22 => ImbalanceType::OrderImb,
            23 => ImbalanceType::OrderInf,
            24 => ImbalanceType::OrderImbalanceBuy,
            25 => ImbalanceType::OrderImbalanceSell,
            26 => ImbalanceType::NoOrderImbalance,
            _ => ImbalanceType::Unknown,
        }
    }

    /// Feeds publish the classification either as the numeric value, the
    /// numeric value as text, or the symbolic name.
    pub fn parse(text: &str) -> Self {
        match text {
            "MARKET_IMBALANCE_BUY" => ImbalanceType::MarketImbalanceBuy,
            "MARKET_IMBALANCE_SELL" => ImbalanceType::MarketImbalanceSell,
            "NO_MARKET_IMBALANCE" => ImbalanceType::NoMarketImbalance,
            "MOC_IMBALANCE_BUY" => ImbalanceType::MocImbalanceBuy,
            "MOC_IMBALANCE_SELL" => ImbalanceType::MocImbalanceSell,
            "NO_MOC_IMBALANCE" => ImbalanceType::NoMocImbalance,
            "ORDER_IMB" => ImbalanceType::OrderImb,
            "ORDER_INF" => ImbalanceType::OrderInf,
            "ORDER_IMBALANCE_BUY" => ImbalanceType::OrderImbalanceBuy,
            "ORDER_IMBALANCE_SELL" => ImbalanceType::OrderImbalanceSell,
            "NO_ORDER_IMBALANCE" => ImbalanceType::NoOrderImbalance,
            other => match other.parse::<u64>() {
                Ok(value) => ImbalanceType::from_wire(value),
                Err(_) => ImbalanceType::Unknown,
            },
        }
    }

    /// True for every imbalance-related classification, including the
    /// announcements that no imbalance exists.
    pub fn is_imbalance_event(&self) -> bool {
        *self != ImbalanceType::Unknown
    }

    /// True when the classification signals an actual imbalance order.
    pub fn is_order_imbalance(&self) -> bool {
        matches!(
            self,
            ImbalanceType::MarketImbalanceBuy
                | ImbalanceType::MarketImbalanceSell
                | ImbalanceType::MocImbalanceBuy
                | ImbalanceType::MocImbalanceSell
                | ImbalanceType::OrderImb
                | ImbalanceType::OrderInf
                | ImbalanceType::OrderImbalanceBuy
                | ImbalanceType::OrderImbalanceSell
        )
    }

    /// True when the classification announces the absence of an imbalance.
    pub fn is_no_imbalance(&self) -> bool {
        matches!(
            self,
            ImbalanceType::NoMarketImbalance
                | ImbalanceType::NoMocImbalance
                | ImbalanceType::NoOrderImbalance
        )
    }
}

/// Side of the book the imbalance lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ImbalanceSide {
    BidSide,
    AskSide,
}

/// Handler interface for order imbalance events.
pub trait OrderImbalanceHandler: Send {
    /// Full refresh of the imbalance image.
    fn on_imbalance_recap(
        &mut self,
        subscription: &SubscriptionInfo,
        msg: &Msg,
        recap: &OrderImbalanceCache,
    );

    /// An order imbalance exists.
    fn on_imbalance(
        &mut self,
        subscription: &SubscriptionInfo,
        msg: &Msg,
        imbalance: &OrderImbalanceCache,
    );

    /// The feed announced that no imbalance exists.
    fn on_no_imbalance(
        &mut self,
        subscription: &SubscriptionInfo,
        msg: &Msg,
        imbalance: &OrderImbalanceCache,
    );
}

// ============================================================================
// Field set
// ============================================================================

/// Resolved descriptors for the order imbalance schema.
#[derive(Debug, Clone, Default)]
pub struct OrderImbalanceFieldSet {
    pub common: CommonFieldSet,
    pub high_indication_price: Option<Arc<FieldDescriptor>>,
    pub low_indication_price: Option<Arc<FieldDescriptor>>,
    pub indication_price: Option<Arc<FieldDescriptor>>,
    pub buy_volume: Option<Arc<FieldDescriptor>>,
    pub sell_volume: Option<Arc<FieldDescriptor>>,
    pub match_volume: Option<Arc<FieldDescriptor>>,
    pub status_qual: Option<Arc<FieldDescriptor>>,
    pub status_orig: Option<Arc<FieldDescriptor>>,
    pub status_time: Option<Arc<FieldDescriptor>>,
    pub inside_match_price: Option<Arc<FieldDescriptor>>,
    pub far_clearing_price: Option<Arc<FieldDescriptor>>,
    pub near_clearing_price: Option<Arc<FieldDescriptor>>,
    pub no_clearing_price: Option<Arc<FieldDescriptor>>,
    pub price_var_ind: Option<Arc<FieldDescriptor>>,
    pub cross_type: Option<Arc<FieldDescriptor>>,
    pub auction_time: Option<Arc<FieldDescriptor>>,
    pub seq_num: Option<Arc<FieldDescriptor>>,
    pub max_fid: u16,
}

impl OrderImbalanceFieldSet {
    fn resolve(dict: &Dictionary, aliases: Option<&FieldAliases>) -> Self {
        let lookup = |name| dictionary::lookup(dict, aliases, name);
        Self {
            common: CommonFieldSet::resolve(dict, aliases),
            high_indication_price: lookup("wHighIndicationPrice"),
            low_indication_price: lookup("wLowIndicationPrice"),
            indication_price: lookup("wIndicationPrice"),
            buy_volume: lookup("wBuyVolume"),
            sell_volume: lookup("wSellVolume"),
            match_volume: lookup("wMatchVolume"),
            status_qual: lookup("wSecStatusQual"),
            status_orig: lookup("wSecStatusOrig"),
            status_time: lookup("wSecStatusTime"),
            inside_match_price: lookup("wInsideMatchPrice"),
            far_clearing_price: lookup("wFarClearingPrice"),
            near_clearing_price: lookup("wNearClearingPrice"),
            no_clearing_price: lookup("wNoClearingPrice"),
            price_var_ind: lookup("wPriceVarInd"),
            cross_type: lookup("wCrossType"),
            auction_time: lookup("wAuctionTime"),
            seq_num: lookup("wSeqNum"),
            max_fid: dict.max_fid(),
        }
    }
}

static IMBALANCE_FIELDS: SharedFieldSet<OrderImbalanceFieldSet> = SharedFieldSet::new();
static IMBALANCE_UPDATERS: OnceLock<UpdaterTable<OrderImbalanceCache>> = OnceLock::new();

/// Process-wide cache of order imbalance field descriptors.
pub struct OrderImbalanceFields;

impl OrderImbalanceFields {
    /// Resolve the schema against a dictionary. Idempotent.
    pub fn set_dictionary(dictionary: &Dictionary, aliases: Option<&FieldAliases>) {
        IMBALANCE_FIELDS.set_with(|| OrderImbalanceFieldSet::resolve(dictionary, aliases));
    }

    pub fn is_set() -> bool {
        IMBALANCE_FIELDS.is_set()
    }

    pub fn reset() {
        IMBALANCE_FIELDS.reset();
    }

    pub fn get() -> Option<Arc<OrderImbalanceFieldSet>> {
        IMBALANCE_FIELDS.get()
    }
}

// ============================================================================
// Cache
// ============================================================================

/// Last-known value and freshness state for every tracked imbalance field.
#[derive(Debug, Clone, Default)]
pub struct OrderImbalanceCache {
    pub symbol: DeltaField<String>,
    pub part_id: DeltaField<String>,
    pub src_time: DeltaField<Option<DateTime<Utc>>>,
    pub activity_time: DeltaField<Option<DateTime<Utc>>>,
    pub line_time: DeltaField<Option<DateTime<Utc>>>,
    pub send_time: DeltaField<Option<DateTime<Utc>>>,

    pub high_indication_price: DeltaField<Decimal>,
    pub low_indication_price: DeltaField<Decimal>,
    pub indication_price: DeltaField<Decimal>,
    pub buy_volume: DeltaField<i64>,
    pub sell_volume: DeltaField<i64>,
    pub match_volume: DeltaField<i64>,
    pub imbalance_state: DeltaField<ImbalanceType>,
    pub status_qual_str: DeltaField<String>,
    pub status_orig: DeltaField<String>,
    pub status_time: DeltaField<Option<DateTime<Utc>>>,
    pub inside_match_price: DeltaField<Decimal>,
    pub far_clearing_price: DeltaField<Decimal>,
    pub near_clearing_price: DeltaField<Decimal>,
    pub no_clearing_price: DeltaField<Decimal>,
    pub price_var_ind: DeltaField<char>,
    pub cross_type: DeltaField<char>,
    pub auction_time: DeltaField<Option<DateTime<Utc>>>,
    pub event_seq_num: DeltaField<u64>,
}

impl OrderImbalanceCache {
    /// Which side the imbalance lies on, from the buy/sell volumes.
    pub fn imbalance_side(&self) -> ImbalanceSide {
        if self.buy_volume.get() > self.sell_volume.get() {
            ImbalanceSide::BidSide
        } else {
            ImbalanceSide::AskSide
        }
    }

    /// The imbalance volume: buy minus sell on the bid side, sell minus buy
    /// on the ask side.
    pub fn imbalance_volume(&self) -> i64 {
        match self.imbalance_side() {
            ImbalanceSide::BidSide => self.buy_volume.get() - self.sell_volume.get(),
            ImbalanceSide::AskSide => self.sell_volume.get() - self.buy_volume.get(),
        }
    }

    fn decay_states(&mut self) {
        self.symbol.decay();
        self.part_id.decay();
        self.src_time.decay();
        self.activity_time.decay();
        self.line_time.decay();
        self.send_time.decay();
        self.high_indication_price.decay();
        self.low_indication_price.decay();
        self.indication_price.decay();
        self.buy_volume.decay();
        self.sell_volume.decay();
        self.match_volume.decay();
        self.imbalance_state.decay();
        self.status_qual_str.decay();
        self.status_orig.decay();
        self.status_time.decay();
        self.inside_match_price.decay();
        self.far_clearing_price.decay();
        self.near_clearing_price.decay();
        self.no_clearing_price.decay();
        self.price_var_ind.decay();
        self.cross_type.decay();
        self.auction_time.decay();
        self.event_seq_num.decay();
    }
}

// ============================================================================
// Updater table
// ============================================================================

fn build_updaters(fields: &OrderImbalanceFieldSet) -> UpdaterTable<OrderImbalanceCache> {
    let mut b: UpdaterTableBuilder<OrderImbalanceCache> = UpdaterTableBuilder::new(fields.max_fid);

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

    b.add(fields.high_indication_price.as_ref(), |c, v| {
        c.high_indication_price.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.low_indication_price.as_ref(), |c, v| {
        c.low_indication_price.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.indication_price.as_ref(), |c, v| {
        c.indication_price.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.buy_volume.as_ref(), |c, v| {
        c.buy_volume.update(v.try_i64()?);
        Ok(())
    });
    b.add(fields.sell_volume.as_ref(), |c, v| {
        c.sell_volume.update(v.try_i64()?);
        Ok(())
    });
    b.add(fields.match_volume.as_ref(), |c, v| {
        c.match_volume.update(v.try_i64()?);
        Ok(())
    });
    b.add(fields.status_qual.as_ref(), |c, v| {
        let (state, raw) = match v {
            FieldValue::String(s) => (ImbalanceType::parse(&s), s.clone()),
            other => {
                let raw = other.try_u64()?;
                (ImbalanceType::from_wire(raw), raw.to_string())
            }
        };
        c.imbalance_state.update(state);
        c.status_qual_str.update(raw);
        Ok(())
    });
    b.add(fields.status_orig.as_ref(), |c, v| {
        c.status_orig.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.status_time.as_ref(), |c, v| {
        c.status_time.update(Some(v.try_datetime()?));
        Ok(())
    });
    b.add(fields.inside_match_price.as_ref(), |c, v| {
        c.inside_match_price.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.far_clearing_price.as_ref(), |c, v| {
        c.far_clearing_price.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.near_clearing_price.as_ref(), |c, v| {
        c.near_clearing_price.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.no_clearing_price.as_ref(), |c, v| {
        c.no_clearing_price.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.price_var_ind.as_ref(), |c, v| {
        c.price_var_ind.update(v.try_char()?);
        Ok(())
    });
    b.add(fields.cross_type.as_ref(), |c, v| {
        c.cross_type.update(v.try_char()?);
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

fn imbalance_updaters() -> Option<&'static UpdaterTable<OrderImbalanceCache>> {
    if let Some(table) = IMBALANCE_UPDATERS.get() {
        return Some(table);
    }
    let fields = OrderImbalanceFields::get()?;
    Some(IMBALANCE_UPDATERS.get_or_init(|| build_updaters(&fields)))
}

// ============================================================================
// Listener
// ============================================================================

/// A listener that specializes in auction order imbalance notifications.
#[derive(Default)]
pub struct OrderImbalanceListener {
    cache: OrderImbalanceCache,
    handlers: SmallVec<[Box<dyn OrderImbalanceHandler>; 2]>,
}

impl OrderImbalanceListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler; handlers are invoked in registration order.
    pub fn add_handler(&mut self, handler: Box<dyn OrderImbalanceHandler>) {
        self.handlers.push(handler);
    }

    /// The cached imbalance image.
    pub fn imbalance(&self) -> &OrderImbalanceCache {
        &self.cache
    }
}

impl MsgListener for OrderImbalanceListener {
    fn on_msg(
        &mut self,
        subscription: &SubscriptionInfo,
        msg: &Msg,
        msg_type: MsgType,
    ) -> Result<(), DataError> {
        let Some(updaters) = imbalance_updaters() else {
            tracing::warn!(
                symbol = subscription.symbol(),
                "imbalance dictionary not resolved, dropping message"
            );
            return Ok(());
        };
        if !matches!(msg_type, MsgType::Initial | MsgType::Recap | MsgType::Update) {
            return Ok(());
        }

        // The imbalance state is not always published; messages without it
        // are not imbalance messages at all.
        let Some(fields) = OrderImbalanceFields::get() else {
            return Ok(());
        };
        let Some(qual_desc) = fields.status_qual.as_ref() else {
            return Ok(());
        };
        let Some(qual_value) = msg.field(qual_desc.fid()) else {
            return Ok(());
        };
        let state = match qual_value {
            FieldValue::String(s) => ImbalanceType::parse(s),
            other => ImbalanceType::from_wire(other.try_u64().map_err(|e| e.with_fid(qual_desc.fid()))?),
        };

        self.cache.decay_states();
        // A fresh imbalance event starts from a clean image.
        if state.is_imbalance_event() {
            self.cache = OrderImbalanceCache::default();
        }
        updaters.merge(&mut self.cache, msg)?;

        let cache = &self.cache;
        match msg_type {
            MsgType::Initial | MsgType::Recap => {
                for handler in self.handlers.iter_mut() {
                    handler.on_imbalance_recap(subscription, msg, cache);
                }
            }
            MsgType::Update => {
                if state.is_order_imbalance() {
                    for handler in self.handlers.iter_mut() {
                        handler.on_imbalance(subscription, msg, cache);
                    }
                } else if state.is_no_imbalance() {
                    for handler in self.handlers.iter_mut() {
                        handler.on_no_imbalance(subscription, msg, cache);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::Subscription;
    use crate::testing;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Recap(ImbalanceType),
        Imbalance {
            state: ImbalanceType,
            side: ImbalanceSide,
            volume: i64,
        },
        NoImbalance(ImbalanceType),
    }

    #[derive(Clone, Default)]
    struct Collector {
        events: Arc<Mutex<Vec<Event>>>,
    }

    impl OrderImbalanceHandler for Collector {
        fn on_imbalance_recap(
            &mut self,
            _sub: &SubscriptionInfo,
            _msg: &Msg,
            recap: &OrderImbalanceCache,
        ) {
            self.events.lock().push(Event::Recap(recap.imbalance_state.get()));
        }

        fn on_imbalance(
            &mut self,
            _sub: &SubscriptionInfo,
            _msg: &Msg,
            imbalance: &OrderImbalanceCache,
        ) {
            self.events.lock().push(Event::Imbalance {
                state: imbalance.imbalance_state.get(),
                side: imbalance.imbalance_side(),
                volume: imbalance.imbalance_volume(),
            });
        }

        fn on_no_imbalance(
            &mut self,
            _sub: &SubscriptionInfo,
            _msg: &Msg,
            imbalance: &OrderImbalanceCache,
        ) {
            self.events
                .lock()
                .push(Event::NoImbalance(imbalance.imbalance_state.get()));
        }
    }

    fn listener_with_collector() -> (OrderImbalanceListener, Arc<Mutex<Vec<Event>>>) {
        testing::resolve_all_fields();
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut listener = OrderImbalanceListener::new();
        listener.add_handler(Box::new(Collector {
            events: events.clone(),
        }));
        (listener, events)
    }

    fn sub() -> Subscription {
        Subscription::new("FEED", "GE")
    }

    #[test]
    fn test_classification() {
        assert!(ImbalanceType::from_wire(16).is_order_imbalance());
        assert!(ImbalanceType::from_wire(26).is_no_imbalance());
        assert!(ImbalanceType::from_wire(18).is_imbalance_event());
        assert!(!ImbalanceType::from_wire(99).is_imbalance_event());
        assert_eq!(
            ImbalanceType::parse("MOC_IMBALANCE_SELL"),
            ImbalanceType::MocImbalanceSell
        );
        assert_eq!(ImbalanceType::parse("16"), ImbalanceType::MarketImbalanceBuy);
    }

    #[test]
    fn test_imbalance_update_fires_imbalance_callback() {
        let (mut listener, events) = listener_with_collector();
        let sub = sub();

        let msg = Msg::new(MsgType::Update)
            .with_field(testing::fid("wSecStatusQual"), "MARKET_IMBALANCE_BUY")
            .with_field(testing::fid("wBuyVolume"), 5000i64)
            .with_field(testing::fid("wSellVolume"), 2000i64);
        listener.on_msg(sub.info(), &msg, MsgType::Update).unwrap();

        assert_eq!(
            events.lock().as_slice(),
            &[Event::Imbalance {
                state: ImbalanceType::MarketImbalanceBuy,
                side: ImbalanceSide::BidSide,
                volume: 3000,
            }]
        );
    }

    #[test]
    fn test_no_imbalance_announcement() {
        let (mut listener, events) = listener_with_collector();
        let sub = sub();

        let msg = Msg::new(MsgType::Update)
            .with_field(testing::fid("wSecStatusQual"), "NO_ORDER_IMBALANCE");
        listener.on_msg(sub.info(), &msg, MsgType::Update).unwrap();

        assert_eq!(
            events.lock().as_slice(),
            &[Event::NoImbalance(ImbalanceType::NoOrderImbalance)]
        );
    }

    #[test]
    fn test_message_without_state_is_ignored() {
        let (mut listener, events) = listener_with_collector();
        let sub = sub();

        let msg = Msg::new(MsgType::Update).with_field(testing::fid("wBuyVolume"), 5000i64);
        listener.on_msg(sub.info(), &msg, MsgType::Update).unwrap();

        assert!(events.lock().is_empty());
        assert!(!listener.imbalance().buy_volume.is_initialised());
    }

    #[test]
    fn test_recap_fires_recap_callback() {
        let (mut listener, events) = listener_with_collector();
        let sub = sub();

        let msg = Msg::new(MsgType::Recap)
            .with_field(testing::fid("wSecStatusQual"), "MOC_IMBALANCE_SELL")
            .with_field(testing::fid("wBuyVolume"), 100i64)
            .with_field(testing::fid("wSellVolume"), 900i64);
        listener.on_msg(sub.info(), &msg, MsgType::Recap).unwrap();

        assert_eq!(
            events.lock().as_slice(),
            &[Event::Recap(ImbalanceType::MocImbalanceSell)]
        );
        assert_eq!(listener.imbalance().imbalance_side(), ImbalanceSide::AskSide);
        assert_eq!(listener.imbalance().imbalance_volume(), 800);
    }

    #[test]
    fn test_fresh_imbalance_clears_previous_image() {
        let (mut listener, _events) = listener_with_collector();
        let sub = sub();

        let first = Msg::new(MsgType::Update)
            .with_field(testing::fid("wSecStatusQual"), "MARKET_IMBALANCE_BUY")
            .with_field(testing::fid("wMatchVolume"), 7000i64);
        listener.on_msg(sub.info(), &first, MsgType::Update).unwrap();
        assert!(listener.imbalance().match_volume.is_initialised());

        // The next imbalance event starts a clean image: the match volume
        // from the previous auction does not linger.
        let second = Msg::new(MsgType::Update)
            .with_field(testing::fid("wSecStatusQual"), "MOC_IMBALANCE_BUY")
            .with_field(testing::fid("wBuyVolume"), 100i64);
        listener.on_msg(sub.info(), &second, MsgType::Update).unwrap();
        assert!(!listener.imbalance().match_volume.is_initialised());
        assert_eq!(
            listener.imbalance().imbalance_state.get(),
            ImbalanceType::MocImbalanceBuy
        );
    }
}

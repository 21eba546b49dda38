// ============================================================================
// Fundamental Listener
// Caches fundamental/corporate-action fields and dispatches a single
// fundamentals callback
// ============================================================================

use crate::cache::{DeltaField, UpdaterTable, UpdaterTableBuilder};
use crate::domain::{Msg, MsgType};
use crate::errors::DataError;
use crate::fields::{dictionary, Dictionary, FieldAliases, FieldDescriptor};
use crate::interfaces::MsgListener;
use crate::listeners::common::{CommonFieldSet, SharedFieldSet};
use crate::subscription::SubscriptionInfo;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use smallvec::SmallVec;
use std::sync::{Arc, OnceLock};

/// Handler interface for fundamental events. Fundamentals change rarely, so
/// a single callback serves both the initial image and later updates.
pub trait FundamentalHandler: Send {
    fn on_fundamentals(
        &mut self,
        subscription: &SubscriptionInfo,
        msg: &Msg,
        fundamentals: &FundamentalCache,
    );
}

// ============================================================================
// Field set
// ============================================================================

/// Resolved descriptors for the fundamentals schema.
#[derive(Debug, Clone, Default)]
pub struct FundamentalFieldSet {
    pub common: CommonFieldSet,
    pub corp_act_type: Option<Arc<FieldDescriptor>>,
    pub dividend_price: Option<Arc<FieldDescriptor>>,
    pub dividend_freq: Option<Arc<FieldDescriptor>>,
    pub dividend_ex_date: Option<Arc<FieldDescriptor>>,
    pub dividend_pay_date: Option<Arc<FieldDescriptor>>,
    pub dividend_rec_date: Option<Arc<FieldDescriptor>>,
    pub dividend_currency: Option<Arc<FieldDescriptor>>,
    pub shares_out: Option<Arc<FieldDescriptor>>,
    pub shares_float: Option<Arc<FieldDescriptor>>,
    pub shares_auth: Option<Arc<FieldDescriptor>>,
    pub earn_per_share: Option<Arc<FieldDescriptor>>,
    pub volatility: Option<Arc<FieldDescriptor>>,
    pub price_earn_ratio: Option<Arc<FieldDescriptor>>,
    pub dividend_yield: Option<Arc<FieldDescriptor>>,
    pub mrkt_segment: Option<Arc<FieldDescriptor>>,
    pub mrkt_sector: Option<Arc<FieldDescriptor>>,
    pub mrkt_segment_native: Option<Arc<FieldDescriptor>>,
    pub mrkt_sector_native: Option<Arc<FieldDescriptor>>,
    pub hist_volatility: Option<Arc<FieldDescriptor>>,
    pub risk_free_rate: Option<Arc<FieldDescriptor>>,
    pub max_fid: u16,
}

impl FundamentalFieldSet {
    fn resolve(dict: &Dictionary, aliases: Option<&FieldAliases>) -> Self {
        let lookup = |name| dictionary::lookup(dict, aliases, name);
        Self {
            common: CommonFieldSet::resolve(dict, aliases),
            corp_act_type: lookup("wCorpActType"),
            dividend_price: lookup("wDividendPrice"),
            dividend_freq: lookup("wDividendFreq"),
            dividend_ex_date: lookup("wDividendExDate"),
            dividend_pay_date: lookup("wDividendPayDate"),
            dividend_rec_date: lookup("wDividendRecDate"),
            dividend_currency: lookup("wDividendCurrency"),
            shares_out: lookup("wSharesOut"),
            shares_float: lookup("wSharesFloat"),
            shares_auth: lookup("wSharesAuth"),
            earn_per_share: lookup("wEarnPerShare"),
            volatility: lookup("wVolatility"),
            price_earn_ratio: lookup("wPriceEarnRatio"),
            dividend_yield: lookup("wYield"),
            mrkt_segment: lookup("wMrktSegment"),
            mrkt_sector: lookup("wMrktSector"),
            mrkt_segment_native: lookup("wMrktSegmNative"),
            mrkt_sector_native: lookup("wMrktSectNative"),
            hist_volatility: lookup("wHistVolatility"),
            risk_free_rate: lookup("wRiskFreeRate"),
            max_fid: dict.max_fid(),
        }
    }
}

static FUNDAMENTAL_FIELDS: SharedFieldSet<FundamentalFieldSet> = SharedFieldSet::new();
static FUNDAMENTAL_UPDATERS: OnceLock<UpdaterTable<FundamentalCache>> = OnceLock::new();

/// Process-wide cache of fundamental field descriptors.
pub struct FundamentalFields;

impl FundamentalFields {
    /// Resolve the schema against a dictionary. Idempotent.
    pub fn set_dictionary(dictionary: &Dictionary, aliases: Option<&FieldAliases>) {
        FUNDAMENTAL_FIELDS.set_with(|| FundamentalFieldSet::resolve(dictionary, aliases));
    }

    pub fn is_set() -> bool {
        FUNDAMENTAL_FIELDS.is_set()
    }

    pub fn reset() {
        FUNDAMENTAL_FIELDS.reset();
    }

    pub fn get() -> Option<Arc<FundamentalFieldSet>> {
        FUNDAMENTAL_FIELDS.get()
    }
}

// ============================================================================
// Cache
// ============================================================================

/// Last-known value and freshness state for every tracked fundamental field.
#[derive(Debug, Clone, Default)]
pub struct FundamentalCache {
    pub symbol: DeltaField<String>,
    pub part_id: DeltaField<String>,
    pub src_time: DeltaField<Option<DateTime<Utc>>>,
    pub activity_time: DeltaField<Option<DateTime<Utc>>>,

    pub corp_act_type: DeltaField<String>,
    pub dividend_price: DeltaField<Decimal>,
    pub dividend_freq: DeltaField<String>,
    pub dividend_ex_date: DeltaField<Option<NaiveDate>>,
    pub dividend_pay_date: DeltaField<Option<NaiveDate>>,
    pub dividend_rec_date: DeltaField<Option<NaiveDate>>,
    pub dividend_currency: DeltaField<String>,
    pub shares_out: DeltaField<u64>,
    pub shares_float: DeltaField<u64>,
    pub shares_auth: DeltaField<u64>,
    pub earn_per_share: DeltaField<f64>,
    pub volatility: DeltaField<f64>,
    pub price_earn_ratio: DeltaField<f64>,
    pub dividend_yield: DeltaField<f64>,
    pub mrkt_segment: DeltaField<String>,
    pub mrkt_sector: DeltaField<String>,
    pub mrkt_segment_native: DeltaField<String>,
    pub mrkt_sector_native: DeltaField<String>,
    pub hist_volatility: DeltaField<f64>,
    pub risk_free_rate: DeltaField<f64>,
}

impl FundamentalCache {
    fn decay_states(&mut self) {
        self.symbol.decay();
        self.part_id.decay();
        self.src_time.decay();
        self.activity_time.decay();
        self.corp_act_type.decay();
        self.dividend_price.decay();
        self.dividend_freq.decay();
        self.dividend_ex_date.decay();
        self.dividend_pay_date.decay();
        self.dividend_rec_date.decay();
        self.dividend_currency.decay();
        self.shares_out.decay();
        self.shares_float.decay();
        self.shares_auth.decay();
        self.earn_per_share.decay();
        self.volatility.decay();
        self.price_earn_ratio.decay();
        self.dividend_yield.decay();
        self.mrkt_segment.decay();
        self.mrkt_sector.decay();
        self.mrkt_segment_native.decay();
        self.mrkt_sector_native.decay();
        self.hist_volatility.decay();
        self.risk_free_rate.decay();
    }
}

// ============================================================================
// Updater table
// ============================================================================

fn build_updaters(fields: &FundamentalFieldSet) -> UpdaterTable<FundamentalCache> {
    let mut b: UpdaterTableBuilder<FundamentalCache> = UpdaterTableBuilder::new(fields.max_fid);

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

    b.add(fields.corp_act_type.as_ref(), |c, v| {
        c.corp_act_type.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.dividend_price.as_ref(), |c, v| {
        c.dividend_price.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.dividend_freq.as_ref(), |c, v| {
        c.dividend_freq.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.dividend_ex_date.as_ref(), |c, v| {
        c.dividend_ex_date.update(Some(v.try_date()?));
        Ok(())
    });
    b.add(fields.dividend_pay_date.as_ref(), |c, v| {
        c.dividend_pay_date.update(Some(v.try_date()?));
        Ok(())
    });
    b.add(fields.dividend_rec_date.as_ref(), |c, v| {
        c.dividend_rec_date.update(Some(v.try_date()?));
        Ok(())
    });
    b.add(fields.dividend_currency.as_ref(), |c, v| {
        c.dividend_currency.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.shares_out.as_ref(), |c, v| {
        c.shares_out.update(v.try_u64()?);
        Ok(())
    });
    b.add(fields.shares_float.as_ref(), |c, v| {
        c.shares_float.update(v.try_u64()?);
        Ok(())
    });
    b.add(fields.shares_auth.as_ref(), |c, v| {
        c.shares_auth.update(v.try_u64()?);
        Ok(())
    });
    b.add(fields.earn_per_share.as_ref(), |c, v| {
        c.earn_per_share.update(v.try_f64()?);
        Ok(())
    });
    b.add(fields.volatility.as_ref(), |c, v| {
        c.volatility.update(v.try_f64()?);
        Ok(())
    });
    b.add(fields.price_earn_ratio.as_ref(), |c, v| {
        c.price_earn_ratio.update(v.try_f64()?);
        Ok(())
    });
    b.add(fields.dividend_yield.as_ref(), |c, v| {
        c.dividend_yield.update(v.try_f64()?);
        Ok(())
    });
    b.add(fields.mrkt_segment.as_ref(), |c, v| {
        c.mrkt_segment.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.mrkt_sector.as_ref(), |c, v| {
        c.mrkt_sector.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.mrkt_segment_native.as_ref(), |c, v| {
        c.mrkt_segment_native.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.mrkt_sector_native.as_ref(), |c, v| {
        c.mrkt_sector_native.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.hist_volatility.as_ref(), |c, v| {
        c.hist_volatility.update(v.try_f64()?);
        Ok(())
    });
    b.add(fields.risk_free_rate.as_ref(), |c, v| {
        c.risk_free_rate.update(v.try_f64()?);
        Ok(())
    });

    b.build()
}

fn fundamental_updaters() -> Option<&'static UpdaterTable<FundamentalCache>> {
    if let Some(table) = FUNDAMENTAL_UPDATERS.get() {
        return Some(table);
    }
    let fields = FundamentalFields::get()?;
    Some(FUNDAMENTAL_UPDATERS.get_or_init(|| build_updaters(&fields)))
}

// ============================================================================
// Listener
// ============================================================================

/// A listener that specializes in fundamental data (dividends, shares,
/// ratios, sector classification).
#[derive(Default)]
pub struct FundamentalListener {
    cache: FundamentalCache,
    handlers: SmallVec<[Box<dyn FundamentalHandler>; 2]>,
}

impl FundamentalListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler; handlers are invoked in registration order.
    pub fn add_handler(&mut self, handler: Box<dyn FundamentalHandler>) {
        self.handlers.push(handler);
    }

    /// The cached fundamental image.
    pub fn fundamentals(&self) -> &FundamentalCache {
        &self.cache
    }
}

impl MsgListener for FundamentalListener {
    fn on_msg(
        &mut self,
        subscription: &SubscriptionInfo,
        msg: &Msg,
        msg_type: MsgType,
    ) -> Result<(), DataError> {
        let Some(updaters) = fundamental_updaters() else {
            tracing::warn!(
                symbol = subscription.symbol(),
                "fundamental dictionary not resolved, dropping message"
            );
            return Ok(());
        };

        match msg_type {
            MsgType::Initial | MsgType::Recap | MsgType::Update => {
                self.cache.decay_states();
                updaters.merge(&mut self.cache, msg)?;
                let cache = &self.cache;
                for handler in self.handlers.iter_mut() {
                    handler.on_fundamentals(subscription, msg, cache);
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
    use crate::fields::FieldState;
    use crate::subscription::Subscription;
    use crate::testing;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct Snapshot {
        dividend_price: Decimal,
        eps: f64,
        eps_state: FieldState,
        sector: String,
    }

    #[derive(Clone, Default)]
    struct Collector {
        events: Arc<Mutex<Vec<Snapshot>>>,
    }

    impl FundamentalHandler for Collector {
        fn on_fundamentals(
            &mut self,
            _sub: &SubscriptionInfo,
            _msg: &Msg,
            fundamentals: &FundamentalCache,
        ) {
            self.events.lock().push(Snapshot {
                dividend_price: fundamentals.dividend_price.get(),
                eps: fundamentals.earn_per_share.get(),
                eps_state: fundamentals.earn_per_share.state(),
                sector: fundamentals.mrkt_sector.value().clone(),
            });
        }
    }

    fn listener_with_collector() -> (FundamentalListener, Arc<Mutex<Vec<Snapshot>>>) {
        testing::resolve_all_fields();
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut listener = FundamentalListener::new();
        listener.add_handler(Box::new(Collector {
            events: events.clone(),
        }));
        (listener, events)
    }

    fn sub() -> Subscription {
        Subscription::new("FEED", "KO")
    }

    #[test]
    fn test_initial_and_delta_update() {
        let (mut listener, events) = listener_with_collector();
        let sub = sub();

        let initial = Msg::new(MsgType::Initial)
            .with_field(testing::fid("wDividendPrice"), Decimal::new(46, 2))
            .with_field(testing::fid("wEarnPerShare"), 2.47)
            .with_field(testing::fid("wMrktSector"), "Consumer Staples");
        listener.on_msg(sub.info(), &initial, MsgType::Initial).unwrap();

        // Delta: only EPS changes; the rest is served from the cache.
        let update = Msg::new(MsgType::Update)
            .with_field(testing::fid("wEarnPerShare"), 2.51);
        listener.on_msg(sub.info(), &update, MsgType::Update).unwrap();

        let events = events.lock();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            Snapshot {
                dividend_price: Decimal::new(46, 2),
                eps: 2.51,
                eps_state: FieldState::Modified,
                sector: "Consumer Staples".to_string(),
            }
        );
    }

    #[test]
    fn test_dividend_dates() {
        let (mut listener, _events) = listener_with_collector();
        let sub = sub();
        let ex_date = NaiveDate::from_ymd_opt(2024, 6, 14).unwrap();

        let msg = Msg::new(MsgType::Update).with_field(testing::fid("wDividendExDate"), ex_date);
        listener.on_msg(sub.info(), &msg, MsgType::Update).unwrap();

        assert_eq!(*listener.fundamentals().dividend_ex_date.value(), Some(ex_date));
    }

    #[test]
    fn test_unrecognized_classification_is_ignored() {
        let (mut listener, events) = listener_with_collector();
        let sub = sub();

        let msg = Msg::new(MsgType::Quote).with_field(testing::fid("wEarnPerShare"), 2.47);
        listener.on_msg(sub.info(), &msg, MsgType::Quote).unwrap();

        assert!(events.lock().is_empty());
        assert!(!listener.fundamentals().earn_per_share.is_initialised());
    }
}

// ============================================================================
// Trade Listener
// Caches trade-related fields and dispatches recap/report/cancel/correction/
// closing/gap callbacks to registered handlers
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

/// Handler interface for trade events.
pub trait TradeHandler: Send {
    /// Full refresh of the trade image (initial value or recap).
    fn on_trade_recap(&mut self, subscription: &SubscriptionInfo, msg: &Msg, recap: &TradeCache);

    /// A regular trade report.
    fn on_trade_report(&mut self, subscription: &SubscriptionInfo, msg: &Msg, trade: &TradeCache);

    /// A gap in the trade count sequence was detected.
    fn on_trade_gap(
        &mut self,
        subscription: &SubscriptionInfo,
        msg: &Msg,
        gap: SeqGap,
        recap: &TradeCache,
    ) {
        let _ = (subscription, msg, gap, recap);
    }

    /// A trade cancel (`is_cancel`) or trade error.
    fn on_trade_cancel_or_error(
        &mut self,
        subscription: &SubscriptionInfo,
        msg: &Msg,
        is_cancel: bool,
        trade: &TradeCache,
    ) {
        let _ = (subscription, msg, is_cancel, trade);
    }

    /// A correction to a previously reported trade.
    fn on_trade_correction(
        &mut self,
        subscription: &SubscriptionInfo,
        msg: &Msg,
        trade: &TradeCache,
    ) {
        let _ = (subscription, msg, trade);
    }

    /// Closing trade summary.
    fn on_trade_closing(&mut self, subscription: &SubscriptionInfo, msg: &Msg, trade: &TradeCache) {
        let _ = (subscription, msg, trade);
    }
}

// ============================================================================
// Field set
// ============================================================================

/// Resolved descriptors for the trade schema.
#[derive(Debug, Clone, Default)]
pub struct TradeFieldSet {
    pub common: CommonFieldSet,
    pub trade_price: Option<Arc<FieldDescriptor>>,
    pub trade_volume: Option<Arc<FieldDescriptor>>,
    pub trade_part_id: Option<Arc<FieldDescriptor>>,
    pub trade_date: Option<Arc<FieldDescriptor>>,
    pub trade_time: Option<Arc<FieldDescriptor>>,
    pub trade_seq_num: Option<Arc<FieldDescriptor>>,
    pub trade_qual: Option<Arc<FieldDescriptor>>,
    pub trade_condition: Option<Arc<FieldDescriptor>>,
    pub aggressor_side: Option<Arc<FieldDescriptor>>,
    pub trade_tick: Option<Arc<FieldDescriptor>>,
    pub trade_units: Option<Arc<FieldDescriptor>>,
    pub sellers_sale_days: Option<Arc<FieldDescriptor>>,
    pub stop_stock_ind: Option<Arc<FieldDescriptor>>,
    pub trade_exec_venue: Option<Arc<FieldDescriptor>>,
    pub off_ex_trade_price: Option<Arc<FieldDescriptor>>,
    pub on_ex_trade_price: Option<Arc<FieldDescriptor>>,
    pub last_price: Option<Arc<FieldDescriptor>>,
    pub last_volume: Option<Arc<FieldDescriptor>>,
    pub last_part_id: Option<Arc<FieldDescriptor>>,
    pub last_time: Option<Arc<FieldDescriptor>>,
    pub net_change: Option<Arc<FieldDescriptor>>,
    pub pct_change: Option<Arc<FieldDescriptor>>,
    pub acc_volume: Option<Arc<FieldDescriptor>>,
    pub off_ex_acc_volume: Option<Arc<FieldDescriptor>>,
    pub on_ex_acc_volume: Option<Arc<FieldDescriptor>>,
    pub open_price: Option<Arc<FieldDescriptor>>,
    pub high_price: Option<Arc<FieldDescriptor>>,
    pub low_price: Option<Arc<FieldDescriptor>>,
    pub close_price: Option<Arc<FieldDescriptor>>,
    pub close_date: Option<Arc<FieldDescriptor>>,
    pub prev_close_price: Option<Arc<FieldDescriptor>>,
    pub prev_close_date: Option<Arc<FieldDescriptor>>,
    pub adj_prev_close: Option<Arc<FieldDescriptor>>,
    pub prev_volume: Option<Arc<FieldDescriptor>>,
    pub block_count: Option<Arc<FieldDescriptor>>,
    pub block_volume: Option<Arc<FieldDescriptor>>,
    pub vwap: Option<Arc<FieldDescriptor>>,
    pub off_ex_vwap: Option<Arc<FieldDescriptor>>,
    pub on_ex_vwap: Option<Arc<FieldDescriptor>>,
    pub total_value: Option<Arc<FieldDescriptor>>,
    pub off_ex_total_value: Option<Arc<FieldDescriptor>>,
    pub on_ex_total_value: Option<Arc<FieldDescriptor>>,
    pub std_dev: Option<Arc<FieldDescriptor>>,
    pub std_dev_sum: Option<Arc<FieldDescriptor>>,
    pub std_dev_sum_squares: Option<Arc<FieldDescriptor>>,
    pub order_id: Option<Arc<FieldDescriptor>>,
    pub settle_price: Option<Arc<FieldDescriptor>>,
    pub settle_date: Option<Arc<FieldDescriptor>>,
    pub trade_count: Option<Arc<FieldDescriptor>>,
    pub conflate_count: Option<Arc<FieldDescriptor>>,
    pub last_seq_num: Option<Arc<FieldDescriptor>>,
    pub high_seq_num: Option<Arc<FieldDescriptor>>,
    pub low_seq_num: Option<Arc<FieldDescriptor>>,
    pub total_volume_seq_num: Option<Arc<FieldDescriptor>>,
    pub currency_code: Option<Arc<FieldDescriptor>>,
    pub is_irregular: Option<Arc<FieldDescriptor>>,
    pub irreg_price: Option<Arc<FieldDescriptor>>,
    pub irreg_volume: Option<Arc<FieldDescriptor>>,
    pub irreg_part_id: Option<Arc<FieldDescriptor>>,
    pub irreg_time: Option<Arc<FieldDescriptor>>,
    pub orig_seq_num: Option<Arc<FieldDescriptor>>,
    pub orig_price: Option<Arc<FieldDescriptor>>,
    pub orig_volume: Option<Arc<FieldDescriptor>>,
    pub orig_part_id: Option<Arc<FieldDescriptor>>,
    pub orig_qual: Option<Arc<FieldDescriptor>>,
    pub orig_condition: Option<Arc<FieldDescriptor>>,
    pub orig_sale_days: Option<Arc<FieldDescriptor>>,
    pub orig_stop_stock_ind: Option<Arc<FieldDescriptor>>,
    pub corr_price: Option<Arc<FieldDescriptor>>,
    pub corr_volume: Option<Arc<FieldDescriptor>>,
    pub corr_part_id: Option<Arc<FieldDescriptor>>,
    pub corr_qual: Option<Arc<FieldDescriptor>>,
    pub corr_condition: Option<Arc<FieldDescriptor>>,
    pub corr_sale_days: Option<Arc<FieldDescriptor>>,
    pub corr_stop_stock_ind: Option<Arc<FieldDescriptor>>,
    pub corr_time: Option<Arc<FieldDescriptor>>,
    pub cancel_time: Option<Arc<FieldDescriptor>>,
    pub trade_id: Option<Arc<FieldDescriptor>>,
    pub orig_trade_id: Option<Arc<FieldDescriptor>>,
    pub corr_trade_id: Option<Arc<FieldDescriptor>>,
    pub short_sale_circuit_breaker: Option<Arc<FieldDescriptor>>,
    pub max_fid: u16,
}

impl TradeFieldSet {
    fn resolve(dict: &Dictionary, aliases: Option<&FieldAliases>) -> Self {
        let lookup = |name| dictionary::lookup(dict, aliases, name);
        Self {
            common: CommonFieldSet::resolve(dict, aliases),
            trade_price: lookup("wTradePrice"),
            trade_volume: lookup("wTradeVolume"),
            trade_part_id: lookup("wTradePartId"),
            trade_date: lookup("wTradeDate"),
            trade_time: lookup("wTradeTime"),
            trade_seq_num: lookup("wTradeSeqNum"),
            trade_qual: lookup("wTradeQualifier"),
            trade_condition: lookup("wSaleCondition"),
            aggressor_side: lookup("wAggressorSide"),
            trade_tick: lookup("wTradeTick"),
            trade_units: lookup("wTradeUnits"),
            sellers_sale_days: lookup("wSellersSaleDays"),
            stop_stock_ind: lookup("wStopStockIndicator"),
            trade_exec_venue: lookup("wTradeExecVenueEnum"),
            off_ex_trade_price: lookup("wOffExchangeTradePrice"),
            on_ex_trade_price: lookup("wOnExchangeTradePrice"),
            last_price: lookup("wLastPrice"),
            last_volume: lookup("wLastVolume"),
            last_part_id: lookup("wLastPartId"),
            last_time: lookup("wLastTime"),
            net_change: lookup("wNetChange"),
            pct_change: lookup("wPctChange"),
            acc_volume: lookup("wTotalVolume"),
            off_ex_acc_volume: lookup("wOffExchangeTotalVolume"),
            on_ex_acc_volume: lookup("wOnExchangeTotalVolume"),
            open_price: lookup("wOpenPrice"),
            high_price: lookup("wHighPrice"),
            low_price: lookup("wLowPrice"),
            close_price: lookup("wClosePrice"),
            close_date: lookup("wCloseDate"),
            prev_close_price: lookup("wPrevClosePrice"),
            prev_close_date: lookup("wPrevCloseDate"),
            adj_prev_close: lookup("wAdjPrevClose"),
            prev_volume: lookup("wPrevVolume"),
            block_count: lookup("wBlockCount"),
            block_volume: lookup("wBlockVolume"),
            vwap: lookup("wVwap"),
            off_ex_vwap: lookup("wOffExchangeVwap"),
            on_ex_vwap: lookup("wOnExchangeVwap"),
            total_value: lookup("wTotalValue"),
            off_ex_total_value: lookup("wOffExchangeTotalValue"),
            on_ex_total_value: lookup("wOnExchangeTotalValue"),
            std_dev: lookup("wStdDev"),
            std_dev_sum: lookup("wStdDevSum"),
            std_dev_sum_squares: lookup("wStdDevSumSquares"),
            order_id: lookup("wOrderId"),
            settle_price: lookup("wSettlePrice"),
            settle_date: lookup("wSettleDate"),
            trade_count: lookup("wTradeCount"),
            conflate_count: lookup("wConflateTradeCount"),
            last_seq_num: lookup("wLastTradeSeqNum"),
            high_seq_num: lookup("wHighSeqNum"),
            low_seq_num: lookup("wLowSeqNum"),
            total_volume_seq_num: lookup("wTotalVolumeSeqNum"),
            currency_code: lookup("wCurrencyCode"),
            is_irregular: lookup("wIsIrregular"),
            irreg_price: lookup("wIrregPrice"),
            irreg_volume: lookup("wIrregSize"),
            irreg_part_id: lookup("wIrregPartId"),
            irreg_time: lookup("wIrregTime"),
            orig_seq_num: lookup("wOrigSeqNum"),
            orig_price: lookup("wOrigPrice"),
            orig_volume: lookup("wOrigSize"),
            orig_part_id: lookup("wOrigPartId"),
            orig_qual: lookup("wOrigQualifier"),
            orig_condition: lookup("wOrigCondition"),
            orig_sale_days: lookup("wOrigSaleDays"),
            orig_stop_stock_ind: lookup("wOrigStopStockInd"),
            corr_price: lookup("wCorrPrice"),
            corr_volume: lookup("wCorrSize"),
            corr_part_id: lookup("wCorrPartId"),
            corr_qual: lookup("wCorrQualifier"),
            corr_condition: lookup("wCorrCondition"),
            corr_sale_days: lookup("wCorrSaleDays"),
            corr_stop_stock_ind: lookup("wCorrStopStockInd"),
            corr_time: lookup("wCorrTime"),
            cancel_time: lookup("wCancelTime"),
            trade_id: lookup("wTradeId"),
            orig_trade_id: lookup("wOrigTradeId"),
            corr_trade_id: lookup("wCorrTradeId"),
            short_sale_circuit_breaker: lookup("wShortSaleCircuitBreaker"),
            max_fid: dict.max_fid(),
        }
    }
}

static TRADE_FIELDS: SharedFieldSet<TradeFieldSet> = SharedFieldSet::new();
static TRADE_UPDATERS: OnceLock<UpdaterTable<TradeCache>> = OnceLock::new();

/// Process-wide cache of trade field descriptors. Must be populated before
/// trade listeners can process messages.
pub struct TradeFields;

impl TradeFields {
    /// Resolve the trade schema against a dictionary, with optional
    /// feed-specific renaming. Idempotent.
    pub fn set_dictionary(dictionary: &Dictionary, aliases: Option<&FieldAliases>) {
        TRADE_FIELDS.set_with(|| TradeFieldSet::resolve(dictionary, aliases));
    }

    pub fn is_set() -> bool {
        TRADE_FIELDS.is_set()
    }

    pub fn reset() {
        TRADE_FIELDS.reset();
    }

    pub fn get() -> Option<Arc<TradeFieldSet>> {
        TRADE_FIELDS.get()
    }
}

// ============================================================================
// Cache
// ============================================================================

/// Last-known value and freshness state for every tracked trade field.
#[derive(Debug, Clone, Default)]
pub struct TradeCache {
    pub symbol: DeltaField<String>,
    pub part_id: DeltaField<String>,
    pub pub_id: DeltaField<String>,
    pub src_time: DeltaField<Option<DateTime<Utc>>>,
    pub activity_time: DeltaField<Option<DateTime<Utc>>>,
    pub line_time: DeltaField<Option<DateTime<Utc>>>,
    pub send_time: DeltaField<Option<DateTime<Utc>>>,

    pub trade_price: DeltaField<Decimal>,
    pub trade_volume: DeltaField<f64>,
    pub trade_part_id: DeltaField<String>,
    pub trade_date: DeltaField<Option<NaiveDate>>,
    pub event_seq_num: DeltaField<u64>,
    pub event_time: DeltaField<Option<DateTime<Utc>>>,
    pub trade_qual: DeltaField<String>,
    pub trade_condition: DeltaField<String>,
    pub aggressor_side: DeltaField<char>,
    pub trade_direction: DeltaField<String>,
    pub trade_units: DeltaField<String>,
    pub sellers_sale_days: DeltaField<u64>,
    pub stop_stock_ind: DeltaField<char>,
    pub trade_exec_venue: DeltaField<String>,
    pub off_ex_trade_price: DeltaField<Decimal>,
    pub on_ex_trade_price: DeltaField<Decimal>,

    pub last_price: DeltaField<Decimal>,
    pub last_volume: DeltaField<f64>,
    pub last_part_id: DeltaField<String>,
    pub last_time: DeltaField<Option<DateTime<Utc>>>,
    pub net_change: DeltaField<Decimal>,
    pub pct_change: DeltaField<f64>,

    pub acc_volume: DeltaField<f64>,
    pub off_ex_acc_volume: DeltaField<f64>,
    pub on_ex_acc_volume: DeltaField<f64>,
    pub open_price: DeltaField<Decimal>,
    pub high_price: DeltaField<Decimal>,
    pub low_price: DeltaField<Decimal>,
    pub close_price: DeltaField<Decimal>,
    pub close_date: DeltaField<Option<NaiveDate>>,
    pub prev_close_price: DeltaField<Decimal>,
    pub prev_close_date: DeltaField<Option<NaiveDate>>,
    pub adj_prev_close: DeltaField<Decimal>,
    pub prev_volume: DeltaField<f64>,
    pub block_count: DeltaField<u64>,
    pub block_volume: DeltaField<f64>,
    pub vwap: DeltaField<Decimal>,
    pub off_ex_vwap: DeltaField<Decimal>,
    pub on_ex_vwap: DeltaField<Decimal>,
    pub total_value: DeltaField<Decimal>,
    pub off_ex_total_value: DeltaField<Decimal>,
    pub on_ex_total_value: DeltaField<Decimal>,
    pub std_dev: DeltaField<f64>,
    pub std_dev_sum: DeltaField<f64>,
    pub std_dev_sum_squares: DeltaField<f64>,
    pub order_id: DeltaField<u64>,
    pub settle_price: DeltaField<Decimal>,
    pub settle_date: DeltaField<Option<NaiveDate>>,
    pub trade_count: DeltaField<u64>,
    pub last_seq_num: DeltaField<u64>,
    pub high_seq_num: DeltaField<u64>,
    pub low_seq_num: DeltaField<u64>,
    pub total_volume_seq_num: DeltaField<u64>,
    pub currency_code: DeltaField<String>,
    pub short_sale_circuit_breaker: DeltaField<char>,

    pub is_irregular: DeltaField<bool>,
    pub irreg_price: DeltaField<Decimal>,
    pub irreg_volume: DeltaField<f64>,
    pub irreg_part_id: DeltaField<String>,
    pub irreg_time: DeltaField<Option<DateTime<Utc>>>,

    pub orig_seq_num: DeltaField<u64>,
    pub orig_price: DeltaField<Decimal>,
    pub orig_volume: DeltaField<f64>,
    pub orig_part_id: DeltaField<String>,
    pub orig_qual: DeltaField<String>,
    pub orig_condition: DeltaField<String>,
    pub orig_sale_days: DeltaField<u64>,
    pub orig_stop_stock_ind: DeltaField<char>,

    pub corr_price: DeltaField<Decimal>,
    pub corr_volume: DeltaField<f64>,
    pub corr_part_id: DeltaField<String>,
    pub corr_qual: DeltaField<String>,
    pub corr_condition: DeltaField<String>,
    pub corr_sale_days: DeltaField<u64>,
    pub corr_stop_stock_ind: DeltaField<char>,
    pub corr_time: DeltaField<Option<DateTime<Utc>>>,
    pub cancel_time: DeltaField<Option<DateTime<Utc>>>,

    pub trade_id: DeltaField<String>,
    pub orig_trade_id: DeltaField<String>,
    pub corr_trade_id: DeltaField<String>,

    /// Whether the last cancel/error message was a cancel.
    pub is_cancel: DeltaField<bool>,

    // Merge scratch, valid for the message currently being processed.
    tmp_trade_count: u64,
    conflate_count: u64,
    got_trade_price: bool,
    got_trade_volume: bool,
    got_trade_count: bool,
}

impl TradeCache {
    fn begin_merge(&mut self) {
        self.got_trade_price = false;
        self.got_trade_volume = false;
        self.got_trade_count = false;
    }

    /// Whether the message carried an actual trade; generic updates only
    /// count as trades when this holds.
    fn saw_trade_fields(&self) -> bool {
        self.got_trade_price || self.got_trade_volume
    }

    fn decay_states(&mut self) {
        self.symbol.decay();
        self.part_id.decay();
        self.pub_id.decay();
        self.src_time.decay();
        self.activity_time.decay();
        self.line_time.decay();
        self.send_time.decay();
        self.trade_price.decay();
        self.trade_volume.decay();
        self.trade_part_id.decay();
        self.trade_date.decay();
        self.event_seq_num.decay();
        self.event_time.decay();
        self.trade_qual.decay();
        self.trade_condition.decay();
        self.aggressor_side.decay();
        self.trade_direction.decay();
        self.trade_units.decay();
        self.sellers_sale_days.decay();
        self.stop_stock_ind.decay();
        self.trade_exec_venue.decay();
        self.off_ex_trade_price.decay();
        self.on_ex_trade_price.decay();
        self.last_price.decay();
        self.last_volume.decay();
        self.last_part_id.decay();
        self.last_time.decay();
        self.net_change.decay();
        self.pct_change.decay();
        self.acc_volume.decay();
        self.off_ex_acc_volume.decay();
        self.on_ex_acc_volume.decay();
        self.open_price.decay();
        self.high_price.decay();
        self.low_price.decay();
        self.close_price.decay();
        self.close_date.decay();
        self.prev_close_price.decay();
        self.prev_close_date.decay();
        self.adj_prev_close.decay();
        self.prev_volume.decay();
        self.block_count.decay();
        self.block_volume.decay();
        self.vwap.decay();
        self.off_ex_vwap.decay();
        self.on_ex_vwap.decay();
        self.total_value.decay();
        self.off_ex_total_value.decay();
        self.on_ex_total_value.decay();
        self.std_dev.decay();
        self.std_dev_sum.decay();
        self.std_dev_sum_squares.decay();
        self.order_id.decay();
        self.settle_price.decay();
        self.settle_date.decay();
        self.trade_count.decay();
        self.last_seq_num.decay();
        self.high_seq_num.decay();
        self.low_seq_num.decay();
        self.total_volume_seq_num.decay();
        self.currency_code.decay();
        self.short_sale_circuit_breaker.decay();
        self.is_irregular.decay();
        self.irreg_price.decay();
        self.irreg_volume.decay();
        self.irreg_part_id.decay();
        self.irreg_time.decay();
        self.orig_seq_num.decay();
        self.orig_price.decay();
        self.orig_volume.decay();
        self.orig_part_id.decay();
        self.orig_qual.decay();
        self.orig_condition.decay();
        self.orig_sale_days.decay();
        self.orig_stop_stock_ind.decay();
        self.corr_price.decay();
        self.corr_volume.decay();
        self.corr_part_id.decay();
        self.corr_qual.decay();
        self.corr_condition.decay();
        self.corr_sale_days.decay();
        self.corr_stop_stock_ind.decay();
        self.corr_time.decay();
        self.cancel_time.decay();
        self.trade_id.decay();
        self.orig_trade_id.decay();
        self.corr_trade_id.decay();
        self.is_cancel.decay();
    }
}

// ============================================================================
// Updater table
// ============================================================================

fn build_updaters(fields: &TradeFieldSet) -> UpdaterTable<TradeCache> {
    let mut b: UpdaterTableBuilder<TradeCache> = UpdaterTableBuilder::new(fields.max_fid);

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

    b.add(fields.trade_price.as_ref(), |c, v| {
        if c.trade_price.update(v.try_price()?) {
            c.got_trade_price = true;
        }
        Ok(())
    });
    b.add(fields.trade_volume.as_ref(), |c, v| {
        if c.trade_volume.update(v.try_f64()?) {
            c.got_trade_volume = true;
        }
        Ok(())
    });
    b.add(fields.trade_part_id.as_ref(), |c, v| {
        c.trade_part_id.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.trade_date.as_ref(), |c, v| {
        c.trade_date.update(Some(v.try_date()?));
        Ok(())
    });
    b.add(fields.trade_time.as_ref(), |c, v| {
        c.event_time.update(Some(v.try_datetime()?));
        Ok(())
    });
    b.add(fields.trade_seq_num.as_ref(), |c, v| {
        c.event_seq_num.update(v.try_u64()?);
        Ok(())
    });
    b.add(fields.trade_qual.as_ref(), |c, v| {
        c.trade_qual.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.trade_condition.as_ref(), |c, v| {
        c.trade_condition.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.aggressor_side.as_ref(), |c, v| {
        c.aggressor_side.update(v.try_char()?);
        Ok(())
    });
    b.add(fields.trade_tick.as_ref(), |c, v| {
        c.trade_direction.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.trade_units.as_ref(), |c, v| {
        c.trade_units.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.sellers_sale_days.as_ref(), |c, v| {
        c.sellers_sale_days.update(v.try_u64()?);
        Ok(())
    });
    b.add(fields.stop_stock_ind.as_ref(), |c, v| {
        c.stop_stock_ind.update(v.try_char()?);
        Ok(())
    });
    b.add(fields.trade_exec_venue.as_ref(), |c, v| {
        c.trade_exec_venue.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.off_ex_trade_price.as_ref(), |c, v| {
        c.off_ex_trade_price.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.on_ex_trade_price.as_ref(), |c, v| {
        c.on_ex_trade_price.update(v.try_price()?);
        Ok(())
    });

    b.add(fields.last_price.as_ref(), |c, v| {
        c.last_price.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.last_volume.as_ref(), |c, v| {
        c.last_volume.update(v.try_f64()?);
        Ok(())
    });
    b.add(fields.last_part_id.as_ref(), |c, v| {
        c.last_part_id.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.last_time.as_ref(), |c, v| {
        c.last_time.update(Some(v.try_datetime()?));
        Ok(())
    });
    b.add(fields.net_change.as_ref(), |c, v| {
        c.net_change.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.pct_change.as_ref(), |c, v| {
        c.pct_change.update(v.try_f64()?);
        Ok(())
    });

    b.add(fields.acc_volume.as_ref(), |c, v| {
        c.acc_volume.update(v.try_f64()?);
        Ok(())
    });
    b.add(fields.off_ex_acc_volume.as_ref(), |c, v| {
        c.off_ex_acc_volume.update(v.try_f64()?);
        Ok(())
    });
    b.add(fields.on_ex_acc_volume.as_ref(), |c, v| {
        c.on_ex_acc_volume.update(v.try_f64()?);
        Ok(())
    });
    b.add(fields.open_price.as_ref(), |c, v| {
        c.open_price.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.high_price.as_ref(), |c, v| {
        c.high_price.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.low_price.as_ref(), |c, v| {
        c.low_price.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.close_price.as_ref(), |c, v| {
        c.close_price.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.close_date.as_ref(), |c, v| {
        c.close_date.update(Some(v.try_date()?));
        Ok(())
    });
    b.add(fields.prev_close_price.as_ref(), |c, v| {
        c.prev_close_price.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.prev_close_date.as_ref(), |c, v| {
        c.prev_close_date.update(Some(v.try_date()?));
        Ok(())
    });
    b.add(fields.adj_prev_close.as_ref(), |c, v| {
        c.adj_prev_close.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.prev_volume.as_ref(), |c, v| {
        c.prev_volume.update(v.try_f64()?);
        Ok(())
    });
    b.add(fields.block_count.as_ref(), |c, v| {
        c.block_count.update(v.try_u64()?);
        Ok(())
    });
    b.add(fields.block_volume.as_ref(), |c, v| {
        c.block_volume.update(v.try_f64()?);
        Ok(())
    });
    b.add(fields.vwap.as_ref(), |c, v| {
        c.vwap.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.off_ex_vwap.as_ref(), |c, v| {
        c.off_ex_vwap.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.on_ex_vwap.as_ref(), |c, v| {
        c.on_ex_vwap.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.total_value.as_ref(), |c, v| {
        c.total_value.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.off_ex_total_value.as_ref(), |c, v| {
        c.off_ex_total_value.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.on_ex_total_value.as_ref(), |c, v| {
        c.on_ex_total_value.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.std_dev.as_ref(), |c, v| {
        c.std_dev.update(v.try_f64()?);
        Ok(())
    });
    b.add(fields.std_dev_sum.as_ref(), |c, v| {
        c.std_dev_sum.update(v.try_f64()?);
        Ok(())
    });
    b.add(fields.std_dev_sum_squares.as_ref(), |c, v| {
        c.std_dev_sum_squares.update(v.try_f64()?);
        Ok(())
    });
    b.add(fields.order_id.as_ref(), |c, v| {
        c.order_id.update(v.try_u64()?);
        Ok(())
    });
    b.add(fields.settle_price.as_ref(), |c, v| {
        c.settle_price.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.settle_date.as_ref(), |c, v| {
        c.settle_date.update(Some(v.try_date()?));
        Ok(())
    });
    b.add(fields.trade_count.as_ref(), |c, v| {
        c.tmp_trade_count = v.try_u64()?;
        c.got_trade_count = true;
        Ok(())
    });
    b.add(fields.conflate_count.as_ref(), |c, v| {
        c.conflate_count = v.try_u64()?;
        Ok(())
    });
    b.add(fields.last_seq_num.as_ref(), |c, v| {
        c.last_seq_num.update(v.try_u64()?);
        Ok(())
    });
    b.add(fields.high_seq_num.as_ref(), |c, v| {
        c.high_seq_num.update(v.try_u64()?);
        Ok(())
    });
    b.add(fields.low_seq_num.as_ref(), |c, v| {
        c.low_seq_num.update(v.try_u64()?);
        Ok(())
    });
    b.add(fields.total_volume_seq_num.as_ref(), |c, v| {
        c.total_volume_seq_num.update(v.try_u64()?);
        Ok(())
    });
    b.add(fields.currency_code.as_ref(), |c, v| {
        c.currency_code.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.short_sale_circuit_breaker.as_ref(), |c, v| {
        c.short_sale_circuit_breaker.update(v.try_char()?);
        Ok(())
    });

    b.add(fields.is_irregular.as_ref(), |c, v| {
        c.is_irregular.update(v.try_bool()?);
        Ok(())
    });
    b.add(fields.irreg_price.as_ref(), |c, v| {
        c.irreg_price.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.irreg_volume.as_ref(), |c, v| {
        c.irreg_volume.update(v.try_f64()?);
        Ok(())
    });
    b.add(fields.irreg_part_id.as_ref(), |c, v| {
        c.irreg_part_id.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.irreg_time.as_ref(), |c, v| {
        c.irreg_time.update(Some(v.try_datetime()?));
        Ok(())
    });

    b.add(fields.orig_seq_num.as_ref(), |c, v| {
        c.orig_seq_num.update(v.try_u64()?);
        Ok(())
    });
    b.add(fields.orig_price.as_ref(), |c, v| {
        c.orig_price.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.orig_volume.as_ref(), |c, v| {
        c.orig_volume.update(v.try_f64()?);
        Ok(())
    });
    b.add(fields.orig_part_id.as_ref(), |c, v| {
        c.orig_part_id.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.orig_qual.as_ref(), |c, v| {
        c.orig_qual.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.orig_condition.as_ref(), |c, v| {
        c.orig_condition.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.orig_sale_days.as_ref(), |c, v| {
        c.orig_sale_days.update(v.try_u64()?);
        Ok(())
    });
    b.add(fields.orig_stop_stock_ind.as_ref(), |c, v| {
        c.orig_stop_stock_ind.update(v.try_char()?);
        Ok(())
    });

    b.add(fields.corr_price.as_ref(), |c, v| {
        c.corr_price.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.corr_volume.as_ref(), |c, v| {
        c.corr_volume.update(v.try_f64()?);
        Ok(())
    });
    b.add(fields.corr_part_id.as_ref(), |c, v| {
        c.corr_part_id.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.corr_qual.as_ref(), |c, v| {
        c.corr_qual.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.corr_condition.as_ref(), |c, v| {
        c.corr_condition.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.corr_sale_days.as_ref(), |c, v| {
        c.corr_sale_days.update(v.try_u64()?);
        Ok(())
    });
    b.add(fields.corr_stop_stock_ind.as_ref(), |c, v| {
        c.corr_stop_stock_ind.update(v.try_char()?);
        Ok(())
    });
    b.add(fields.corr_time.as_ref(), |c, v| {
        c.corr_time.update(Some(v.try_datetime()?));
        Ok(())
    });
    b.add(fields.cancel_time.as_ref(), |c, v| {
        c.cancel_time.update(Some(v.try_datetime()?));
        Ok(())
    });

    b.add(fields.trade_id.as_ref(), |c, v| {
        c.trade_id.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.orig_trade_id.as_ref(), |c, v| {
        c.orig_trade_id.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.corr_trade_id.as_ref(), |c, v| {
        c.corr_trade_id.update(v.try_str()?.to_string());
        Ok(())
    });

    b.build()
}

fn trade_updaters() -> Option<&'static UpdaterTable<TradeCache>> {
    if let Some(table) = TRADE_UPDATERS.get() {
        return Some(table);
    }
    let fields = TradeFields::get()?;
    Some(TRADE_UPDATERS.get_or_init(|| build_updaters(&fields)))
}

// ============================================================================
// Listener
// ============================================================================

/// A listener that specializes in trade reports, corrections, cancels and
/// closing summaries.
#[derive(Default)]
pub struct TradeListener {
    cache: TradeCache,
    handlers: SmallVec<[Box<dyn TradeHandler>; 2]>,
    gap_begin: DeltaField<u64>,
    gap_end: DeltaField<u64>,
    ignore_update: bool,
    last_generic_msg_was_trade: bool,
    process_updates_as_trades: bool,
}

impl TradeListener {
    pub fn new() -> Self {
        Self {
            process_updates_as_trades: true,
            ..Self::default()
        }
    }

    /// Builder method: whether generic `Update` messages carrying trade
    /// fields are reported as trades.
    pub fn with_updates_as_trades(mut self, process: bool) -> Self {
        self.process_updates_as_trades = process;
        self
    }

    /// Add a trade handler; handlers are invoked in registration order.
    pub fn add_handler(&mut self, handler: Box<dyn TradeHandler>) {
        self.handlers.push(handler);
    }

    /// The cached trade image.
    pub fn trade(&self) -> &TradeCache {
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
        updaters: &UpdaterTable<TradeCache>,
    ) -> Result<(), DataError> {
        self.update_trade_fields(msg, updaters)?;
        self.check_trade_count(subscription, msg, false);

        let cache = &self.cache;
        for handler in self.handlers.iter_mut() {
            handler.on_trade_recap(subscription, msg, cache);
        }
        Ok(())
    }

    fn handle_trade(
        &mut self,
        subscription: &SubscriptionInfo,
        msg: &Msg,
        updaters: &UpdaterTable<TradeCache>,
    ) -> Result<(), DataError> {
        self.update_trade_fields(msg, updaters)?;
        self.check_trade_count(subscription, msg, true);
        if self.take_ignore_update() {
            return Ok(());
        }

        let cache = &self.cache;
        for handler in self.handlers.iter_mut() {
            handler.on_trade_report(subscription, msg, cache);
        }
        Ok(())
    }

    fn handle_cancel_or_error(
        &mut self,
        subscription: &SubscriptionInfo,
        msg: &Msg,
        is_cancel: bool,
        updaters: &UpdaterTable<TradeCache>,
    ) -> Result<(), DataError> {
        self.update_trade_fields(msg, updaters)?;
        self.cache.is_cancel.force(is_cancel);
        self.check_trade_count(subscription, msg, true);
        if self.take_ignore_update() {
            return Ok(());
        }

        // The cancel time, when published, becomes the event time.
        if let Some(cancel_time) = *self.cache.cancel_time.value() {
            self.cache.event_time.force(Some(cancel_time));
        }

        let cache = &self.cache;
        for handler in self.handlers.iter_mut() {
            handler.on_trade_cancel_or_error(subscription, msg, is_cancel, cache);
        }
        Ok(())
    }

    fn handle_correction(
        &mut self,
        subscription: &SubscriptionInfo,
        msg: &Msg,
        updaters: &UpdaterTable<TradeCache>,
    ) -> Result<(), DataError> {
        self.update_trade_fields(msg, updaters)?;
        self.check_trade_count(subscription, msg, true);
        if self.take_ignore_update() {
            return Ok(());
        }

        if let Some(corr_time) = *self.cache.corr_time.value() {
            self.cache.event_time.force(Some(corr_time));
        }

        let cache = &self.cache;
        for handler in self.handlers.iter_mut() {
            handler.on_trade_correction(subscription, msg, cache);
        }
        Ok(())
    }

    fn handle_closing(
        &mut self,
        subscription: &SubscriptionInfo,
        msg: &Msg,
        updaters: &UpdaterTable<TradeCache>,
    ) -> Result<(), DataError> {
        self.update_trade_fields(msg, updaters)?;
        self.check_trade_count(subscription, msg, true);
        if self.take_ignore_update() {
            return Ok(());
        }

        let cache = &self.cache;
        for handler in self.handlers.iter_mut() {
            handler.on_trade_closing(subscription, msg, cache);
        }
        Ok(())
    }

    fn handle_generic_update(
        &mut self,
        subscription: &SubscriptionInfo,
        msg: &Msg,
        updaters: &UpdaterTable<TradeCache>,
    ) -> Result<(), DataError> {
        self.update_trade_fields(msg, updaters)?;
        if !self.last_generic_msg_was_trade {
            return Ok(());
        }
        self.last_generic_msg_was_trade = false;

        self.check_trade_count(subscription, msg, true);
        if self.take_ignore_update() {
            return Ok(());
        }

        let cache = &self.cache;
        for handler in self.handlers.iter_mut() {
            handler.on_trade_report(subscription, msg, cache);
        }
        Ok(())
    }

    fn update_trade_fields(
        &mut self,
        msg: &Msg,
        updaters: &UpdaterTable<TradeCache>,
    ) -> Result<(), DataError> {
        self.gap_begin.decay();
        self.gap_end.decay();
        self.cache.decay_states();
        self.last_generic_msg_was_trade = false;
        self.cache.begin_merge();

        updaters.merge(&mut self.cache, msg)?;

        if self.cache.saw_trade_fields() {
            self.last_generic_msg_was_trade = true;
        }
        Ok(())
    }

    fn take_ignore_update(&mut self) -> bool {
        std::mem::take(&mut self.ignore_update)
    }

    /// Gap and duplicate detection on the trade count sequence. Only engages
    /// when the feed actually publishes a trade count.
    fn check_trade_count(&mut self, subscription: &SubscriptionInfo, msg: &Msg, check_for_gap: bool) {
        self.ignore_update = false;
        if !self.cache.got_trade_count {
            return;
        }

        let tmp = self.cache.tmp_trade_count;
        let count = self.cache.trade_count.get();
        let conflate = self.cache.conflate_count;

        if check_for_gap && count > 0 && tmp > count + conflate {
            self.gap_begin.force(count + conflate);
            self.gap_end.force(tmp - 1);
            self.cache.trade_count.force(tmp);
            let gap = SeqGap::new(self.gap_begin.get(), self.gap_end.get());
            tracing::debug!(
                symbol = subscription.symbol(),
                begin = gap.begin,
                end = gap.end,
                "trade gap detected"
            );
            let cache = &self.cache;
            for handler in self.handlers.iter_mut() {
                handler.on_trade_gap(subscription, msg, gap, cache);
            }
        }

        // A gap message also lands here once its count is rolled forward,
        // so a gap is reported through the gap callback alone.
        let current = self.cache.trade_count.get();
        if current > 0 && tmp == current {
            tracing::debug!(
                symbol = subscription.symbol(),
                count = tmp,
                "trade count did not advance, suppressing update"
            );
            self.ignore_update = true;
        }

        self.cache.trade_count.update(tmp);
    }
}

impl MsgListener for TradeListener {
    fn on_msg(
        &mut self,
        subscription: &SubscriptionInfo,
        msg: &Msg,
        msg_type: MsgType,
    ) -> Result<(), DataError> {
        let Some(updaters) = trade_updaters() else {
            tracing::warn!(
                symbol = subscription.symbol(),
                "trade dictionary not resolved, dropping message"
            );
            return Ok(());
        };

        self.cache.conflate_count = 1;

        match msg_type {
            MsgType::Initial | MsgType::Recap | MsgType::Snapshot | MsgType::PreOpening => {
                self.handle_recap(subscription, msg, updaters)
            }
            MsgType::Trade => self.handle_trade(subscription, msg, updaters),
            MsgType::Cancel => self.handle_cancel_or_error(subscription, msg, true, updaters),
            MsgType::Error => self.handle_cancel_or_error(subscription, msg, false, updaters),
            MsgType::Correction => self.handle_correction(subscription, msg, updaters),
            MsgType::Closing => self.handle_closing(subscription, msg, updaters),
            MsgType::Update if self.process_updates_as_trades => {
                self.handle_generic_update(subscription, msg, updaters)
            }
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Security Status Listener
// Caches security status fields and dispatches recap/update callbacks
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

/// Trading status of a security.
///
/// Feeds publish the field either as the numeric wire value or as its string
/// name; both forms parse to the same variant and publications this library
/// does not know map to `Unknown` (the raw string stays cached alongside).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SecurityStatus {
    #[default]
    None,
    Normal,
    Closed,
    Halted,
    Crossing,
    Auction,
    Deleted,
    NotExist,
    Suspended,
    AtLast,
    Unknown,
}

impl SecurityStatus {
    pub fn from_wire(value: u64) -> Self {
        match value {
            0 => SecurityStatus::None,
            1 => SecurityStatus::Normal,
            2 => SecurityStatus::Closed,
            3 => SecurityStatus::Halted,
            4 => SecurityStatus::Crossing,
            5 => SecurityStatus::Auction,
            6 => SecurityStatus::Deleted,
            7 => SecurityStatus::NotExist,
            8 => SecurityStatus::Suspended,
            9 => SecurityStatus::AtLast,
            _ => SecurityStatus::Unknown,
        }
    }

    pub fn parse(text: &str) -> Self {
        match text {
            "None" => SecurityStatus::None,
            "Normal" => SecurityStatus::Normal,
            "Closed" => SecurityStatus::Closed,
            "Halted" => SecurityStatus::Halted,
            "Crossing" => SecurityStatus::Crossing,
            "Auction" => SecurityStatus::Auction,
            "Deleted" => SecurityStatus::Deleted,
            "NotExist" => SecurityStatus::NotExist,
            "Suspended" => SecurityStatus::Suspended,
            "AtLast" => SecurityStatus::AtLast,
            other => match other.parse::<u64>() {
                Ok(value) => SecurityStatus::from_wire(value),
                Err(_) => SecurityStatus::Unknown,
            },
        }
    }
}

/// Qualifier refining a [`SecurityStatus`].
///
/// The imbalance qualifiers share their wire values with
/// [`ImbalanceType`](crate::listeners::ImbalanceType); feeds publish the
/// auction imbalance state through this slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SecurityStatusQual {
    #[default]
    None,
    Opening,
    Excused,
    Withdrawn,
    Suspended,
    Resume,
    QuoteResume,
    TradeResume,
    ResumeTime,
    MktImbBuy,
    MktImbSell,
    NoMktImb,
    MocImbBuy,
    MocImbSell,
    NoMocImb,
    OrderImb,
    OrderInf,
    OrderImbBuy,
    OrderImbSell,
    NoOrderImb,
    RangeInd,
    ItsPreOpen,
    Reserved,
    Frozen,
    PreOpen,
    News,
    NewsDissem,
    Unknown,
}

impl SecurityStatusQual {
    pub fn from_wire(value: u64) -> Self {
        match value {
            0 => SecurityStatusQual::None,
            1 => SecurityStatusQual::Opening,
            2 => SecurityStatusQual::Excused,
            3 => SecurityStatusQual::Withdrawn,
            4 => SecurityStatusQual::Suspended,
            5 => SecurityStatusQual::Resume,
            6 => SecurityStatusQual::QuoteResume,
            7 => SecurityStatusQual::TradeResume,
            8 => SecurityStatusQual::ResumeTime,
            16 => SecurityStatusQual::MktImbBuy,
            17 => SecurityStatusQual::MktImbSell,
            18 => SecurityStatusQual::NoMktImb,
            19 => SecurityStatusQual::MocImbBuy,
            20 => SecurityStatusQual::MocImbSell,
            21 => SecurityStatusQual::NoMocImb,
            22 => SecurityStatusQual::OrderImb,
            23 => SecurityStatusQual::OrderInf,
            24 => SecurityStatusQual::OrderImbBuy,
            25 => SecurityStatusQual::OrderImbSell,
            26 => SecurityStatusQual::NoOrderImb,
            27 => SecurityStatusQual::RangeInd,
            28 => SecurityStatusQual::ItsPreOpen,
            29 => SecurityStatusQual::Reserved,
            30 => SecurityStatusQual::Frozen,
            31 => SecurityStatusQual::PreOpen,
            32 => SecurityStatusQual::News,
            33 => SecurityStatusQual::NewsDissem,
            _ => SecurityStatusQual::Unknown,
        }
    }

    pub fn parse(text: &str) -> Self {
        match text {
            "None" => SecurityStatusQual::None,
            "Opening" => SecurityStatusQual::Opening,
            "Excused" => SecurityStatusQual::Excused,
            "Withdrawn" => SecurityStatusQual::Withdrawn,
            "Suspended" => SecurityStatusQual::Suspended,
            "Resume" => SecurityStatusQual::Resume,
            "QuoteResume" => SecurityStatusQual::QuoteResume,
            "TradeResume" => SecurityStatusQual::TradeResume,
            "ResumeTime" => SecurityStatusQual::ResumeTime,
            "MktImbBuy" => SecurityStatusQual::MktImbBuy,
            "MktImbSell" => SecurityStatusQual::MktImbSell,
            "NoMktImb" => SecurityStatusQual::NoMktImb,
            "MocImbBuy" => SecurityStatusQual::MocImbBuy,
            "MocImbSell" => SecurityStatusQual::MocImbSell,
            "NoMocImb" => SecurityStatusQual::NoMocImb,
            "OrderImb" => SecurityStatusQual::OrderImb,
            "OrderInf" => SecurityStatusQual::OrderInf,
            "OrderImbBuy" => SecurityStatusQual::OrderImbBuy,
            "OrderImbSell" => SecurityStatusQual::OrderImbSell,
            "NoOrderImb" => SecurityStatusQual::NoOrderImb,
            "RangeInd" => SecurityStatusQual::RangeInd,
            "ItsPreOpen" => SecurityStatusQual::ItsPreOpen,
            "Reserved" => SecurityStatusQual::Reserved,
            "Frozen" => SecurityStatusQual::Frozen,
            "PreOpen" => SecurityStatusQual::PreOpen,
            "News" => SecurityStatusQual::News,
            "NewsDissem" => SecurityStatusQual::NewsDissem,
            other => match other.parse::<u64>() {
                Ok(value) => SecurityStatusQual::from_wire(value),
                Err(_) => SecurityStatusQual::Unknown,
            },
        }
    }
}

/// Parse an enum-carrying field published either numerically or as a string.
/// Returns the parsed value plus the raw text form for the string cache.
fn enum_field<T>(
    value: &FieldValue,
    from_wire: fn(u64) -> T,
    parse: fn(&str) -> T,
) -> Result<(T, String), DataError> {
    match value {
        FieldValue::String(s) => Ok((parse(s), s.clone())),
        _ => {
            let raw = value.try_u64()?;
            Ok((from_wire(raw), raw.to_string()))
        }
    }
}

/// Handler interface for security status events.
pub trait SecurityStatusHandler: Send {
    /// Full refresh of the security status image.
    fn on_security_status_recap(
        &mut self,
        subscription: &SubscriptionInfo,
        msg: &Msg,
        recap: &SecurityStatusCache,
    );

    /// A tracked status field changed.
    fn on_security_status_update(
        &mut self,
        subscription: &SubscriptionInfo,
        msg: &Msg,
        status: &SecurityStatusCache,
    );
}

// ============================================================================
// Field set
// ============================================================================

/// Resolved descriptors for the security status schema.
#[derive(Debug, Clone, Default)]
pub struct SecurityStatusFieldSet {
    pub common: CommonFieldSet,
    pub security_status: Option<Arc<FieldDescriptor>>,
    pub status_qual: Option<Arc<FieldDescriptor>>,
    pub status_orig: Option<Arc<FieldDescriptor>>,
    pub status_time: Option<Arc<FieldDescriptor>>,
    pub reason: Option<Arc<FieldDescriptor>>,
    pub seq_num: Option<Arc<FieldDescriptor>>,
    pub short_sale_circuit_breaker: Option<Arc<FieldDescriptor>>,
    pub luld_indicator: Option<Arc<FieldDescriptor>>,
    pub luld_time: Option<Arc<FieldDescriptor>>,
    pub luld_high_limit: Option<Arc<FieldDescriptor>>,
    pub luld_low_limit: Option<Arc<FieldDescriptor>>,
    pub max_fid: u16,
}

impl SecurityStatusFieldSet {
    fn resolve(dict: &Dictionary, aliases: Option<&FieldAliases>) -> Self {
        let lookup = |name| dictionary::lookup(dict, aliases, name);
        Self {
            common: CommonFieldSet::resolve(dict, aliases),
            security_status: lookup("wSecurityStatus"),
            status_qual: lookup("wSecStatusQual"),
            status_orig: lookup("wSecStatusOrig"),
            status_time: lookup("wSecStatusTime"),
            reason: lookup("wReason"),
            seq_num: lookup("wSeqNum"),
            short_sale_circuit_breaker: lookup("wShortSaleCircuitBreaker"),
            luld_indicator: lookup("wLuldIndicator"),
            luld_time: lookup("wLuldTime"),
            luld_high_limit: lookup("wLuldHighLimit"),
            luld_low_limit: lookup("wLuldLowLimit"),
            max_fid: dict.max_fid(),
        }
    }
}

static SEC_STATUS_FIELDS: SharedFieldSet<SecurityStatusFieldSet> = SharedFieldSet::new();
static SEC_STATUS_UPDATERS: OnceLock<UpdaterTable<SecurityStatusCache>> = OnceLock::new();

/// Process-wide cache of security status field descriptors.
pub struct SecurityStatusFields;

impl SecurityStatusFields {
    /// Resolve the schema against a dictionary. Idempotent.
    pub fn set_dictionary(dictionary: &Dictionary, aliases: Option<&FieldAliases>) {
        SEC_STATUS_FIELDS.set_with(|| SecurityStatusFieldSet::resolve(dictionary, aliases));
    }

    pub fn is_set() -> bool {
        SEC_STATUS_FIELDS.is_set()
    }

    pub fn reset() {
        SEC_STATUS_FIELDS.reset();
    }

    pub fn get() -> Option<Arc<SecurityStatusFieldSet>> {
        SEC_STATUS_FIELDS.get()
    }
}

// ============================================================================
// Cache
// ============================================================================

/// Last-known value and freshness state for every tracked status field.
#[derive(Debug, Clone, Default)]
pub struct SecurityStatusCache {
    pub symbol: DeltaField<String>,
    pub part_id: DeltaField<String>,
    pub src_time: DeltaField<Option<DateTime<Utc>>>,
    pub activity_time: DeltaField<Option<DateTime<Utc>>>,
    pub line_time: DeltaField<Option<DateTime<Utc>>>,
    pub send_time: DeltaField<Option<DateTime<Utc>>>,

    pub security_status: DeltaField<SecurityStatus>,
    pub security_status_str: DeltaField<String>,
    pub status_qual: DeltaField<SecurityStatusQual>,
    pub status_qual_str: DeltaField<String>,
    pub status_orig: DeltaField<String>,
    pub status_time: DeltaField<Option<DateTime<Utc>>>,
    pub reason: DeltaField<String>,
    pub event_seq_num: DeltaField<u64>,
    pub short_sale_circuit_breaker: DeltaField<char>,

    pub luld_indicator: DeltaField<char>,
    pub luld_time: DeltaField<Option<DateTime<Utc>>>,
    pub luld_high_limit: DeltaField<Decimal>,
    pub luld_low_limit: DeltaField<Decimal>,

    // Set during the merge when any tracked field changed.
    updated: bool,
}

impl SecurityStatusCache {
    fn begin_merge(&mut self) {
        self.updated = false;
    }

    fn decay_states(&mut self) {
        self.symbol.decay();
        self.part_id.decay();
        self.src_time.decay();
        self.activity_time.decay();
        self.line_time.decay();
        self.send_time.decay();
        self.security_status.decay();
        self.security_status_str.decay();
        self.status_qual.decay();
        self.status_qual_str.decay();
        self.status_orig.decay();
        self.status_time.decay();
        self.reason.decay();
        self.event_seq_num.decay();
        self.short_sale_circuit_breaker.decay();
        self.luld_indicator.decay();
        self.luld_time.decay();
        self.luld_high_limit.decay();
        self.luld_low_limit.decay();
    }
}

// ============================================================================
// Updater table
// ============================================================================

fn build_updaters(fields: &SecurityStatusFieldSet) -> UpdaterTable<SecurityStatusCache> {
    let mut b: UpdaterTableBuilder<SecurityStatusCache> = UpdaterTableBuilder::new(fields.max_fid);

    b.add(fields.common.symbol.as_ref(), |c, v| {
        c.updated |= c.symbol.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.common.issue_symbol.as_ref(), |c, v| {
        c.updated |= c.symbol.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.common.part_id.as_ref(), |c, v| {
        c.updated |= c.part_id.update(v.try_str()?.to_string());
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

    b.add(fields.security_status.as_ref(), |c, v| {
        let (status, raw) = enum_field(v, SecurityStatus::from_wire, SecurityStatus::parse)?;
        c.updated |= c.security_status.update(status);
        c.security_status_str.update(raw);
        Ok(())
    });
    b.add(fields.status_qual.as_ref(), |c, v| {
        let (qual, raw) = enum_field(v, SecurityStatusQual::from_wire, SecurityStatusQual::parse)?;
        c.updated |= c.status_qual.update(qual);
        c.status_qual_str.update(raw);
        Ok(())
    });
    b.add(fields.status_orig.as_ref(), |c, v| {
        c.updated |= c.status_orig.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.status_time.as_ref(), |c, v| {
        c.updated |= c.status_time.update(Some(v.try_datetime()?));
        Ok(())
    });
    b.add(fields.reason.as_ref(), |c, v| {
        c.updated |= c.reason.update(v.try_str()?.to_string());
        Ok(())
    });
    b.add(fields.seq_num.as_ref(), |c, v| {
        c.updated |= c.event_seq_num.update(v.try_u64()?);
        Ok(())
    });
    b.add(fields.short_sale_circuit_breaker.as_ref(), |c, v| {
        c.updated |= c.short_sale_circuit_breaker.update(v.try_char()?);
        Ok(())
    });
    b.add(fields.luld_indicator.as_ref(), |c, v| {
        c.updated |= c.luld_indicator.update(v.try_char()?);
        Ok(())
    });
    b.add(fields.luld_time.as_ref(), |c, v| {
        c.updated |= c.luld_time.update(Some(v.try_datetime()?));
        Ok(())
    });
    b.add(fields.luld_high_limit.as_ref(), |c, v| {
        c.updated |= c.luld_high_limit.update(v.try_price()?);
        Ok(())
    });
    b.add(fields.luld_low_limit.as_ref(), |c, v| {
        c.updated |= c.luld_low_limit.update(v.try_price()?);
        Ok(())
    });

    b.build()
}

fn sec_status_updaters() -> Option<&'static UpdaterTable<SecurityStatusCache>> {
    if let Some(table) = SEC_STATUS_UPDATERS.get() {
        return Some(table);
    }
    let fields = SecurityStatusFields::get()?;
    Some(SEC_STATUS_UPDATERS.get_or_init(|| build_updaters(&fields)))
}

// ============================================================================
// Listener
// ============================================================================

/// A listener that specializes in security status updates (halts, auctions,
/// LULD bands, circuit breakers).
#[derive(Default)]
pub struct SecurityStatusListener {
    cache: SecurityStatusCache,
    handlers: SmallVec<[Box<dyn SecurityStatusHandler>; 2]>,
}

impl SecurityStatusListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler; handlers are invoked in registration order.
    pub fn add_handler(&mut self, handler: Box<dyn SecurityStatusHandler>) {
        self.handlers.push(handler);
    }

    /// The cached status image.
    pub fn status(&self) -> &SecurityStatusCache {
        &self.cache
    }
}

impl MsgListener for SecurityStatusListener {
    fn on_msg(
        &mut self,
        subscription: &SubscriptionInfo,
        msg: &Msg,
        msg_type: MsgType,
    ) -> Result<(), DataError> {
        let Some(updaters) = sec_status_updaters() else {
            tracing::warn!(
                symbol = subscription.symbol(),
                "security status dictionary not resolved, dropping message"
            );
            return Ok(());
        };

        let is_recap = matches!(msg_type, MsgType::Initial | MsgType::Recap);
        let is_update = matches!(
            msg_type,
            MsgType::PreOpening
                | MsgType::SecStatus
                | MsgType::Update
                | MsgType::Quote
                | MsgType::Trade
                | MsgType::BookUpdate
        );
        if !is_recap && !is_update {
            return Ok(());
        }

        self.cache.decay_states();
        self.cache.begin_merge();
        updaters.merge(&mut self.cache, msg)?;

        let cache = &self.cache;
        if is_recap {
            for handler in self.handlers.iter_mut() {
                handler.on_security_status_recap(subscription, msg, cache);
            }
        } else if cache.updated {
            // Only a genuine change is reported as an update.
            for handler in self.handlers.iter_mut() {
                handler.on_security_status_update(subscription, msg, cache);
            }
        }
        Ok(())
    }
}

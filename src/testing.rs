// ============================================================================
// Test Fixtures
// One schema dictionary shared by every test in the crate
// ============================================================================
//
// The per-type field sets are process-wide and populated exactly once, so
// all tests resolve against this single dictionary; fids here are arbitrary
// but stable.

use crate::domain::FieldType;
use crate::fields::Dictionary;
use crate::listeners::auction::AuctionFields;
use crate::listeners::fundamentals::FundamentalFields;
use crate::listeners::order_imbalance::OrderImbalanceFields;
use crate::listeners::quote::QuoteFields;
use crate::listeners::security_status::SecurityStatusFields;
use crate::listeners::trade::TradeFields;

#[rustfmt::skip]
pub(crate) fn entries() -> Vec<(u16, &'static str, FieldType)> {
    vec![
        // Common
        (101, "wSymbol", FieldType::String),
        (102, "wIssueSymbol", FieldType::String),
        (103, "wPartId", FieldType::String),
        (104, "wSrcTime", FieldType::DateTime),
        (105, "wActivityTime", FieldType::DateTime),
        (106, "wLineTime", FieldType::DateTime),
        (107, "wSendTime", FieldType::DateTime),
        (108, "wPubId", FieldType::String),
        // Quote
        (120, "wBidPrice", FieldType::Price),
        (121, "wBidSize", FieldType::F64),
        (122, "wBidPartId", FieldType::String),
        (123, "wBidDepth", FieldType::F64),
        (124, "wBidClose", FieldType::Price),
        (125, "wBidCloseDate", FieldType::Date),
        (126, "wPrevBidClose", FieldType::Price),
        (127, "wPrevBidCloseDate", FieldType::Date),
        (128, "wBidHigh", FieldType::Price),
        (129, "wBidLow", FieldType::Price),
        (130, "wAskPrice", FieldType::Price),
        (131, "wAskSize", FieldType::F64),
        (132, "wAskPartId", FieldType::String),
        (133, "wAskDepth", FieldType::F64),
        (134, "wAskClose", FieldType::Price),
        (135, "wAskCloseDate", FieldType::Date),
        (136, "wPrevAskClose", FieldType::Price),
        (137, "wPrevAskCloseDate", FieldType::Date),
        (138, "wAskHigh", FieldType::Price),
        (139, "wAskLow", FieldType::Price),
        (140, "wQuoteSeqNum", FieldType::U64),
        (141, "wQuoteTime", FieldType::DateTime),
        (142, "wQuoteDate", FieldType::Date),
        (143, "wQuoteQualifier", FieldType::String),
        (144, "wCondition", FieldType::String),
        (145, "wQuoteCount", FieldType::U64),
        (146, "wConflateQuoteCount", FieldType::U64),
        (147, "wShortSaleBidTick", FieldType::Char),
        (148, "wBidTick", FieldType::Char),
        (149, "wShortSaleCircuitBreaker", FieldType::Char),
        (150, "wAskTime", FieldType::DateTime),
        (151, "wBidTime", FieldType::DateTime),
        (152, "wAskIndicator", FieldType::String),
        (153, "wBidIndicator", FieldType::String),
        (154, "wAskUpdateCount", FieldType::U64),
        (155, "wBidUpdateCount", FieldType::U64),
        (156, "wAskYield", FieldType::F64),
        (157, "wBidYield", FieldType::F64),
        // Trade
        (200, "wTradePrice", FieldType::Price),
        (201, "wTradeVolume", FieldType::F64),
        (202, "wTradePartId", FieldType::String),
        (203, "wTradeDate", FieldType::Date),
        (204, "wTradeTime", FieldType::DateTime),
        (205, "wTradeSeqNum", FieldType::U64),
        (206, "wTradeQualifier", FieldType::String),
        (207, "wSaleCondition", FieldType::String),
        (208, "wAggressorSide", FieldType::Char),
        (209, "wTradeTick", FieldType::String),
        (210, "wTradeUnits", FieldType::String),
        (211, "wSellersSaleDays", FieldType::U64),
        (212, "wStopStockIndicator", FieldType::Char),
        (213, "wTradeExecVenueEnum", FieldType::String),
        (214, "wOffExchangeTradePrice", FieldType::Price),
        (215, "wOnExchangeTradePrice", FieldType::Price),
        (216, "wLastPrice", FieldType::Price),
        (217, "wLastVolume", FieldType::F64),
        (218, "wLastPartId", FieldType::String),
        (219, "wLastTime", FieldType::DateTime),
        (220, "wNetChange", FieldType::Price),
        (221, "wPctChange", FieldType::F64),
        (222, "wTotalVolume", FieldType::F64),
        (223, "wOffExchangeTotalVolume", FieldType::F64),
        (224, "wOnExchangeTotalVolume", FieldType::F64),
        (225, "wOpenPrice", FieldType::Price),
        (226, "wHighPrice", FieldType::Price),
        (227, "wLowPrice", FieldType::Price),
        (228, "wClosePrice", FieldType::Price),
        (229, "wCloseDate", FieldType::Date),
        (230, "wPrevClosePrice", FieldType::Price),
        (231, "wPrevCloseDate", FieldType::Date),
        (232, "wAdjPrevClose", FieldType::Price),
        (233, "wPrevVolume", FieldType::F64),
        (234, "wBlockCount", FieldType::U64),
        (235, "wBlockVolume", FieldType::F64),
        (236, "wVwap", FieldType::Price),
        (237, "wOffExchangeVwap", FieldType::Price),
        (238, "wOnExchangeVwap", FieldType::Price),
        (239, "wTotalValue", FieldType::Price),
        (240, "wOffExchangeTotalValue", FieldType::Price),
        (241, "wOnExchangeTotalValue", FieldType::Price),
        (242, "wStdDev", FieldType::F64),
        (243, "wStdDevSum", FieldType::F64),
        (244, "wStdDevSumSquares", FieldType::F64),
        (245, "wOrderId", FieldType::U64),
        (246, "wSettlePrice", FieldType::Price),
        (247, "wSettleDate", FieldType::Date),
        (248, "wTradeCount", FieldType::U64),
        (249, "wConflateTradeCount", FieldType::U64),
        (250, "wLastTradeSeqNum", FieldType::U64),
        (251, "wHighSeqNum", FieldType::U64),
        (252, "wLowSeqNum", FieldType::U64),
        (253, "wTotalVolumeSeqNum", FieldType::U64),
        (254, "wCurrencyCode", FieldType::String),
        (255, "wIsIrregular", FieldType::Bool),
        (256, "wIrregPrice", FieldType::Price),
        (257, "wIrregSize", FieldType::F64),
        (258, "wIrregPartId", FieldType::String),
        (259, "wIrregTime", FieldType::DateTime),
        (260, "wOrigSeqNum", FieldType::U64),
        (261, "wOrigPrice", FieldType::Price),
        (262, "wOrigSize", FieldType::F64),
        (263, "wOrigPartId", FieldType::String),
        (264, "wOrigQualifier", FieldType::String),
        (265, "wOrigCondition", FieldType::String),
        (266, "wOrigSaleDays", FieldType::U64),
        (267, "wOrigStopStockInd", FieldType::Char),
        (268, "wCorrPrice", FieldType::Price),
        (269, "wCorrSize", FieldType::F64),
        (270, "wCorrPartId", FieldType::String),
        (271, "wCorrQualifier", FieldType::String),
        (272, "wCorrCondition", FieldType::String),
        (273, "wCorrSaleDays", FieldType::U64),
        (274, "wCorrStopStockInd", FieldType::Char),
        (275, "wCorrTime", FieldType::DateTime),
        (276, "wCancelTime", FieldType::DateTime),
        (277, "wTradeId", FieldType::String),
        (278, "wOrigTradeId", FieldType::String),
        (279, "wCorrTradeId", FieldType::String),
        // Security status
        (300, "wSecurityStatus", FieldType::String),
        (301, "wSecStatusQual", FieldType::String),
        (302, "wSecStatusOrig", FieldType::String),
        (303, "wSecStatusTime", FieldType::DateTime),
        (304, "wReason", FieldType::String),
        (305, "wSeqNum", FieldType::U64),
        (306, "wLuldIndicator", FieldType::Char),
        (307, "wLuldTime", FieldType::DateTime),
        (308, "wLuldHighLimit", FieldType::Price),
        (309, "wLuldLowLimit", FieldType::Price),
        // Auction
        (330, "wUncrossPrice", FieldType::Price),
        (331, "wUncrossVolume", FieldType::F64),
        (332, "wUncrossPriceInd", FieldType::String),
        (333, "wAuctionTime", FieldType::DateTime),
        // Order imbalance
        (350, "wHighIndicationPrice", FieldType::Price),
        (351, "wLowIndicationPrice", FieldType::Price),
        (352, "wIndicationPrice", FieldType::Price),
        (353, "wBuyVolume", FieldType::I64),
        (354, "wSellVolume", FieldType::I64),
        (355, "wMatchVolume", FieldType::I64),
        (356, "wInsideMatchPrice", FieldType::Price),
        (357, "wFarClearingPrice", FieldType::Price),
        (358, "wNearClearingPrice", FieldType::Price),
        (359, "wNoClearingPrice", FieldType::Price),
        (360, "wPriceVarInd", FieldType::Char),
        (361, "wCrossType", FieldType::Char),
        // Fundamentals
        (400, "wCorpActType", FieldType::String),
        (401, "wDividendPrice", FieldType::Price),
        (402, "wDividendFreq", FieldType::String),
        (403, "wDividendExDate", FieldType::Date),
        (404, "wDividendPayDate", FieldType::Date),
        (405, "wDividendRecDate", FieldType::Date),
        (406, "wDividendCurrency", FieldType::String),
        (407, "wSharesOut", FieldType::U64),
        (408, "wSharesFloat", FieldType::U64),
        (409, "wSharesAuth", FieldType::U64),
        (410, "wEarnPerShare", FieldType::F64),
        (411, "wVolatility", FieldType::F64),
        (412, "wPriceEarnRatio", FieldType::F64),
        (413, "wYield", FieldType::F64),
        (414, "wMrktSegment", FieldType::String),
        (415, "wMrktSector", FieldType::String),
        (416, "wMrktSegmNative", FieldType::String),
        (417, "wMrktSectNative", FieldType::String),
        (418, "wHistVolatility", FieldType::F64),
        (419, "wRiskFreeRate", FieldType::F64),
    ]
}

/// The shared schema dictionary.
pub(crate) fn dictionary() -> Dictionary {
    Dictionary::from_entries(entries())
}

/// Fid of a field in the shared dictionary.
pub(crate) fn fid(name: &str) -> u16 {
    entries()
        .iter()
        .find(|(_, n, _)| *n == name)
        .unwrap_or_else(|| panic!("unknown test field {name}"))
        .0
}

/// Resolve every listener type's field set against the shared dictionary.
/// Idempotent, so any test can call it first.
pub(crate) fn resolve_all_fields() {
    let dict = dictionary();
    QuoteFields::set_dictionary(&dict, None);
    TradeFields::set_dictionary(&dict, None);
    SecurityStatusFields::set_dictionary(&dict, None);
    AuctionFields::set_dictionary(&dict, None);
    OrderImbalanceFields::set_dictionary(&dict, None);
    FundamentalFields::set_dictionary(&dict, None);
}

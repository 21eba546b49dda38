// ============================================================================
// Quote Ticker Example
// ============================================================================

use mamda::prelude::*;
use rust_decimal::Decimal;

struct QuoteTicker;

impl QuoteHandler for QuoteTicker {
    fn on_quote_recap(&mut self, sub: &SubscriptionInfo, _msg: &Msg, recap: &QuoteCache) {
        println!(
            "{}: recap bid {} x {}  ask {} x {}",
            sub.symbol(),
            recap.bid_price.get(),
            recap.bid_size.get(),
            recap.ask_price.get(),
            recap.ask_size.get(),
        );
    }

    fn on_quote_update(&mut self, sub: &SubscriptionInfo, _msg: &Msg, quote: &QuoteCache) {
        let changed = |modified: bool| if modified { "*" } else { " " };
        println!(
            "{}: quote bid {}{} x {}{}  ask {}{} x {}{}  mid {:?}",
            sub.symbol(),
            quote.bid_price.get(),
            changed(quote.bid_price.is_modified()),
            quote.bid_size.get(),
            changed(quote.bid_size.is_modified()),
            quote.ask_price.get(),
            changed(quote.ask_price.is_modified()),
            quote.ask_size.get(),
            changed(quote.ask_size.is_modified()),
            quote.mid_price(),
        );
    }

    fn on_quote_gap(&mut self, sub: &SubscriptionInfo, _msg: &Msg, gap: SeqGap, _recap: &QuoteCache) {
        println!("{}: gap, quotes {}..={} missed", sub.symbol(), gap.begin, gap.end);
    }
}

fn main() {
    #[cfg(feature = "logging")]
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== Quote Ticker Example ===\n");

    // The transport layer would supply the dictionary; synthesized here.
    let dictionary = Dictionary::from_entries([
        (101u16, "wSymbol", FieldType::String),
        (120, "wBidPrice", FieldType::Price),
        (121, "wBidSize", FieldType::F64),
        (130, "wAskPrice", FieldType::Price),
        (131, "wAskSize", FieldType::F64),
        (145, "wQuoteCount", FieldType::U64),
    ]);
    QuoteFields::set_dictionary(&dictionary, None);

    let mut listener = QuoteListener::new();
    listener.add_handler(Box::new(QuoteTicker));

    let mut subscription = Subscription::new("FEED", "IBM.N");
    subscription.add_msg_listener(Box::new(listener));
    subscription.activate();

    // Initial image, then deltas, then a quote-count gap.
    let messages = vec![
        Msg::new(MsgType::Initial)
            .with_field(101, "IBM.N")
            .with_field(120, Decimal::new(1005, 1))
            .with_field(121, 300.0)
            .with_field(130, Decimal::new(1007, 1))
            .with_field(131, 200.0)
            .with_field(145, 1u64),
        Msg::new(MsgType::Quote)
            .with_field(120, Decimal::new(1006, 1))
            .with_field(145, 2u64),
        Msg::new(MsgType::Quote)
            .with_field(131, 500.0)
            .with_field(145, 3u64),
        // Count jumps: quotes 4..=5 were conflated away upstream.
        Msg::new(MsgType::Quote)
            .with_field(120, Decimal::new(1008, 1))
            .with_field(145, 6u64),
    ];

    for msg in &messages {
        if let Err(err) = subscription.process_msg(msg) {
            eprintln!("message dropped: {err}");
        }
    }

    println!("\ndone");
}

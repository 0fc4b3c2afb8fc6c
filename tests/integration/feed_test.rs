//! Decoding and subscription planning through the public API

use depth_ingest::data::{OrderSide, Side};
use depth_ingest::feed::{DepthDecoder, FeedDecoder, LiquidationDecoder};
use depth_ingest::shard::partition;
use depth_ingest::universe::{StaticUniverse, Symbol, SymbolUniverse};
use depth_ingest::ws::WsConnector;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_universe_to_subscription_urls() {
    let universe = StaticUniverse::new(["xrpusdt", "BTCUSDT", "ethusdt", "SOLUSDT", "BTCUSDT"]);
    let symbols = universe.discover().await.unwrap();
    assert_eq!(symbols.len(), 4);

    let shards = partition(&symbols, 3);
    assert_eq!(shards.len(), 2);
    assert_eq!(shards[0].id, 0);
    assert_eq!(shards[1].symbols, vec![Symbol::new("XRPUSDT")]);

    let decoder = DepthDecoder::default();
    let connector = WsConnector::with_url("wss://fstream.binance.com");
    assert_eq!(
        connector.stream_url(&decoder.topics(&shards[0].symbols)),
        "wss://fstream.binance.com/stream?streams=btcusdt@depth20@100ms/ethusdt@depth20@100ms/solusdt@depth20@100ms"
    );
}

#[test]
fn test_depth_decoding_skips_bad_levels_and_truncates() {
    let decoder = DepthDecoder::new(2, "depth20@100ms");
    let msg = r#"{"stream":"ethusdt@depth20@100ms","data":{"E":1704067200000,"s":"ETHUSDT","b":[["2300.1","1"],["oops","2"],["2299.9","3"],["2299.8","4"]],"a":[[2300.2, 0.5]]}}"#;

    let rows = decoder.decode(msg).unwrap();
    let bids: Vec<_> = rows.iter().filter(|r| r.side == Side::Bid).collect();
    let asks: Vec<_> = rows.iter().filter(|r| r.side == Side::Ask).collect();

    // second level is malformed; rank 2 is absent rather than renumbered
    assert_eq!(bids.len(), 1);
    assert_eq!(bids[0].depth_rank, 1);
    assert_eq!(bids[0].price, dec!(2300.1));
    assert_eq!(asks.len(), 1);
    assert_eq!(asks[0].quantity, dec!(0.5));
}

#[test]
fn test_decoders_ignore_subscription_acks() {
    let ack = r#"{"result":null,"id":1}"#;
    assert!(DepthDecoder::default().decode(ack).unwrap().is_empty());
    assert!(LiquidationDecoder::new().decode(ack).unwrap().is_empty());
}

#[test]
fn test_malformed_messages_are_errors() {
    let decoder = DepthDecoder::default();
    assert!(decoder.decode("not json").is_err());
    assert!(decoder
        .decode(r#"{"stream":"btcusdt@depth20@100ms","data":{"s":"BTCUSDT","b":[],"a":[]}}"#)
        .is_err());
}

#[test]
fn test_liquidation_decoding() {
    let msg = r#"{"e":"forceOrder","E":1704067200123,"o":{"s":"btcusdt","S":"SELL","o":"LIMIT","X":"FILLED","p":"42000.1","ap":"","q":"0.014"}}"#;
    let rows = LiquidationDecoder::new().decode(msg).unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].symbol, "BTCUSDT");
    assert_eq!(rows[0].side, OrderSide::Sell);
    assert_eq!(rows[0].avg_price, dec!(0));
    assert_eq!(rows[0].event_time.timestamp_millis(), 1704067200123);
}

//! Engine scenarios over the scripted connector and in-memory store

use crate::support::{depth_message, malformed, ScriptedConnector, Step};
use chrono::Utc;
use depth_ingest::data::{DepthRow, LiquidationRow, Record};
use depth_ingest::engine::{
    Engine, EngineConfig, FlushConfig, PipelineConfig, RetentionConfig, RetentionJob,
    WatchdogConfig,
};
use depth_ingest::store::{MemoryStore, Store};
use depth_ingest::telemetry::IngestStats;
use depth_ingest::universe::Symbol;
use depth_ingest::worker::{Backoff, BackoffConfig, WorkerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const T0: i64 = 1_704_067_200_000;

fn config(flush_interval: Duration, backoff: BackoffConfig) -> EngineConfig {
    EngineConfig {
        shard_size: 2,
        liquidations_enabled: false,
        pipeline: PipelineConfig {
            worker: WorkerConfig {
                recv_timeout: Duration::from_secs(1),
                backoff,
            },
            flush: FlushConfig {
                interval: flush_interval,
                ..FlushConfig::default()
            },
            watchdog: WatchdogConfig::default(),
            retention: RetentionConfig::default(),
        },
        ..EngineConfig::default()
    }
}

fn symbols() -> Vec<Symbol> {
    ["BTCUSDT", "ETHUSDT", "SOLUSDT", "XRPUSDT"]
        .into_iter()
        .map(Symbol::new)
        .collect()
}

/// Five valid messages alternating over a shard's two symbols, one malformed
fn shard_session(a: &str, b: &str) -> Vec<Step> {
    let mut steps: Vec<Step> = (0..5)
        .map(|i| depth_message(if i % 2 == 0 { a } else { b }, T0 + i * 100))
        .collect();
    steps.insert(2, malformed());
    steps
}

#[tokio::test(start_paused = true)]
async fn test_sharded_ingest_persists_exactly_valid_rows() {
    let connector = Arc::new(ScriptedConnector::new());
    // symbols are sorted: [BTCUSDT, ETHUSDT] [SOLUSDT, XRPUSDT]
    connector
        .script("btcusdt@depth20@100ms", shard_session("BTCUSDT", "ETHUSDT"))
        .script("solusdt@depth20@100ms", shard_session("SOLUSDT", "XRPUSDT"));
    let store = Arc::new(MemoryStore::new());

    let engine = Engine::new(
        connector,
        store.clone(),
        config(Duration::from_secs(1), BackoffConfig::default()),
    );
    let handle = engine.start(&symbols());
    assert_eq!(handle.pipeline("depth").map(|p| p.shard_count()), Some(2));

    tokio::time::sleep(Duration::from_secs(3)).await;

    // flushed on cadence, before shutdown
    assert_eq!(store.row_count(DepthRow::TABLE), 30);

    let depth = handle.pipeline("depth").unwrap();
    let stats = depth.stats();
    assert_eq!(stats.messages_received, 12);
    assert_eq!(stats.decode_errors, 2);
    assert_eq!(stats.rows_appended, 30);
    assert_eq!(stats.rows_flushed, 30);
    assert!(depth.watermarks().iter().all(|w| w.get().is_some()));

    handle.shutdown().await;
    assert_eq!(store.row_count(DepthRow::TABLE), 30);

    let rows = store.rows(DepthRow::TABLE);
    let ranks: Vec<u64> = rows
        .iter()
        .filter(|r| r["symbol"] == "BTCUSDT" && r["side"] == "BID")
        .map(|r| r["depth_rank"].as_u64().unwrap())
        .collect();
    assert_eq!(ranks.len(), 6);
    assert!(ranks.iter().all(|r| *r == 1 || *r == 2));
}

#[tokio::test]
async fn test_forced_close_reconnects_within_backoff() {
    let floor = Duration::from_millis(200);
    let backoff = BackoffConfig {
        floor,
        ceiling: Duration::from_secs(2),
        jitter_factor: 0.2,
    };
    let topic = "btcusdt@depth20@100ms";

    let connector = Arc::new(ScriptedConnector::new());
    connector
        .script(
            topic,
            vec![
                depth_message("BTCUSDT", T0),
                Step::Wait(Duration::from_millis(50)),
                Step::Close,
            ],
        )
        .script(topic, vec![depth_message("BTCUSDT", T0 + 1_000)]);
    let store = Arc::new(MemoryStore::new());

    let mut engine_config = config(Duration::from_millis(100), backoff.clone());
    engine_config.shard_size = 50;
    let engine = Engine::new(connector.clone(), store.clone(), engine_config);
    let handle = engine.start(&[Symbol::new("BTCUSDT")]);

    tokio::time::sleep(Duration::from_millis(30)).await;
    let first_mark = handle.pipeline("depth").unwrap().watermarks()[0]
        .get()
        .expect("first message decoded");

    tokio::time::sleep(Duration::from_millis(600)).await;

    let connects = connector.connects(topic);
    assert_eq!(connects.len(), 2);
    let gap = connects[1] - connects[0];
    let bound = Backoff::new(backoff).max_jittered(floor) + Duration::from_millis(50 + 100);
    assert!(gap <= bound, "reconnected after {gap:?}, bound {bound:?}");

    let depth = handle.pipeline("depth").unwrap();
    let second_mark = depth.watermarks()[0].get().unwrap();
    assert!(second_mark > first_mark);
    assert_eq!(depth.stats().reconnects, 1);

    handle.shutdown().await;
    assert_eq!(store.row_count(DepthRow::TABLE), 6);
}

#[tokio::test(start_paused = true)]
async fn test_store_rejections_drop_batch_and_flusher_keeps_ticking() {
    let topic = "btcusdt@depth20@100ms";
    let connector = Arc::new(ScriptedConnector::new());
    connector.script(
        topic,
        vec![
            depth_message("BTCUSDT", T0),
            Step::Wait(Duration::from_millis(900)),
            Step::Wait(Duration::from_millis(900)),
            Step::Wait(Duration::from_millis(900)),
            depth_message("BTCUSDT", T0 + 1_000),
        ],
    );
    let store = Arc::new(MemoryStore::new());
    store.fail_next_writes(3);

    let engine = Engine::new(
        connector,
        store.clone(),
        config(Duration::from_secs(1), BackoffConfig::default()),
    );
    let handle = engine.start(&[Symbol::new("BTCUSDT")]);

    tokio::time::sleep(Duration::from_secs(5)).await;

    let stats = handle.pipeline("depth").unwrap().stats();
    assert_eq!(stats.batches_dropped, 1);
    assert_eq!(stats.rows_dropped, 3);
    assert_eq!(stats.rows_flushed, 3);
    assert!(store.write_attempts() >= 4);

    // only the second message survived
    let times = store.event_times(DepthRow::TABLE);
    assert_eq!(times.len(), 3);
    assert!(times.iter().all(|t| t.timestamp_millis() == T0 + 1_000));

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_drains_buffer() {
    let topic = "btcusdt@depth20@100ms";
    let connector = Arc::new(ScriptedConnector::new());
    connector.script(
        topic,
        (0..4).map(|i| depth_message("BTCUSDT", T0 + i)).collect(),
    );
    let store = Arc::new(MemoryStore::new());

    let engine = Engine::new(
        connector,
        store.clone(),
        config(Duration::from_secs(3600), BackoffConfig::default()),
    );
    let handle = engine.start(&[Symbol::new("BTCUSDT")]);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(store.row_count(DepthRow::TABLE), 0);
    assert_eq!(handle.pipeline("depth").unwrap().buffered_rows(), 12);

    let shutdown = CancellationToken::new();
    shutdown.cancel();
    handle.run_until(shutdown).await;

    assert_eq!(store.row_count(DepthRow::TABLE), 12);
}

#[tokio::test(start_paused = true)]
async fn test_liquidation_pipeline_ingests_force_orders() {
    let connector = Arc::new(ScriptedConnector::new());
    connector
        .script("btcusdt@depth20@100ms", vec![depth_message("BTCUSDT", T0)])
        .script(
            "!forceOrder@arr",
            vec![Step::Text(format!(
                r#"{{"stream":"!forceOrder@arr","data":{{"e":"forceOrder","E":{},"o":{{"s":"ETHUSDT","S":"BUY","o":"LIMIT","X":"FILLED","p":"2300.5","ap":"2301","q":"4.2"}}}}}}"#,
                T0
            ))],
        );
    let store = Arc::new(MemoryStore::new());

    let mut engine_config = config(Duration::from_secs(1), BackoffConfig::default());
    engine_config.liquidations_enabled = true;
    let engine = Engine::new(connector, store.clone(), engine_config);
    let handle = engine.start(&[Symbol::new("BTCUSDT")]);

    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.shutdown().await;

    assert_eq!(store.row_count(DepthRow::TABLE), 3);
    let liquidations = store.rows(LiquidationRow::TABLE);
    assert_eq!(liquidations.len(), 1);
    assert_eq!(liquidations[0]["symbol"], "ETHUSDT");
    assert_eq!(liquidations[0]["side"], "BUY");
}

#[tokio::test]
async fn test_retention_removes_rows_past_horizon() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    let rows: Vec<DepthRow> = [8 * 24, 7 * 24 + 1, 6 * 24, 1]
        .iter()
        .enumerate()
        .map(|(i, hours_ago)| DepthRow {
            symbol: "BTCUSDT".to_string(),
            side: depth_ingest::data::Side::Ask,
            price: rust_decimal_macros::dec!(1),
            quantity: rust_decimal_macros::dec!(1),
            depth_rank: i as u16 + 1,
            event_time: now - chrono::Duration::hours(*hours_ago),
        })
        .collect();
    store.upsert(&rows).await.unwrap();

    let job = RetentionJob::new(
        "depth",
        DepthRow::TABLE,
        store.clone(),
        Arc::new(IngestStats::new()),
        RetentionConfig::default(),
    );

    // 8 days and 7 days + 1 hour are past a 7 day horizon
    assert_eq!(job.run_once(now).await.unwrap(), 2);
    assert_eq!(store.row_count(DepthRow::TABLE), 2);
    assert_eq!(job.run_once(now).await.unwrap(), 0);
}

//! End-to-end estimation tests against the mock feed.

mod integration;
use integration::common::book_message;
use integration::common::mock_ws::{MockFeedServer, Script};

use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tradesim_app::{AppConfig, AppError, Application};
use tradesim_core::EstimationResult;
use tradesim_estimator::FeedStatus;

type Delivered = Arc<Mutex<Vec<EstimationResult>>>;

fn config_for(server: &MockFeedServer) -> AppConfig {
    let mut config = AppConfig::default();
    config.feed.url_template = server.url_template();
    config.feed.connect_timeout_ms = 2_000;
    config.feed.reopen_base_delay_ms = 0;
    config.feed.reopen_max_delay_ms = 0;
    config
}

/// Application whose sink records results and stops the run after `stop_after`.
fn app_with_recorder(config: AppConfig, stop_after: usize) -> (Application, Delivered) {
    let delivered: Delivered = Arc::new(Mutex::new(Vec::new()));
    let token = CancellationToken::new();

    let sink_results = Arc::clone(&delivered);
    let sink_token = token.clone();
    let sink = move |result: &EstimationResult| {
        let mut results = sink_results.lock().unwrap();
        results.push(result.clone());
        if results.len() >= stop_after {
            sink_token.cancel();
        }
    };

    let app = Application::with_sink(config, Box::new(sink), token).unwrap();
    (app, delivered)
}

#[tokio::test]
async fn test_market_order_estimates_until_shutdown() {
    let ack = r#"{"event":"subscribe","arg":{"channel":"books","instId":"BTC-USDT-SWAP"}}"#;
    let mut messages = vec![ack.to_string()];
    messages.extend((1..=3).map(|i| book_message(i, "100.0", "101.0")));
    messages.push("not json".to_string());
    messages.push(book_message(4, "100.0", "101.0"));

    let server = MockFeedServer::start(Script::new(messages)).await;
    let (mut app, delivered) = app_with_recorder(config_for(&server), 4);

    timeout(Duration::from_secs(5), app.run())
        .await
        .expect("run did not stop")
        .unwrap();

    let results = delivered.lock().unwrap();
    assert_eq!(results.len(), 4);
    for result in results.iter() {
        assert_eq!(result.maker_taker_split(), "0/100");
        assert_eq!(result.fee, Some(dec!(0.1)));
        assert!(!result.is_partial());
    }
    assert_eq!(results[0].latency_ms, dec!(0));

    let stats = app.pipeline().stats();
    assert_eq!(stats.processed, 4);
    assert_eq!(stats.malformed, 1);
    assert_eq!(stats.control, 1);
    assert_eq!(*app.pipeline().status(), FeedStatus::Closed);

    server.shutdown().await;
}

#[tokio::test]
async fn test_no_delivery_after_sink_requests_shutdown() {
    let messages = (1..=20).map(|i| book_message(i, "100.0", "101.0")).collect();
    let server = MockFeedServer::start(Script::new(messages)).await;
    let (mut app, delivered) = app_with_recorder(config_for(&server), 2);

    timeout(Duration::from_secs(5), app.run())
        .await
        .expect("run did not stop")
        .unwrap();

    assert_eq!(delivered.lock().unwrap().len(), 2);
    assert_eq!(app.pipeline().stats().processed, 2);

    server.shutdown().await;
}

#[tokio::test]
async fn test_feed_reopened_after_server_close() {
    // Three connections each play one snapshot and close; the fourth is refused.
    let server = MockFeedServer::start(
        Script::new(vec![book_message(1, "100.0", "101.0")])
            .closing()
            .accept_limit(3),
    )
    .await;
    let mut config = config_for(&server);
    config.feed.max_reopen_attempts = 2;
    let (mut app, delivered) = app_with_recorder(config, usize::MAX);

    let err = timeout(Duration::from_secs(5), app.run())
        .await
        .expect("run did not stop")
        .unwrap_err();

    // Successful opens reset the budget; only the refused connects count.
    assert!(matches!(err, AppError::FeedLost { attempts: 2, .. }), "{err:?}");
    assert_eq!(server.connection_count().await, 3);
    assert_eq!(delivered.lock().unwrap().len(), 3);
    // Classifier samples survive reopening.
    assert_eq!(app.pipeline().classifier().samples_seen(), 3);

    server.shutdown().await;
}

#[tokio::test]
async fn test_no_reopen_when_disabled() {
    let server = MockFeedServer::start(Script::default().closing()).await;
    let mut config = config_for(&server);
    config.feed.max_reopen_attempts = 0;
    let (mut app, delivered) = app_with_recorder(config, usize::MAX);

    let err = timeout(Duration::from_secs(5), app.run())
        .await
        .expect("run did not stop")
        .unwrap_err();

    assert!(matches!(err, AppError::FeedLost { attempts: 0, .. }));
    assert_eq!(server.connection_count().await, 1);
    assert!(delivered.lock().unwrap().is_empty());

    server.shutdown().await;
}

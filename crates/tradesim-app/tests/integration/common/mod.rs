pub mod mock_ws;

/// Two-level book in the flat `bids`/`asks` shape.
pub fn book_message(ts: i64, best_bid: &str, best_ask: &str) -> String {
    serde_json::json!({
        "ts": ts.to_string(),
        "bids": [[best_bid, "1.0"], ["99.5", "2.0"]],
        "asks": [[best_ask, "1.5"], ["101.5", "1.5"]],
    })
    .to_string()
}

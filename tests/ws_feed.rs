use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use tick_feed::feed::{Broadcaster, Channel, Scheduler};
use tick_feed::market::{CatalogRecord, Registry};
use tick_feed::server::{self, AppState};
use tick_feed::sim::PriceSimulator;

const TICK: Duration = Duration::from_millis(50);
const WAIT: Duration = Duration::from_secs(5);

async fn start(instruments: &[(&str, f64)]) -> (SocketAddr, Arc<Broadcaster>) {
    let records = instruments
        .iter()
        .map(|(symbol, price)| CatalogRecord { symbol: symbol.to_string(), price: *price })
        .collect();
    let registry = Registry::from_records(records).unwrap();
    let broadcaster = Arc::new(Broadcaster::new(registry.instruments().into(), 64).unwrap());
    Scheduler::new(PriceSimulator::new(registry, Some(2024)), Arc::clone(&broadcaster), TICK).spawn();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server::serve(listener, AppState::new(Arc::clone(&broadcaster)), std::future::pending()));
    (addr, broadcaster)
}

async fn next_json<S>(ws: &mut S) -> Value
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let msg = timeout(WAIT, ws.next()).await.expect("timed out").expect("stream ended").unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn prices_start_with_full_snapshot() {
    let (addr, _) = start(&[("AAPL", 180.0), ("TSLA", 250.0), ("NVDA", 900.0)]).await;
    let (mut ws, _) = connect_async(format!("ws://{addr}/ws/prices")).await.unwrap();

    let first = next_json(&mut ws).await;
    let entries = first.as_array().unwrap();
    assert_eq!(entries.len(), 3);
    for entry in entries {
        for key in ["symbol", "price", "amountChange", "change"] {
            assert!(entry.get(key).is_some(), "missing {key} in {entry}");
        }
    }
}

#[tokio::test]
async fn prices_then_stream_only_changed_instruments() {
    let (addr, _) = start(&[("A", 100.0), ("B", 100.0), ("C", 100.0), ("D", 100.0)]).await;
    let (mut ws, _) = connect_async(format!("ws://{addr}/ws/prices")).await.unwrap();
    next_json(&mut ws).await;

    for _ in 0..5 {
        let tick = next_json(&mut ws).await;
        let quotes = tick.as_array().unwrap();
        assert!(!quotes.is_empty() && quotes.len() <= 2, "got {} quotes", quotes.len());
        for quote in quotes {
            let price = quote["price"].as_f64().unwrap();
            assert!((90.0..=110.0).contains(&price), "price {price}");
        }
    }
}

#[tokio::test]
async fn order_book_every_interval() {
    let (addr, _) = start(&[("A", 10.0)]).await;
    let (mut ws, _) = connect_async(format!("ws://{addr}/ws/orderbook")).await.unwrap();

    for _ in 0..3 {
        let book = next_json(&mut ws).await;
        let buy = book["buy"].as_array().unwrap();
        let sell = book["sell"].as_array().unwrap();
        assert_eq!(buy.len(), 5);
        assert_eq!(sell.len(), 5);
        for level in buy {
            let price = level["price"].as_f64().unwrap();
            assert!((50.0..150.0).contains(&price));
        }
        for level in sell {
            let price = level["price"].as_f64().unwrap();
            assert!((150.0..250.0).contains(&price));
            let volume = level["volume"].as_u64().unwrap();
            assert!((1..=1000).contains(&volume));
        }
    }
}

#[tokio::test]
async fn unknown_ws_path_is_rejected() {
    let (addr, broadcaster) = start(&[("A", 10.0)]).await;
    let result = connect_async(format!("ws://{addr}/ws/unknown")).await;
    assert!(result.is_err());
    assert_eq!(broadcaster.subscriber_count(Channel::Prices), 0);
    assert_eq!(broadcaster.subscriber_count(Channel::OrderBook), 0);
}

#[tokio::test]
async fn disconnect_leaves_channel() {
    let (addr, broadcaster) = start(&[("A", 10.0)]).await;
    let (mut ws, _) = connect_async(format!("ws://{addr}/ws/orderbook")).await.unwrap();
    next_json(&mut ws).await;
    assert_eq!(broadcaster.subscriber_count(Channel::OrderBook), 1);

    let _ = ws.close(None).await;
    drop(ws);

    timeout(WAIT, async {
        while broadcaster.subscriber_count(Channel::OrderBook) != 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("subscriber still registered");
}

#[tokio::test]
async fn stock_info_lists_catalog() {
    let (addr, _) = start(&[("AAPL", 180.0), ("MSFT", 410.0)]).await;
    let body: Value = reqwest::get(format!("http://{addr}/stockInfo")).await.unwrap().json().await.unwrap();
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["symbol"], "AAPL");
    assert_eq!(entries[0]["basePrice"], 180.0);
    assert!(entries[1]["price"].is_number());
}

#[tokio::test]
async fn root_answers_with_text() {
    let (addr, _) = start(&[("A", 10.0)]).await;
    let response = reqwest::get(format!("http://{addr}/")).await.unwrap();
    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), server::routes::ROOT_TEXT);
}

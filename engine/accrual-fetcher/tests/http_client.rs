//! HttpAccrualClient against a local warp server standing in for the accrual system

use accrual_fetcher::{AccrualClient, AccrualError, AccrualStatus, FetcherConfig, HttpAccrualClient};
use ledger_store::Decimal;
use std::net::SocketAddr;
use std::time::Duration;
use warp::http::{Response, StatusCode};
use warp::Filter;

fn reply(status: u16, body: &'static str) -> Response<String> {
    let mut builder = Response::builder()
        .status(StatusCode::from_u16(status).unwrap())
        .header("content-type", "application/json");
    if status == 429 {
        builder = builder.header("retry-after", "60");
    }
    builder.body(body.to_string()).unwrap()
}

/// Serve canned answers keyed by order number; returns `host:port`
async fn spawn_accrual_server() -> SocketAddr {
    let route = warp::path!("api" / "orders" / String).and(warp::get()).map(|order: String| {
        match order.as_str() {
            "4561261212345467" => {
                reply(200, r#"{"order":"4561261212345467","status":"PROCESSED","accrual":500}"#)
            }
            "2377225624" => reply(200, r#"{"order":"2377225624","status":"REGISTERED"}"#),
            "12345678903" => reply(204, ""),
            "79927398713" => reply(429, "No more than N requests per minute allowed"),
            "49927398716" => reply(200, "{not json"),
            "1234567812345670" => reply(200, r#"{"order":"1","status":"INVALID"}"#),
            "371449635398431" => reply(200, r#"{"order":"371449635398431","status":"PROCESSED"}"#),
            _ => reply(500, ""),
        }
    });

    let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    addr
}

async fn client() -> HttpAccrualClient {
    let addr = spawn_accrual_server().await;
    let config = FetcherConfig {
        base_url: addr.to_string(),
        request_timeout_secs: 5,
        ..Default::default()
    };
    HttpAccrualClient::new(&config).unwrap()
}

#[tokio::test]
async fn test_fetch_processed() {
    let response = client().await.fetch_status("4561261212345467").await.unwrap();

    assert_eq!(response.status, AccrualStatus::Processed);
    assert_eq!(response.accrual, Some(Decimal::from(500)));
}

#[tokio::test]
async fn test_fetch_registered_without_accrual() {
    let response = client().await.fetch_status("2377225624").await.unwrap();

    assert_eq!(response.status, AccrualStatus::Registered);
    assert_eq!(response.accrual, None);
}

#[tokio::test]
async fn test_error_responses() {
    let client = client().await;

    let err = client.fetch_status("12345678903").await.unwrap_err();
    assert!(matches!(err, AccrualError::NotRegistered));

    let err = client.fetch_status("79927398713").await.unwrap_err();
    match err {
        AccrualError::RateLimited { retry_after } => {
            assert_eq!(retry_after, Some(Duration::from_secs(60)))
        }
        other => panic!("expected rate limit, got {other:?}"),
    }

    let err = client.fetch_status("0").await.unwrap_err();
    assert!(matches!(err, AccrualError::UnexpectedStatus(500)));

    let err = client.fetch_status("49927398716").await.unwrap_err();
    assert!(matches!(err, AccrualError::Decode(_)));

    let err = client.fetch_status("1234567812345670").await.unwrap_err();
    assert!(matches!(err, AccrualError::OrderMismatch { .. }));

    let err = client.fetch_status("371449635398431").await.unwrap_err();
    assert!(matches!(err, AccrualError::MissingAccrual { .. }));
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let config = FetcherConfig {
        // Port 9 (discard) is not expected to be listening locally
        base_url: "127.0.0.1:9".to_string(),
        request_timeout_secs: 2,
        ..Default::default()
    };
    let client = HttpAccrualClient::new(&config).unwrap();

    let err = client.fetch_status("4561261212345467").await.unwrap_err();
    assert!(matches!(err, AccrualError::Transport(_)));
}

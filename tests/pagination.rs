//! End-to-end pagination against a local mock server: walks every page of
//! a `{data[], next_cursor}` endpoint until the server signals exhaustion.

use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;

use clobber::rest::Trade;

#[tokio::test]
async fn paginate_walks_pages_until_cursor_end() {
    let server = MockServer::start();

    let page1 = server.mock(|when, then| {
        when.method(GET).path("/trades").query_param("next_cursor", "MA==");
        then.status(200).json_body(json!({
            "data": [
                {"id": "t1", "market": "m", "price": "0.50", "size": "10", "side": "BUY"},
                {"id": "t2", "market": "m", "price": "0.51", "size": "5", "side": "SELL"},
            ],
            "next_cursor": "X",
        }));
    });
    let page2 = server.mock(|when, then| {
        when.method(GET).path("/trades").query_param("next_cursor", "X");
        then.status(200).json_body(json!({
            "data": [
                {"id": "t3", "market": "m", "price": "0.52", "size": "7", "side": "BUY"},
            ],
            "next_cursor": "LTE=",
        }));
    });

    let pipeline = clobber::http::Pipeline::new(
        server.base_url(),
        "clobber-test/0.1",
        Duration::from_secs(5),
        None,
        None,
        None,
    )
    .unwrap();

    let trades: Vec<Trade> = pipeline.paginate("/trades", &[], false).await.unwrap();

    page1.assert();
    page2.assert();
    assert_eq!(trades.len(), 3);
    assert_eq!(trades[0].id, "t1");
    assert_eq!(trades[1].id, "t2");
    assert_eq!(trades[2].id, "t3");
}

#[tokio::test]
async fn paginate_stops_on_empty_first_page() {
    let server = MockServer::start();

    let only_call = server.mock(|when, then| {
        when.method(GET).path("/trades").query_param("next_cursor", "MA==");
        then.status(200).json_body(json!({
            "data": [],
            "next_cursor": "LTE=",
        }));
    });

    let pipeline = clobber::http::Pipeline::new(
        server.base_url(),
        "clobber-test/0.1",
        Duration::from_secs(5),
        None,
        None,
        None,
    )
    .unwrap();

    let trades: Vec<Trade> = pipeline.paginate("/trades", &[], false).await.unwrap();

    only_call.assert();
    assert!(trades.is_empty());
}

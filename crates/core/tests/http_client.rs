use apewatch_core::ingest::{FeedError, FetchFailure, JsonSource, MentionFeedFetcher, RateLimitedHttpClient};
use httpmock::Method::GET;
use httpmock::MockServer;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn client(server: &MockServer, min_interval: Duration, timeout: Duration) -> RateLimitedHttpClient {
    RateLimitedHttpClient::new(&server.base_url(), min_interval, timeout).unwrap()
}

#[tokio::test]
async fn returns_parsed_json_on_success() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/filter/all-stocks/page/1");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"count": 1, "pages": 4, "currentPage": 1, "results": []}"#);
    });

    let c = client(&server, Duration::ZERO, Duration::from_secs(5));
    let body = c.fetch("/filter/all-stocks/page/1").await.unwrap();
    mock.assert();
    assert_eq!(body["pages"], 4);
}

#[tokio::test]
async fn non_success_status_is_fetch_failed() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/filter/all-stocks/page/1");
        then.status(503).body("upstream down");
    });

    let c = client(&server, Duration::ZERO, Duration::from_secs(5));
    let err = c.fetch("/filter/all-stocks/page/1").await.unwrap_err();
    mock.assert_calls(1);
    match err {
        FeedError::FetchFailed { url, cause } => {
            assert!(url.ends_with("/filter/all-stocks/page/1"));
            assert!(matches!(cause, FetchFailure::Status { status: 503 }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn invalid_json_body_is_fetch_failed() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/filter/all-crypto/page/1");
        then.status(200).body("<html>maintenance</html>");
    });

    let c = client(&server, Duration::ZERO, Duration::from_secs(5));
    let err = c.fetch("/filter/all-crypto/page/1").await.unwrap_err();
    assert!(matches!(
        err,
        FeedError::FetchFailed {
            cause: FetchFailure::Json(_),
            ..
        }
    ));
}

#[tokio::test]
async fn slow_response_times_out_as_fetch_failed() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/filter/all-stocks/page/1");
        then.status(200)
            .delay(Duration::from_secs(2))
            .body(r#"{"pages": 1, "results": []}"#);
    });

    let c = client(&server, Duration::ZERO, Duration::from_millis(200));
    let err = c.fetch("/filter/all-stocks/page/1").await.unwrap_err();
    assert!(matches!(
        err,
        FeedError::FetchFailed {
            cause: FetchFailure::Timeout(_),
            ..
        }
    ));
}

#[tokio::test]
async fn unreachable_host_is_fetch_failed() {
    // Port 9 (discard) on localhost is expected to refuse connections.
    let c = RateLimitedHttpClient::new("http://127.0.0.1:9", Duration::ZERO, Duration::from_secs(2)).unwrap();
    let err = c.fetch("/filter/all-stocks/page/1").await.unwrap_err();
    assert!(matches!(err, FeedError::FetchFailed { .. }));
}

#[tokio::test]
async fn paces_requests_even_after_a_failure() {
    let server = MockServer::start();
    let fail = server.mock(|when, then| {
        when.method(GET).path("/filter/all-stocks/page/1");
        then.status(500);
    });
    let ok = server.mock(|when, then| {
        when.method(GET).path("/filter/all-stocks/page/2");
        then.status(200).body(r#"{"pages": 2, "results": []}"#);
    });

    let min_interval = Duration::from_millis(400);
    let c = client(&server, min_interval, Duration::from_secs(5));

    let before_first = Instant::now();
    assert!(c.fetch("/filter/all-stocks/page/1").await.is_err());
    assert!(c.fetch("/filter/all-stocks/page/2").await.is_ok());
    assert!(before_first.elapsed() >= min_interval);

    fail.assert_calls(1);
    ok.assert_calls(1);
}

#[tokio::test]
async fn fetch_all_walks_every_page_over_http() {
    let server = MockServer::start();
    let page1 = server.mock(|when, then| {
        when.method(GET).path("/filter/wallstreetbets/page/1");
        then.status(200).body(
            r#"{"count": 3, "pages": 2, "currentPage": 1, "results": [
                {"rank": 1, "ticker": "GME", "name": "GameStop", "mentions": "310", "upvotes": "1200", "rank_24h_ago": "2", "mentions_24h_ago": "150"},
                {"rank": 2, "ticker": "AMC", "name": "AMC Entertainment", "mentions": 95, "upvotes": null, "rank_24h_ago": null, "mentions_24h_ago": null}
            ]}"#,
        );
    });
    let page2 = server.mock(|when, then| {
        when.method(GET).path("/filter/wallstreetbets/page/2");
        then.status(200).body(
            r#"{"count": 3, "pages": 2, "currentPage": 2, "results": [
                {"rank": 3, "ticker": "BB", "name": "BlackBerry", "mentions": "40", "upvotes": "7", "rank_24h_ago": "n/a", "mentions_24h_ago": "41"}
            ]}"#,
        );
    });

    let c = client(&server, Duration::from_millis(50), Duration::from_secs(5));
    let fetcher = MentionFeedFetcher::new(Arc::new(c));
    let all = fetcher.fetch_all("wallstreetbets").await.unwrap();

    page1.assert_calls(1);
    page2.assert_calls(1);
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].mentions, 310);
    assert_eq!(all[0].mention_change(), Some(160));
    assert_eq!(all[1].upvotes, 0);
    assert_eq!(all[2].rank_24h_ago, None);
    assert_eq!(all[2].mentions_24h_ago, Some(41));
}

//! Retry behavior of the page fetcher

use crate::common::{RecordingSleeper, RETRY_DELAY};
use stall_scraper::crawler::{AttemptFailure, FetchError, FetchSettings, Fetcher};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings() -> FetchSettings {
    FetchSettings {
        max_retries: 3,
        retry_delay: RETRY_DELAY,
        request_timeout: Duration::from_secs(2),
        retry_statuses: vec![408, 429],
        user_agent: "TestScraper/1.0".to_string(),
    }
}

#[tokio::test]
async fn test_succeeds_after_two_failures() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/shop/"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/shop/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let sleeper = RecordingSleeper::new();
    let fetcher = Fetcher::new(settings(), None, sleeper.clone()).unwrap();

    let body = fetcher
        .fetch(&format!("{}/shop/", mock_server.uri()))
        .await
        .expect("third attempt should succeed");

    assert_eq!(body, "<html>ok</html>");
    assert_eq!(sleeper.delays(), vec![RETRY_DELAY, RETRY_DELAY]);
}

#[tokio::test]
async fn test_exhausted_retries_report_last_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let sleeper = RecordingSleeper::new();
    let fetcher = Fetcher::new(settings(), None, sleeper.clone()).unwrap();

    let result = fetcher.fetch(&format!("{}/shop/", mock_server.uri())).await;

    match result {
        Err(FetchError::Exhausted { attempts, last, .. }) => {
            assert_eq!(attempts, 3);
            assert!(matches!(last, AttemptFailure::Status(503)));
        }
        other => panic!("expected exhausted retries, got {:?}", other),
    }

    // No delay after the final attempt
    assert_eq!(sleeper.delays().len(), 2);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let sleeper = RecordingSleeper::new();
    let fetcher = Fetcher::new(settings(), None, sleeper.clone()).unwrap();

    let result = fetcher.fetch(&format!("{}/shop/", mock_server.uri())).await;

    assert!(matches!(result, Err(FetchError::Rejected { status: 404, .. })));
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_configured_4xx_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("later"))
        .mount(&mock_server)
        .await;

    let sleeper = RecordingSleeper::new();
    let fetcher = Fetcher::new(settings(), None, sleeper.clone()).unwrap();

    let body = fetcher
        .fetch(&format!("{}/shop/", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(body, "later");
    assert_eq!(sleeper.delays(), vec![RETRY_DELAY]);
}

#[tokio::test]
async fn test_connection_refused_exhausts_retries() {
    // Grab a free port and release it so nothing is listening there
    let uri = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };

    let sleeper = RecordingSleeper::new();
    let fetcher = Fetcher::new(settings(), None, sleeper.clone()).unwrap();

    let result = fetcher.fetch(&format!("{}/shop/", uri)).await;

    match result {
        Err(FetchError::Exhausted { attempts, last, .. }) => {
            assert_eq!(attempts, 3);
            assert!(matches!(last, AttemptFailure::Transport(_)));
        }
        other => panic!("expected exhausted retries, got {:?}", other),
    }
    assert_eq!(sleeper.delays(), vec![RETRY_DELAY, RETRY_DELAY]);
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("too late")
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&mock_server)
        .await;

    let mut settings = settings();
    settings.max_retries = 1;
    settings.request_timeout = Duration::from_millis(100);

    let sleeper = RecordingSleeper::new();
    let fetcher = Fetcher::new(settings, None, sleeper.clone()).unwrap();

    let result = fetcher.fetch(&format!("{}/shop/", mock_server.uri())).await;

    match result {
        Err(FetchError::Exhausted {
            attempts: 1,
            last: AttemptFailure::Transport(e),
            ..
        }) => assert!(e.is_timeout()),
        other => panic!("expected a timeout, got {:?}", other),
    }
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_requests_go_through_proxy() {
    let proxy = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("via proxy"))
        .expect(1)
        .mount(&proxy)
        .await;

    let sleeper = RecordingSleeper::new();
    let fetcher = Fetcher::new(settings(), Some(&proxy.uri()), sleeper).unwrap();

    // The host does not resolve; only the proxy can answer
    let body = fetcher
        .fetch("http://shop.invalid/shop/")
        .await
        .expect("proxy should serve the request");

    assert_eq!(body, "via proxy");
}

#[tokio::test]
async fn test_fetch_bytes_is_single_attempt() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/img/a.jpg"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let sleeper = RecordingSleeper::new();
    let fetcher = Fetcher::new(settings(), None, sleeper.clone()).unwrap();

    let result = fetcher
        .fetch_bytes(&format!("{}/img/a.jpg", mock_server.uri()))
        .await;

    assert!(matches!(
        result,
        Err(FetchError::Exhausted { attempts: 1, .. })
    ));
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_fetch_bytes_returns_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/img/a.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0]))
        .mount(&mock_server)
        .await;

    let fetcher = Fetcher::new(settings(), None, RecordingSleeper::new()).unwrap();

    let bytes = fetcher
        .fetch_bytes(&format!("{}/img/a.jpg", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(bytes, vec![0xFF, 0xD8, 0xFF, 0xE0]);
}

use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use topsy::{Client, ClientConfig, Error, NeverSample, WarnSampler};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Default, Clone)]
struct CountingSampler(Arc<AtomicUsize>);

impl WarnSampler for CountingSampler {
    fn sample(&self) -> bool {
        self.0.fetch_add(1, Ordering::SeqCst);
        false
    }
}

fn client_for(uri: &str) -> Client {
    let cfg = ClientConfig::new("test-key")
        .with_host("example.com")
        .with_base_url(uri);
    Client::with_config(cfg).unwrap().with_sampler(NeverSample)
}

fn limited(status: u16, limit: i64, remaining: i64) -> ResponseTemplate {
    ResponseTemplate::new(status)
        .insert_header("X-RateLimit-Limit", limit.to_string().as_str())
        .insert_header("X-RateLimit-Remaining", remaining.to_string().as_str())
        .insert_header("X-RateLimit-Reset", "1300000000")
}

// The blocking client must be created, used and dropped off the async runtime.
async fn blocking<T, F>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn authorinfo_returns_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/authorinfo.json"))
        .and(query_param("apikey", "test-key"))
        .and(query_param("url", "http://twitter.com/thesmart"))
        .and(header("user-agent", "example.com topsy-client-0.1.0"))
        .and(header("expect", ""))
        .respond_with(limited(200, 10000, 9999).set_body_json(json!({
            "request": {"resource": "authorinfo"},
            "response": {"name": "John Smart", "nick": "thesmart"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let (payload, last) = blocking(move || {
        let client = client_for(&uri);
        let payload = client
            .call("authorinfo", [("url", "http://twitter.com/thesmart")])
            .unwrap();
        (payload, client.last_limit())
    })
    .await;

    assert_eq!(payload["name"], "John Smart");
    assert_eq!(last, Some(9999));
}

#[tokio::test(flavor = "multi_thread")]
async fn query_is_sorted_and_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": {"list": []}})))
        .mount(&server)
        .await;

    let uri = server.uri();
    blocking(move || {
        client_for(&uri)
            .call("search", [("q", "rust lang"), ("window", "d"), ("apikey", "ignored")])
            .unwrap()
    })
    .await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let expect = requests[0]
        .headers
        .get("expect")
        .map(|v| v.to_str().unwrap().to_string());
    assert_eq!(expect.as_deref(), Some(""));
    assert_eq!(
        requests[0].url.query(),
        Some("apikey=test-key&q=rust%20lang&window=d")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn api_error_carries_status_and_joined_messages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/foobar.json"))
        .respond_with(limited(400, 10000, 42).set_body_json(json!({
            "response": {"errors": ["Action not supported", "check the docs"], "status": 400}
        })))
        .mount(&server)
        .await;

    let uri = server.uri();
    let (err, last) = blocking(move || {
        let client = client_for(&uri);
        let params: [(&str, &str); 0] = [];
        let err = client.call("foobar", params).unwrap_err();
        (err, client.last_limit())
    })
    .await;

    match err {
        Error::Api { code, message } => {
            assert_eq!(code, 400);
            assert_eq!(message, "Action not supported\ncheck the docs");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(last, Some(42));
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_and_empty_bodies() {
    let server = MockServer::start().await;
    Mock::given(path("/broken.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>busy</html>"))
        .mount(&server)
        .await;
    Mock::given(path("/empty.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"request": {}})))
        .mount(&server)
        .await;

    let uri = server.uri();
    let (broken, empty, last) = blocking(move || {
        let client = client_for(&uri);
        let none: [(&str, &str); 0] = [];
        let broken = client.call("broken", none).unwrap_err();
        let empty = client.call("empty", none).unwrap_err();
        (broken, empty, client.last_limit())
    })
    .await;

    assert!(matches!(broken, Error::MalformedResponse { .. }));
    assert_eq!(broken.code(), 500);
    assert!(matches!(empty, Error::EmptyResponse));
    assert_eq!(empty.code(), 500);
    assert_eq!(last, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn last_limit_tracks_each_call() {
    let server = MockServer::start().await;
    Mock::given(path("/authorinfo.json"))
        .respond_with(limited(200, 10000, 500).set_body_json(json!({"response": {"n": 1}})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(path("/authorinfo.json"))
        .respond_with(limited(200, 10000, 499).set_body_json(json!({"response": {"n": 2}})))
        .mount(&server)
        .await;

    let uri = server.uri();
    let seen = blocking(move || {
        let client = client_for(&uri);
        let mut seen = vec![client.last_limit()];
        for _ in 0..2 {
            client.call("authorinfo", [("url", "x")]).unwrap();
            seen.push(client.last_limit());
        }
        seen
    })
    .await;

    assert_eq!(seen, vec![None, Some(500), Some(499)]);
}

#[tokio::test(flavor = "multi_thread")]
async fn near_limit_still_returns_payload() {
    let server = MockServer::start().await;
    Mock::given(path("/authorinfo.json"))
        .respond_with(limited(200, 100, 5).set_body_json(json!({"response": {"name": "John Smart"}})))
        .mount(&server)
        .await;

    let sampler = CountingSampler::default();
    let counter = sampler.0.clone();
    let cfg = ClientConfig::new("test-key").with_base_url(server.uri());
    let payload = blocking(move || {
        let client = Client::with_config(cfg).unwrap().with_sampler(sampler);
        client.call("authorinfo", [("url", "x")]).unwrap()
    })
    .await;

    assert_eq!(payload["name"], "John Smart");
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn call_into_deserializes_payload() {
    #[derive(Debug, serde::Deserialize)]
    struct Author {
        name: String,
        nick: String,
    }

    let server = MockServer::start().await;
    Mock::given(path("/authorinfo.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": {"name": "John Smart", "nick": "thesmart", "influence_level": 5}
        })))
        .mount(&server)
        .await;

    let uri = server.uri();
    let (author, wrong) = blocking(move || {
        let client = client_for(&uri);
        let author: Author = client.call_into("authorinfo", [("url", "x")]).unwrap();
        let wrong = client.call_into::<Vec<String>, _, _, _>("authorinfo", [("url", "x")]);
        (author, wrong)
    })
    .await;

    assert_eq!(author.name, "John Smart");
    assert_eq!(author.nick, "thesmart");
    assert!(matches!(wrong, Err(Error::MalformedResponse { .. })));
}

#[test]
fn connection_refused_is_transport_error() {
    // Nothing listens on port 1.
    let cfg = ClientConfig::new("test-key").with_base_url("http://127.0.0.1:1/");
    let client = Client::with_config(cfg).unwrap();
    let err = client.call("authorinfo", [("url", "x")]).unwrap_err();
    match &err {
        Error::Transport { code, message } => {
            assert_eq!(*code, 7);
            assert!(!message.is_empty());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(client.last_limit(), None);
}

use std::time::Duration;

use avalon_http::{HttpError, HttpSession, RequestOpts, TransportOptions};
use reqwest::Method;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session() -> HttpSession {
    HttpSession::with_user_agent(TransportOptions::default(), "avalon-tests/1.0")
        .expect("session builds")
}

fn url(server: &MockServer, p: &str) -> Url {
    Url::parse(&server.uri()).unwrap().join(p).unwrap()
}

#[tokio::test]
async fn cookies_are_replayed_on_later_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/seed"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "datr=abc; Path=/"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/echo"))
        .and(header("cookie", "datr=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("seen"))
        .mount(&server)
        .await;

    let s = session();
    let cancel = CancellationToken::new();
    s.send(Method::GET, &url(&server, "/seed"), RequestOpts::default(), &cancel)
        .await
        .unwrap();
    let resp = s
        .send(Method::GET, &url(&server, "/echo"), RequestOpts::default(), &cancel)
        .await
        .unwrap();

    assert_eq!(resp.body, "seen");
    assert_eq!(s.cookie_count(), 1);
}

#[tokio::test]
async fn user_agent_is_sent_on_every_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("user-agent", "avalon-tests/1.0"))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&server)
        .await;

    let s = session();
    let cancel = CancellationToken::new();
    for _ in 0..2 {
        let resp = s
            .send(Method::GET, &url(&server, "/"), RequestOpts::default(), &cancel)
            .await
            .unwrap();
        assert!(resp.is_success());
    }
}

#[tokio::test]
async fn redirect_hops_keep_their_cookies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", "/landing")
                .insert_header("set-cookie", "hop=1; Path=/"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/landing"))
        .respond_with(ResponseTemplate::new(200).set_body_string("home"))
        .mount(&server)
        .await;

    let s = session();
    let resp = s
        .send(
            Method::GET,
            &url(&server, "/start"),
            RequestOpts::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(resp.body, "home");
    assert_eq!(resp.url.path(), "/landing");
    assert!(s.has_cookie(&url(&server, "/"), "hop"));
}

#[tokio::test]
async fn non_success_status_is_data_not_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&server)
        .await;

    let resp = session()
        .send(
            Method::GET,
            &url(&server, "/"),
            RequestOpts::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status.as_u16(), 503);
    assert!(!resp.is_success());
    assert_eq!(resp.body, "busy");
}

#[tokio::test]
async fn form_bodies_are_url_encoded_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("email=a%40b.c&pass=p+w"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let opts = RequestOpts {
        form: Some(vec![("email", "a@b.c".into()), ("pass", "p w".into())]),
        ..Default::default()
    };
    let resp = session()
        .send(Method::POST, &url(&server, "/login"), opts, &CancellationToken::new())
        .await
        .unwrap();
    assert!(resp.is_success());
}

#[tokio::test]
async fn cancellation_discards_cookies_from_the_aborted_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "late=1; Path=/")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let s = session();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let err = s
        .send(Method::GET, &url(&server, "/"), RequestOpts::default(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, HttpError::Cancelled));
    assert_eq!(s.cookie_count(), 0);
}

#[tokio::test]
async fn sessions_do_not_share_cookies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/seed"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "mine=1; Path=/"))
        .mount(&server)
        .await;

    let first = session();
    let second = session();
    first
        .send(
            Method::GET,
            &url(&server, "/seed"),
            RequestOpts::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(first.has_cookie(&url(&server, "/"), "mine"));
    assert_eq!(second.cookie_count(), 0);
}

#[tokio::test]
async fn connection_failure_is_a_network_error() {
    // Nothing listens on the tcpmux port in the test environment.
    let target = Url::parse("http://127.0.0.1:1/").unwrap();

    let err = session()
        .send(Method::GET, &target, RequestOpts::default(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Network(_)));
}

#[tokio::test]
async fn per_request_timeout_is_a_network_error_and_drops_cookies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "slow=1; Path=/")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let s = session();
    let opts = RequestOpts {
        timeout: Some(Duration::from_millis(200)),
        ..Default::default()
    };
    let err = s
        .send(Method::GET, &url(&server, "/"), opts, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, HttpError::Network(_)));
    assert_eq!(s.cookie_count(), 0);
}

#[tokio::test]
async fn cookie_names_follow_path_scoping() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/seed"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "site=1; Path=/")
                .append_header("set-cookie", "scoped=1; Path=/groups"),
        )
        .mount(&server)
        .await;

    let s = session();
    s.send(
        Method::GET,
        &url(&server, "/seed"),
        RequestOpts::default(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(s.cookie_names(&url(&server, "/")), vec!["site".to_string()]);
    let mut under_groups = s.cookie_names(&url(&server, "/groups/1"));
    under_groups.sort();
    assert_eq!(under_groups, vec!["scoped".to_string(), "site".to_string()]);
}

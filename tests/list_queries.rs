mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;
use uuid::Uuid;

use tutor_market_api::types::Role;

use common::{get, offline_app, test_config, token_for};

// Every case here must be rejected while parsing the list request; the pool
// behind the router cannot connect.

#[tokio::test]
async fn non_positive_page_is_rejected() {
    let (router, state) = offline_app(test_config());
    let token = token_for(&state, Uuid::new_v4(), Role::Student);
    for uri in ["/api/sessions?page=0", "/api/sessions?page=-2", "/api/sessions?page=abc"] {
        let (status, body) = get(&router, uri, Some(&token)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }
}

#[tokio::test]
async fn non_positive_limit_is_rejected() {
    let (router, state) = offline_app(test_config());
    let token = token_for(&state, Uuid::new_v4(), Role::Tutor);
    let (status, body) = get(&router, "/api/exams?limit=0", Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn unknown_filter_is_rejected() {
    let (router, state) = offline_app(test_config());
    let token = token_for(&state, Uuid::new_v4(), Role::Student);
    let (status, body) = get(&router, "/api/tutors?password_hash=x", Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap_or_default().contains("password_hash"));
}

#[tokio::test]
async fn admin_only_filter_is_unknown_to_tutors() {
    let (router, state) = offline_app(test_config());
    let token = token_for(&state, Uuid::new_v4(), Role::Tutor);
    let uri = format!("/api/documents?tutorId={}", Uuid::new_v4());
    let (status, _) = get(&router, &uri, Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn badly_typed_filter_value_is_rejected() {
    let (router, state) = offline_app(test_config());
    let token = token_for(&state, Uuid::new_v4(), Role::Student);
    for uri in ["/api/tutors?minRate=cheap", "/api/sessions?status=pending", "/api/planner?completed=maybe"] {
        let (status, _) = get(&router, uri, Some(&token)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn duplicate_filter_key_is_rejected() {
    let (router, state) = offline_app(test_config());
    let token = token_for(&state, Uuid::new_v4(), Role::Student);
    let (status, _) = get(&router, "/api/sessions?status=scheduled&status=completed", Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn non_uuid_path_id_is_rejected() {
    let (router, state) = offline_app(test_config());
    let token = token_for(&state, Uuid::new_v4(), Role::Student);
    let (status, body) = get(&router, "/api/sessions/not-a-uuid", Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn students_cannot_list_documents() {
    let (router, state) = offline_app(test_config());
    let token = token_for(&state, Uuid::new_v4(), Role::Student);
    let (status, _) = get(&router, "/api/documents", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn rate_limit_returns_429_envelope() {
    let mut config = test_config();
    config.api.enable_rate_limiting = true;
    config.api.rate_limit_requests = 2;
    config.api.rate_limit_window_secs = 60;
    let (router, _) = offline_app(config);

    for _ in 0..2 {
        let (status, _) = get(&router, "/", None).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = get(&router, "/", None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "TOO_MANY_REQUESTS");
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn rotating_forwarded_for_does_not_reset_the_budget() {
    let mut config = test_config();
    config.api.enable_rate_limiting = true;
    config.api.rate_limit_requests = 1;
    let (router, _) = offline_app(config);

    let mut rejected = 0;
    for i in 0..20 {
        let request = Request::builder()
            .uri("/")
            .header("x-forwarded-for", format!("203.0.113.{}", i))
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            rejected += 1;
        }
    }
    assert_eq!(rejected, 19);
}

#[tokio::test]
async fn trusted_proxy_limits_each_forwarded_client() {
    let mut config = test_config();
    config.api.enable_rate_limiting = true;
    config.api.rate_limit_requests = 1;
    config.api.trust_forwarded_for = true;
    let (router, _) = offline_app(config);

    for (client, expected) in [("203.0.113.1", StatusCode::OK), ("203.0.113.2", StatusCode::OK), ("203.0.113.1", StatusCode::TOO_MANY_REQUESTS)] {
        let request = Request::builder().uri("/").header("x-forwarded-for", client).body(Body::empty()).unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), expected, "{client}");
    }
}

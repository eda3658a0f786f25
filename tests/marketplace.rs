mod common;

use std::str::FromStr;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::{DateTime, Duration, DurationRound, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

use tutor_market_api::types::Role;

use common::{get, post, TestDb};

fn slot(days_ahead: i64) -> DateTime<Utc> {
    (Utc::now() + Duration::days(days_ahead)).duration_trunc(Duration::hours(1)).unwrap()
}

fn booking(tutor: Uuid, at: DateTime<Utc>) -> Value {
    json!({ "tutorId": tutor, "subject": "Algebra", "scheduledAt": at, "durationMinutes": 90 })
}

fn decimal(v: &Value) -> Decimal {
    Decimal::from_str(v.as_str().unwrap_or_default()).unwrap()
}

#[tokio::test]
async fn page_count_turns_over_at_the_limit() -> Result<()> {
    let Some(db) = TestDb::connect().await? else { return Ok(()) };
    let student = db.user(Role::Student).await?;
    let token = db.token(student, Role::Student);

    for i in 0..20 {
        let (status, _) = post(&db.router, "/api/planner", Some(&token), json!({"title": format!("Task {i}"), "itemType": "task"})).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (_, body) = get(&db.router, "/api/planner?limit=20", Some(&token)).await;
    assert_eq!(body["data"]["pagination"], json!({"currentPage": 1, "totalPages": 1, "totalCount": 20, "limit": 20}));

    post(&db.router, "/api/planner", Some(&token), json!({"title": "One more", "itemType": "study"})).await;
    let (_, body) = get(&db.router, "/api/planner?limit=20&page=2", Some(&token)).await;
    assert_eq!(body["data"]["pagination"]["totalPages"], 2);
    assert_eq!(body["data"]["pagination"]["totalCount"], 21);
    assert_eq!(body["data"]["items"].as_array().map(Vec::len), Some(1));

    // Past the end: empty page, same totals.
    let (status, body) = get(&db.router, "/api/planner?limit=20&page=5", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"], json!([]));
    assert_eq!(body["data"]["pagination"]["totalCount"], 21);

    db.teardown().await
}

#[tokio::test]
async fn list_reads_are_repeatable() -> Result<()> {
    let Some(db) = TestDb::connect().await? else { return Ok(()) };
    db.tutor("approved", "40.00").await?;
    db.tutor("approved", "25.00").await?;
    db.tutor("pending", "10.00").await?;
    let student = db.user(Role::Student).await?;
    let token = db.token(student, Role::Student);

    let uri = "/api/tutors?subject=maths&maxRate=50&sortBy=hourlyRate&sortOrder=asc";
    let (_, first) = get(&db.router, uri, Some(&token)).await;
    let (_, second) = get(&db.router, uri, Some(&token)).await;
    assert_eq!(first, second);

    let items = first["data"]["items"].as_array().cloned().unwrap_or_default();
    assert_eq!(items.len(), 2, "pending tutors stay out of the directory");
    assert_eq!(decimal(&items[0]["hourlyRate"]), Decimal::from(25));

    db.teardown().await
}

#[tokio::test]
async fn booking_an_unapproved_tutor_is_a_conflict() -> Result<()> {
    let Some(db) = TestDb::connect().await? else { return Ok(()) };
    let tutor = db.tutor("pending", "40.00").await?;
    let student = db.user(Role::Student).await?;
    let token = db.token(student, Role::Student);

    let (status, body) = post(&db.router, "/api/sessions", Some(&token), booking(tutor, slot(2))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "CONFLICT");
    assert_eq!(db.count("SELECT COUNT(*) FROM sessions").await?, 0);

    db.teardown().await
}

#[tokio::test]
async fn booking_prices_the_session_and_notifies_the_tutor() -> Result<()> {
    let Some(db) = TestDb::connect().await? else { return Ok(()) };
    let tutor = db.tutor("approved", "45.00").await?;
    let student = db.user(Role::Student).await?;
    let token = db.token(student, Role::Student);

    let (status, body) = post(&db.router, "/api/sessions", Some(&token), booking(tutor, slot(2))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(decimal(&body["data"]["price"]), Decimal::from_str("67.50")?);
    assert_eq!(body["data"]["status"], "scheduled");

    let tutor_token = db.token(tutor, Role::Tutor);
    let (_, inbox) = get(&db.router, "/api/notifications?kind=session.booked", Some(&tutor_token)).await;
    assert_eq!(inbox["data"]["pagination"]["totalCount"], 1);
    assert_eq!(db.count("SELECT COUNT(*) FROM activity_log WHERE action = 'session.book'").await?, 1);

    db.teardown().await
}

#[tokio::test]
async fn concurrent_bookings_for_one_slot_admit_exactly_one() -> Result<()> {
    let Some(db) = TestDb::connect().await? else { return Ok(()) };
    let tutor = db.tutor("approved", "30.00").await?;
    let first = db.token(db.user(Role::Student).await?, Role::Student);
    let second = db.token(db.user(Role::Student).await?, Role::Student);
    let at = slot(3);

    let (a, b) = tokio::join!(
        post(&db.router, "/api/sessions", Some(&first), booking(tutor, at)),
        post(&db.router, "/api/sessions", Some(&second), booking(tutor, at)),
    );
    let mut statuses = vec![a.0, b.0];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::BAD_REQUEST]);
    let loser = if a.0 == StatusCode::BAD_REQUEST { a.1 } else { b.1 };
    assert_eq!(loser["code"], "CONFLICT");
    assert_eq!(db.count("SELECT COUNT(*) FROM sessions").await?, 1);

    db.teardown().await
}

#[tokio::test]
async fn coupon_payment_and_refunding_dispute() -> Result<()> {
    let Some(db) = TestDb::connect().await? else { return Ok(()) };
    let admin = db.token(db.user(Role::Admin).await?, Role::Admin);
    let tutor = db.tutor("approved", "40.00").await?;
    let student_id = db.user(Role::Student).await?;
    let student = db.token(student_id, Role::Student);

    let (status, _) = post(
        &db.router,
        "/api/admin/coupons",
        Some(&admin),
        json!({"code": "welcome10", "discountPercent": 10, "maxUses": 1}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, check) = get(&db.router, "/api/coupons/WELCOME10", Some(&student)).await;
    assert_eq!(check["data"]["valid"], true);

    let (_, session) = post(&db.router, "/api/sessions", Some(&student), booking(tutor, slot(4))).await;
    let session_id = session["data"]["id"].clone();

    let (status, payment) = post(
        &db.router,
        "/api/payments",
        Some(&student),
        json!({"sessionId": session_id, "couponCode": "welcome10", "method": "card"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(decimal(&payment["data"]["discount"]), Decimal::from(6));
    assert_eq!(decimal(&payment["data"]["amount"]), Decimal::from(54));

    let (status, again) = post(&db.router, "/api/payments", Some(&student), json!({"sessionId": session_id, "method": "card"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(again["code"], "CONFLICT");

    let (_, check) = get(&db.router, "/api/coupons/WELCOME10", Some(&student)).await;
    assert_eq!(check["data"]["valid"], false);

    let (status, dispute) = post(&db.router, "/api/disputes", Some(&student), json!({"sessionId": session_id, "reason": "Tutor never joined"})).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = post(&db.router, "/api/disputes", Some(&student), json!({"sessionId": session_id, "reason": "Again"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/api/admin/disputes/{}/resolve", dispute["data"]["id"].as_str().unwrap_or_default());
    let (status, resolved) = post(&db.router, &uri, Some(&admin), json!({"resolution": "Refunded in full", "refund": true})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resolved["data"]["refunded"], true);

    let (_, payments) = get(&db.router, "/api/payments?status=refunded", Some(&student)).await;
    assert_eq!(payments["data"]["pagination"]["totalCount"], 1);

    let (_, overview) = get(&db.router, "/api/admin/analytics/overview", Some(&admin)).await;
    assert_eq!(decimal(&overview["data"]["revenue"]["net"]), Decimal::ZERO);
    assert_eq!(overview["data"]["openDisputes"], 0);

    let (status, _) = post(&db.router, &uri, Some(&admin), json!({"resolution": "twice", "refund": false})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    db.teardown().await
}

#[tokio::test]
async fn exam_publish_submit_and_grade() -> Result<()> {
    let Some(db) = TestDb::connect().await? else { return Ok(()) };
    let tutor_id = db.tutor("approved", "40.00").await?;
    let tutor = db.token(tutor_id, Role::Tutor);
    let student = db.token(db.user(Role::Student).await?, Role::Student);

    let (status, exam) = post(
        &db.router,
        "/api/exams",
        Some(&tutor),
        json!({
            "title": "Fractions",
            "subject": "maths",
            "questions": [{"q": "1/2 + 1/4?", "options": ["3/4", "2/6"]}],
            "durationMinutes": 20,
            "passingScore": 60
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let exam_id = exam["data"]["id"].as_str().unwrap_or_default().to_string();

    let submit_uri = format!("/api/exams/{exam_id}/submissions");
    let (status, _) = post(&db.router, &submit_uri, Some(&student), json!({"answers": ["3/4"]})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "drafts take no submissions");

    let (_, listed) = get(&db.router, "/api/exams", Some(&student)).await;
    assert_eq!(listed["data"]["pagination"]["totalCount"], 0);

    let publish_uri = format!("/api/exams/{exam_id}/publish");
    let (status, _) = post(&db.router, &publish_uri, Some(&tutor), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = post(&db.router, &publish_uri, Some(&tutor), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "CONFLICT");

    let (status, submission) = post(&db.router, &submit_uri, Some(&student), json!({"answers": ["3/4"]})).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = post(&db.router, &submit_uri, Some(&student), json!({"answers": ["2/6"]})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, ungraded) = get(&db.router, &format!("{submit_uri}?graded=false"), Some(&tutor)).await;
    assert_eq!(ungraded["data"]["pagination"]["totalCount"], 1);

    let grade_uri = format!("/api/submissions/{}/grade", submission["data"]["id"].as_str().unwrap_or_default());
    let (status, graded) = post(&db.router, &grade_uri, Some(&tutor), json!({"score": 60})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(graded["data"]["passed"], true);

    let (status, _) = post(&db.router, &grade_uri, Some(&tutor), json!({"score": 90})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    db.teardown().await
}

#[tokio::test]
async fn register_login_and_suspension() -> Result<()> {
    let Some(db) = TestDb::connect().await? else { return Ok(()) };
    let admin = db.token(db.user(Role::Admin).await?, Role::Admin);

    let (status, registered) = post(
        &db.router,
        "/api/auth/register",
        None,
        json!({"email": "Ada@Example.com", "password": common::PASSWORD, "firstName": "Ada", "lastName": "L", "role": "tutor"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(registered["data"]["user"].get("passwordHash").is_none());
    let user_id = registered["data"]["user"]["id"].as_str().unwrap_or_default().to_string();
    assert_eq!(db.count("SELECT COUNT(*) FROM tutor_profiles WHERE status = 'pending'").await?, 1);
    let stored: String = sqlx::query_scalar("SELECT password_hash FROM users WHERE email = 'ada@example.com'")
        .fetch_one(&db.pool)
        .await?;
    assert!(stored.starts_with("$2"), "passwords are stored as bcrypt hashes");

    let (status, _) = post(
        &db.router,
        "/api/auth/register",
        None,
        json!({"email": "ada@example.com", "password": common::PASSWORD, "firstName": "Ada", "lastName": "L", "role": "student"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "email is unique case-insensitively");

    let login = json!({"email": "ada@example.com", "password": common::PASSWORD});
    let (status, _) = post(&db.router, "/api/auth/login", None, json!({"email": "ada@example.com", "password": "wrong-password"})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, body) = post(&db.router, "/api/auth/login", None, login.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap_or_default().to_string();
    let (status, me) = get(&db.router, "/api/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["email"], "ada@example.com");

    let (status, _) = post(&db.router, &format!("/api/admin/users/{user_id}/suspend"), Some(&admin), json!({"reason": "Fake documents"})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = post(&db.router, "/api/auth/login", None, login.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, _) = post(&db.router, &format!("/api/admin/users/{user_id}/activate"), Some(&admin), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = post(&db.router, "/api/auth/login", None, login).await;
    assert_eq!(status, StatusCode::OK);

    db.teardown().await
}

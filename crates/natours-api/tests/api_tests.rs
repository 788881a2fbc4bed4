//! API Integration Tests
//!
//! Every test drives the full router over a fresh in-memory store.

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
};
use natours_api::test_support::{test_app, test_app_with, TestApp};
use natours_core::config::BootstrapAdmin;
use natours_core::{AppConfig, DocumentStore, Environment};
use serde_json::{json, Value};
use tower::ServiceExt;

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &TestApp, request: Request<Body>) -> Reply {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    Reply {
        status,
        headers,
        body,
    }
}

async fn call(app: &TestApp, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Reply {
    send(app, request(method, uri, token, body)).await
}

async fn signup(app: &TestApp, name: &str, email: &str) -> String {
    let reply = call(
        app,
        "POST",
        "/api/v1/users/signup",
        None,
        Some(json!({
            "name": name,
            "email": email,
            "password": "pass1234",
            "passwordConfirm": "pass1234"
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    reply.body["token"].as_str().unwrap().to_string()
}

async fn login(app: &TestApp, email: &str, password: &str) -> Reply {
    call(
        app,
        "POST",
        "/api/v1/users/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await
}

async fn admin_token(app: &TestApp) -> String {
    app.state
        .auth
        .bootstrap_admin(&BootstrapAdmin {
            name: "Admin".to_string(),
            email: "admin@natours.dev".to_string(),
            password: "adminpass1".to_string(),
        })
        .await
        .unwrap();
    let reply = login(app, "admin@natours.dev", "adminpass1").await;
    reply.body["token"].as_str().unwrap().to_string()
}

fn tour_payload(name: &str, price: f64) -> Value {
    json!({
        "name": name,
        "duration": 5,
        "maxGroupSize": 25,
        "difficulty": "easy",
        "price": price,
        "summary": "Breathtaking hike through the Canadian Banff National Park",
        "description": "Lorem ipsum dolor sit amet",
        "imageCover": "tour-1-cover.jpg"
    })
}

async fn create_tour(app: &TestApp, admin: &str, name: &str, price: f64) -> String {
    let reply = call(
        app,
        "POST",
        "/api/v1/tours",
        Some(admin),
        Some(tour_payload(name, price)),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    reply.body["data"]["data"]["id"].as_str().unwrap().to_string()
}

fn reset_token_from(body: &str) -> String {
    let start = body.find("/resetPassword/").unwrap() + "/resetPassword/".len();
    body[start..].split('.').next().unwrap().trim().to_string()
}

// =============================================================================
// Health and routing
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = test_app();
    let reply = call(&app, "GET", "/health", None, None).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], "ok");
    assert!(reply.body["version"].is_string());
    assert!(reply.headers.get(header::X_CONTENT_TYPE_OPTIONS).is_some());
}

#[tokio::test]
async fn test_unknown_route() {
    let app = test_app();
    let reply = call(&app, "GET", "/api/v1/nothing-here", None, None).await;

    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body["status"], "fail");
    assert_eq!(
        reply.body["message"],
        "Can't find /api/v1/nothing-here on this server!"
    );
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_signup_sets_cookie_and_hides_credentials() {
    let app = test_app();
    let reply = call(
        &app,
        "POST",
        "/api/v1/users/signup",
        None,
        Some(json!({
            "name": "Jonas",
            "email": "jonas@example.com",
            "password": "pass1234",
            "passwordConfirm": "pass1234",
            "role": "admin"
        })),
    )
    .await;

    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["status"], "success");
    assert!(reply.body["token"].is_string());
    assert_eq!(reply.body["data"]["user"]["role"], "user");
    assert!(reply.body["data"]["user"].get("passwordHash").is_none());

    let cookie = reply.headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with("jwt="));
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_login_after_signup() {
    let app = test_app();
    signup(&app, "Jonas", "jonas@example.com").await;

    let ok = login(&app, "jonas@example.com", "pass1234").await;
    assert_eq!(ok.status, StatusCode::OK);
    let token = ok.body["token"].as_str().unwrap();
    let claims = app.state.tokens.verify(token).unwrap();
    assert_eq!(
        claims.sub,
        ok.body["data"]["user"]["id"].as_str().unwrap()
    );

    let wrong = login(&app, "jonas@example.com", "wrongpass").await;
    let unknown = login(&app, "ghost@example.com", "pass1234").await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.body["message"], unknown.body["message"]);
    assert_eq!(wrong.body["message"], "Incorrect email or password");
}

#[tokio::test]
async fn test_duplicate_email_is_conflict() {
    let app = test_app();
    signup(&app, "Jonas", "jonas@example.com").await;

    let reply = call(
        &app,
        "POST",
        "/api/v1/users/signup",
        None,
        Some(json!({
            "name": "Other Jonas",
            "email": "JONAS@example.com",
            "password": "pass1234",
            "passwordConfirm": "pass1234"
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert!(reply.body["message"]
        .as_str()
        .unwrap()
        .starts_with("Duplicate field value"));
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let app = test_app();
    let token = signup(&app, "Jonas", "jonas@example.com").await;

    let anonymous = call(&app, "GET", "/api/v1/users/me", None, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        anonymous.body["message"],
        "You are not logged in! Please log in to get access."
    );

    let garbage = call(&app, "GET", "/api/v1/users/me", Some("not-a-token"), None).await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
    assert_eq!(garbage.body["message"], "Invalid token. Please log in again!");

    let me = call(&app, "GET", "/api/v1/users/me", Some(&token), None).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["data"]["data"]["email"], "jonas@example.com");
}

#[tokio::test]
async fn test_cookie_session_and_logout() {
    let app = test_app();
    let token = signup(&app, "Jonas", "jonas@example.com").await;

    let with_cookie = Request::builder()
        .uri("/api/v1/users/me")
        .header(header::COOKIE, format!("jwt={token}"))
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, with_cookie).await.status, StatusCode::OK);

    let logout = call(&app, "GET", "/api/v1/users/logout", Some(&token), None).await;
    assert_eq!(logout.status, StatusCode::OK);
    let cookie = logout.headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with("jwt=loggedout"));

    let logged_out = Request::builder()
        .uri("/api/v1/users/me")
        .header(header::COOKIE, "jwt=loggedout")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, logged_out).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_endpoint_is_soft() {
    let app = test_app();
    let token = signup(&app, "Jonas", "jonas@example.com").await;

    let anonymous = call(&app, "GET", "/api/v1/users/session", None, None).await;
    assert_eq!(anonymous.status, StatusCode::OK);
    assert!(anonymous.body["data"]["user"].is_null());

    let broken = call(&app, "GET", "/api/v1/users/session", Some("garbage"), None).await;
    assert_eq!(broken.status, StatusCode::OK);
    assert!(broken.body["data"]["user"].is_null());

    let known = call(&app, "GET", "/api/v1/users/session", Some(&token), None).await;
    assert_eq!(known.body["data"]["user"]["name"], "Jonas");
}

#[tokio::test]
async fn test_password_change_invalidates_older_tokens() {
    let app = test_app();
    let old_token = signup(&app, "Jonas", "jonas@example.com").await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let changed = call(
        &app,
        "PATCH",
        "/api/v1/users/updateMyPassword",
        Some(&old_token),
        Some(json!({
            "passwordCurrent": "pass1234",
            "password": "newpass123",
            "passwordConfirm": "newpass123"
        })),
    )
    .await;
    assert_eq!(changed.status, StatusCode::OK, "{}", changed.body);
    let new_token = changed.body["token"].as_str().unwrap().to_string();

    let stale = call(&app, "GET", "/api/v1/users/me", Some(&old_token), None).await;
    assert_eq!(stale.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        stale.body["message"],
        "User recently changed password! Please log in again."
    );

    let fresh = call(&app, "GET", "/api/v1/users/me", Some(&new_token), None).await;
    assert_eq!(fresh.status, StatusCode::OK);

    assert_eq!(
        login(&app, "jonas@example.com", "newpass123").await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_wrong_current_password() {
    let app = test_app();
    let token = signup(&app, "Jonas", "jonas@example.com").await;

    let reply = call(
        &app,
        "PATCH",
        "/api/v1/users/updateMyPassword",
        Some(&token),
        Some(json!({
            "passwordCurrent": "wrong-one",
            "password": "newpass123",
            "passwordConfirm": "newpass123"
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["message"], "Your current password is wrong.");
}

// =============================================================================
// Password reset
// =============================================================================

#[tokio::test]
async fn test_reset_token_redeemable_once() {
    let app = test_app();
    signup(&app, "Jonas", "jonas@example.com").await;

    let forgot = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/v1/users/forgotPassword")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::HOST, "natours.test")
            .body(Body::from(r#"{"email":"jonas@example.com"}"#))
            .unwrap(),
    )
    .await;
    assert_eq!(forgot.status, StatusCode::OK);
    assert_eq!(forgot.body["message"], "Token sent to email!");

    let email = app.mailer.last().unwrap();
    assert_eq!(email.subject, "Your password reset token (valid for 10 min)");
    assert!(email
        .body
        .contains("http://natours.test/api/v1/resetPassword/"));
    let raw = reset_token_from(&email.body);

    let body = json!({"password": "newpass123", "passwordConfirm": "newpass123"});
    let first = call(
        &app,
        "PATCH",
        &format!("/api/v1/resetPassword/{raw}"),
        None,
        Some(body.clone()),
    )
    .await;
    assert_eq!(first.status, StatusCode::OK, "{}", first.body);
    assert!(first.body["token"].is_string());

    let again = format!("/api/v1/users/resetPassword/{raw}");
    let second = call(&app, "PATCH", &again, None, Some(body)).await;
    assert_eq!(second.status, StatusCode::BAD_REQUEST);
    assert_eq!(second.body["message"], "Token is invalid or has expired");

    assert_eq!(
        login(&app, "jonas@example.com", "newpass123").await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_forgot_password_unknown_email() {
    let app = test_app();
    let reply = call(
        &app,
        "POST",
        "/api/v1/users/forgotPassword",
        None,
        Some(json!({"email": "ghost@example.com"})),
    )
    .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body["message"], "There is no user with that email address.");
}

#[tokio::test]
async fn test_failed_delivery_reports_error() {
    let app = test_app();
    signup(&app, "Jonas", "jonas@example.com").await;
    app.mailer.set_failing(true);

    let reply = call(
        &app,
        "POST",
        "/api/v1/users/forgotPassword",
        None,
        Some(json!({"email": "jonas@example.com"})),
    )
    .await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.body["status"], "error");
    assert_eq!(
        reply.body["message"],
        "There was an error sending the email. Try again later!"
    );
    // development mode exposes the cause
    assert!(reply.body["error"].is_string());
}

#[tokio::test]
async fn test_production_hides_error_detail() {
    let app = test_app_with(AppConfig {
        environment: Environment::Production,
        ..AppConfig::for_testing()
    });
    signup(&app, "Jonas", "jonas@example.com").await;
    app.mailer.set_failing(true);

    let reply = call(
        &app,
        "POST",
        "/api/v1/users/forgotPassword",
        None,
        Some(json!({"email": "jonas@example.com"})),
    )
    .await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(reply.body.get("error").is_none());
}

#[tokio::test]
async fn test_reset_link_uses_configured_public_host() {
    let mut config = AppConfig::for_testing();
    config.environment = Environment::Production;
    config.server.public_host = Some("natours.dev".to_string());
    let app = test_app_with(config);
    signup(&app, "Jonas", "jonas@example.com").await;

    let forgot = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/v1/users/forgotPassword")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::HOST, "attacker.example")
            .body(Body::from(r#"{"email":"jonas@example.com"}"#))
            .unwrap(),
    )
    .await;
    assert_eq!(forgot.status, StatusCode::OK);

    let email = app.mailer.last().unwrap();
    assert!(email
        .body
        .contains("http://natours.dev/api/v1/resetPassword/"));
    assert!(!email.body.contains("attacker.example"));
}

#[tokio::test]
async fn test_session_cookie_matches_token_lifetime() {
    let mut config = AppConfig::for_testing();
    config.auth.jwt_expires_in_secs = 3600;
    let app = test_app_with(config);

    let reply = call(
        &app,
        "POST",
        "/api/v1/users/signup",
        None,
        Some(json!({
            "name": "Jonas",
            "email": "jonas@example.com",
            "password": "pass1234",
            "passwordConfirm": "pass1234"
        })),
    )
    .await;
    let claims = app
        .state
        .tokens
        .verify(reply.body["token"].as_str().unwrap())
        .unwrap();
    assert_eq!(claims.exp - claims.iat, 3600);

    let cookie = reply.headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    let max_age: i64 = cookie
        .split("; ")
        .find_map(|part| part.strip_prefix("Max-Age="))
        .unwrap()
        .parse()
        .unwrap();
    assert!((3598..=3600).contains(&max_age), "{cookie}");
}

// =============================================================================
// Rate limiting
// =============================================================================

#[tokio::test]
async fn test_credential_endpoints_are_rate_limited() {
    let mut config = AppConfig::for_testing();
    config.rate_limit.enabled = true;
    config.rate_limit.auth.burst = 2;
    let app = test_app_with(config);

    let attempt = |ip: &'static str| {
        Request::builder()
            .method("POST")
            .uri("/api/v1/users/login")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", ip)
            .body(Body::from(r#"{"email":"ghost@example.com","password":"guess1234"}"#))
            .unwrap()
    };

    for _ in 0..2 {
        let reply = send(&app, attempt("203.0.113.7")).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    }

    let limited = send(&app, attempt("203.0.113.7")).await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.body["status"], "fail");
    assert_eq!(
        limited.body["message"],
        "Too many requests from this IP, please try again later"
    );

    let other_client = send(&app, attempt("198.51.100.1")).await;
    assert_eq!(other_client.status, StatusCode::UNAUTHORIZED);

    // reads are only bound by the wider API budget
    let tours = send(
        &app,
        Request::builder()
            .uri("/api/v1/tours")
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(tours.status, StatusCode::OK);
}

// =============================================================================
// Users
// =============================================================================

#[tokio::test]
async fn test_update_me_and_delete_me() {
    let app = test_app();
    let token = signup(&app, "Jonas", "jonas@example.com").await;

    let refused = call(
        &app,
        "PATCH",
        "/api/v1/users/updateMe",
        Some(&token),
        Some(json!({"password": "newpass123"})),
    )
    .await;
    assert_eq!(refused.status, StatusCode::BAD_REQUEST);

    let updated = call(
        &app,
        "PATCH",
        "/api/v1/users/updateMe",
        Some(&token),
        Some(json!({"name": "Jonas S", "role": "admin"})),
    )
    .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["data"]["user"]["name"], "Jonas S");
    assert_eq!(updated.body["data"]["user"]["role"], "user");

    let deleted = call(&app, "DELETE", "/api/v1/users/deleteMe", Some(&token), None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let gone = call(&app, "GET", "/api/v1/users/me", Some(&token), None).await;
    assert_eq!(gone.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        login(&app, "jonas@example.com", "pass1234").await.status,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_user_admin_routes() {
    let app = test_app();
    let user = signup(&app, "Jonas", "jonas@example.com").await;
    let admin = admin_token(&app).await;

    let forbidden = call(&app, "GET", "/api/v1/users", Some(&user), None).await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
    assert_eq!(
        forbidden.body["message"],
        "You do not have permission to perform this action"
    );

    let listed = call(&app, "GET", "/api/v1/users", Some(&admin), None).await;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.body["results"], 2);

    let not_defined = call(
        &app,
        "POST",
        "/api/v1/users",
        Some(&admin),
        Some(json!({"name": "x"})),
    )
    .await;
    assert_eq!(not_defined.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        not_defined.body["message"],
        "This route is not defined! Please use /signup instead"
    );

    let bad_id = call(&app, "GET", "/api/v1/users/not-a-uuid", Some(&admin), None).await;
    assert_eq!(bad_id.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_id.body["message"], "Invalid id: not-a-uuid");
}

#[tokio::test]
async fn test_admin_delete_deactivates_user() {
    let app = test_app();
    let user = signup(&app, "Jonas", "jonas@example.com").await;
    let admin = admin_token(&app).await;
    let me = call(&app, "GET", "/api/v1/users/me", Some(&user), None).await;
    let id = me.body["data"]["data"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/users/{id}");

    let deleted = call(&app, "DELETE", &uri, Some(&admin), None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let record = app
        .state
        .store
        .find_by_id("users", uuid::Uuid::parse_str(&id).unwrap(), &[])
        .await
        .unwrap()
        .expect("identity record is kept");
    assert_eq!(record["active"], false);
    assert_eq!(record["email"], "jonas@example.com");

    let session = call(&app, "GET", "/api/v1/users/me", Some(&user), None).await;
    assert_eq!(session.status, StatusCode::UNAUTHORIZED);

    let hidden = call(&app, "GET", &uri, Some(&admin), None).await;
    assert_eq!(hidden.status, StatusCode::NOT_FOUND);

    let again = call(&app, "DELETE", &uri, Some(&admin), None).await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Tours
// =============================================================================

#[tokio::test]
async fn test_tour_writes_require_staff_role() {
    let app = test_app();
    let user = signup(&app, "Jonas", "jonas@example.com").await;
    let admin = admin_token(&app).await;

    let anonymous = call(
        &app,
        "POST",
        "/api/v1/tours",
        None,
        Some(tour_payload("The Forest Hiker", 397.0)),
    )
    .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let forbidden = call(
        &app,
        "POST",
        "/api/v1/tours",
        Some(&user),
        Some(tour_payload("The Forest Hiker", 397.0)),
    )
    .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

    let id = create_tour(&app, &admin, "The Forest Hiker", 397.0).await;

    let public = call(&app, "GET", &format!("/api/v1/tours/{id}"), None, None).await;
    assert_eq!(public.status, StatusCode::OK);
    assert_eq!(public.body["data"]["data"]["slug"], "the-forest-hiker");
    assert!(public.body["data"]["data"]["reviews"].is_array());

    let deleted = call(&app, "DELETE", &format!("/api/v1/tours/{id}"), Some(&admin), None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let missing = call(&app, "GET", &format!("/api/v1/tours/{id}"), None, None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tour_validation() {
    let app = test_app();
    let admin = admin_token(&app).await;

    let mut payload = tour_payload("The Sea Explorer", 497.0);
    payload["priceDiscount"] = json!(600);
    let reply = call(&app, "POST", "/api/v1/tours", Some(&admin), Some(payload)).await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    let message = reply.body["message"].as_str().unwrap();
    assert!(message.starts_with("Invalid input data."));
    assert!(message.contains("should be below regular price"));
}

#[tokio::test]
async fn test_tour_list_query() {
    let app = test_app();
    let admin = admin_token(&app).await;
    for (name, price) in [
        ("The Forest Hiker", 397.0),
        ("The Sea Explorer", 497.0),
        ("The Snow Adventurer", 997.0),
        ("The City Wanderer", 1197.0),
        ("The Park Camper", 1497.0),
        ("The Sports Lover", 2997.0),
        ("The Wine Taster", 1997.0),
        ("The Star Gazer", 80.0),
    ] {
        create_tour(&app, &admin, name, price).await;
    }

    let reply = call(
        &app,
        "GET",
        "/api/v1/tours?price%5Bgte%5D=100&price%5Blte%5D=1000&sort=price&fields=name,price",
        None,
        None,
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["results"], 3);

    let tours = reply.body["data"]["data"].as_array().unwrap();
    let prices: Vec<f64> = tours.iter().map(|t| t["price"].as_f64().unwrap()).collect();
    assert_eq!(prices, vec![397.0, 497.0, 997.0]);
    for tour in tours {
        let mut keys: Vec<&str> = tour.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, vec!["id", "name", "price"]);
    }

    let page = call(&app, "GET", "/api/v1/tours?sort=price&page=2&limit=3", None, None).await;
    let names: Vec<&str> = page.body["data"]["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec!["The Snow Adventurer", "The City Wanderer", "The Park Camper"]
    );

    let top = call(&app, "GET", "/api/v1/tours/top-5-cheap", None, None).await;
    assert_eq!(top.body["results"], 5);
    assert_eq!(top.body["data"]["data"][0]["name"], "The Star Gazer");
    assert!(top.body["data"]["data"][0].get("difficulty").is_some());
    assert!(top.body["data"]["data"][0].get("description").is_none());

    let invalid = call(&app, "GET", "/api/v1/tours?price%5Bregex%5D=1", None, None).await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Reviews
// =============================================================================

#[tokio::test]
async fn test_reviews_update_tour_ratings() {
    let app = test_app();
    let admin = admin_token(&app).await;
    let tour_id = create_tour(&app, &admin, "The Forest Hiker", 397.0).await;
    let nested = format!("/api/v1/tours/{tour_id}/reviews");

    let mut review_ids = Vec::new();
    for (i, rating) in [4, 5, 3].into_iter().enumerate() {
        let token = signup(&app, "Reviewer", &format!("reviewer{i}@example.com")).await;
        let reply = call(
            &app,
            "POST",
            &nested,
            Some(&token),
            Some(json!({"review": "Amazing tour!", "rating": rating})),
        )
        .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
        assert_eq!(reply.body["data"]["data"]["tour"], tour_id.as_str());
        review_ids.push((token, reply.body["data"]["data"]["id"].as_str().unwrap().to_string()));
    }

    let tour = call(&app, "GET", &format!("/api/v1/tours/{tour_id}"), None, None).await;
    assert_eq!(tour.body["data"]["data"]["ratingsQuantity"], 3);
    assert_eq!(tour.body["data"]["data"]["ratingsAverage"], 4.0);
    assert_eq!(tour.body["data"]["data"]["reviews"].as_array().unwrap().len(), 3);

    let (token, _) = &review_ids[0];
    let listed = call(&app, "GET", &nested, Some(token), None).await;
    assert_eq!(listed.body["results"], 3);

    for (token, id) in &review_ids {
        let reply = call(&app, "DELETE", &format!("/api/v1/reviews/{id}"), Some(token), None).await;
        assert_eq!(reply.status, StatusCode::NO_CONTENT);
    }

    let tour = call(&app, "GET", &format!("/api/v1/tours/{tour_id}"), None, None).await;
    assert_eq!(tour.body["data"]["data"]["ratingsQuantity"], 0);
    assert_eq!(tour.body["data"]["data"]["ratingsAverage"], 4.5);
}

#[tokio::test]
async fn test_duplicate_review_is_conflict() {
    let app = test_app();
    let admin = admin_token(&app).await;
    let tour_id = create_tour(&app, &admin, "The Forest Hiker", 397.0).await;
    let token = signup(&app, "Jonas", "jonas@example.com").await;

    let body = json!({"review": "Great", "rating": 5, "tour": tour_id});
    let first = call(&app, "POST", "/api/v1/reviews", Some(&token), Some(body.clone())).await;
    assert_eq!(first.status, StatusCode::CREATED);

    let second = call(&app, "POST", "/api/v1/reviews", Some(&token), Some(body)).await;
    assert_eq!(second.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_review_permissions() {
    let app = test_app();
    let admin = admin_token(&app).await;
    let tour_id = create_tour(&app, &admin, "The Forest Hiker", 397.0).await;
    let author = signup(&app, "Author", "author@example.com").await;
    let other = signup(&app, "Other", "other@example.com").await;

    let anonymous = call(&app, "GET", "/api/v1/reviews", None, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let by_admin = call(
        &app,
        "POST",
        "/api/v1/reviews",
        Some(&admin),
        Some(json!({"review": "Nice", "rating": 4, "tour": tour_id})),
    )
    .await;
    assert_eq!(by_admin.status, StatusCode::FORBIDDEN);

    let created = call(
        &app,
        "POST",
        "/api/v1/reviews",
        Some(&author),
        Some(json!({"review": "Nice", "rating": 4, "tour": tour_id})),
    )
    .await;
    let id = created.body["data"]["data"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/reviews/{id}");

    let hijack = call(&app, "PATCH", &uri, Some(&other), Some(json!({"rating": 1}))).await;
    assert_eq!(hijack.status, StatusCode::FORBIDDEN);

    let own = call(&app, "PATCH", &uri, Some(&author), Some(json!({"rating": 2}))).await;
    assert_eq!(own.status, StatusCode::OK);
    assert_eq!(own.body["data"]["data"]["rating"], 2.0);

    let tour = call(&app, "GET", &format!("/api/v1/tours/{tour_id}"), None, None).await;
    assert_eq!(tour.body["data"]["data"]["ratingsAverage"], 2.0);

    let moderated = call(&app, "DELETE", &uri, Some(&admin), None).await;
    assert_eq!(moderated.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_review_for_missing_tour() {
    let app = test_app();
    let token = signup(&app, "Jonas", "jonas@example.com").await;

    let reply = call(
        &app,
        "POST",
        &format!("/api/v1/tours/{}/reviews", uuid::Uuid::new_v4()),
        Some(&token),
        Some(json!({"review": "Nice", "rating": 4})),
    )
    .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

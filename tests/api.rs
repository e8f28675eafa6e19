use actix_web::{test, App};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use aalaboo_api::auth::JwtKeys;
use aalaboo_api::config::{AppConfig, MongoConfig, RazorpayConfig};
use aalaboo_api::models::Role;
use aalaboo_api::notify::{LogMailer, Notifier};
use aalaboo_api::AppState;

const JWT_SECRET: &str = "test-access";
const REFRESH_SECRET: &str = "test-refresh";

// Nothing in these tests reaches the database; the driver connects lazily.
fn config(geocoder_url: &str, razorpay: Option<RazorpayConfig>) -> AppConfig {
    AppConfig {
        mongo_uri: "mongodb://127.0.0.1:1".to_string(),
        database_name: "aalaboo_test".to_string(),
        bind_address: "127.0.0.1:0".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        refresh_secret: REFRESH_SECRET.to_string(),
        razorpay,
        currency: "INR".to_string(),
        geocoder_url: geocoder_url.to_string(),
        geocoder_user_agent: "aalaboo-api-tests".to_string(),
        warehouse_lat: 22.5726,
        warehouse_lon: 88.3639,
        mail: None,
        upload_dir: std::env::temp_dir().join("aalaboo-test-uploads").display().to_string(),
        public_base_url: "http://localhost".to_string(),
    }
}

async fn state(config: &AppConfig) -> AppState {
    let db = MongoConfig::init(config).await.unwrap();
    AppState::new(config, db, Notifier::start(Arc::new(LogMailer))).unwrap()
}

fn bearer(role: Role) -> (&'static str, String) {
    let pair = JwtKeys::new(JWT_SECRET, REFRESH_SECRET)
        .issue("64b7f0c2a1b2c3d4e5f60718", role)
        .unwrap();
    ("Authorization", format!("Bearer {}", pair.token))
}

macro_rules! app {
    ($state:expr) => {{
        let state = $state;
        test::init_service(App::new().configure(move |cfg| state.configure(cfg))).await
    }};
}

#[actix_web::test]
async fn missing_token_asks_to_login_again() {
    let app = app!(state(&config("http://127.0.0.1:1", None)).await);

    let req = test::TestRequest::post().uri("/api/cart/get").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "success": false, "message": "Not authorized, login again" }));
}

#[actix_web::test]
async fn tampered_token_is_rejected() {
    let app = app!(state(&config("http://127.0.0.1:1", None)).await);

    let (name, value) = bearer(Role::User);
    let req = test::TestRequest::get()
        .uri("/api/user/profile")
        .insert_header((name, format!("{}x", value)))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Not authorized, login again");
}

#[actix_web::test]
async fn user_token_cannot_reach_admin_routes() {
    let app = app!(state(&config("http://127.0.0.1:1", None)).await);

    for uri in ["/api/order/list", "/api/order/status", "/api/festival"] {
        let req = test::TestRequest::post()
            .uri(uri)
            .insert_header(bearer(Role::User))
            .set_json(json!({}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["success"], false, "{}", uri);
        assert_eq!(body["message"], "Not authorized", "{}", uri);
    }
}

#[actix_web::test]
async fn delivery_quote_requires_address_before_lookup() {
    let geocoder = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&geocoder)
        .await;

    let app = app!(state(&config(&geocoder.uri(), None)).await);

    let req = test::TestRequest::post()
        .uri("/api/order/calculate-delivery")
        .set_json(json!({ "city": "Howrah", "zipcode": "711101" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body, json!({ "success": false, "message": "street required" }));
}

#[actix_web::test]
async fn delivery_quote_uses_distance_tier() {
    let geocoder = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "lat": "22.95", "lon": "88.45" }])))
        .expect(1)
        .mount(&geocoder)
        .await;

    let app = app!(state(&config(&geocoder.uri(), None)).await);

    let req = test::TestRequest::post()
        .uri("/api/order/calculate-delivery")
        .set_json(json!({
            "street": "12 Station Road",
            "city": "Bandel",
            "state": "West Bengal",
            "zipcode": "712123",
            "country": "India"
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["success"], true);
    assert_eq!(body["fee"], 100);
    let distance = body["distance"].as_f64().unwrap();
    assert!(distance > 40.0 && distance < 50.0, "distance {}", distance);
}

#[actix_web::test]
async fn unknown_address_is_reported() {
    let geocoder = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&geocoder)
        .await;

    let app = app!(state(&config(&geocoder.uri(), None)).await);

    let req = test::TestRequest::post()
        .uri("/api/order/calculate-delivery")
        .set_json(json!({ "street": "Nowhere Lane", "city": "Atlantis", "zipcode": "000000" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body, json!({ "success": false, "message": "Address not found" }));
}

#[actix_web::test]
async fn reverse_geocode_checks_coordinates() {
    let app = app!(state(&config("http://127.0.0.1:1", None)).await);

    let req = test::TestRequest::get()
        .uri("/api/order/reverse-geocode?lat=95.0&lon=88.0")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body, json!({ "success": false, "message": "Invalid coordinates" }));
}

#[actix_web::test]
async fn online_checkout_without_gateway_fails_cleanly() {
    let app = app!(state(&config("http://127.0.0.1:1", None)).await);

    let req = test::TestRequest::post()
        .uri("/api/order/razorpay")
        .insert_header(bearer(Role::User))
        .set_json(json!({
            "items": [{ "productId": "64b7f0c2a1b2c3d4e5f60719", "size": "M", "quantity": 1 }],
            "amount": 499.0,
            "address": {
                "street": "1 Park Street", "city": "Kolkata", "state": "West Bengal",
                "zipcode": "700016", "country": "India", "phone": "9876543210"
            }
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body, json!({ "success": false, "message": "Payment gateway not configured" }));
}

#[actix_web::test]
async fn forged_payment_signature_is_refused() {
    let gateway = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&gateway)
        .await;

    let razorpay = RazorpayConfig {
        key_id: "rzp_test_key".to_string(),
        key_secret: "rzp_test_secret".to_string(),
        api_url: gateway.uri(),
    };
    let app = app!(state(&config("http://127.0.0.1:1", Some(razorpay))).await);

    let req = test::TestRequest::post()
        .uri("/api/order/verifyRazorpay")
        .insert_header(bearer(Role::User))
        .set_json(json!({
            "razorpay_order_id": "order_ABC",
            "razorpay_payment_id": "pay_XYZ",
            "razorpay_signature": "deadbeef"
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body, json!({ "success": false, "message": "Payment failed" }));
}

#[actix_web::test]
async fn malformed_json_uses_the_envelope() {
    let app = app!(state(&config("http://127.0.0.1:1", None)).await);

    let req = test::TestRequest::post()
        .uri("/api/order/calculate-delivery")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{ not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn missing_upload_is_not_found() {
    let app = app!(state(&config("http://127.0.0.1:1", None)).await);

    let req = test::TestRequest::get().uri("/uploads/does-not-exist.png").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn seller_applications_are_admin_only() {
    let app = app!(state(&config("http://127.0.0.1:1", None)).await);

    let req = test::TestRequest::get()
        .uri("/api/seller/applications")
        .insert_header(bearer(Role::User))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({ "success": false, "message": "Not authorized" }));

    let req = test::TestRequest::post()
        .uri("/api/seller/apply")
        .insert_header(bearer(Role::User))
        .set_json(json!({
            "shopName": "Loops", "ownerName": "Mitali", "email": "not-an-email",
            "phone": "9876543210", "city": "Kolkata"
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({ "success": false, "message": "email is not a valid email" }));
}

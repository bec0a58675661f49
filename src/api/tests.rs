use super::*;
use crate::testing::{test_store, MockMessenger};
use axum::body::Body;
use axum::http::Request;
use herald_core::types::SendError;
use http_body_util::BodyExt;
use tower::ServiceExt;

fn test_state(messenger: Arc<MockMessenger>, store: Store) -> ApiState {
    ApiState {
        messenger,
        store,
        deployment_id: "default".to_string(),
        country_code: "94".to_string(),
        bulk: BulkConfig {
            default_delay_ms: 0,
            verify_numbers: false,
            detection_limit: 50,
            detection_delay_ms: 0,
        },
        api_key: None,
        uptime: Instant::now(),
    }
}

async fn connected_app() -> (Router, Arc<MockMessenger>, Store) {
    let messenger = Arc::new(MockMessenger::connected());
    let store = test_store().await;
    let app = build_router(test_state(messenger.clone(), store.clone()));
    (app, messenger, store)
}

async fn disconnected_app() -> (Router, Arc<MockMessenger>, Store) {
    let messenger = Arc::new(MockMessenger::disconnected());
    let store = test_store().await;
    let app = build_router(test_state(messenger.clone(), store.clone()));
    (app, messenger, store)
}

fn get_req(path: &str) -> Request<Body> {
    Request::get(path).body(Body::empty()).unwrap()
}

fn post_json(path: &str, body: &str) -> Request<Body> {
    Request::post(path)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(resp: axum::http::Response<Body>) -> Value {
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

// --- Auth ---

#[tokio::test]
async fn test_health_no_auth_configured_allows_all() {
    let (app, _m, _s) = connected_app().await;
    let resp = app.oneshot(get_req("/api/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert_eq!(json["status"], "running");
    assert_eq!(json["whatsapp"], "connected");
    assert_eq!(json["database"], "connected");
}

#[tokio::test]
async fn test_auth_enforced_when_key_set() {
    let messenger = Arc::new(MockMessenger::connected());
    let store = test_store().await;
    let mut state = test_state(messenger, store);
    state.api_key = Some("secret".to_string());
    let app = build_router(state);

    // Missing header.
    let resp = app.clone().oneshot(get_req("/api/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // Wrong token.
    let req = Request::get("/api/health")
        .header("Authorization", "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // Valid token.
    let req = Request::get("/api/health")
        .header("Authorization", "Bearer secret")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

// --- Status / QR ---

#[tokio::test]
async fn test_status_reports_pending_qr() {
    let (app, _m, store) = disconnected_app().await;
    store.record_qr("default", "data:image/png;base64,AAAA").await.unwrap();

    let resp = app.oneshot(get_req("/api/status")).await.unwrap();
    let json = body_json(resp).await;

    assert_eq!(json["success"], true);
    assert_eq!(json["connected"], false);
    assert_eq!(json["qr_available"], true);
    assert_eq!(json["message"], "QR available - scan to pair");
}

#[tokio::test]
async fn test_status_connected() {
    let (app, _m, store) = connected_app().await;
    store.record_connected("default", Some("94771234567")).await.unwrap();

    let resp = app.oneshot(get_req("/api/status")).await.unwrap();
    let json = body_json(resp).await;

    assert_eq!(json["connected"], true);
    assert_eq!(json["state"], "open");
    assert_eq!(json["phone_number"], "94771234567");
    assert_eq!(json["message"], "WhatsApp connected");
}

#[tokio::test]
async fn test_qr_endpoint() {
    let (app, _m, store) = disconnected_app().await;

    // Nothing pending yet.
    let resp = app.clone().oneshot(get_req("/api/qr")).await.unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["success"], false);

    store.record_qr("default", "data:image/png;base64,AAAA").await.unwrap();
    let resp = app.oneshot(get_req("/api/qr")).await.unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["qr"], "data:image/png;base64,AAAA");
}

// --- Pairing / new session ---

#[tokio::test]
async fn test_pairing_code_requires_number() {
    let (app, _m, _s) = disconnected_app().await;

    let resp = app.oneshot(get_req("/api/pairing-code")).await.unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Phone number is required");
}

#[tokio::test]
async fn test_pairing_code_formats_number() {
    let (app, _m, _s) = disconnected_app().await;

    let resp = app
        .oneshot(get_req("/api/pairing-code?number=0771234567"))
        .await
        .unwrap();
    let json = body_json(resp).await;

    assert_eq!(json["success"], true);
    assert_eq!(json["pairing_code"], "ABCD1234");
    assert_eq!(json["phone_number"], "94771234567");
    assert!(json["instructions"].as_array().unwrap().len() == 5);
}

#[tokio::test]
async fn test_new_session_resets_channel() {
    let (app, messenger, _s) = connected_app().await;

    let resp = app
        .oneshot(post_json("/api/new-session", "{}"))
        .await
        .unwrap();
    let json = body_json(resp).await;

    assert_eq!(json["success"], true);
    assert_eq!(messenger.reset_calls(), 1);
}

// --- Single send ---

#[tokio::test]
async fn test_send_message_not_connected() {
    let (app, _m, _s) = disconnected_app().await;

    let resp = app
        .oneshot(post_json(
            "/api/send-message",
            r#"{"number":"0771234567","message":"hi"}"#,
        ))
        .await
        .unwrap();
    let json = body_json(resp).await;

    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "WhatsApp not connected");
}

#[tokio::test]
async fn test_send_message_success_updates_contact() {
    let (app, messenger, store) = connected_app().await;

    let resp = app
        .oneshot(post_json(
            "/api/send-message",
            r#"{"number":"0771234567","message":"hello"}"#,
        ))
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["success"], true);

    let sent = messenger.sent_texts();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0], ("94771234567".to_string(), "hello".to_string()));

    let contact = store.get_contact("94771234567").await.unwrap().unwrap();
    assert_eq!(contact.message_count, 1);
}

#[tokio::test]
async fn test_send_message_requires_fields() {
    let (app, _m, _s) = connected_app().await;

    let resp = app
        .oneshot(post_json(
            "/api/send-message",
            r#"{"number":"","message":"hi"}"#,
        ))
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["success"], false);
}

// --- Bulk ---

#[tokio::test]
async fn test_send_bulk_counts_and_order() {
    let (app, _m, _s) = connected_app().await;

    let resp = app
        .oneshot(post_json(
            "/api/send-bulk",
            r#"{"contacts":["0771111111","0772222222","0773333333"],"message":"promo","delay_ms":0}"#,
        ))
        .await
        .unwrap();
    let json = body_json(resp).await;

    assert_eq!(json["success"], true);
    assert_eq!(json["sent"], 3);
    assert_eq!(json["failed"], 0);
    assert_eq!(json["total"], 3);

    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["destination"], "0771111111");
    assert_eq!(results[2]["destination"], "0773333333");
}

#[tokio::test]
async fn test_send_bulk_isolates_failures() {
    let (app, messenger, _s) = connected_app().await;
    messenger.fail_number("94772222222", SendError::Other("timeout".into()));

    let resp = app
        .oneshot(post_json(
            "/api/send-bulk",
            r#"{"contacts":["0771111111","0772222222","0773333333"],"message":"promo","delay_ms":0}"#,
        ))
        .await
        .unwrap();
    let json = body_json(resp).await;

    assert_eq!(json["sent"], 2);
    assert_eq!(json["failed"], 1);
    let results = json["results"].as_array().unwrap();
    assert_eq!(results[1]["status"], "error");
    assert_eq!(results[2]["status"], "success");
}

#[tokio::test]
async fn test_send_bulk_newline_contacts() {
    let (app, _m, _s) = connected_app().await;

    let resp = app
        .oneshot(post_json(
            "/api/send-bulk",
            r#"{"contacts":"0771111111\n0772222222\n","message":"promo","delay_ms":0}"#,
        ))
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["total"], 2);
}

#[tokio::test]
async fn test_send_bulk_falls_back_to_stored_contacts() {
    let (app, _m, store) = connected_app().await;
    store.record_send("94771111111").await.unwrap();
    store.mark_contact_status("94772222222", "inactive").await.unwrap();

    let resp = app
        .oneshot(post_json(
            "/api/send-bulk",
            r#"{"message":"promo","send_to":"active","delay_ms":0}"#,
        ))
        .await
        .unwrap();
    let json = body_json(resp).await;

    assert_eq!(json["total"], 1);
    assert_eq!(json["results"][0]["destination"], "94771111111");
}

#[tokio::test]
async fn test_send_bulk_no_contacts() {
    let (app, _m, _s) = connected_app().await;

    let resp = app
        .oneshot(post_json("/api/send-bulk", r#"{"message":"promo"}"#))
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "No contacts to send to");
}

#[tokio::test]
async fn test_send_bulk_not_connected() {
    let (app, _m, _s) = disconnected_app().await;

    let resp = app
        .oneshot(post_json(
            "/api/send-bulk",
            r#"{"contacts":["0771111111"],"message":"promo"}"#,
        ))
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "WhatsApp not connected");
}

#[tokio::test]
async fn test_smart_bulk_personalizes() {
    let (app, messenger, store) = connected_app().await;
    store
        .upsert_contact(&herald_store::NewContact {
            phone_number: "94771111111".into(),
            name: Some("Nimal".into()),
            location: Some("Colombo".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    let resp = app
        .oneshot(post_json(
            "/api/smart-bulk",
            r#"{"template":"Hi {{name}} from {{location}}","delay_ms":0}"#,
        ))
        .await
        .unwrap();
    let json = body_json(resp).await;

    assert_eq!(json["success"], true);
    assert_eq!(json["personalization"], true);
    let sent = messenger.sent_texts();
    assert_eq!(sent[0].1, "Hi Nimal from Colombo");
}

// --- Detection ---

#[tokio::test]
async fn test_detect_active_records_contacts() {
    let (app, messenger, store) = connected_app().await;
    messenger.set_unregistered("94772222222");

    let resp = app
        .oneshot(post_json(
            "/api/detect-active",
            r#"{"numbers":["0771111111","0772222222"]}"#,
        ))
        .await
        .unwrap();
    let json = body_json(resp).await;

    assert_eq!(json["success"], true);
    assert_eq!(json["active"], 1);
    assert_eq!(json["inactive"], 1);
    assert_eq!(json["active_percentage"], "50.00");

    let contact = store.get_contact("94771111111").await.unwrap().unwrap();
    assert_eq!(contact.source, "detection");
    assert!(store.get_contact("94772222222").await.unwrap().is_none());
}

// --- Contacts ---

#[tokio::test]
async fn test_contacts_create_and_list() {
    let (app, _m, _s) = connected_app().await;

    let resp = app
        .clone()
        .oneshot(post_json(
            "/api/contacts",
            r#"{"phone_number":"0771234567","name":"Nimal","tags":"vip, retail"}"#,
        ))
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["contact"]["phone_number"], "94771234567");
    assert_eq!(json["contact"]["tags"], serde_json::json!(["vip", "retail"]));

    let resp = app.oneshot(get_req("/api/contacts")).await.unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["contacts"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_contact_stats_endpoint() {
    let (app, _m, store) = connected_app().await;
    store.record_send("94771111111").await.unwrap();
    store.mark_contact_status("94772222222", "inactive").await.unwrap();

    let resp = app.oneshot(get_req("/api/contacts/stats")).await.unwrap();
    let json = body_json(resp).await;

    assert_eq!(json["total_contacts"], 2);
    assert_eq!(json["active_contacts"], 1);
    assert_eq!(json["inactive_contacts"], 1);
}

// --- Categories ---

#[tokio::test]
async fn test_category_create_and_send() {
    let (app, messenger, store) = connected_app().await;

    for (phone, bt) in [("94771111111", "Retail"), ("94772222222", "Hotel")] {
        store
            .upsert_contact(&herald_store::NewContact {
                phone_number: phone.into(),
                business_type: Some(bt.into()),
                ..Default::default()
            })
            .await
            .unwrap();
    }

    let resp = app
        .clone()
        .oneshot(post_json(
            "/api/categories",
            r#"{"name":"Retailers","filters":{"business_types":["Retail"]}}"#,
        ))
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["success"], true);
    let id = json["category"]["id"].as_str().unwrap().to_string();

    let resp = app
        .oneshot(post_json(
            &format!("/api/categories/{id}/send"),
            r#"{"message":"Hi {{name}}","delay_ms":0}"#,
        ))
        .await
        .unwrap();
    let json = body_json(resp).await;

    assert_eq!(json["success"], true);
    assert_eq!(json["total"], 1);
    assert_eq!(json["sent"], 1);
    let sent = messenger.sent_texts();
    assert_eq!(sent[0].0, "94771111111");
    assert_eq!(sent[0].1, "Hi there");
}

#[tokio::test]
async fn test_category_send_unknown_id() {
    let (app, _m, _s) = connected_app().await;

    let resp = app
        .oneshot(post_json(
            "/api/categories/nope/send",
            r#"{"message":"hi"}"#,
        ))
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Category not found");
}

// --- Campaigns ---

#[tokio::test]
async fn test_campaign_create_and_run() {
    let (app, messenger, store) = connected_app().await;
    messenger.fail_number("94772222222", SendError::Other("timeout".into()));

    let resp = app
        .clone()
        .oneshot(post_json(
            "/api/campaigns",
            r#"{"name":"Launch","message":"We are live","contacts":"0771111111\n0772222222"}"#,
        ))
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["campaign"]["status"], "draft");
    let id = json["campaign"]["id"].as_str().unwrap().to_string();

    let resp = app
        .clone()
        .oneshot(post_json(
            &format!("/api/campaigns/{id}/run"),
            r#"{"delay_ms":0}"#,
        ))
        .await
        .unwrap();
    let json = body_json(resp).await;

    assert_eq!(json["success"], true);
    assert_eq!(json["sent"], 1);
    assert_eq!(json["failed"], 1);

    let campaign = store.get_campaign(&id).await.unwrap().unwrap();
    assert_eq!(campaign.status, "completed");
    assert_eq!(campaign.sent, 1);
    assert_eq!(campaign.failed, 1);

    let resp = app.oneshot(get_req("/api/campaigns")).await.unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["campaigns"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_campaign_run_unknown_id() {
    let (app, _m, _s) = connected_app().await;

    let resp = app
        .oneshot(post_json("/api/campaigns/nope/run", "{}"))
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Campaign not found");
}

// --- Helpers ---

#[test]
fn test_parse_contact_list_shapes() {
    let arr = serde_json::json!(["111", " 222 ", ""]);
    assert_eq!(parse_contact_list(&arr), vec!["111", "222"]);

    let s = serde_json::json!("111\n 222 \n\n");
    assert_eq!(parse_contact_list(&s), vec!["111", "222"]);

    let other = serde_json::json!(42);
    assert!(parse_contact_list(&other).is_empty());
}

#[test]
fn test_constant_time_eq() {
    assert!(constant_time_eq("abc", "abc"));
    assert!(!constant_time_eq("abc", "abd"));
    assert!(!constant_time_eq("abc", "abcd"));
}

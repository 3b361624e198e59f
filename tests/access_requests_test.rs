mod common;

use common::{data, TestApp};
use reqwest::StatusCode;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_concurrent_requests_leave_one_active() {
    let app = TestApp::spawn().await;
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    let listing = app.active_listing(seller, json!({})).await;

    let attempts = (0..6).map(|_| {
        app.post("/api/request-access", buyer)
            .json(&json!({ "noteListingId": listing["id"], "requestType": "documents" }))
            .send()
    });
    let responses = futures_join(attempts).await;

    let created = responses
        .iter()
        .filter(|status| **status == StatusCode::CREATED)
        .count();
    let conflicts = responses
        .iter()
        .filter(|status| **status == StatusCode::CONFLICT)
        .count();
    assert_eq!(created, 1);
    assert_eq!(conflicts, responses.len() - 1);

    let (active,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM access_requests WHERE buyer_id = $1 AND status = 'pending'",
    )
    .bind(buyer)
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(active, 1);
}

async fn futures_join<F>(requests: impl Iterator<Item = F>) -> Vec<StatusCode>
where
    F: std::future::Future<Output = reqwest::Result<reqwest::Response>> + Send + 'static,
{
    let handles: Vec<_> = requests.map(tokio::spawn).collect();
    let mut statuses = Vec::new();
    for handle in handles {
        statuses.push(handle.await.unwrap().unwrap().status());
    }
    statuses
}

#[tokio::test]
async fn test_review_and_expiry() {
    let app = TestApp::spawn().await;
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    let outsider = Uuid::new_v4();
    let listing = app.active_listing(seller, json!({})).await;

    // Requests are made for oneself.
    let res = app
        .post("/api/request-access", outsider)
        .json(&json!({
            "buyerId": buyer,
            "noteListingId": listing["id"],
            "requestType": "contact"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app
        .post("/api/request-access", seller)
        .json(&json!({ "noteListingId": listing["id"], "requestType": "contact" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app
        .post("/api/request-access", buyer)
        .json(&json!({
            "buyerId": buyer,
            "noteListingId": listing["id"],
            "requestType": "full",
            "expiresAt": "2099-01-01T00:00:00Z"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let request = data(res).await;
    let request_id: Uuid = request["id"].as_str().unwrap().parse().unwrap();
    assert_eq!(request["status"], "pending");
    assert!(!request["expiresAt"].as_str().unwrap().starts_with("2099"));

    let res = app.get("/api/access-requests", Some(seller)).send().await.unwrap();
    assert_eq!(data(res).await.as_array().unwrap().len(), 1);
    let res = app.get("/api/access-requests", Some(outsider)).send().await.unwrap();
    assert!(data(res).await.as_array().unwrap().is_empty());

    let res = app
        .put(&format!("/api/access-requests/{}", request_id), buyer)
        .json(&json!({ "status": "approved" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app
        .put(&format!("/api/access-requests/{}", request_id), seller)
        .json(&json!({ "status": "expired" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Let the request lapse; it can no longer be reviewed and a new one may
    // be opened.
    sqlx::query("UPDATE access_requests SET expires_at = NOW() - INTERVAL '1 minute' WHERE id = $1")
        .bind(request_id)
        .execute(&app.pool)
        .await
        .unwrap();

    let res = app
        .put(&format!("/api/access-requests/{}", request_id), seller)
        .json(&json!({ "status": "approved" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = app
        .post("/api/request-access", buyer)
        .json(&json!({ "noteListingId": listing["id"], "requestType": "documents" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let renewed = data(res).await;

    let res = app
        .put(&format!("/api/access-requests/{}", renewed["id"].as_str().unwrap()), seller)
        .json(&json!({ "status": "approved" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(data(res).await["status"], "approved");

    let res = app.get("/api/access-requests", Some(buyer)).send().await.unwrap();
    let mine = data(res).await;
    let statuses: Vec<&str> = mine
        .as_array()
        .unwrap()
        .iter()
        .map(|request| request["status"].as_str().unwrap())
        .collect();
    assert!(statuses.contains(&"expired"));
    assert!(statuses.contains(&"approved"));
}

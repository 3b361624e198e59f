mod common;

use common::{data, TestApp};
use reqwest::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

struct Deal {
    id: String,
    listing_id: String,
    seller: Uuid,
    buyer: Uuid,
}

/// Buyer inquires, seller accepts: the accepted inquiry opens the deal.
async fn open_deal(app: &TestApp) -> Deal {
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    let listing = app.active_listing(seller, json!({})).await;
    let listing_id = listing["id"].as_str().unwrap().to_string();

    let res = app
        .post("/api/inquiries", buyer)
        .json(&json!({
            "noteListingId": listing_id,
            "message": "Interested",
            "offerAmount": "118000"
        }))
        .send()
        .await
        .unwrap();
    let inquiry = data(res).await;

    let res = app
        .post(&format!("/api/inquiries/{}/respond", inquiry["id"].as_str().unwrap()), seller)
        .json(&json!({ "status": "accepted", "responseMessage": "Agreed" }))
        .send()
        .await
        .unwrap();
    let answer = data(res).await;

    Deal {
        id: answer["transaction"]["id"].as_str().unwrap().to_string(),
        listing_id,
        seller,
        buyer,
    }
}

async fn add_task(app: &TestApp, deal: &Deal, body: Value) -> String {
    let res = app
        .post(&format!("/api/transactions/{}/tasks", deal.id), deal.seller)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    data(res).await["id"].as_str().unwrap().to_string()
}

async fn complete(app: &TestApp, deal: &Deal, task_id: &str, user: Uuid) -> reqwest::Response {
    app.post(
        &format!("/api/transactions/{}/tasks/{}/complete", deal.id, task_id),
        user,
    )
    .send()
    .await
    .unwrap()
}

#[tokio::test]
async fn test_phases_advance_when_required_tasks_finish() {
    let app = TestApp::spawn().await;
    let deal = open_deal(&app).await;

    let res = app
        .get(&format!("/api/transactions/{}", deal.id), Some(deal.buyer))
        .send()
        .await
        .unwrap();
    let transaction = data(res).await;
    assert_eq!(transaction["currentPhase"], "negotiations");
    assert_eq!(transaction["status"], "pending");

    let optional =
        add_task(&app, &deal, json!({ "title": "Intro call", "isRequired": false })).await;
    let terms = add_task(&app, &deal, json!({ "title": "Agree terms" })).await;
    let pay_history = add_task(
        &app,
        &deal,
        json!({ "title": "Review pay history", "assignedTo": deal.buyer }),
    )
    .await;
    let wire = add_task(&app, &deal, json!({ "title": "Wire funds", "phase": "closing" })).await;

    // Optional tasks never move the deal.
    let res = complete(&app, &deal, &optional, deal.buyer).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(data(res).await["phaseAdvanced"], false);

    // Closing tasks wait for their phase.
    let res = complete(&app, &deal, &wire, deal.seller).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // Assigned tasks belong to the assignee.
    let res = complete(&app, &deal, &pay_history, deal.seller).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = complete(&app, &deal, &terms, deal.seller).await;
    assert_eq!(data(res).await["phaseAdvanced"], false);
    let res = complete(&app, &deal, &terms, deal.seller).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = complete(&app, &deal, &pay_history, deal.buyer).await;
    let done = data(res).await;
    assert_eq!(done["phaseAdvanced"], true);
    assert_eq!(done["transaction"]["currentPhase"], "closing");

    let res = app
        .get(&format!("/api/transactions/{}/timeline", deal.id), Some(deal.seller))
        .send()
        .await
        .unwrap();
    let timeline = data(res).await;
    let events = timeline.as_array().unwrap();
    assert_eq!(events[0]["description"], "Transaction created");
    let advance = events
        .iter()
        .find(|event| event["description"] == "Phase advanced from negotiations to closing")
        .expect("phase change recorded");
    assert_eq!(advance["eventType"], "info");

    // Past phases take no new tasks.
    let res = app
        .post(&format!("/api/transactions/{}/tasks", deal.id), deal.seller)
        .json(&json!({ "title": "Late", "phase": "negotiations" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = complete(&app, &deal, &wire, deal.buyer).await;
    let closed = data(res).await;
    assert_eq!(closed["transaction"]["currentPhase"], "completed");
    assert_eq!(closed["transaction"]["status"], "completed");
    assert!(!closed["transaction"]["completedAt"].is_null());

    let res = app
        .get(&format!("/api/note-listings/{}", deal.listing_id), Some(deal.seller))
        .send()
        .await
        .unwrap();
    assert_eq!(data(res).await["status"], "sold");

    let res = app
        .put(&format!("/api/transactions/{}", deal.id), deal.seller)
        .json(&json!({ "finalAmount": "1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_phase_without_required_tasks_stays_put() {
    let app = TestApp::spawn().await;
    let deal = open_deal(&app).await;

    let optional = add_task(&app, &deal, json!({ "title": "Optional", "isRequired": false })).await;
    let res = complete(&app, &deal, &optional, deal.seller).await;
    let result = data(res).await;
    assert_eq!(result["phaseAdvanced"], false);
    assert_eq!(result["transaction"]["currentPhase"], "negotiations");
}

#[tokio::test]
async fn test_updates_files_and_notes() {
    let app = TestApp::spawn().await;
    let deal = open_deal(&app).await;
    let outsider = Uuid::new_v4();

    let res = app
        .get(&format!("/api/transactions/{}", deal.id), Some(outsider))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app
        .put(&format!("/api/transactions/{}", deal.id), deal.seller)
        .json(&json!({ "status": "cancelled" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .put(&format!("/api/transactions/{}", deal.id), deal.seller)
        .json(&json!({ "status": "active", "finalAmount": "117500" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(data(res).await["status"], "active");

    for (name, public) in [("note.pdf", true), ("bank-statement.pdf", false)] {
        let res = app
            .post(&format!("/api/transactions/{}/files", deal.id), deal.seller)
            .json(&json!({
                "filename": name,
                "fileUrl": format!("https://files.example.com/{}", name),
                "fileType": "application/pdf",
                "fileSize": 2048,
                "isPublic": public,
                "category": "financial"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let res = app
        .get(&format!("/api/transactions/{}/files", deal.id), Some(deal.buyer))
        .send()
        .await
        .unwrap();
    let visible = data(res).await;
    assert_eq!(visible.as_array().unwrap().len(), 1);
    assert_eq!(visible[0]["filename"], "note.pdf");

    let res = app
        .get(&format!("/api/transactions/{}/files", deal.id), Some(deal.seller))
        .send()
        .await
        .unwrap();
    assert_eq!(data(res).await.as_array().unwrap().len(), 2);

    let res = app
        .post(&format!("/api/transactions/{}/timeline", deal.id), deal.buyer)
        .json(&json!({ "description": "Title company engaged" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = app
        .get(&format!("/api/transactions/{}/timeline", deal.id), Some(deal.buyer))
        .send()
        .await
        .unwrap();
    let timeline = data(res).await;
    let last = timeline.as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["eventType"], "note");
    assert_eq!(last["description"], "Title company engaged");
}

#[tokio::test]
async fn test_direct_creation_requires_seller_and_active_listing() {
    let app = TestApp::spawn().await;
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    let listing = app.active_listing(seller, json!({})).await;

    let res = app
        .post("/api/transactions", buyer)
        .json(&json!({ "listingId": listing["id"], "buyerId": buyer }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app
        .post("/api/transactions", seller)
        .json(&json!({ "noteListingId": listing["id"], "buyerId": buyer }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created = data(res).await;
    let amount: f64 = created["initialAmount"].to_string().trim_matches('"').parse().unwrap();
    assert_eq!(amount, 120000.0);
    assert_eq!(created["currentPhase"], "negotiations");
}

//! End-to-end journey through the HTTP API: checkout, cancellation, delivery,
//! a gated return approval and a partial refund with restock.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use bazaar_domain::Actor;
use bazaar_testkit::{admin, customer, product, super_admin, Harness};
use bazaard::{create_router, ApiState};
use http_body_util::BodyExt;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn call(app: &Router, method: &str, uri: &str, actor: &Actor, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-actor-id", actor.id.to_string())
        .header("x-actor-name", actor.display_name.clone())
        .header("x-actor-role", actor.role.clone());
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn checkout(lines: &[(uuid::Uuid, u32)]) -> Value {
    let items: Vec<Value> = lines
        .iter()
        .map(|(id, qty)| json!({ "product_id": id, "quantity": qty }))
        .collect();
    json!({
        "items": items,
        "shipping_address": {
            "recipient": "Noor Haddad",
            "street": "4 Mill Lane",
            "city": "Leeds",
            "postal_code": "LS1 4AP",
            "country": "GB",
            "phone": "+44 113 000 0000"
        },
        "payment_method": "CARD"
    })
}

fn id_of(body: &Value) -> String {
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_checkout_cancel_and_refund_journey() {
    let h = Harness::new();
    let a = h.seed(product("Teapot", dec!(25), 5)).await.unwrap();
    let b = h.seed(product("Cup set", dec!(18), 1)).await.unwrap();
    let app = create_router(Arc::new(ApiState {
        commerce: h.commerce.clone(),
    }));

    let buyer = customer("Noor");
    let clerk = admin("Clerk");
    let boss = super_admin("Boss");

    // Checkout reserves every line
    let (status, first) = call(&app, "POST", "/orders", &buyer, Some(checkout(&[(a, 3), (b, 1)]))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!((h.stock(a), h.stock(b)), (Some(2), Some(0)));

    // Cancelling restores it and is audited
    let (status, cancelled) = call(
        &app,
        "POST",
        &format!("/orders/{}/status", id_of(&first)),
        &boss,
        Some(json!({ "status": "CANCELLED", "reason": "changed address" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["is_cancelled"], true);
    assert_eq!((h.stock(a), h.stock(b)), (Some(5), Some(1)));

    let (_, audit) = call(&app, "GET", &format!("/orders/{}/audit", id_of(&first)), &boss, None).await;
    assert!(audit
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e["action"] == "ORDER_STATUS_CHANGED" && e["status_to"] == "CANCELLED"));

    // Second order, delivered
    let (status, second) = call(&app, "POST", "/orders", &buyer, Some(checkout(&[(a, 3), (b, 1)]))).await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id = id_of(&second);
    let status_uri = format!("/orders/{}/status", order_id);
    let paid = json!({ "status": "PAID", "payment_result": { "provider": "card", "reference": "ch_42" } });
    for body in [paid, json!({ "status": "SHIPPED" }), json!({ "status": "DELIVERED" })] {
        let (status, _) = call(&app, "POST", &status_uri, &boss, Some(body)).await;
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!((h.stock(a), h.stock(b)), (Some(2), Some(0)));

    // Day 6 of 7: the teapot line is still returnable
    h.advance_days(6);
    let (status, report) = call(&app, "GET", &format!("/orders/{}/return-eligibility", order_id), &buyer, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(report.as_array().unwrap().iter().all(|line| line["eligible"] == true));

    let line_id = second["items"][0]["id"].clone();
    let (status, opened) = call(
        &app,
        "POST",
        &format!("/orders/{}/returns", order_id),
        &buyer,
        Some(json!({ "line_item_id": line_id, "reason": "DEFECTIVE", "comments": "lid cracked", "quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(opened["status"], "REQUESTED");
    assert_eq!(opened["quantity"], 1);
    let return_uri = format!("/returns/{}/status", id_of(&opened));

    // A non-top-privilege approval is parked and leaves the request alone
    let (status, parked) = call(&app, "POST", &return_uri, &clerk, Some(json!({ "status": "APPROVED" }))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let (status, _) = call(&app, "POST", &return_uri, &clerk, Some(json!({ "status": "APPROVED" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (_, unchanged) = call(&app, "GET", &format!("/returns/{}", id_of(&opened)), &buyer, None).await;
    assert_eq!(unchanged["status"], "REQUESTED");

    let (status, approved) = call(&app, "POST", &format!("/approvals/{}/approve", id_of(&parked)), &boss, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["result"]["status"], "APPROVED");

    for body in [json!({ "status": "PICKUP_SCHEDULED" }), json!({ "status": "PICKED_UP" })] {
        let (status, _) = call(&app, "POST", &return_uri, &boss, Some(body)).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, refunded) = call(
        &app,
        "POST",
        &return_uri,
        &boss,
        Some(json!({ "status": "REFUNDED", "restore_inventory": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refunded["status"], "REFUNDED");

    // Only the returned teapot goes back on the shelf
    assert_eq!((h.stock(a), h.stock(b)), (Some(3), Some(0)));
    assert_eq!(h.store.financial_record_count(), 1);
}

//! End-to-end purchase scenarios against the mock billing service.

mod common;

use common::TestApp;
use iabkit_lib::testing::receipt_json;
use iabkit_lib::{BillingEvent, BuyIntentResponse, Category, FlowResult, ResponseCode};

#[tokio::test]
async fn test_purchase_coins100_end_to_end() {
    let mut app = TestApp::new();
    app.connect().await;
    assert!(!app.session.is_purchased("coins100"));

    app.session
        .purchase("coins100", Category::OneTime)
        .await
        .unwrap();
    assert_eq!(app.launcher.launched().len(), 1);

    let result = app.signed_result("coins100", "tok-100", &app.last_payload());
    assert!(app.session.handle_flow_result(result));

    assert!(app.session.is_purchased("coins100"));
    assert_eq!(
        app.handler.count(&BillingEvent::ProductPurchased {
            product_id: "coins100".into(),
            already_owned: false,
        }),
        1
    );
    assert_eq!(app.handler.purchased().len(), 1);
    assert!(app.handler.error_codes().is_empty());
}

#[tokio::test]
async fn test_already_owned_with_empty_cache_triggers_restore() {
    let mut app = TestApp::new();
    app.connect().await;
    app.service
        .set_buy_intent(BuyIntentResponse::error(ResponseCode::ITEM_ALREADY_OWNED));
    app.service.set_owned(
        Category::OneTime,
        vec![receipt_json("coins100", "tok-owned", "")],
    );
    let requests_before = app.service.purchases_requests().len();

    app.session
        .purchase("coins100", Category::OneTime)
        .await
        .unwrap();

    assert!(app.service.purchases_requests().len() > requests_before);
    assert!(app.session.is_purchased("coins100"));
    assert_eq!(
        app.handler.purchased(),
        vec![("coins100".to_string(), true)]
    );
}

#[tokio::test]
async fn test_second_purchase_invalidates_first_completion() {
    let mut app = TestApp::new();
    app.connect().await;

    app.session.purchase("a", Category::OneTime).await.unwrap();
    let payload_a = app.last_payload();
    app.session.purchase("b", Category::OneTime).await.unwrap();
    let payload_b = app.last_payload();
    assert_ne!(payload_a, payload_b);

    let late = app.signed_result("a", "tok-a", &payload_a);
    assert!(app.session.handle_flow_result(late));

    assert!(!app.session.is_purchased("a"));
    assert_eq!(app.handler.error_codes(), vec![102]);
    assert!(app.handler.purchased().is_empty());
}

#[tokio::test]
async fn test_tampered_receipt_never_cached() {
    let mut app = TestApp::new();
    app.connect().await;
    app.session
        .purchase("coins100", Category::OneTime)
        .await
        .unwrap();
    let payload = app.last_payload();

    let receipt = receipt_json("coins100", "tok-1", &payload);
    let signature = app.signer.sign(&receipt);
    let tampered = receipt.replace("tok-1", "tok-2");
    let result = FlowResult::completed(app.request_code(), tampered, signature);

    assert!(app.session.handle_flow_result(result));
    assert!(!app.session.is_purchased("coins100"));
    assert_eq!(app.handler.error_codes(), vec![102]);
}

#[tokio::test]
async fn test_missing_license_key_skips_verification() {
    let mut app = TestApp::unverified();
    app.connect().await;
    app.session
        .purchase("coins100", Category::OneTime)
        .await
        .unwrap();

    let receipt = receipt_json("coins100", "tok-1", &app.last_payload());
    let result = FlowResult::completed(app.request_code(), receipt, "not a signature");
    app.session.handle_flow_result(result);

    assert!(app.session.is_purchased("coins100"));
}

#[tokio::test]
async fn test_purchase_then_consume_allows_rebuy() {
    let mut app = TestApp::new();
    app.connect().await;

    app.session.purchase_product("coins100").await.unwrap();
    let result = app.signed_result("coins100", "tok-1", &app.last_payload());
    app.session.handle_flow_result(result);
    assert!(app.session.is_purchased("coins100"));

    app.session.consume("coins100").await.unwrap();
    assert!(!app.session.is_purchased("coins100"));
    assert_eq!(app.service.consumed_tokens(), vec!["tok-1".to_string()]);

    assert!(app.session.consume("coins100").await.is_err());
    assert_eq!(app.service.consumed_tokens().len(), 1);
}

#[tokio::test]
async fn test_session_usable_while_purchase_pending() {
    let mut app = TestApp::new();
    app.connect().await;
    app.service
        .set_owned(Category::Subscription, vec![receipt_json("monthly", "t", "")]);

    app.session
        .purchase("coins100", Category::OneTime)
        .await
        .unwrap();
    let payload = app.last_payload();

    app.session.restore(Category::Subscription).await.unwrap();
    assert!(app.session.is_subscribed("monthly"));

    let result = app.signed_result("coins100", "tok-1", &payload);
    app.session.handle_flow_result(result);
    assert!(app.session.is_purchased("coins100"));
}

#[tokio::test]
async fn test_disconnect_blocks_purchases() {
    let mut app = TestApp::new();
    app.connect().await;
    app.session.on_service_disconnected();

    assert!(app
        .session
        .purchase("coins100", Category::OneTime)
        .await
        .is_err());
    assert!(app.service.buy_intent_requests().is_empty());
    assert!(app.handler.events().is_empty());
}

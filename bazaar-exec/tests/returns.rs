//! Return eligibility, customer requests and the return machine.

use bazaar_audit::AuditAction;
use bazaar_domain::{
    Money, OrderStatus, PlatformSettings, Quantity, ReturnDetails, ReturnReason, ReturnStatus,
};
use bazaar_engine::{IneligibilityReason, ReturnTransitionInput};
use bazaar_exec::{ErrorKind, ExecError, GateOutcome};
use bazaar_testkit::{admin, customer, product, product_with_policy, Harness};
use chrono::Duration;
use rust_decimal_macros::dec;

async fn advance_return(h: &Harness, return_id: uuid::Uuid, to: ReturnStatus, input: ReturnTransitionInput) -> anyhow::Result<bazaar_domain::ReturnRequest> {
    match h
        .commerce
        .transition_return_status(return_id, to, input, &h.operator)
        .await?
    {
        GateOutcome::Applied(request) => Ok(request),
        GateOutcome::PendingApproval(_) => anyhow::bail!("operator change was parked"),
    }
}

#[tokio::test]
async fn test_window_boundary_is_inclusive() -> anyhow::Result<()> {
    let h = Harness::new();
    let a = h.seed(product("Boots", dec!(90), 3)).await?;
    let buyer = customer("Mei");
    let order = h.place(&buyer, &[(a, 1)]).await?;
    let delivered = h.deliver(order.id).await?;
    let delivered_at = delivered.delivered_at.expect("delivered");

    h.clock.set(delivered_at + Duration::days(7));
    let verdicts = h.commerce.return_eligibility(order.id, &buyer).await?;
    assert!(verdicts[0].eligible, "{:?}", verdicts[0].reasons);

    h.clock.set(delivered_at + Duration::days(7) + Duration::seconds(1));
    let verdicts = h.commerce.return_eligibility(order.id, &buyer).await?;
    assert!(!verdicts[0].eligible);
    assert_eq!(
        verdicts[0].reasons,
        vec![IneligibilityReason::WindowExpired {
            window_ends_at: delivered_at + Duration::days(7)
        }]
    );

    let err = h
        .commerce
        .request_return(order.id, order.items[0].id, ReturnReason::SizeIssue, ReturnDetails::default(), &buyer)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IneligibleReturn);
    Ok(())
}

#[tokio::test]
async fn test_product_window_overrides_platform_default() -> anyhow::Result<()> {
    let h = Harness::new();
    let a = h.seed(product_with_policy("Coat", dec!(150), 2, true, Some(30))).await?;
    let b = h.seed(product_with_policy("Earrings", dec!(40), 2, false, None)).await?;
    let buyer = customer("Zoe");
    let order = h.place(&buyer, &[(a, 1), (b, 1)]).await?;
    h.deliver(order.id).await?;
    h.advance_days(20);

    let verdicts = h.commerce.return_eligibility(order.id, &buyer).await?;
    assert!(verdicts[0].eligible);
    assert!(!verdicts[1].eligible);
    assert!(verdicts[1].reasons.contains(&IneligibilityReason::NotReturnable));
    assert!(verdicts[1]
        .reasons
        .iter()
        .any(|r| matches!(r, IneligibilityReason::WindowExpired { .. })));
    Ok(())
}

#[tokio::test]
async fn test_every_failing_reason_is_reported() -> anyhow::Result<()> {
    let h = Harness::with_settings(PlatformSettings {
        returns_enabled: false,
        default_return_window_days: 7,
    });
    let a = h.seed(product("Scarf", dec!(20), 2)).await?;
    let buyer = customer("Ivo");
    let order = h.place(&buyer, &[(a, 1)]).await?;

    let verdicts = h.commerce.return_eligibility(order.id, &buyer).await?;
    assert_eq!(
        verdicts[0].reasons,
        vec![IneligibilityReason::ReturnsDisabled, IneligibilityReason::NotDelivered]
    );
    assert_eq!(verdicts[0].window_ends_at, None);
    Ok(())
}

#[tokio::test]
async fn test_return_refund_with_restock() -> anyhow::Result<()> {
    let h = Harness::new();
    let a = h.seed(product("Blender", dec!(70), 5)).await?;
    let buyer = customer("Rosa");
    let order = h.place(&buyer, &[(a, 2)]).await?;
    h.deliver(order.id).await?;
    assert_eq!(h.stock(a), Some(3));

    h.advance_days(6);
    let line = order.items[0].id;
    let request = h
        .commerce
        .request_return(
            order.id,
            line,
            ReturnReason::Defective,
            ReturnDetails {
                comments: Some("motor stops".to_string()),
                images: vec![],
                quantity: None,
            },
            &buyer,
        )
        .await?;
    assert_eq!(request.status, ReturnStatus::Requested);
    assert_eq!(request.refund_amount.as_decimal(), dec!(140));

    // A second request for the same line is refused while this one is active
    let err = h
        .commerce
        .request_return(order.id, line, ReturnReason::Defective, ReturnDetails::default(), &buyer)
        .await
        .unwrap_err();
    match err {
        ExecError::IneligibleReturn { reasons, .. } => assert_eq!(
            reasons,
            vec![IneligibilityReason::ActiveReturnExists {
                status: ReturnStatus::Requested
            }]
        ),
        other => panic!("unexpected error: {other}"),
    }

    for status in [ReturnStatus::Approved, ReturnStatus::PickupScheduled, ReturnStatus::PickedUp] {
        advance_return(&h, request.id, status, ReturnTransitionInput::default()).await?;
    }
    assert_eq!(h.stock(a), Some(3));

    let refunded = advance_return(
        &h,
        request.id,
        ReturnStatus::Refunded,
        ReturnTransitionInput {
            restore_inventory: true,
            note: Some("inspected".to_string()),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(refunded.status, ReturnStatus::Refunded);
    assert_eq!(refunded.history.len(), 5);
    assert_eq!(refunded.latest_status(), ReturnStatus::Refunded);
    assert_eq!(h.stock(a), Some(5));

    assert_eq!(h.store.financial_record_count(), 1);
    let order_now = h.commerce.get_order(order.id, &buyer).await?;
    assert_eq!(order_now.items[0].return_status, ReturnStatus::Refunded);
    assert_eq!(order_now.status, OrderStatus::Delivered);

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].status, ReturnStatus::Refunded);
    assert_eq!(sent[1].refund_amount.map(|m| m.as_decimal()), Some(dec!(140)));

    let actions: Vec<_> = h.audit_sink.all().into_iter().map(|e| e.action).collect();
    assert!(actions.contains(&AuditAction::ReturnRequested));
    assert!(actions.contains(&AuditAction::InventoryRestored));
    Ok(())
}

#[tokio::test]
async fn test_partial_refund_and_override_cap() -> anyhow::Result<()> {
    let h = Harness::new();
    let a = h.seed(product("Mixer", dec!(50), 2)).await?;
    let buyer = customer("Jun");
    let order = h.place(&buyer, &[(a, 1)]).await?;
    h.deliver(order.id).await?;

    let request = h
        .commerce
        .request_return(order.id, order.items[0].id, ReturnReason::NotAsDescribed, ReturnDetails::default(), &buyer)
        .await?;
    for status in [ReturnStatus::Approved, ReturnStatus::PickupScheduled, ReturnStatus::PickedUp] {
        advance_return(&h, request.id, status, ReturnTransitionInput::default()).await?;
    }

    let err = advance_return(
        &h,
        request.id,
        ReturnStatus::Refunded,
        ReturnTransitionInput {
            refund_amount: Some(Money::new(dec!(50.01))?),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.downcast::<ExecError>()?.kind(), ErrorKind::Invalid);

    let refunded = advance_return(
        &h,
        request.id,
        ReturnStatus::Refunded,
        ReturnTransitionInput {
            refund_amount: Some(Money::new(dec!(35))?),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(refunded.refund_amount.as_decimal(), dec!(35));
    assert_eq!(h.stock(a), Some(1));
    Ok(())
}

#[tokio::test]
async fn test_rejected_line_can_be_requested_again() -> anyhow::Result<()> {
    let h = Harness::new();
    let a = h.seed(product("Toaster", dec!(30), 2)).await?;
    let buyer = customer("Oli");
    let order = h.place(&buyer, &[(a, 1)]).await?;
    h.deliver(order.id).await?;
    let line = order.items[0].id;

    let first = h
        .commerce
        .request_return(order.id, line, ReturnReason::ChangedMind, ReturnDetails::default(), &buyer)
        .await?;
    advance_return(&h, first.id, ReturnStatus::Rejected, ReturnTransitionInput::default()).await?;

    let second = h
        .commerce
        .request_return(order.id, line, ReturnReason::Defective, ReturnDetails::default(), &buyer)
        .await?;
    assert_ne!(first.id, second.id);
    assert_eq!(h.commerce.returns_for_order(order.id, &buyer).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_invalid_return_transition_is_a_conflict() -> anyhow::Result<()> {
    let h = Harness::new();
    let a = h.seed(product("Grill", dec!(99), 2)).await?;
    let buyer = customer("Ana");
    let order = h.place(&buyer, &[(a, 1)]).await?;
    h.deliver(order.id).await?;
    let request = h
        .commerce
        .request_return(order.id, order.items[0].id, ReturnReason::WrongItem, ReturnDetails::default(), &buyer)
        .await?;

    let err = advance_return(&h, request.id, ReturnStatus::Refunded, ReturnTransitionInput::default())
        .await
        .unwrap_err();
    assert_eq!(err.downcast::<ExecError>()?.kind(), ErrorKind::Conflict);

    let unchanged = h.commerce.get_return(request.id, &buyer).await?;
    assert_eq!(unchanged.status, ReturnStatus::Requested);
    assert_eq!(h.store.financial_record_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_notification_failure_does_not_fail_transition() -> anyhow::Result<()> {
    let h = Harness::new();
    let a = h.seed(product("Fan", dec!(45), 2)).await?;
    let buyer = customer("Lu");
    let order = h.place(&buyer, &[(a, 1)]).await?;
    h.deliver(order.id).await?;
    let request = h
        .commerce
        .request_return(order.id, order.items[0].id, ReturnReason::Damaged, ReturnDetails::default(), &buyer)
        .await?;

    h.notifier.set_fail(true);
    let approved = advance_return(&h, request.id, ReturnStatus::Approved, ReturnTransitionInput::default()).await?;
    assert_eq!(approved.status, ReturnStatus::Approved);

    // A mailer slower than the bound is abandoned
    h.notifier.set_fail(false);
    h.notifier.set_delay(Some(std::time::Duration::from_secs(2)));
    advance_return(&h, request.id, ReturnStatus::PickupScheduled, ReturnTransitionInput::default()).await?;
    advance_return(&h, request.id, ReturnStatus::PickedUp, ReturnTransitionInput::default()).await?;
    let refunded = advance_return(&h, request.id, ReturnStatus::Refunded, ReturnTransitionInput::default()).await?;
    assert_eq!(refunded.status, ReturnStatus::Refunded);
    assert_eq!(h.store.financial_record_count(), 1);
    assert!(h.notifier.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_other_customers_cannot_request() -> anyhow::Result<()> {
    let h = Harness::new();
    let a = h.seed(product("Clock", dec!(25), 2)).await?;
    let order = h.place(&customer("Owner"), &[(a, 1)]).await?;
    h.deliver(order.id).await?;

    let err = h
        .commerce
        .request_return(order.id, order.items[0].id, ReturnReason::Other, ReturnDetails::default(), &customer("Stranger"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    // Staff may file on behalf of the customer
    let request = h
        .commerce
        .request_return(order.id, order.items[0].id, ReturnReason::Other, ReturnDetails::default(), &admin("Desk"))
        .await?;
    assert_eq!(request.customer_id, order.customer_id);
    Ok(())
}

#[tokio::test]
async fn test_partial_return_restocks_only_returned_units() -> anyhow::Result<()> {
    let h = Harness::new();
    let a = h.seed(product("Teapot", dec!(25), 5)).await?;
    let b = h.seed(product("Cup set", dec!(18), 1)).await?;
    let buyer = customer("Noor");
    let order = h.place(&buyer, &[(a, 3), (b, 1)]).await?;
    assert_eq!((h.stock(a), h.stock(b)), (Some(2), Some(0)));
    h.deliver(order.id).await?;

    h.advance_days(6);
    let line = order.items[0].id;

    let err = h
        .commerce
        .request_return(
            order.id,
            line,
            ReturnReason::Defective,
            ReturnDetails {
                quantity: Some(Quantity::new(4)?),
                ..Default::default()
            },
            &buyer,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invalid);
    assert_eq!(h.store.return_count(), 0);

    let request = h
        .commerce
        .request_return(
            order.id,
            line,
            ReturnReason::Defective,
            ReturnDetails {
                quantity: Some(Quantity::new(1)?),
                ..Default::default()
            },
            &buyer,
        )
        .await?;
    assert_eq!(request.quantity.get(), 1);
    assert_eq!(request.refund_amount.as_decimal(), dec!(25));
    assert_eq!(request.max_refund().as_decimal(), dec!(25));

    advance_return(&h, request.id, ReturnStatus::Approved, ReturnTransitionInput::default()).await?;
    advance_return(&h, request.id, ReturnStatus::PickupScheduled, ReturnTransitionInput::default()).await?;
    advance_return(&h, request.id, ReturnStatus::PickedUp, ReturnTransitionInput::default()).await?;
    let refunded = advance_return(
        &h,
        request.id,
        ReturnStatus::Refunded,
        ReturnTransitionInput {
            restore_inventory: true,
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(refunded.status, ReturnStatus::Refunded);

    assert_eq!((h.stock(a), h.stock(b)), (Some(3), Some(0)));
    assert_eq!(h.store.financial_record_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_refund_with_restock_audits_once() -> anyhow::Result<()> {
    let h = Harness::new();
    let a = h.seed(product("Heater", dec!(70), 2)).await?;
    let buyer = customer("Sol");
    let order = h.place(&buyer, &[(a, 1)]).await?;
    h.deliver(order.id).await?;
    let request = h
        .commerce
        .request_return(order.id, order.items[0].id, ReturnReason::Defective, ReturnDetails::default(), &buyer)
        .await?;

    for status in [ReturnStatus::Approved, ReturnStatus::PickupScheduled, ReturnStatus::PickedUp] {
        advance_return(&h, request.id, status, ReturnTransitionInput::default()).await?;
    }
    advance_return(
        &h,
        request.id,
        ReturnStatus::Refunded,
        ReturnTransitionInput {
            restore_inventory: true,
            ..Default::default()
        },
    )
    .await?;

    let events = h.audit_sink.all();
    let count = |action: AuditAction, status_to: Option<&str>| {
        events
            .iter()
            .filter(|e| e.action == action && (status_to.is_none() || e.status_to.as_deref() == status_to))
            .count()
    };
    assert_eq!(count(AuditAction::ReturnRequested, None), 1);
    for status in ["APPROVED", "PICKUP_SCHEDULED", "PICKED_UP", "REFUNDED"] {
        assert_eq!(count(AuditAction::ReturnStatusChanged, Some(status)), 1, "{status}");
    }
    assert_eq!(count(AuditAction::InventoryRestored, None), 1);
    assert_eq!(h.stock(a), Some(2));
    Ok(())
}

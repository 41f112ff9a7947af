#![allow(non_snake_case)]
use nft_mint_session::{
    Action,
    ActionKind,
    SessionError,
    remote::ContractCall,
    test_helpers::{
        TestContext,
        address,
    },
};

#[tokio::test]
async fn toggle__participant_is_rejected_locally() {
    let ctx = TestContext::new();
    // given
    let mut coordinator = ctx.coordinator_for(ctx.alice());
    coordinator.connect().await.unwrap();

    // when
    let result = coordinator.submit(Action::TogglePublicMint).await;

    // then
    assert!(matches!(
        result,
        Err(SessionError::Unauthorized(ActionKind::TogglePublicMint))
    ));
    assert!(ctx.contract.submitted_calls().is_empty());
}

#[tokio::test]
async fn toggle__contract_enforces_ownership_when_guard_is_bypassed() {
    let ctx = TestContext::new();
    // given
    let mut coordinator = ctx.coordinator_for(ctx.owner());
    coordinator.connect().await.unwrap();
    ctx.contract.update_state(|s| s.owner = address(9));

    // when
    let result = coordinator.submit(Action::TogglePublicMint).await;

    // then
    assert_eq!(
        result.err(),
        Some(SessionError::RemoteRevert(
            "Ownable: caller is not the owner".to_string()
        ))
    );
}

#[tokio::test]
async fn toggles__out_of_order_confirmations_both_reflected() {
    let ctx = TestContext::new();
    ctx.contract.hold_confirmations(true);
    // given
    let mut coordinator = ctx.coordinator_for(ctx.owner());
    coordinator.connect().await.unwrap();
    let public = coordinator.submit(Action::TogglePublicMint).await.unwrap();
    let whitelist = coordinator
        .submit(Action::ToggleWhitelistMint)
        .await
        .unwrap();
    assert_eq!(coordinator.pending().len(), 2);

    // when
    assert!(ctx.contract.release(&whitelist.pending().hash.clone()));
    let settled = whitelist.confirm().await;
    coordinator.settle(settled).await.unwrap();
    assert!(ctx.contract.release(&public.pending().hash.clone()));
    let settled = public.confirm().await;
    coordinator.settle(settled).await.unwrap();

    // then
    let snapshot = coordinator.snapshot().unwrap();
    assert!(snapshot.public_mint_open());
    assert!(snapshot.whitelist_mint_open());
    assert!(coordinator.pending().is_empty());
}

#[tokio::test]
async fn whitelist__add_then_check_then_remove() {
    let ctx = TestContext::new();
    // given
    let mut coordinator = ctx.coordinator_for(ctx.owner());
    coordinator.connect().await.unwrap();
    let alice = ctx.alice();

    // when
    let added = coordinator
        .submit(Action::AddToWhitelist(alice.clone()))
        .await
        .unwrap();
    let settled = added.confirm().await;
    coordinator.settle(settled).await.unwrap();
    let listed = coordinator.check_whitelist(&alice).await.unwrap();
    let removed = coordinator
        .submit(Action::RemoveFromWhitelist(alice.clone()))
        .await
        .unwrap();
    let settled = removed.confirm().await;
    coordinator.settle(settled).await.unwrap();
    let still_listed = coordinator.check_whitelist(&alice).await.unwrap();

    // then
    assert!(listed);
    assert!(!still_listed);
    assert_eq!(
        ctx.contract.submitted_calls(),
        vec![
            ContractCall::AddToWhitelist(alice.clone()),
            ContractCall::RemoveFromWhitelist(alice),
        ]
    );
}

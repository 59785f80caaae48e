mod common;

use common::{FaultyStore, Harness};
use credits_ledger::domain::user::Credits;
use credits_ledger::error::ErrorKind;
use std::sync::Arc;

#[tokio::test]
async fn test_store_outage_leaves_no_partial_purchase() {
    let store = Arc::new(FaultyStore::default());
    let h = Harness::with_store(store.clone()).await;
    let user = h.user("alice", 60).await;
    let hat = h.product("Hat", 50, 1).await;

    store.set_down(true);
    let err = h
        .engine
        .catalog()
        .purchase(&user.id, &hat.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    assert!(!err.is_business_outcome());
    store.set_down(false);

    assert_eq!(
        h.engine.ledger().balance(&user.id).await.unwrap(),
        Credits::new(60)
    );
    assert_eq!(h.engine.catalog().product(&hat.id).await.unwrap().stock, 1);
    assert!(h.engine.catalog().orders(&user.id, 10).await.unwrap().is_empty());
    h.assert_consistent().await;

    h.engine.catalog().purchase(&user.id, &hat.id).await.unwrap();
    h.assert_consistent().await;
}

#[tokio::test]
async fn test_store_outage_during_earn_and_adjust() {
    let store = Arc::new(FaultyStore::default());
    let h = Harness::with_store(store.clone()).await;
    let user = h.user("bob", 0).await;

    store.set_down(true);
    assert_eq!(
        h.engine.ledger().earn(&user.id).await.unwrap_err().kind(),
        ErrorKind::StoreUnavailable
    );
    assert!(
        h.engine
            .ledger()
            .admin_adjust(&h.admin, &user.id, 10, "bonus")
            .await
            .is_err()
    );
    store.set_down(false);

    assert_eq!(
        h.engine.ledger().balance(&user.id).await.unwrap(),
        Credits::ZERO
    );
    assert!(h.engine.ledger().history(&user.id, 10).await.unwrap().is_empty());

    // A failed earn does not start the cooldown.
    h.engine.ledger().earn(&user.id).await.unwrap();
    h.assert_consistent().await;
}

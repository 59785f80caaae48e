mod common;

use common::Harness;
use credits_ledger::domain::product::ProductPatch;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[tokio::test]
async fn test_random_operations_keep_balances_consistent() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let h = Harness::new().await;

    let mut users = Vec::new();
    for i in 0..8 {
        users.push(h.user(&format!("user{i}"), rng.gen_range(0..50)).await);
    }
    let mut products = Vec::new();
    for i in 0..4 {
        products.push(
            h.product(&format!("item{i}"), rng.gen_range(1..40), rng.gen_range(0..5))
                .await,
        );
    }

    for _ in 0..500 {
        let user = &users[rng.gen_range(0..users.len())];
        let product = &products[rng.gen_range(0..products.len())];
        // Business refusals are expected here; only the invariants matter.
        let _ = match rng.gen_range(0..5) {
            0 => h.engine.ledger().earn(&user.id).await.map(drop),
            1 => h
                .engine
                .ledger()
                .admin_adjust(&h.admin, &user.id, rng.gen_range(-60..60), "random")
                .await
                .map(drop),
            2 => h
                .engine
                .catalog()
                .update_product(
                    &h.admin,
                    &product.id,
                    ProductPatch {
                        stock: Some(rng.gen_range(0..3)),
                        ..Default::default()
                    },
                )
                .await
                .map(drop),
            3 => h.clock.advance_secs(rng.gen_range(0..400)),
            _ => h
                .engine
                .catalog()
                .purchase(&user.id, &product.id)
                .await
                .map(drop),
        };
    }

    h.assert_consistent().await;
    for user in &users {
        let orders = h.engine.catalog().orders(&user.id, 100).await.unwrap();
        let history = h.engine.ledger().history(&user.id, 100).await.unwrap();
        let purchases = history
            .iter()
            .filter(|e| e.reason.starts_with("purchase:"))
            .count();
        if history.len() < 100 {
            assert_eq!(orders.len(), purchases);
        }
    }
}

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use common::TestApp;
use household_api::{
    entities::{ingredient::StockStatus, stock_transaction, stock_transaction::StockAction},
    errors::ServiceError,
    events::EventSender,
    services::{
        ledger::{LedgerService, NewIngredient, StockMovement},
        recognition::IngredientRecognizer,
    },
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

fn movement(name: &str, action: StockAction, quantity: f64, actor: Option<i32>) -> StockMovement {
    StockMovement {
        name: name.to_string(),
        action,
        quantity,
        actor,
        image_ref: None,
    }
}

async fn ledger_rows(app: &TestApp, ingredient_id: i32) -> u64 {
    stock_transaction::Entity::find()
        .filter(stock_transaction::Column::IngredientId.eq(ingredient_id))
        .count(app.state.db.as_ref())
        .await
        .unwrap()
}

#[tokio::test]
async fn purchase_then_consume_updates_stock_and_ledger() {
    let app = TestApp::new().await;
    let cook = app.login("cook@example.com").await;
    let ledger = &app.state.services.ledger;

    let bought = ledger
        .record_transaction(movement("Flour", StockAction::Purchase, 10.0, Some(cook)))
        .await
        .expect("purchase");
    assert_eq!(bought.previous_quantity, 0.0);
    assert_eq!(bought.ingredient.quantity, 10.0);

    let used = ledger
        .record_transaction(movement("Flour", StockAction::Consume, 3.0, Some(cook)))
        .await
        .expect("consume");
    assert_eq!(used.previous_quantity, 10.0);
    assert_eq!(used.ingredient.quantity, 7.0);
    assert_eq!(used.transaction.user_id, Some(cook));

    assert_eq!(ledger_rows(&app, used.ingredient.id).await, 2);
}

#[tokio::test]
async fn consuming_unknown_ingredient_is_not_found() {
    let app = TestApp::new().await;
    let result = app
        .state
        .services
        .ledger
        .record_transaction(movement("Saffron", StockAction::Consume, 1.0, None))
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));

    let listed = app.state.services.ledger.list_ingredients().await.unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn purchasing_unknown_ingredient_creates_it() {
    let app = TestApp::new().await;
    let receipt = app
        .state
        .services
        .ledger
        .record_transaction(movement("Rice", StockAction::Purchase, 2.5, None))
        .await
        .unwrap();

    assert_eq!(receipt.ingredient.name, "Rice");
    assert_eq!(receipt.ingredient.quantity, 2.5);
    assert_eq!(receipt.ingredient.critical_quantity, 0.0);
    assert_eq!(receipt.ingredient.image_ref, None);
}

#[tokio::test]
async fn stock_may_go_negative() {
    let app = TestApp::new().await;
    let ledger = &app.state.services.ledger;
    ledger
        .record_transaction(movement("Eggs", StockAction::Purchase, 2.0, None))
        .await
        .unwrap();

    let receipt = ledger
        .record_transaction(movement("Eggs", StockAction::Consume, 5.0, None))
        .await
        .unwrap();
    assert_eq!(receipt.ingredient.quantity, -3.0);
    assert_eq!(receipt.ingredient.status(), StockStatus::Critical);
}

#[tokio::test]
async fn critical_threshold_is_inclusive() {
    let app = TestApp::new().await;
    let ledger = &app.state.services.ledger;
    let milk = ledger
        .create_ingredient(
            NewIngredient {
                name: "Milk".to_string(),
                quantity: 3.0,
                critical_quantity: 2.0,
                image_ref: None,
            },
            None,
        )
        .await
        .unwrap();
    ledger
        .create_ingredient(
            NewIngredient {
                name: "Sugar".to_string(),
                quantity: 5.0,
                critical_quantity: 1.0,
                image_ref: None,
            },
            None,
        )
        .await
        .unwrap();
    assert!(ledger.list_critical().await.unwrap().is_empty());

    ledger
        .record_transaction(movement("Milk", StockAction::Consume, 1.0, None))
        .await
        .unwrap();

    let critical = ledger.list_critical().await.unwrap();
    assert_eq!(critical.len(), 1);
    assert_eq!(critical[0].id, milk.id);
    assert_eq!(critical[0].quantity, 2.0);
}

#[tokio::test]
async fn raising_threshold_marks_ingredient_critical() {
    let app = TestApp::new().await;
    let ledger = &app.state.services.ledger;
    let oil = ledger
        .create_ingredient(
            NewIngredient {
                name: "Oil".to_string(),
                quantity: 4.0,
                critical_quantity: 0.0,
                image_ref: None,
            },
            None,
        )
        .await
        .unwrap();

    let updated = ledger.set_critical_quantity(oil.id, 4.0).await.unwrap();
    assert!(updated.is_critical());
    assert_eq!(ledger.list_critical().await.unwrap().len(), 1);
}

#[tokio::test]
async fn duplicate_ingredient_name_conflicts() {
    let app = TestApp::new().await;
    let ledger = &app.state.services.ledger;
    let salt = NewIngredient {
        name: "Salt".to_string(),
        quantity: 1.0,
        critical_quantity: 0.0,
        image_ref: None,
    };
    ledger.create_ingredient(salt.clone(), None).await.unwrap();
    let second = ledger.create_ingredient(salt, None).await;
    assert_matches!(second, Err(ServiceError::Conflict(_)));
}

#[tokio::test]
async fn ledger_reconciles_with_stored_quantity() {
    let app = TestApp::new().await;
    let ledger = &app.state.services.ledger;
    let butter = ledger
        .create_ingredient(
            NewIngredient {
                name: "Butter".to_string(),
                quantity: 4.0,
                critical_quantity: 1.0,
                image_ref: None,
            },
            None,
        )
        .await
        .unwrap();
    ledger
        .record_transaction(movement("Butter", StockAction::Purchase, 6.0, None))
        .await
        .unwrap();
    ledger
        .record_transaction(movement("Butter", StockAction::Consume, 2.5, None))
        .await
        .unwrap();

    let report = ledger.reconcile(butter.id).await.unwrap();
    assert_eq!(report.stored_quantity, 7.5);
    assert_eq!(report.derived_quantity, 7.5);
    assert_eq!(report.drift, 0.0);
    assert_eq!(report.transaction_count, 3);
}

#[tokio::test]
async fn activity_lists_newest_first() {
    let app = TestApp::new().await;
    let ledger = &app.state.services.ledger;
    for (name, action) in [
        ("Flour", StockAction::Purchase),
        ("Yeast", StockAction::Purchase),
        ("Flour", StockAction::Consume),
    ] {
        ledger
            .record_transaction(movement(name, action, 1.0, None))
            .await
            .unwrap();
    }

    let activity = ledger.list_activity(None).await.unwrap();
    assert_eq!(activity.len(), 3);
    assert_eq!(activity[0].ingredient_name, "Flour");
    assert_eq!(activity[0].action, StockAction::Consume);
    assert_eq!(activity[0].signed_quantity, -1.0);
    assert_eq!(activity[2].ingredient_name, "Flour");
    assert_eq!(activity[2].action, StockAction::Purchase);

    let limited = ledger.list_activity(Some(1)).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, activity[0].id);
}

#[tokio::test]
async fn concurrent_purchases_all_apply() {
    let app = TestApp::new().await;
    let ledger = app.state.services.ledger.clone();
    let pasta = ledger
        .create_ingredient(
            NewIngredient {
                name: "Pasta".to_string(),
                quantity: 0.0,
                critical_quantity: 0.0,
                image_ref: None,
            },
            None,
        )
        .await
        .unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                ledger
                    .record_transaction(movement("Pasta", StockAction::Purchase, 1.0, None))
                    .await
            })
        })
        .collect();
    for task in futures::future::join_all(tasks).await {
        task.expect("task panicked").expect("purchase applied");
    }

    let stored = ledger.get_ingredient(pasta.id).await.unwrap();
    assert_eq!(stored.quantity, 8.0);
    assert_eq!(stored.version, 9);
    assert_eq!(ledger_rows(&app, pasta.id).await, 8);
}

#[tokio::test]
async fn overlapping_consumes_surface_only_conflicts() {
    let app = TestApp::with_options(true, 10).await;
    let ledger = app.state.services.ledger.clone();
    let pasta = ledger
        .create_ingredient(
            NewIngredient {
                name: "Pasta".to_string(),
                quantity: 100.0,
                critical_quantity: 0.0,
                image_ref: None,
            },
            None,
        )
        .await
        .unwrap();

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                ledger
                    .record_transaction(movement("Pasta", StockAction::Consume, 1.0, None))
                    .await
            })
        })
        .collect();

    let mut applied: u64 = 0;
    for task in futures::future::join_all(tasks).await {
        match task.expect("task panicked") {
            Ok(_) => applied += 1,
            Err(err) => assert!(err.is_conflict(), "unexpected error: {}", err),
        }
    }
    assert!(applied > 0);

    // Stock and ledger stay paired whichever writers won
    let report = ledger.reconcile(pasta.id).await.unwrap();
    assert_eq!(report.stored_quantity, 100.0 - applied as f64);
    assert_eq!(report.drift, 0.0);
    assert_eq!(report.transaction_count, applied + 1);
}

#[tokio::test]
async fn activity_without_limit_returns_every_entry() {
    let app = TestApp::new().await;
    let ledger = &app.state.services.ledger;
    for _ in 0..60 {
        ledger
            .record_transaction(movement("Flour", StockAction::Purchase, 1.0, None))
            .await
            .unwrap();
    }

    let activity = ledger.list_activity(None).await.unwrap();
    assert_eq!(activity.len(), 60);
    assert!(activity.windows(2).all(|pair| pair[0].id > pair[1].id));

    assert_eq!(ledger.list_activity(Some(5)).await.unwrap().len(), 5);
}

#[tokio::test]
async fn unknown_actor_is_rejected() {
    let app = TestApp::new().await;
    let result = app
        .state
        .services
        .ledger
        .record_transaction(movement("Flour", StockAction::Purchase, 1.0, Some(777)))
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
    assert!(app.state.services.ledger.list_ingredients().await.unwrap().is_empty());
}

#[tokio::test]
async fn non_positive_quantities_are_rejected() {
    let app = TestApp::new().await;
    for quantity in [0.0, -1.0, f64::INFINITY] {
        let result = app
            .state
            .services
            .ledger
            .record_transaction(movement("Flour", StockAction::Purchase, quantity, None))
            .await;
        assert_matches!(result, Err(ServiceError::ValidationError(_)));
    }
}

struct FixedRecognizer(&'static str);

#[async_trait::async_trait]
impl IngredientRecognizer for FixedRecognizer {
    async fn recognize(&self, _image_ref: &str) -> Option<String> {
        Some(self.0.to_string())
    }
}

#[tokio::test]
async fn recognizer_names_consumed_ingredient_from_photo() {
    let app = TestApp::new().await;
    let (sender, _rx) = EventSender::channel(16);
    let ledger = LedgerService::new(
        app.state.db.clone(),
        Arc::new(sender),
        Arc::new(FixedRecognizer("Tomato")),
        3,
    );
    ledger
        .record_transaction(movement("Tomato", StockAction::Purchase, 4.0, None))
        .await
        .unwrap();

    let receipt = ledger
        .record_transaction(StockMovement {
            image_ref: Some("abc-photo.jpg".to_string()),
            ..movement("unknown", StockAction::Consume, 1.0, None)
        })
        .await
        .unwrap();
    assert_eq!(receipt.ingredient.name, "Tomato");
    assert_eq!(receipt.ingredient.quantity, 3.0);
    assert_eq!(receipt.transaction.image_ref.as_deref(), Some("abc-photo.jpg"));
}

mod support;

use loyalty_engine::{
    db_types::{AccrualResolution, NewOrder, OrderNumber, OrderStatus, Points},
    AccountManagement,
    AccrualLedger,
    ApplyOutcome,
    InsertOrderResult,
    OrderManagement,
    PendingOrders,
    SqliteDatabase,
    SqliteDatabaseError,
};
use support::prepare_env::prepare_test_env;

async fn user_with_orders(db: &SqliteDatabase, login: &str, orders: &[&str]) {
    assert!(db.create_user(login).await.expect("create user"));
    for number in orders {
        let result = db.insert_order(NewOrder::new(*number, login)).await.expect("insert order");
        assert_eq!(result, InsertOrderResult::Inserted);
    }
}

fn processed(order: &str, points: i64) -> AccrualResolution {
    AccrualResolution::new(order, OrderStatus::Processed, Points::from_points(points))
}

#[tokio::test]
async fn uploading_an_order_twice() {
    let db = prepare_test_env().await;
    user_with_orders(&db, "alice", &["12345678903"]).await;
    assert!(db.create_user("bob").await.unwrap());
    assert!(!db.create_user("bob").await.unwrap());

    let again = db.insert_order(NewOrder::new("12345678903", "alice")).await.unwrap();
    assert_eq!(again, InsertOrderResult::AlreadyOwned);
    let stolen = db.insert_order(NewOrder::new("12345678903", "bob")).await.unwrap();
    assert_eq!(stolen, InsertOrderResult::OwnedByAnotherUser);

    let order = db.order_by_number(&OrderNumber::from("12345678903")).await.unwrap().expect("order");
    assert_eq!(order.user_login, "alice");
    assert_eq!(order.status, OrderStatus::New);
    assert_eq!(order.accrual, None);
    assert!(db.orders_for_user("bob").await.unwrap().is_empty());
}

#[tokio::test]
async fn applying_a_resolution_twice_credits_once() {
    let db = prepare_test_env().await;
    user_with_orders(&db, "alice", &["100"]).await;

    let first = db.apply_accrual_result(&processed("100", 500)).await.unwrap();
    assert_eq!(first, ApplyOutcome::Applied { credited: Points::from_points(500) });
    let second = db.apply_accrual_result(&processed("100", 500)).await.unwrap();
    assert_eq!(second, ApplyOutcome::AlreadyFinal);

    let balance = db.fetch_balance("alice").await.unwrap().expect("balance");
    assert_eq!(balance.current, Points::from_points(500));
    assert_eq!(balance.withdrawn, Points::default());
    let order = db.order_by_number(&OrderNumber::from("100")).await.unwrap().expect("order");
    assert_eq!(order.status, OrderStatus::Processed);
    assert_eq!(order.accrual, Some(Points::from_points(500)));
}

#[tokio::test]
async fn only_processed_orders_credit_the_balance() {
    let db = prepare_test_env().await;
    user_with_orders(&db, "alice", &["1", "2"]).await;

    let processing = AccrualResolution::new("1", OrderStatus::Processing, Points::from_points(99));
    let outcome = db.apply_accrual_result(&processing).await.unwrap();
    assert_eq!(outcome, ApplyOutcome::Applied { credited: Points::default() });
    let order = db.order_by_number(&OrderNumber::from("1")).await.unwrap().expect("order");
    assert_eq!(order.status, OrderStatus::Processing);
    assert_eq!(order.accrual, None);

    let invalid = AccrualResolution::new("2", OrderStatus::Invalid, Points::default());
    db.apply_accrual_result(&invalid).await.unwrap();
    // An invalid order is final.
    let outcome = db.apply_accrual_result(&processed("2", 10)).await.unwrap();
    assert_eq!(outcome, ApplyOutcome::AlreadyFinal);

    let outcome = db.apply_accrual_result(&AccrualResolution::new("1", OrderStatus::Processed, Points::from(72_998))).await;
    assert_eq!(outcome.unwrap(), ApplyOutcome::Applied { credited: Points::from(72_998) });
    let balance = db.fetch_balance("alice").await.unwrap().expect("balance");
    assert_eq!(balance.current.to_string(), "729.98");
}

#[tokio::test]
async fn resolving_an_unknown_order_fails() {
    let db = prepare_test_env().await;
    let err = db.apply_accrual_result(&processed("404", 1)).await.expect_err("unknown order");
    assert!(matches!(err, SqliteDatabaseError::OrderNotFound(_)));
}

#[tokio::test]
async fn discovery_returns_only_pending_orders() {
    let db = prepare_test_env().await;
    user_with_orders(&db, "alice", &["A", "B", "C"]).await;
    db.apply_accrual_result(&AccrualResolution::new("B", OrderStatus::Processing, Points::default())).await.unwrap();
    db.apply_accrual_result(&processed("C", 5)).await.unwrap();

    let pending = db.list_pending_orders().await.unwrap();
    let mut numbers = pending.iter().map(|o| o.number.as_str().to_string()).collect::<Vec<_>>();
    numbers.sort();
    assert_eq!(numbers, vec!["A", "B"]);
}

#[tokio::test]
async fn withdrawals_need_sufficient_funds() {
    let db = prepare_test_env().await;
    user_with_orders(&db, "alice", &["100"]).await;
    db.apply_accrual_result(&processed("100", 50)).await.unwrap();

    let err = db.withdraw("alice", &OrderNumber::from("900"), Points::from_points(51)).await.expect_err("too much");
    assert!(matches!(err, SqliteDatabaseError::InsufficientFunds { .. }));
    let err = db.withdraw("nobody", &OrderNumber::from("901"), Points::from_points(1)).await.expect_err("no user");
    assert!(matches!(err, SqliteDatabaseError::UserNotFound(_)));
    let err = db.withdraw("alice", &OrderNumber::from("902"), Points::default()).await.expect_err("zero sum");
    assert!(matches!(err, SqliteDatabaseError::QueryError(_)));

    let balance = db.withdraw("alice", &OrderNumber::from("903"), Points::from(1_050)).await.unwrap();
    assert_eq!(balance.current, Points::from(3_950));
    assert_eq!(balance.withdrawn, Points::from(1_050));
    let withdrawals = db.withdrawals_for_user("alice").await.unwrap();
    assert_eq!(withdrawals.len(), 1);
    assert_eq!(withdrawals[0].order.as_str(), "903");
    assert_eq!(withdrawals[0].sum, Points::from(1_050));
}

#[tokio::test]
async fn concurrent_accruals_and_withdrawals_lose_no_updates() {
    let db = prepare_test_env().await;
    let accrual_orders = (0..10).map(|i| format!("acc{i}")).collect::<Vec<_>>();
    let refs = accrual_orders.iter().map(String::as_str).collect::<Vec<_>>();
    user_with_orders(&db, "dave", &refs).await;
    db.insert_order(NewOrder::new("seed", "dave")).await.unwrap();
    db.apply_accrual_result(&processed("seed", 100)).await.unwrap();

    let mut tasks = Vec::new();
    for number in accrual_orders {
        let db = db.clone();
        tasks.push(tokio::spawn(async move { db.apply_accrual_result(&processed(&number, 5)).await.is_ok() }));
    }
    let mut withdrawals = Vec::new();
    for i in 0..20 {
        let db = db.clone();
        withdrawals.push(tokio::spawn(async move {
            db.withdraw("dave", &OrderNumber::from(format!("w{i}")), Points::from_points(10)).await.is_ok()
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap(), "every accrual must be applied");
    }
    let mut successful = 0;
    for task in withdrawals {
        if task.await.unwrap() {
            successful += 1;
        }
    }

    let balance = db.fetch_balance("dave").await.unwrap().expect("balance");
    let withdrawn = Points::from_points(10 * successful);
    assert_eq!(balance.withdrawn, withdrawn);
    assert_eq!(balance.current + balance.withdrawn, Points::from_points(150));
    assert!(balance.current >= Points::default());
    assert_eq!(db.withdrawals_for_user("dave").await.unwrap().len(), usize::try_from(successful).unwrap());
}

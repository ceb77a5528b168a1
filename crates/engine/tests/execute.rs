use std::sync::Arc;

use sea_orm::{Database, DatabaseConnection};

use engine::{
    Account, Engine, EngineError, ExecutedTransfer, Fund, FundCategory, Money, RecordingSink,
    RetryPolicy, RiskTier, TransferEvent, TransferStage,
    commands::{ExecuteTransferCmd, NewFundCmd, OpenAccountCmd},
};
use migration::MigratorTrait;
use uuid::Uuid;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .retry_policy(RetryPolicy::immediate(5))
        .build()
        .await
        .unwrap();
    (engine, db)
}

/// An account holding `cash`, associated with a fund that starts at `fund_total`.
async fn seed(engine: &Engine, cash: &str, fund_total: &str) -> (Account, Fund) {
    let account = engine
        .open_account(OpenAccountCmd::new("alice", cash.parse().unwrap()))
        .await
        .unwrap();
    let fund = engine
        .create_fund(
            NewFundCmd::new("World", "Global equity", FundCategory::Equity, RiskTier::High)
                .total(fund_total.parse().unwrap()),
        )
        .await
        .unwrap();
    let account = engine.associate_fund(account.id, fund.id).await.unwrap();
    (account, fund)
}

async fn invest(
    engine: &Engine,
    account: &Account,
    fund: &Fund,
    amount: &str,
) -> Result<ExecutedTransfer, EngineError> {
    engine
        .execute_transfer(ExecuteTransferCmd::new(
            account.id,
            fund.id,
            amount.parse().unwrap(),
        ))
        .await
}

#[tokio::test]
async fn invest_whole_cash_balance() {
    let (engine, _db) = engine_with_db().await;
    let (account, fund) = seed(&engine, "25000", "10000").await;

    let executed = invest(&engine, &account, &fund, "25000").await.unwrap();
    assert!(!executed.replayed);
    assert_eq!(executed.transfer.amount, Money::from_units(25_000));
    assert_eq!(executed.transfer.account_id, account.id);
    assert_eq!(executed.transfer.fund_id, fund.id);

    let after = engine.account(account.id).await.unwrap();
    assert_eq!(after.cash_balance, Money::ZERO);
    assert_eq!(after.invested_total, Money::from_units(25_000));
    assert_eq!(after.holdings(), account.holdings());
    assert_eq!(after.revision, account.revision + 1);

    let fund_after = engine.fund(fund.id).await.unwrap();
    assert_eq!(fund_after.total, Money::from_units(35_000));
    assert_eq!(fund_after.performance, fund.performance);

    let transfers = engine.transfers(account.id).await.unwrap();
    assert_eq!(transfers, vec![executed.transfer.clone()]);
    assert_eq!(
        engine.transfer(executed.transfer.id).await.unwrap(),
        executed.transfer
    );
}

#[tokio::test]
async fn insufficient_balance_changes_nothing() {
    let (engine, _db) = engine_with_db().await;
    let (account, fund) = seed(&engine, "500", "0").await;

    let err = invest(&engine, &account, &fund, "10000").await.unwrap_err();
    assert!(matches!(err, EngineError::InsufficientBalance(_)));

    assert_eq!(engine.account(account.id).await.unwrap(), account);
    assert_eq!(engine.fund(fund.id).await.unwrap().total, Money::ZERO);
    assert!(engine.transfers(account.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn non_positive_amount_is_invalid() {
    let (engine, _db) = engine_with_db().await;
    let (account, fund) = seed(&engine, "500", "0").await;

    for amount in ["0", "-1", "-0.01"] {
        let err = invest(&engine, &account, &fund, amount).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)), "{amount}");
    }
    assert_eq!(engine.account(account.id).await.unwrap(), account);
}

#[tokio::test]
async fn other_fund_is_not_associated() {
    let (engine, _db) = engine_with_db().await;
    let (account, _fund) = seed(&engine, "500", "0").await;
    let other = engine
        .create_fund(NewFundCmd::new(
            "Gilts",
            "UK government bonds",
            FundCategory::Bond,
            RiskTier::Low,
        ))
        .await
        .unwrap();

    let err = invest(&engine, &account, &other, "10").await.unwrap_err();
    assert!(matches!(err, EngineError::FundNotAssociated(_)));

    let err = engine
        .associate_fund(account.id, other.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::FundAlreadyAssociated(_)));
}

#[tokio::test]
async fn unknown_account_is_not_found() {
    let (engine, _db) = engine_with_db().await;
    let err = engine
        .execute_transfer(ExecuteTransferCmd::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Money::from_units(1),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AccountNotFound(_)));
}

#[tokio::test]
async fn decimal_amounts_sum_exactly() {
    let (engine, _db) = engine_with_db().await;
    let (account, fund) = seed(&engine, "1.00", "0.30").await;

    invest(&engine, &account, &fund, "0.1").await.unwrap();
    invest(&engine, &account, &fund, "0.2").await.unwrap();

    let after = engine.account(account.id).await.unwrap();
    assert_eq!(after.cash_balance, "0.7".parse().unwrap());
    assert_eq!(after.invested_total, "0.3".parse().unwrap());
    assert_eq!(
        engine.fund(fund.id).await.unwrap().total,
        "0.6".parse().unwrap()
    );

    let amounts: Vec<Money> = engine
        .transfers(account.id)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.amount)
        .collect();
    assert_eq!(amounts, vec!["0.1".parse().unwrap(), "0.2".parse().unwrap()]);
}

#[tokio::test]
async fn amount_that_would_round_changes_nothing() {
    let (engine, _db) = engine_with_db().await;
    let big = "100000000000000000000";
    let (account, fund) = seed(&engine, big, big).await;

    let err = invest(&engine, &account, &fund, "0.0000000000000000000000000001")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)), "{err:?}");

    assert_eq!(engine.account(account.id).await.unwrap(), account);
    assert_eq!(engine.fund(fund.id).await.unwrap().total, big.parse().unwrap());
    assert!(engine.transfers(account.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn corrupted_row_is_not_retried() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let sink = Arc::new(RecordingSink::new());
    let engine = Engine::builder()
        .database(db.clone())
        .events(sink.clone())
        .retry_policy(RetryPolicy::immediate(5))
        .build()
        .await
        .unwrap();
    let (account, fund) = seed(&engine, "100", "0").await;
    raw::corrupt_cash(&db, account.id).await;

    let err = engine.account(account.id).await.unwrap_err();
    assert!(matches!(err, EngineError::CorruptedRecord(_)), "{err:?}");

    let err = invest(&engine, &account, &fund, "10").await.unwrap_err();
    assert!(matches!(err, EngineError::CorruptedRecord(_)), "{err:?}");
    assert!(
        !sink
            .events()
            .iter()
            .any(|event| matches!(event, TransferEvent::Retry { .. }))
    );
}

#[tokio::test]
async fn money_is_stored_as_decimal_text() {
    let (engine, db) = engine_with_db().await;
    let (account, fund) = seed(&engine, "1234.56", "0").await;
    invest(&engine, &account, &fund, "0.56").await.unwrap();

    let row = raw::account(&db, account.id).await;
    assert_eq!(row.0, "1234");
    assert_eq!(row.1, "0.56");
}

#[tokio::test]
async fn same_idempotency_key_debits_once() {
    let (engine, _db) = engine_with_db().await;
    let (account, fund) = seed(&engine, "1000", "0").await;
    let cmd = ExecuteTransferCmd::new(account.id, fund.id, Money::from_units(300))
        .idempotency_key("req-42");

    let first = engine.execute_transfer(cmd.clone()).await.unwrap();
    let second = engine.execute_transfer(cmd).await.unwrap();

    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(first.transfer.id, second.transfer.id);
    assert_eq!(
        first.transfer.idempotency_key.as_deref(),
        Some("req-42")
    );

    let after = engine.account(account.id).await.unwrap();
    assert_eq!(after.cash_balance, Money::from_units(700));
    assert_eq!(engine.transfers(account.id).await.unwrap().len(), 1);
    assert_eq!(
        engine.fund(fund.id).await.unwrap().total,
        Money::from_units(300)
    );
}

#[tokio::test]
async fn replay_skips_eligibility() {
    let (engine, _db) = engine_with_db().await;
    let (account, fund) = seed(&engine, "100", "0").await;
    let cmd = ExecuteTransferCmd::new(account.id, fund.id, Money::from_units(100))
        .idempotency_key("all-in");

    engine.execute_transfer(cmd.clone()).await.unwrap();
    // Cash is now 0: a fresh execution would be rejected, a replay is not.
    let replay = engine.execute_transfer(cmd).await.unwrap();
    assert!(replay.replayed);
}

#[tokio::test]
async fn concurrent_invests_never_overdraw() {
    let (engine, _db) = engine_with_db().await;
    let (account, fund) = seed(&engine, "25000", "0").await;

    let (a, b) = tokio::join!(
        invest(&engine, &account, &fund, "15000"),
        invest(&engine, &account, &fund, "15000"),
    );

    let results = [a, b];
    let ok = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(ok, 1, "{results:?}");
    assert!(results.iter().any(|r| matches!(
        r,
        Err(EngineError::InsufficientBalance(_)) | Err(EngineError::ConcurrencyConflict(_))
    )));

    let after = engine.account(account.id).await.unwrap();
    assert_eq!(after.cash_balance, Money::from_units(10_000));
    assert_eq!(after.invested_total, Money::from_units(15_000));
    assert_eq!(
        engine.fund(fund.id).await.unwrap().total,
        Money::from_units(15_000)
    );
    assert_eq!(engine.transfers(account.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_investors_share_a_fund() {
    let (engine, _db) = engine_with_db().await;
    let (alice, fund) = seed(&engine, "100", "0").await;
    let bob = engine
        .open_account(OpenAccountCmd::new("bob", Money::from_units(100)))
        .await
        .unwrap();
    let bob = engine.associate_fund(bob.id, fund.id).await.unwrap();

    let (a, b) = tokio::join!(
        invest(&engine, &alice, &fund, "40"),
        invest(&engine, &bob, &fund, "60"),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(
        engine.fund(fund.id).await.unwrap().total,
        Money::from_units(100)
    );
}

#[tokio::test]
async fn atomic_path_reports_every_stage() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let sink = Arc::new(RecordingSink::new());
    let engine = Engine::builder()
        .database(db.clone())
        .events(sink.clone())
        .build()
        .await
        .unwrap();
    let (account, fund) = seed(&engine, "10", "0").await;

    invest(&engine, &account, &fund, "10").await.unwrap();
    assert_eq!(
        sink.stages(),
        vec![
            TransferStage::Received,
            TransferStage::Validated,
            TransferStage::Debited,
            TransferStage::Credited,
            TransferStage::Recorded,
            TransferStage::Committed,
        ]
    );
}

#[tokio::test]
async fn transfers_are_listed_by_execution_time() {
    let (engine, _db) = engine_with_db().await;
    let (account, fund) = seed(&engine, "100", "0").await;

    let mut ids = Vec::new();
    for amount in ["1", "2", "3"] {
        ids.push(invest(&engine, &account, &fund, amount).await.unwrap().transfer.id);
    }

    let listed: Vec<Uuid> = engine
        .transfers(account.id)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(listed, ids);
}

/// Raw row access, bypassing the domain conversions.
mod raw {
    use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};
    use uuid::Uuid;

    pub async fn account(db: &DatabaseConnection, id: Uuid) -> (String, String) {
        let row = db
            .query_one(Statement::from_sql_and_values(
                db.get_database_backend(),
                "SELECT cash_balance, invested_total FROM accounts WHERE id = ?",
                vec![id.to_string().into()],
            ))
            .await
            .unwrap()
            .unwrap();
        (
            row.try_get("", "cash_balance").unwrap(),
            row.try_get("", "invested_total").unwrap(),
        )
    }

    pub async fn corrupt_cash(db: &DatabaseConnection, id: Uuid) {
        db.execute(Statement::from_sql_and_values(
            db.get_database_backend(),
            "UPDATE accounts SET cash_balance = 'not money' WHERE id = ?",
            vec![id.to_string().into()],
        ))
        .await
        .unwrap();
    }
}


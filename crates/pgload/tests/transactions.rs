use pgload::{
    Begin, GenericClient, Loader, OrmError, OrmResult, Record, TransactionHandle,
    run_in_transaction,
};
use std::sync::{Arc, Mutex};
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

#[derive(Debug, Default, Record)]
struct Transfer {
    #[tag(pgload = "omitZero")]
    id: i64,
    from_account: i64,
    to_account: i64,
    amount_cents: i64,
}

#[derive(Debug, Default)]
struct Log {
    events: Mutex<Vec<String>>,
}

impl Log {
    fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

struct FakeClient {
    log: Arc<Log>,
}

struct FakeTx {
    log: Arc<Log>,
}

impl GenericClient for FakeClient {
    async fn query(&self, _sql: &str, _params: &[&(dyn ToSql + Sync)]) -> OrmResult<Vec<Row>> {
        Ok(vec![])
    }

    async fn execute(&self, sql: &str, _params: &[&(dyn ToSql + Sync)]) -> OrmResult<u64> {
        self.log.push(format!("outside: {sql}"));
        Ok(1)
    }
}

impl GenericClient for FakeTx {
    async fn query(&self, _sql: &str, _params: &[&(dyn ToSql + Sync)]) -> OrmResult<Vec<Row>> {
        Ok(vec![])
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<u64> {
        self.log.push(format!("tx({}): {sql}", params.len()));
        Ok(1)
    }
}

impl TransactionHandle for FakeTx {
    async fn commit(self) -> OrmResult<()> {
        self.log.push("COMMIT");
        Ok(())
    }

    async fn rollback(self) -> OrmResult<()> {
        self.log.push("ROLLBACK");
        Ok(())
    }
}

impl Begin for FakeClient {
    type Transaction<'a> = FakeTx;

    async fn begin(&mut self) -> OrmResult<FakeTx> {
        self.log.push("BEGIN");
        Ok(FakeTx {
            log: Arc::clone(&self.log),
        })
    }
}

fn loader() -> (Loader<FakeClient>, Arc<Log>) {
    let log = Arc::new(Log::default());
    let client = FakeClient {
        log: Arc::clone(&log),
    };
    (Loader::new(client), log)
}

#[tokio::test]
async fn statements_run_on_the_transaction_and_commit() {
    let (mut loader, log) = loader();
    let debit = Transfer {
        from_account: 1,
        to_account: 2,
        amount_cents: 500,
        ..Default::default()
    };

    let total = run_in_transaction(&mut loader, |tx| {
        Box::pin(async move {
            let inserted = tx.insert("transfers", &[&debit]).await?;
            let updated = tx
                .exec(
                    "UPDATE accounts SET balance = balance - $1 WHERE id = $2",
                    &[&500_i64, &1_i64],
                )
                .await?;
            Ok(inserted + updated)
        })
    })
    .await
    .unwrap();

    assert_eq!(total, 2);
    assert_eq!(
        log.events(),
        [
            "BEGIN",
            r#"tx(3): INSERT INTO transfers ("from_account", "to_account", "amount_cents") VALUES ($1, $2, $3)"#,
            "tx(2): UPDATE accounts SET balance = balance - $1 WHERE id = $2",
            "COMMIT",
        ]
    );

    loader.exec("SELECT 1", &[]).await.unwrap();
    assert_eq!(log.events().last().map(String::as_str), Some("outside: SELECT 1"));
}

#[tokio::test]
async fn work_error_rolls_back_and_is_returned() {
    let (mut loader, log) = loader();
    let err = run_in_transaction(&mut loader, |tx| {
        Box::pin(async move {
            tx.exec("DELETE FROM transfers", &[]).await?;
            Err::<(), _>(OrmError::not_found("transfer 7"))
        })
    })
    .await
    .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(
        log.events(),
        ["BEGIN", "tx(0): DELETE FROM transfers", "ROLLBACK"]
    );
}

#[tokio::test]
async fn generation_errors_inside_the_work_roll_back() {
    let (mut loader, log) = loader();
    let err = run_in_transaction(&mut loader, |tx| {
        Box::pin(async move { tx.insert::<Transfer>("transfers", &[]).await })
    })
    .await
    .unwrap_err();

    assert!(err.is_input());
    assert_eq!(log.events(), ["BEGIN", "ROLLBACK"]);
}

//! Keyed joins.

mod common;

use common::{assert_rows, TestContext};

fn orders_and_customers(ctx: &TestContext) {
    ctx.load(
        "orders",
        &[("o1", r#"{"id": 1, "cust_ids": ["c1", "c9"]}"#)],
    );
    ctx.load("customers", &[("c1", r#"{"name": "A"}"#)]);
}

#[tokio::test]
async fn inner_keys_join_drops_unmatched_keys() {
    let ctx = TestContext::new();
    orders_and_customers(&ctx);
    assert_rows(
        &ctx.rows(
            "SELECT o.id AS id, c AS cust FROM orders AS o JOIN customers AS c KEYS o.cust_ids",
        )
        .await,
        &[r#"{"id": 1, "cust": {"name": "A"}}"#],
    );
}

#[tokio::test]
async fn left_keys_join_binds_null_for_unmatched_keys() {
    let ctx = TestContext::new();
    orders_and_customers(&ctx);
    assert_rows(
        &ctx.rows(
            "SELECT o.id AS id, c AS cust FROM orders AS o LEFT JOIN customers AS c KEYS o.cust_ids",
        )
        .await,
        &[
            r#"{"id": 1, "cust": {"name": "A"}}"#,
            r#"{"id": 1, "cust": null}"#,
        ],
    );
}

#[tokio::test]
async fn single_key_join() {
    let ctx = TestContext::new();
    ctx.load(
        "orders",
        &[
            ("o1", r#"{"id": 1, "store": "s1"}"#),
            ("o2", r#"{"id": 2, "store": "s9"}"#),
            ("o3", r#"{"id": 3}"#),
        ],
    );
    ctx.load("stores", &[("s1", r#"{"city": "here"}"#)]);

    // INNER: rows without a match (or without a key) are dropped
    assert_rows(
        &ctx.rows(
            "SELECT o.id AS id, s.city AS city FROM orders AS o JOIN stores AS s KEY o.store ORDER BY o.id",
        )
        .await,
        &[r#"{"id": 1, "city": "here"}"#],
    );

    // LEFT: unmatched and unkeyed rows pass through unchanged
    assert_rows(
        &ctx.rows(
            "SELECT o.id AS id, s.city AS city FROM orders AS o LEFT JOIN stores AS s KEY o.store ORDER BY o.id",
        )
        .await,
        &[r#"{"id": 1, "city": "here"}"#, r#"{"id": 2}"#, r#"{"id": 3}"#],
    );
}

#[tokio::test]
async fn empty_key_arrays_follow_the_join_type() {
    let ctx = TestContext::new();
    ctx.load(
        "orders",
        &[("o1", r#"{"id": 1, "cust_ids": []}"#)],
    );
    ctx.bucket("customers");
    assert_rows(
        &ctx.rows("SELECT o.id AS id FROM orders AS o JOIN customers AS c KEYS o.cust_ids")
            .await,
        &[],
    );
    assert_rows(
        &ctx.rows("SELECT o.id AS id FROM orders AS o LEFT JOIN customers AS c KEYS o.cust_ids")
            .await,
        &[r#"{"id": 1}"#],
    );
}

#[tokio::test]
async fn keys_join_batches_large_arrays_in_order() {
    let ctx = TestContext::new();
    // 150 keys spans multiple bulk-fetch rounds of 64
    let ids: Vec<String> = (0..150).map(|i| format!("\"k{:03}\"", i)).collect();
    ctx.load(
        "orders",
        &[("o1", &format!(r#"{{"keys": [{}]}}"#, ids.join(", ")))],
    );
    let targets = ctx.bucket("targets");
    for i in 0..150 {
        targets.put_json(&format!("k{:03}", i), &format!(r#"{{"n": {}}}"#, i));
    }
    let rows = ctx
        .rows("SELECT t.n AS n FROM orders AS o JOIN targets AS t KEYS o.keys")
        .await;
    assert_eq!(rows.len(), 150);
    // emission order matches the key array order
    let ns: Vec<f64> = rows
        .iter()
        .map(|row| row.field("n").as_number().unwrap())
        .collect();
    let expected: Vec<f64> = (0..150).map(|i| i as f64).collect();
    assert_eq!(ns, expected);
}

#[tokio::test]
async fn chained_joins() {
    let ctx = TestContext::new();
    ctx.load(
        "orders",
        &[("o1", r#"{"id": 1, "cust": "c1", "store": "s1"}"#)],
    );
    ctx.load("customers", &[("c1", r#"{"name": "A"}"#)]);
    ctx.load("stores", &[("s1", r#"{"city": "here"}"#)]);
    assert_rows(
        &ctx.rows(
            "SELECT c.name AS who, s.city AS at FROM orders AS o \
             JOIN customers AS c KEY o.cust JOIN stores AS s KEY o.store",
        )
        .await,
        &[r#"{"who": "A", "at": "here"}"#],
    );
}

mod flaky {
    use async_trait::async_trait;
    use quill_catalog::{Bucket, Error, IndexMeta, Pool, Result, Scanner};
    use quill_value::Item;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// A bucket whose fetches always fail transiently.
    pub struct FlakyBucket;

    /// A pool serving a real `orders` bucket and a flaky `customers` one.
    pub struct FlakyPool {
        pub orders: Arc<dyn Bucket>,
    }

    #[async_trait]
    impl Pool for FlakyPool {
        fn name(&self) -> &str {
            "default"
        }

        fn bucket_names(&self) -> Vec<String> {
            vec!["orders".to_string(), "customers".to_string()]
        }

        fn bucket(&self, name: &str) -> Result<Arc<dyn Bucket>> {
            match name {
                "orders" => Ok(self.orders.clone()),
                "customers" => Ok(Arc::new(FlakyBucket)),
                other => Err(Error::BucketNotFound(other.to_string())),
            }
        }
    }

    #[async_trait]
    impl Bucket for FlakyBucket {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn fetch(&self, _id: &str) -> Result<Option<Item>> {
            Err(Error::Transient("fetch failed".into()))
        }

        async fn bulk_fetch(&self, _ids: &[String]) -> Result<HashMap<String, Item>> {
            Err(Error::Transient("bulk fetch failed".into()))
        }

        async fn count(&self) -> Result<u64> {
            Ok(0)
        }

        fn scanner(&self) -> Result<Box<dyn Scanner>> {
            Err(Error::Unavailable("no scanner".into()))
        }

        async fn create_index(&self, _: &str, _: &str, _: Vec<String>) -> Result<()> {
            Ok(())
        }

        fn indexes(&self) -> Vec<IndexMeta> {
            Vec::new()
        }
    }
}

#[tokio::test]
async fn transient_fetch_failures_warn_and_follow_the_join_type() {
    use quill_query::pipeline::{key_join::KeyJoin, Operator, Output, SupportMsg, TransientFailures};
    use quill_query::stmt::JoinType;
    use quill_query::Parser;
    use quill_value::{Item, Value};
    use std::sync::Arc;
    use tokio::sync::{mpsc, watch};

    let (item_tx, mut item_rx) = mpsc::channel(8);
    let (support_tx, mut support_rx) = mpsc::channel(8);
    let (_stop_tx, stop_rx) = watch::channel(false);
    let mut output = Output::new(item_tx, support_tx, stop_rx);

    let mut join = KeyJoin {
        bucket: Arc::new(flaky::FlakyBucket),
        alias: "c".to_string(),
        join_type: JoinType::Left,
        many: true,
        keys: Parser::parse_expression_text("o.ids").unwrap(),
        failures: TransientFailures::new(),
        fetched: 0,
    };

    let mut item = Item::empty();
    item.set_field(
        "o",
        Value::from(serde_json::json!({"ids": ["k1"]})),
    );
    let keep_going = join.process_item(item, &mut output).await.unwrap();
    assert!(keep_going);

    // the failed round behaves as misses: LEFT binds NULL and warns
    let row = item_rx.try_recv().unwrap();
    assert!(row.value().field("c").is_null());
    match support_rx.try_recv().unwrap() {
        SupportMsg::Warning(error) => assert!(!error.is_fatal()),
        other => panic!("expected a warning, got {:?}", other),
    }
}

#[tokio::test]
async fn repeated_transient_failures_fail_the_request() {
    use quill_query::pipeline::{
        key_join::KeyJoin, Operator, Output, SupportMsg, TransientFailures,
        MAX_TRANSIENT_FAILURES,
    };
    use quill_query::stmt::JoinType;
    use quill_query::Parser;
    use quill_value::{Item, Value};
    use std::sync::Arc;
    use tokio::sync::{mpsc, watch};

    let (item_tx, _item_rx) = mpsc::channel(64);
    let (support_tx, mut support_rx) = mpsc::channel(64);
    let (_stop_tx, stop_rx) = watch::channel(false);
    let mut output = Output::new(item_tx, support_tx, stop_rx);

    let mut join = KeyJoin {
        bucket: Arc::new(flaky::FlakyBucket),
        alias: "c".to_string(),
        join_type: JoinType::Inner,
        many: true,
        keys: Parser::parse_expression_text("o.ids").unwrap(),
        failures: TransientFailures::new(),
        fetched: 0,
    };

    let mut outcome = None;
    for _ in 0..=MAX_TRANSIENT_FAILURES {
        let mut item = Item::empty();
        item.set_field("o", Value::from(serde_json::json!({"ids": ["k1"]})));
        match join.process_item(item, &mut output).await {
            Ok(_) => {}
            Err(error) => {
                outcome = Some(error);
                break;
            }
        }
    }

    let error = outcome.expect("repeated transient failures should fail the request");
    assert!(error.to_string().contains("giving up"), "{}", error);

    // the allowance was spent on warnings first
    let mut warnings = 0u32;
    while let Ok(message) = support_rx.try_recv() {
        assert!(matches!(message, SupportMsg::Warning(_)));
        warnings += 1;
    }
    assert_eq!(warnings, MAX_TRANSIENT_FAILURES);
}

#[tokio::test]
async fn a_pipeline_fails_once_the_transient_allowance_is_exhausted() {
    use quill_query::pipeline::{SupportMsg, MAX_TRANSIENT_FAILURES};
    use quill_query::{exec, Parser, Planner};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    let ctx = TestContext::new();
    let orders = ctx.bucket("orders");
    for i in 0..MAX_TRANSIENT_FAILURES + 2 {
        orders.put_json(&format!("o{}", i), r#"{"ids": ["k1"]}"#);
    }
    let pool: Arc<dyn quill_catalog::Pool> = Arc::new(flaky::FlakyPool { orders });

    let statement =
        Parser::parse("SELECT * FROM orders AS o JOIN customers AS c KEYS o.ids").unwrap();
    let plan = Planner::new(Default::default())
        .plan(statement, &HashMap::new())
        .unwrap();
    let mut execution = exec::start(&plan, &pool).unwrap();

    let (warnings, fatal) = tokio::time::timeout(Duration::from_secs(10), async {
        let mut warnings = 0u32;
        let mut fatal = None;
        let mut items_open = true;
        let mut support_open = true;
        while items_open || support_open {
            tokio::select! {
                received = execution.items.recv(), if items_open => {
                    if received.is_none() {
                        items_open = false;
                    }
                }
                received = execution.support.recv(), if support_open => match received {
                    Some(SupportMsg::Warning(_)) => warnings += 1,
                    Some(SupportMsg::Fatal(error)) => fatal = Some(error),
                    None => support_open = false,
                },
            }
        }
        execution.join().await;
        (warnings, fatal)
    })
    .await
    .expect("pipeline did not settle");

    assert_eq!(warnings, MAX_TRANSIENT_FAILURES);
    let fatal = fatal.expect("the request should fail after repeated transient failures");
    assert!(fatal.to_string().contains("giving up"), "{}", fatal);
}

#[tokio::test]
async fn transient_scan_failures_warn_within_the_allowance() {
    use quill_query::pipeline::SupportMsg;
    use quill_query::{exec, Parser, Planner};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    let ctx = TestContext::new();
    let pool: Arc<dyn quill_catalog::Pool> = Arc::new(flaky::FlakyPool {
        orders: ctx.bucket("orders"),
    });

    // the flaky bucket cannot even open a scanner; one transient failure
    // skips the scan with a warning and the request still completes
    let statement = Parser::parse("SELECT * FROM customers").unwrap();
    let plan = Planner::new(Default::default())
        .plan(statement, &HashMap::new())
        .unwrap();
    let mut execution = exec::start(&plan, &pool).unwrap();

    let (rows, warnings, fatal) = tokio::time::timeout(Duration::from_secs(10), async {
        let mut rows = 0u32;
        let mut warnings = 0u32;
        let mut fatal = false;
        let mut items_open = true;
        let mut support_open = true;
        while items_open || support_open {
            tokio::select! {
                received = execution.items.recv(), if items_open => match received {
                    Some(_) => rows += 1,
                    None => items_open = false,
                },
                received = execution.support.recv(), if support_open => match received {
                    Some(SupportMsg::Warning(_)) => warnings += 1,
                    Some(SupportMsg::Fatal(_)) => fatal = true,
                    None => support_open = false,
                },
            }
        }
        execution.join().await;
        (rows, warnings, fatal)
    })
    .await
    .expect("pipeline did not settle");

    assert_eq!(rows, 0);
    assert_eq!(warnings, 1);
    assert!(!fatal);
}

#[tokio::test]
async fn key_kind_mismatches_are_fatal() {
    let ctx = TestContext::new();
    ctx.load("orders", &[("o1", r#"{"ids": ["c1"]}"#)]);
    ctx.bucket("customers");
    let error = ctx
        .error("SELECT * FROM orders AS o JOIN customers AS c KEY o.ids")
        .await;
    assert!(error.to_string().contains("single key"), "{}", error);
}

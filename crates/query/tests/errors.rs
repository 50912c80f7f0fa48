//! Pre-execution failures: syntax, semantics, aliases, grouping, catalog.

mod common;

use common::TestContext;
use quill_query::{Error, RequestStatus};

#[tokio::test]
async fn duplicate_aliases_fail_before_execution() {
    let ctx = TestContext::new();
    ctx.load("b", &[("d1", r#"{"name": "x", "age": 1}"#)]);
    let error = ctx.error("SELECT name AS x, age AS x FROM b").await;
    assert_eq!(error, Error::DuplicateAlias("x".into()));
}

#[tokio::test]
async fn ungrouped_select_expressions_fail() {
    let ctx = TestContext::new();
    ctx.load("b", &[("d1", r#"{"dept": "x", "age": 1}"#)]);
    let error = ctx.error("SELECT dept, age FROM b GROUP BY dept").await;
    assert_eq!(error, Error::NotInGroupBy("b.age".into()));

    let error = ctx.error("SELECT * FROM b GROUP BY dept").await;
    assert_eq!(error, Error::NotInGroupBy("*".into()));
}

#[tokio::test]
async fn bare_identifiers_without_a_source_are_ambiguous() {
    let ctx = TestContext::new();
    let error = ctx.error("SELECT name").await;
    assert_eq!(error, Error::AmbiguousReference("name".into()));
}

#[tokio::test]
async fn shadowed_bucket_names_are_ambiguous() {
    let ctx = TestContext::new();
    ctx.load("b", &[("d1", r#"{"x": 1}"#)]);
    let error = ctx.error("SELECT b.x FROM b AS alias").await;
    assert_eq!(error, Error::AmbiguousReference("b".into()));
}

#[tokio::test]
async fn unknown_buckets_and_pools_surface_as_not_found() {
    let ctx = TestContext::new();
    let error = ctx.error("SELECT * FROM nowhere").await;
    assert!(matches!(error, Error::CatalogNotFound(_)), "{}", error);

    let error = ctx.error("SELECT * FROM ghost:b").await;
    assert!(matches!(error, Error::CatalogNotFound(_)), "{}", error);
}

#[tokio::test]
async fn syntax_errors_fail_the_request() {
    let ctx = TestContext::new();
    for statement in [
        "SELEKT 1",
        "SELECT",
        "SELECT a FROM",
        "SELECT a FROM b WHERE",
        "SELECT a FROM b LIMIT x",
    ] {
        let error = ctx.error(statement).await;
        assert!(matches!(error, Error::Syntax(_)), "{}: {}", statement, error);
    }
}

#[tokio::test]
async fn semantic_errors_fail_the_request() {
    let ctx = TestContext::new();
    ctx.load("b", &[("d1", r#"{"v": 1}"#)]);
    for statement in [
        "SELECT NO_SUCH_FN(v) FROM b",
        "SELECT LENGTH() FROM b",
        "SELECT UPPER(DISTINCT v) FROM b",
        "SELECT SUM(COUNT(v)) FROM b",
        "SELECT v FROM b WHERE COUNT(*) > 1",
        "SELECT v FROM b GROUP BY COUNT(v)",
    ] {
        let error = ctx.error(statement).await;
        assert!(
            matches!(error, Error::Semantic(_)),
            "{}: {}",
            statement,
            error
        );
    }
}

#[tokio::test]
async fn missing_parameters_are_semantic_errors() {
    let ctx = TestContext::new();
    ctx.load("b", &[("d1", r#"{"v": 1}"#)]);
    let error = ctx.error("SELECT v FROM b WHERE v > $min").await;
    assert!(matches!(error, Error::Semantic(_)), "{}", error);
}

#[tokio::test]
async fn failed_requests_report_error_status() {
    let ctx = TestContext::new();
    let sink = ctx.run("SELECT").await;
    assert_eq!(sink.status, Some(RequestStatus::Errors));
    assert!(sink.results.is_empty());
}

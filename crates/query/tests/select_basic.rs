//! Basic selection and projection behavior.

mod common;

use common::{assert_rows, TestContext};
use quill_value::Value;

#[tokio::test]
async fn select_without_from() {
    let ctx = TestContext::new();
    assert_rows(&ctx.rows("SELECT 7 + 7").await, &[r#"{"$1": 14}"#]);
    assert_rows(
        &ctx.rows(r#"SELECT 7 + 7 AS sum, "x" AS tag"#).await,
        &[r#"{"sum": 14, "tag": "x"}"#],
    );
}

#[tokio::test]
async fn null_is_kept_and_missing_is_omitted() {
    let ctx = TestContext::new();
    // arithmetic over a non-number is NULL: present in the row
    assert_rows(&ctx.rows(r#"SELECT "a" + 1"#).await, &[r#"{"$1": null}"#]);

    // arithmetic over an absent attribute is MISSING: absent from the row
    ctx.load("b", &[("d1", "{}")]);
    assert_rows(&ctx.rows("SELECT 7 + foo FROM b").await, &["{}"]);
}

#[tokio::test]
async fn trailing_property_names_and_generated_names() {
    let ctx = TestContext::new();
    ctx.load("b", &[("d1", r#"{"name": "ada", "age": 36}"#)]);
    assert_rows(
        &ctx.rows("SELECT name, age, age * 2 FROM b").await,
        &[r#"{"name": "ada", "age": 36, "$1": 72}"#],
    );
}

#[tokio::test]
async fn star_expands_the_source_document() {
    let ctx = TestContext::new();
    ctx.load("b", &[("d1", r#"{"a": 1, "b": "two"}"#)]);
    assert_rows(&ctx.rows("SELECT * FROM b").await, &[r#"{"a": 1, "b": "two"}"#]);
}

#[tokio::test]
async fn dot_star_merges_object_fields() {
    let ctx = TestContext::new();
    ctx.load(
        "b",
        &[
            ("d1", r#"{"child": {"x": 1, "y": 2}, "name": "n"}"#),
            ("d2", r#"{"child": 5, "name": "m"}"#),
        ],
    );
    let rows = ctx
        .rows("SELECT child.*, name FROM b ORDER BY name")
        .await;
    // a non-object `child` contributes nothing, silently
    assert_rows(&rows, &[r#"{"name": "m"}"#, r#"{"name": "n", "x": 1, "y": 2}"#]);
}

#[tokio::test]
async fn nested_paths_and_case() {
    let ctx = TestContext::new();
    ctx.load(
        "b",
        &[("d1", r#"{"a": {"b": [10, 20]}, "kind": "even"}"#)],
    );
    assert_rows(
        &ctx.rows(r#"SELECT a.b[1] AS v, CASE kind WHEN "even" THEN 0 ELSE 1 END AS k FROM b"#)
            .await,
        &[r#"{"v": 20, "k": 0}"#],
    );
}

#[tokio::test]
async fn meta_exposes_document_ids() {
    let ctx = TestContext::new();
    ctx.load("b", &[("doc-7", r#"{"x": 1}"#)]);
    assert_rows(
        &ctx.rows("SELECT META() AS meta FROM b").await,
        &[r#"{"meta": {"id": "doc-7"}}"#],
    );
}

#[tokio::test]
async fn named_parameters_bind_before_planning() {
    let ctx = TestContext::new();
    ctx.load(
        "b",
        &[("d1", r#"{"age": 50}"#), ("d2", r#"{"age": 20}"#)],
    );
    let sink = ctx
        .run_with_args(
            "SELECT age FROM b WHERE age > $min",
            &[("min", Value::Number(30.0))],
        )
        .await;
    assert_rows(&sink.results, &[r#"{"age": 50}"#]);
}

#[tokio::test]
async fn select_distinct_deduplicates_projected_rows() {
    let ctx = TestContext::new();
    ctx.load(
        "b",
        &[
            ("d1", r#"{"dept": "x", "extra": 1}"#),
            ("d2", r#"{"dept": "x", "extra": 2}"#),
            ("d3", r#"{"dept": "y"}"#),
        ],
    );
    assert_rows(
        &ctx.rows("SELECT DISTINCT dept FROM b ORDER BY dept").await,
        &[r#"{"dept": "x"}"#, r#"{"dept": "y"}"#],
    );
}

#[tokio::test]
async fn collection_quantifiers_in_where() {
    let ctx = TestContext::new();
    ctx.load(
        "b",
        &[
            ("d1", r#"{"name": "a", "scores": [1, 9]}"#),
            ("d2", r#"{"name": "b", "scores": [1, 2]}"#),
            ("d3", r#"{"name": "c"}"#),
        ],
    );
    assert_rows(
        &ctx.rows("SELECT name FROM b WHERE ANY VALUE() > 8 OVER scores")
            .await,
        &[r#"{"name": "a"}"#],
    );
}

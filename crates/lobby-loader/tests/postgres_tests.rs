//! PostgreSQL integration tests using testcontainers
//!
//! These tests require Docker to be running. Run with:
//!
//! ```bash
//! cargo test -p lobby-loader --test postgres_tests -- --ignored --nocapture
//! ```

mod common;

use common::{init_test_tracing, read_lines, write_source, TestPostgres};
use lobby_loader::db::{self, DbConfig};
use lobby_loader::target::postgres::{describe_table, list_tables};
use lobby_loader::{
    load, CommitGranularity, Delimiter, LoadError, LoadOptions, PgTarget, TableName,
};
use std::path::Path;

const PEOPLE_DDL: &str = r#"
    CREATE TABLE people (
        id integer PRIMARY KEY,
        name text NOT NULL,
        amount numeric(10,2)
    )
"#;

async fn count(pg: &TestPostgres, table: &str) -> i64 {
    let (n,): (i64,) = sqlx::query_as(&format!("SELECT count(*) FROM {}", table))
        .fetch_one(pg.pool())
        .await
        .expect("count query failed");
    n
}

async fn pg_target(pg: &TestPostgres, table: &str) -> (sqlx::PgPool, PgTarget) {
    let pool = db::connect(&DbConfig::from_url(pg.connection_string()))
        .await
        .expect("Failed to connect");
    let target = PgTarget::new(pool.clone(), table.parse::<TableName>().expect("table name"));
    (pool, target)
}

fn csv_options(sink: &Path) -> LoadOptions {
    LoadOptions::builder(sink)
        .delimiter(Delimiter::Comma)
        .build()
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_rejected_rows_do_not_poison_the_transaction() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    pg.execute(PEOPLE_DDL).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let source = write_source(
        dir.path(),
        "people.csv",
        b"id,name,amount\n1,Alice,10.50\n1,Dup,1\nabc,Bad,1\n2,Bob,\n3,Carol,7\n",
    );
    let sink = dir.path().join("people_errors.csv");
    let reason_log = dir.path().join("people_errors.jsonl");
    let options = LoadOptions::builder(&sink)
        .delimiter(Delimiter::Comma)
        .reason_log_path(Some(reason_log.clone()))
        .build();
    let (pool, mut target) = pg_target(&pg, "people").await;

    let outcome = load(&source, &mut target, &options).await.unwrap();
    pool.close().await;

    // "2,Bob," binds '' to a numeric column
    assert_eq!(outcome.attempted(), 5);
    assert_eq!(outcome.failed(), 3);
    assert_eq!(outcome.committed(), 2);
    assert_eq!(count(&pg, "people").await, 2);
    assert_eq!(read_lines(&sink), vec!["1,Dup,1", "abc,Bad,1", "2,Bob,"]);

    let reasons = std::fs::read_to_string(&reason_log).unwrap();
    assert!(reasons.contains("duplicate key value violates unique constraint \\\"people_pkey\\\""));
    assert!(reasons.contains("invalid input syntax for type integer"));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_empty_as_null_and_typed_casts() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    pg.execute(PEOPLE_DDL).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), "people.csv", b"id,name,amount\n2,Bob,\n3,Carol,7.25\n");
    let sink = dir.path().join("people_errors.csv");
    let options = LoadOptions::builder(&sink)
        .delimiter(Delimiter::Comma)
        .empty_as_null(true)
        .build();
    let (pool, mut target) = pg_target(&pg, "people").await;

    let outcome = load(&source, &mut target, &options).await.unwrap();
    pool.close().await;

    assert!(outcome.is_clean());
    let (nulls,): (i64,) = sqlx::query_as("SELECT count(*) FROM people WHERE amount IS NULL")
        .fetch_one(pg.pool())
        .await
        .unwrap();
    assert_eq!(nulls, 1);
    let (total,): (String,) = sqlx::query_as("SELECT sum(amount)::text FROM people")
        .fetch_one(pg.pool())
        .await
        .unwrap();
    assert_eq!(total, "7.25");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_per_row_commits_are_visible_during_load() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    pg.execute(PEOPLE_DDL).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), "people.csv", b"id,name\n1,A\n2,B\n2,C\n");
    let sink = dir.path().join("people_errors.csv");
    let options = LoadOptions::builder(&sink)
        .delimiter(Delimiter::Comma)
        .commit_granularity(CommitGranularity::PerRow)
        .build();
    let (pool, mut target) = pg_target(&pg, "people").await;

    let outcome = load(&source, &mut target, &options).await.unwrap();
    pool.close().await;

    assert_eq!(outcome.committed(), 2);
    assert_eq!(outcome.failed(), 1);
    assert_eq!(count(&pg, "people").await, 2);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_upper_case_names_fold_to_table() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    pg.execute("CREATE SCHEMA calaccess; CREATE TABLE calaccess.lexp_cd (filing_id integer, payee text)")
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), "LEXP_CD.TSV", b"PAYEE\tFILING_ID\nAcme\t10\n");
    let sink = dir.path().join("LEXP_CD_errors.tsv");
    let options = LoadOptions::builder(&sink)
        .expected_column_count(Some(2))
        .build();
    let (pool, mut target) = pg_target(&pg, "CALACCESS.LEXP_CD").await;

    let outcome = load(&source, &mut target, &options).await.unwrap();
    pool.close().await;

    assert_eq!(outcome.committed(), 1);
    let (filing_id, payee): (i32, String) =
        sqlx::query_as("SELECT filing_id, payee FROM calaccess.lexp_cd")
            .fetch_one(pg.pool())
            .await
            .unwrap();
    assert_eq!((filing_id, payee.as_str()), (10, "Acme"));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_replace_load_deletes_existing_rows() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    pg.execute(PEOPLE_DDL).await.unwrap();
    pg.execute("INSERT INTO people (id, name) VALUES (1, 'Old'), (9, 'Old')")
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), "people.csv", b"id,name\n1,New\n");
    let sink = dir.path().join("people_errors.csv");
    let options = LoadOptions::builder(&sink)
        .delimiter(Delimiter::Comma)
        .truncate_before_load(true)
        .build();
    let (pool, mut target) = pg_target(&pg, "people").await;

    let outcome = load(&source, &mut target, &options).await.unwrap();
    pool.close().await;

    assert_eq!(outcome.rows_deleted(), Some(2));
    assert!(outcome.is_clean());
    let (name,): (String,) = sqlx::query_as("SELECT name FROM people")
        .fetch_one(pg.pool())
        .await
        .unwrap();
    assert_eq!(name, "New");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_missing_table_and_column_are_fatal() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    pg.execute(PEOPLE_DDL).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let sink = dir.path().join("errors.csv");

    let source = write_source(dir.path(), "people.csv", b"id,name\n1,A\n");
    let (pool, mut target) = pg_target(&pg, "nobody").await;
    let err = load(&source, &mut target, &csv_options(&sink)).await.unwrap_err();
    pool.close().await;
    assert!(matches!(err, LoadError::TableNotFound(_)));

    let source = write_source(dir.path(), "people2.csv", b"id,nickname\n1,A\n");
    let (pool, mut target) = pg_target(&pg, "people").await;
    let err = load(&source, &mut target, &csv_options(&sink)).await.unwrap_err();
    pool.close().await;
    assert!(matches!(err, LoadError::UnknownColumn { .. }));

    assert!(!sink.exists());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_describe_table() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    pg.execute(PEOPLE_DDL).await.unwrap();
    pg.execute("ALTER TABLE people DROP COLUMN name").await.unwrap();
    pg.execute("ALTER TABLE people ADD COLUMN code char(5)").await.unwrap();

    let (table_ref, columns) = describe_table(pg.pool(), &TableName::new("PEOPLE"))
        .await
        .unwrap();

    assert_eq!(table_ref, "people");
    let described: Vec<(&str, &str, &str)> = columns
        .iter()
        .map(|c| (c.name.as_str(), c.sql_type.as_str(), c.cast_type.as_str()))
        .collect();
    assert_eq!(
        described,
        vec![
            ("id", "integer", "integer"),
            ("amount", "numeric(10,2)", "numeric"),
            ("code", "character(5)", "bpchar"),
        ]
    );
    assert_eq!(columns[1].position, 3);
    assert_eq!(columns[2].position, 4);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_length_limited_columns_reject_instead_of_truncating() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    pg.execute("CREATE TABLE codes (id integer PRIMARY KEY, code char(5), short varchar(3), flags bit(4))")
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let source = write_source(
        dir.path(),
        "codes.csv",
        b"id,code,short,flags\n1,ABCDE,abc,1010\n2,ABCDEFG,ab,1111\n3,AB,abcd,0000\n4,XY,ab,101\n",
    );
    let sink = dir.path().join("codes_errors.csv");
    let reason_log = dir.path().join("codes_errors.jsonl");
    let options = LoadOptions::builder(&sink)
        .delimiter(Delimiter::Comma)
        .reason_log_path(Some(reason_log.clone()))
        .build();
    let (pool, mut target) = pg_target(&pg, "codes").await;

    let outcome = load(&source, &mut target, &options).await.unwrap();
    pool.close().await;

    assert_eq!(outcome.committed(), 1);
    assert_eq!(outcome.failed(), 3);
    let (code, short, flags): (String, String, String) =
        sqlx::query_as("SELECT code::text, short, flags::text FROM codes WHERE id = 1")
            .fetch_one(pg.pool())
            .await
            .unwrap();
    assert_eq!((code.as_str(), short.as_str(), flags.as_str()), ("ABCDE", "abc", "1010"));
    assert_eq!(read_lines(&sink), vec!["2,ABCDEFG,ab,1111", "3,AB,abcd,0000", "4,XY,ab,101"]);

    let logged: Vec<serde_json::Value> = read_lines(&reason_log)
        .iter()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(logged[0]["reason"], "value too long for type character(5)");
    assert_eq!(logged[0]["code"], "22001");
    assert_eq!(logged[1]["reason"], "value too long for type character varying(3)");
    assert_eq!(logged[2]["reason"], "bit string length 3 does not match type bit(4)");
    assert_eq!(logged[2]["code"], "22026");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_list_tables_in_schema() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    pg.execute(PEOPLE_DDL).await.unwrap();
    pg.execute(
        "CREATE SCHEMA calaccess;
         CREATE TABLE calaccess.lexp_cd (filing_id integer);
         CREATE TABLE calaccess.cvr_lobby_disclosure_cd (filing_id integer);
         CREATE VIEW calaccess.lexp_view AS SELECT * FROM calaccess.lexp_cd",
    )
    .await
    .unwrap();

    assert_eq!(list_tables(pg.pool(), "public").await.unwrap(), vec!["people"]);
    assert_eq!(
        list_tables(pg.pool(), "CALACCESS").await.unwrap(),
        vec!["cvr_lobby_disclosure_cd", "lexp_cd"]
    );
    assert!(list_tables(pg.pool(), "nowhere").await.unwrap().is_empty());
}

use rolodex::bridge::{serve_lines, Operation, RequestHandler};
use rolodex::config::BackupConfig;
use rolodex::{Bridge, ErrorKind, Request, SqliteStore};
use serde_json::{json, Value as Json};
use std::sync::Arc;
use tokio::io::BufReader;

fn file_bridge(dir: &std::path::Path, config: &BackupConfig) -> Bridge {
    let store = Arc::new(SqliteStore::open(&dir.join("crm.db")).unwrap());
    Bridge::from_config(store, config, dir)
}

const INSERT_PROFILE: &str = "INSERT INTO profiles (first_name, last_name, company, status) VALUES (?, ?, ?, ?)";

#[tokio::test]
async fn test_all_operations_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = file_bridge(dir.path(), &BackupConfig::default());

    let inserted = bridge
        .handle(Request::statement(
            Operation::Insert,
            INSERT_PROFILE,
            vec![json!("Jane"), json!("Smith"), json!("Acme"), json!("Customer")],
        ))
        .await;
    assert!(inserted.ok);
    let id = inserted.result.unwrap()["lastInsertId"].as_i64().unwrap();

    let one = bridge
        .handle(Request::statement(Operation::QueryOne, "SELECT * FROM profiles WHERE id = ?", vec![json!(id)]))
        .await;
    assert_eq!(one.result.unwrap()["company"], json!("Acme"));

    let all = bridge
        .handle(Request::statement(Operation::QueryAll, "SELECT id FROM profiles", vec![]))
        .await;
    assert_eq!(all.result.unwrap(), json!([{ "id": id }]));

    let mut dup = Request::new(Operation::FindDuplicate);
    dup.params = vec![json!("Jane"), json!("Smith"), json!("Acme")];
    let found = bridge.handle(dup).await;
    assert_eq!(found.result.unwrap()["id"], json!(id));

    let backup = bridge.handle(Request::new(Operation::CreateBackup)).await;
    let path = backup.result.unwrap();
    assert!(std::path::Path::new(path.as_str().unwrap()).is_file());
}

#[tokio::test]
async fn test_errors_carry_kinds() {
    let dir = tempfile::tempdir().unwrap();
    let config = BackupConfig {
        enabled: false,
        ..BackupConfig::default()
    };
    let bridge = file_bridge(dir.path(), &config);

    let params = vec![json!("Jane"), json!("Smith"), json!(""), json!("Lead")];
    assert!(bridge.handle(Request::statement(Operation::Insert, INSERT_PROFILE, params.clone())).await.ok);

    let dup = bridge.handle(Request::statement(Operation::Insert, INSERT_PROFILE, params)).await;
    assert!(!dup.ok);
    assert_eq!(dup.error.unwrap().kind, ErrorKind::ConstraintViolation);

    let bad = bridge.handle(Request::statement(Operation::QueryAll, "SELEC nonsense", vec![])).await;
    assert_eq!(bad.error.unwrap().kind, ErrorKind::SyntaxOrBinding);

    let missing_sql = bridge.handle(Request::new(Operation::QueryOne)).await;
    assert_eq!(missing_sql.error.unwrap().kind, ErrorKind::InvalidRequest);

    let disabled = bridge.handle(Request::new(Operation::CreateBackup)).await;
    assert_eq!(disabled.error.unwrap().kind, ErrorKind::BackupDisabled);
}

#[tokio::test]
async fn test_shutdown_backs_up_and_closes() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = file_bridge(dir.path(), &BackupConfig::default());

    let path = bridge.shutdown().await.unwrap().unwrap();
    assert!(path.is_file());
    assert!(path.starts_with(dir.path().join("data")));

    let after = bridge
        .handle(Request::statement(Operation::QueryAll, "SELECT * FROM profiles", vec![]))
        .await;
    assert_eq!(after.error.unwrap().kind, ErrorKind::StoreClosed);
}

#[tokio::test]
async fn test_serve_lines_answers_in_order() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let bridge = Bridge::new(store);

    let input = concat!(
        r#"{"operation":"run","sql":"INSERT INTO profiles (first_name, last_name, status) VALUES (?, ?, ?)","params":["Ann","Lee","Lead"]}"#,
        "\n",
        "\n",
        "not json\n",
        r#"{"operation":"get","sql":"SELECT first_name FROM profiles WHERE last_name = ?","params":["Lee"]}"#,
        "\n",
    );
    let mut output = Vec::new();
    serve_lines(&bridge, BufReader::new(input.as_bytes()), &mut output).await.unwrap();

    let responses: Vec<Json> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0]["ok"], json!(true));
    assert_eq!(responses[1]["ok"], json!(false));
    assert_eq!(responses[1]["error"]["kind"], json!("invalidRequest"));
    assert_eq!(responses[2]["result"], json!({ "first_name": "Ann" }));
}

//! Request bridge between a UI process and the store
//!
//! A UI sends `{ "operation", "sql", "params" }` requests and receives
//! `{ "ok": true, "result" }` or `{ "ok": false, "error": { "kind", "message" } }`.
//! Store calls run on tokio's blocking pool; the store's own lock keeps
//! statements from interleaving.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use crate::backup::BackupManager;
use crate::config::BackupConfig;
use crate::duplicate::{find_duplicate, DuplicateCandidate};
use crate::storage::{SqliteStore, Value};
use crate::{Error, ErrorKind, Result};

/// Operations a UI may request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    #[serde(alias = "run", alias = "execute")]
    Insert,
    #[serde(alias = "get")]
    QueryOne,
    #[serde(alias = "all")]
    QueryAll,
    FindDuplicate,
    #[serde(alias = "backup")]
    CreateBackup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub operation: Operation,
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default)]
    pub params: Vec<Json>,
    /// For `findDuplicate`; falls back to `params` as [first, last, company?]
    #[serde(default)]
    pub candidate: Option<DuplicateCandidate>,
}

impl Request {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            sql: None,
            params: Vec::new(),
            candidate: None,
        }
    }

    pub fn statement(operation: Operation, sql: impl Into<String>, params: Vec<Json>) -> Self {
        Self {
            sql: Some(sql.into()),
            params,
            ..Self::new(operation)
        }
    }

    fn require_sql(&self) -> Result<String> {
        self.sql
            .clone()
            .ok_or_else(|| Error::InvalidRequest("missing \"sql\"".into()))
    }

    fn bound_params(&self) -> Vec<Value> {
        self.params.iter().map(Value::from_json).collect()
    }

    fn duplicate_candidate(&self) -> Result<DuplicateCandidate> {
        if let Some(candidate) = &self.candidate {
            return Ok(candidate.clone());
        }
        let text = |idx: usize| self.params.get(idx).and_then(Json::as_str);
        match (text(0), text(1)) {
            (Some(first), Some(last)) => Ok(DuplicateCandidate::new(first, last, text(2))),
            _ => Err(Error::InvalidRequest(
                "findDuplicate needs a candidate or [first_name, last_name, company?] params".into(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

impl Response {
    pub fn success(result: Json) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(err: &Error) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(ErrorPayload {
                kind: err.kind(),
                message: err.to_string(),
            }),
        }
    }
}

impl From<Result<Json>> for Response {
    fn from(result: Result<Json>) -> Self {
        match result {
            Ok(value) => Response::success(value),
            Err(e) => Response::failure(&e),
        }
    }
}

/// Anything that can answer bridge requests
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, request: Request) -> Response;
}

/// The store-side end of the bridge
pub struct Bridge {
    store: Arc<SqliteStore>,
    backups: Option<BackupManager>,
    backup_on_close: bool,
}

impl Bridge {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self {
            store,
            backups: None,
            backup_on_close: false,
        }
    }

    pub fn with_backups(mut self, manager: BackupManager, on_close: bool) -> Self {
        self.backups = Some(manager);
        self.backup_on_close = on_close;
        self
    }

    /// Wire backups from configuration; disabled backups leave `createBackup`
    /// answering `BackupDisabled`
    pub fn from_config(store: Arc<SqliteStore>, config: &BackupConfig, base: &Path) -> Self {
        let bridge = Self::new(store);
        if config.enabled {
            bridge.with_backups(BackupManager::from_config(config, base), config.on_close)
        } else {
            bridge
        }
    }

    pub fn store(&self) -> &Arc<SqliteStore> {
        &self.store
    }

    /// Dispatch one request
    pub async fn call(&self, request: Request) -> Result<Json> {
        tracing::debug!("bridge call: {:?}", request.operation);
        match request.operation {
            Operation::Insert => {
                let sql = request.require_sql()?;
                let params = request.bound_params();
                let exec = self.blocking(move |store| store.execute(&sql, &params)).await?;
                Ok(serde_json::to_value(exec).unwrap_or(Json::Null))
            }
            Operation::QueryOne => {
                let sql = request.require_sql()?;
                let params = request.bound_params();
                let row = self.blocking(move |store| store.query_one(&sql, &params)).await?;
                Ok(row.map(|r| r.to_json()).unwrap_or(Json::Null))
            }
            Operation::QueryAll => {
                let sql = request.require_sql()?;
                let params = request.bound_params();
                let rows = self.blocking(move |store| store.query_all(&sql, &params)).await?;
                Ok(Json::Array(rows.iter().map(|r| r.to_json()).collect()))
            }
            Operation::FindDuplicate => {
                let candidate = request.duplicate_candidate()?;
                let found = self.blocking(move |store| find_duplicate(store, &candidate)).await?;
                Ok(found
                    .and_then(|profile| serde_json::to_value(profile).ok())
                    .unwrap_or(Json::Null))
            }
            Operation::CreateBackup => {
                let path = self.create_backup().await?;
                Ok(Json::String(path.display().to_string()))
            }
        }
    }

    pub async fn create_backup(&self) -> Result<PathBuf> {
        let manager = self.backups.clone().ok_or(Error::BackupDisabled)?;
        self.blocking(move |store| manager.create_backup(store)).await
    }

    /// Orderly shutdown: take the on-close backup if configured, then release
    /// the store. The store is released even when the backup fails.
    pub async fn shutdown(&self) -> Result<Option<PathBuf>> {
        let backup = match (&self.backups, self.backup_on_close) {
            (Some(_), true) => Some(self.create_backup().await),
            _ => None,
        };
        let closed = self.blocking(|store| store.close()).await;

        let path = backup.transpose()?;
        closed?;
        tracing::info!("Store released");
        Ok(path)
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteStore) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))?
    }
}

#[async_trait]
impl RequestHandler for Bridge {
    async fn handle(&self, request: Request) -> Response {
        let result = self.call(request).await;
        if let Err(e) = &result {
            tracing::error!("Database operation error: {}", e);
        }
        result.into()
    }
}

/// Answer one JSON request per line until `reader` is exhausted.
///
/// Requests are handled strictly in arrival order.
pub async fn serve_lines<H, R, W>(handler: &H, reader: R, mut writer: W) -> anyhow::Result<()>
where
    H: RequestHandler + ?Sized,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => handler.handle(request).await,
            Err(e) => Response::failure(&Error::InvalidRequest(e.to_string())),
        };
        let mut encoded = serde_json::to_string(&response)?;
        encoded.push('\n');
        writer.write_all(encoded.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}

/// Serve the bridge over stdin/stdout
pub async fn serve_stdio<H: RequestHandler + ?Sized>(handler: &H) -> anyhow::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    serve_lines(handler, stdin, tokio::io::stdout()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bridge() -> Bridge {
        Bridge::new(Arc::new(SqliteStore::open_in_memory().unwrap()))
    }

    #[test]
    fn test_request_aliases() {
        let req: Request = serde_json::from_value(json!({"operation": "run", "sql": "DELETE FROM contacts"})).unwrap();
        assert_eq!(req.operation, Operation::Insert);
        let req: Request = serde_json::from_value(json!({"operation": "all", "sql": "SELECT 1"})).unwrap();
        assert_eq!(req.operation, Operation::QueryAll);
        assert!(req.params.is_empty());
    }

    #[tokio::test]
    async fn test_insert_and_query() {
        let bridge = bridge();
        let result = bridge
            .call(Request::statement(
                Operation::Insert,
                "INSERT INTO profiles (first_name, last_name, status) VALUES (?, ?, ?)",
                vec![json!("Jane"), json!("Smith"), json!("Customer")],
            ))
            .await
            .unwrap();
        let id = result["lastInsertId"].as_i64().unwrap();
        assert_eq!(result["rowsAffected"], json!(1));

        let row = bridge
            .call(Request::statement(Operation::QueryOne, "SELECT * FROM profiles WHERE id = ?", vec![json!(id)]))
            .await
            .unwrap();
        assert_eq!(row["first_name"], json!("Jane"));
        assert_eq!(row["company"], json!(""));

        let none = bridge
            .call(Request::statement(Operation::QueryOne, "SELECT * FROM profiles WHERE id = ?", vec![json!(id + 1)]))
            .await
            .unwrap();
        assert!(none.is_null());
    }

    #[tokio::test]
    async fn test_error_kinds_cross_the_bridge() {
        let bridge = bridge();
        let response = bridge
            .handle(Request::statement(
                Operation::Insert,
                "INSERT INTO contacts (profile_id, date, type, details) VALUES (?, ?, ?, ?)",
                vec![json!(999999), json!("2025-01-01"), json!("Call"), json!("x")],
            ))
            .await;
        assert!(!response.ok);
        assert_eq!(response.error.unwrap().kind, ErrorKind::ConstraintViolation);

        let response = bridge.handle(Request::new(Operation::QueryAll)).await;
        assert_eq!(response.error.unwrap().kind, ErrorKind::InvalidRequest);

        let response = bridge.handle(Request::new(Operation::CreateBackup)).await;
        assert_eq!(response.error.unwrap().kind, ErrorKind::BackupDisabled);
    }

    #[tokio::test]
    async fn test_find_duplicate_from_params() {
        let bridge = bridge();
        bridge
            .store()
            .insert_profile(&crate::NewProfile::new("Jane", "Smith", "Lead"))
            .unwrap();

        let mut request = Request::new(Operation::FindDuplicate);
        request.params = vec![json!("Jane"), json!("Smith")];
        let found = bridge.call(request).await.unwrap();
        assert_eq!(found["first_name"], json!("Jane"));

        let mut request = Request::new(Operation::FindDuplicate);
        request.candidate = Some(DuplicateCandidate::new("Jane", "Smith", Some("Acme")));
        assert!(bridge.call(request).await.unwrap().is_null());
    }

    #[tokio::test]
    async fn test_serve_lines_answers_in_order() {
        let bridge = bridge();
        let input = concat!(
            r#"{"operation":"insert","sql":"INSERT INTO profiles (first_name, last_name, status) VALUES ('A','B','Lead')"}"#,
            "\n",
            "not json\n",
            "\n",
            r#"{"operation":"queryAll","sql":"SELECT first_name FROM profiles"}"#,
            "\n",
        );
        let mut output = Vec::new();
        serve_lines(&bridge, BufReader::new(input.as_bytes()), &mut output).await.unwrap();

        let responses: Vec<Response> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(responses.len(), 3);
        assert!(responses[0].ok);
        assert_eq!(responses[1].error.as_ref().unwrap().kind, ErrorKind::InvalidRequest);
        assert_eq!(responses[2].result, Some(json!([{"first_name": "A"}])));
    }

    #[tokio::test]
    async fn test_shutdown_without_backups_closes_store() {
        let bridge = bridge();
        assert_eq!(bridge.shutdown().await.unwrap(), None);
        assert!(bridge.store().is_closed());

        let response = bridge.handle(Request::statement(Operation::QueryAll, "SELECT 1", vec![])).await;
        assert_eq!(response.error.unwrap().kind, ErrorKind::StoreClosed);
    }
}

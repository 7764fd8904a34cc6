// Databricks SQL warehouse repository (Statement Execution API)
use crate::application::feature_repository::{FeatureRepository, QueryError};
use crate::domain::feature::FeatureRow;
use crate::infrastructure::config::WarehouseSettings;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const LIST_FEATURES_SQL: &str = "SELECT DISTINCT Feature FROM feature_analysis ORDER BY Feature";
const FEATURE_VALUES_SQL: &str =
    "SELECT Feature, Current_Value, Optimal_Value FROM feature_analysis WHERE Feature = :feature";

#[derive(Debug, Clone)]
pub struct DatabricksRepository {
    client: reqwest::Client,
    host: String,
    token: String,
    warehouse_id: String,
    catalog: Option<String>,
    schema: Option<String>,
    wait_timeout: String,
    poll_interval: Duration,
}

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    warehouse_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    catalog: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parameters: Vec<StatementParameter<'a>>,
    wait_timeout: &'a str,
    on_wait_timeout: &'static str,
    disposition: &'static str,
    format: &'static str,
}

#[derive(Debug, Serialize)]
struct StatementParameter<'a> {
    name: &'static str,
    value: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct StatementResponse {
    statement_id: String,
    status: StatementStatus,
    #[serde(default)]
    manifest: Option<Manifest>,
    #[serde(default)]
    result: Option<ResultChunk>,
}

#[derive(Debug, Deserialize)]
struct StatementStatus {
    state: String,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    schema: ManifestSchema,
}

#[derive(Debug, Deserialize)]
struct ManifestSchema {
    #[serde(default)]
    columns: Vec<ColumnInfo>,
}

#[derive(Debug, Deserialize)]
struct ColumnInfo {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct ResultChunk {
    #[serde(default)]
    data_array: Vec<Vec<Value>>,
    #[serde(default)]
    next_chunk_internal_link: Option<String>,
}

/// Columns and rows of a finished statement
#[derive(Debug, Default)]
struct ResultTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl ResultTable {
    fn column(&self, name: &str) -> Result<usize, QueryError> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .ok_or_else(|| QueryError::Decode(format!("result has no {} column", name)))
    }
}

impl DatabricksRepository {
    pub fn new(settings: &WarehouseSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            host: settings.host.trim_end_matches('/').to_string(),
            token: settings.token.clone(),
            warehouse_id: settings.warehouse_id.clone(),
            catalog: settings.catalog.clone(),
            schema: settings.schema.clone(),
            wait_timeout: wait_timeout(settings.wait_timeout_secs),
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
        }
    }

    fn statement_request<'a>(
        &'a self,
        statement: &'a str,
        parameters: Vec<StatementParameter<'a>>,
    ) -> StatementRequest<'a> {
        StatementRequest {
            statement,
            warehouse_id: &self.warehouse_id,
            catalog: self.catalog.as_deref(),
            schema: self.schema.as_deref(),
            parameters,
            wait_timeout: &self.wait_timeout,
            on_wait_timeout: "CONTINUE",
            disposition: "INLINE",
            format: "JSON_ARRAY",
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, QueryError> {
        let response = request
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(QueryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| QueryError::Decode(e.to_string()))
    }

    /// Run a statement to completion. With `all_chunks` false only the inline
    /// first chunk is read, for queries that use a single row.
    async fn execute_statement(
        &self,
        statement: &str,
        parameters: Vec<StatementParameter<'_>>,
        all_chunks: bool,
    ) -> Result<ResultTable, QueryError> {
        let request = self.statement_request(statement, parameters);
        tracing::debug!("Executing statement: {}", statement);

        let url = format!("{}/api/2.0/sql/statements", self.host);
        let mut response: StatementResponse = self.send(self.client.post(&url).json(&request)).await?;

        // Long statements keep running after wait_timeout; poll until they settle
        while !statement_finished(&response.status)? {
            tokio::time::sleep(self.poll_interval).await;
            let url = format!(
                "{}/api/2.0/sql/statements/{}",
                self.host,
                urlencoding::encode(&response.statement_id)
            );
            response = self.send(self.client.get(&url)).await?;
        }

        let columns = response
            .manifest
            .map(|m| m.schema.columns.into_iter().map(|c| c.name).collect())
            .unwrap_or_default();

        let mut chunk = response.result.unwrap_or_default();
        let mut rows = std::mem::take(&mut chunk.data_array);
        if !all_chunks {
            chunk.next_chunk_internal_link = None;
        }
        while let Some(link) = chunk.next_chunk_internal_link.take() {
            chunk = self.send(self.client.get(format!("{}{}", self.host, link))).await?;
            rows.append(&mut chunk.data_array);
        }

        tracing::debug!("Statement {} returned {} rows", response.statement_id, rows.len());
        Ok(ResultTable { columns, rows })
    }
}

/// Ok(true) once the statement succeeded, Ok(false) while it is still running
fn statement_finished(status: &StatementStatus) -> Result<bool, QueryError> {
    match status.state.as_str() {
        "SUCCEEDED" => Ok(true),
        "PENDING" | "RUNNING" => Ok(false),
        other => {
            let message = status
                .error
                .as_ref()
                .and_then(|e| match (&e.error_code, &e.message) {
                    (Some(code), Some(message)) => Some(format!("[{}] {}", code, message)),
                    (None, Some(message)) => Some(message.clone()),
                    (Some(code), None) => Some(code.clone()),
                    (None, None) => None,
                })
                .unwrap_or_else(|| "no error detail".to_string());
            Err(QueryError::Statement {
                state: other.to_string(),
                message,
            })
        }
    }
}

/// The API accepts 0 (async) or 5 to 50 seconds
fn wait_timeout(secs: u64) -> String {
    match secs {
        0 => "0s".to_string(),
        s => format!("{}s", s.clamp(5, 50)),
    }
}

fn cell_str(row: &[Value], idx: usize) -> Option<&str> {
    row.get(idx).and_then(Value::as_str)
}

/// JSON_ARRAY results carry numbers as strings; NULL comes through as null
fn cell_f64(row: &[Value], idx: usize) -> Result<Option<f64>, QueryError> {
    match row.get(idx) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| QueryError::Decode(format!("{:?} is not a number", s))),
        Some(other) => Err(QueryError::Decode(format!("{} is not a number", other))),
    }
}

fn features_from_table(table: &ResultTable) -> Result<Vec<String>, QueryError> {
    let feature_idx = table.column("Feature")?;
    Ok(table
        .rows
        .iter()
        .filter_map(|row| cell_str(row, feature_idx).map(str::to_string))
        .collect())
}

fn first_feature_row(table: &ResultTable) -> Result<Option<FeatureRow>, QueryError> {
    let Some(row) = table.rows.first() else {
        return Ok(None);
    };

    let feature_idx = table.column("Feature")?;
    let current_idx = table.column("Current_Value")?;
    let optimal_idx = table.column("Optimal_Value")?;

    Ok(Some(FeatureRow::new(
        cell_str(row, feature_idx).unwrap_or_default().to_string(),
        cell_f64(row, current_idx)?,
        cell_f64(row, optimal_idx)?,
    )))
}

#[async_trait]
impl FeatureRepository for DatabricksRepository {
    async fn list_distinct_features(&self) -> Result<Vec<String>, QueryError> {
        let table = self.execute_statement(LIST_FEATURES_SQL, Vec::new(), true).await?;
        features_from_table(&table)
    }

    async fn fetch_feature_row(&self, feature: &str) -> Result<Option<FeatureRow>, QueryError> {
        let parameters = vec![StatementParameter {
            name: "feature",
            value: feature,
            kind: "STRING",
        }];
        let table = self.execute_statement(FEATURE_VALUES_SQL, parameters, false).await?;
        first_feature_row(&table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn settings() -> WarehouseSettings {
        WarehouseSettings {
            host: "https://example.cloud.databricks.com/".to_string(),
            token: "dapi-test".to_string(),
            warehouse_id: "abc123".to_string(),
            catalog: Some("main".to_string()),
            schema: None,
            wait_timeout_secs: 30,
            poll_interval_ms: 500,
        }
    }

    fn table(columns: &[&str], rows: Value) -> ResultTable {
        ResultTable {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: serde_json::from_value(rows).unwrap(),
        }
    }

    #[test]
    fn test_feature_name_is_bound_not_interpolated() {
        let repo = DatabricksRepository::new(&settings());
        let hostile = "x' OR '1'='1";
        let request = repo.statement_request(
            FEATURE_VALUES_SQL,
            vec![StatementParameter {
                name: "feature",
                value: hostile,
                kind: "STRING",
            }],
        );
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(
            body["statement"],
            "SELECT Feature, Current_Value, Optimal_Value FROM feature_analysis WHERE Feature = :feature"
        );
        assert_eq!(
            body["parameters"],
            json!([{"name": "feature", "value": hostile, "type": "STRING"}])
        );
        assert_eq!(body["catalog"], "main");
        assert!(body.get("schema").is_none());
        assert_eq!(body["format"], "JSON_ARRAY");
        assert_eq!(body["wait_timeout"], "30s");
    }

    #[test]
    fn test_list_request_has_no_parameters() {
        let repo = DatabricksRepository::new(&settings());
        let body = serde_json::to_value(repo.statement_request(LIST_FEATURES_SQL, Vec::new())).unwrap();

        assert!(body.get("parameters").is_none());
        assert_eq!(repo.host, "https://example.cloud.databricks.com");
    }

    #[test]
    fn test_wait_timeout_range() {
        assert_eq!(wait_timeout(0), "0s");
        assert_eq!(wait_timeout(2), "5s");
        assert_eq!(wait_timeout(30), "30s");
        assert_eq!(wait_timeout(120), "50s");
    }

    #[test]
    fn test_statement_states() {
        let status = |state: &str, error: Option<ServiceError>| StatementStatus {
            state: state.to_string(),
            error,
        };

        assert!(statement_finished(&status("SUCCEEDED", None)).unwrap());
        assert!(!statement_finished(&status("PENDING", None)).unwrap());
        assert!(!statement_finished(&status("RUNNING", None)).unwrap());

        let err = statement_finished(&status(
            "FAILED",
            Some(ServiceError {
                error_code: Some("BAD_REQUEST".to_string()),
                message: Some("Table not found".to_string()),
            }),
        ))
        .unwrap_err();
        assert_eq!(err.to_string(), "statement FAILED: [BAD_REQUEST] Table not found");

        let err = statement_finished(&status("CANCELED", None)).unwrap_err();
        assert_eq!(err.to_string(), "statement CANCELED: no error detail");
    }

    #[test]
    fn test_parse_statement_response() {
        let response: StatementResponse = serde_json::from_value(json!({
            "statement_id": "01ef-abc",
            "status": {"state": "SUCCEEDED"},
            "manifest": {"schema": {"column_count": 1, "columns": [{"name": "Feature", "position": 0}]}},
            "result": {"chunk_index": 0, "data_array": [["Accuracy"], ["Latency"]]}
        }))
        .unwrap();

        assert_eq!(response.statement_id, "01ef-abc");
        assert_eq!(response.manifest.unwrap().schema.columns[0].name, "Feature");
        assert_eq!(response.result.unwrap().data_array.len(), 2);
    }

    #[test]
    fn test_features_keep_order_and_skip_nulls() {
        let table = table(&["Feature"], json!([["Zeta"], [null], ["Alpha"]]));

        assert_eq!(features_from_table(&table).unwrap(), vec!["Zeta", "Alpha"]);
    }

    #[test]
    fn test_first_feature_row() {
        let table = table(
            &["Feature", "Current_Value", "Optimal_Value"],
            json!([["Latency", "3.5", "7.0"], ["Latency", "1", "1"]]),
        );

        assert_eq!(
            first_feature_row(&table).unwrap(),
            Some(FeatureRow::new("Latency".to_string(), Some(3.5), Some(7.0)))
        );
    }

    #[test]
    fn test_feature_row_nulls_and_nan() {
        let table = table(
            &["Feature", "Current_Value", "Optimal_Value"],
            json!([["Latency", null, "NaN"]]),
        );
        let row = first_feature_row(&table).unwrap().unwrap();

        assert_eq!(row.current_value, None);
        assert!(row.optimal_value.unwrap().is_nan());
    }

    #[test]
    fn test_empty_result_is_no_row() {
        let table = table(&["Feature", "Current_Value", "Optimal_Value"], json!([]));

        assert_eq!(first_feature_row(&table).unwrap(), None);
    }

    #[test]
    fn test_non_numeric_value_is_decode_error() {
        let table = table(
            &["Feature", "Current_Value", "Optimal_Value"],
            json!([["Latency", "fast", "7.0"]]),
        );

        assert!(matches!(first_feature_row(&table), Err(QueryError::Decode(_))));
    }

    #[test]
    fn test_missing_column_is_decode_error() {
        let table = table(&["Name"], json!([["Latency"]]));

        assert!(matches!(features_from_table(&table), Err(QueryError::Decode(_))));
    }

    const STATEMENTS: &str = "/api/2.0/sql/statements";
    const CHUNK_LINK: &str = "/api/2.0/sql/statements/st-1/result/chunks/1";

    /// Serve `router` on an ephemeral local port, returning its base URL
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn repo_for(host: String) -> DatabricksRepository {
        let mut settings = settings();
        settings.host = host;
        settings.poll_interval_ms = 1;
        let mut repo = DatabricksRepository::new(&settings);
        // Keep local traffic away from any proxy configured in the environment
        repo.client = reqwest::Client::builder().no_proxy().build().unwrap();
        repo
    }

    fn chunk_route(hits: Arc<AtomicUsize>) -> axum::routing::MethodRouter {
        get(move || {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Json(json!({"chunk_index": 1, "data_array": [["Zeta"]]}))
            }
        })
    }

    #[tokio::test]
    async fn test_pending_statement_is_polled_and_chunks_followed() {
        let polls = Arc::new(AtomicUsize::new(0));
        let chunk_hits = Arc::new(AtomicUsize::new(0));
        let auth = Arc::new(Mutex::new(Vec::<String>::new()));

        let submit = {
            let auth = auth.clone();
            post(move |headers: HeaderMap| {
                let auth = auth.clone();
                async move {
                    let value = headers
                        .get(AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default();
                    auth.lock().push(value.to_string());
                    Json(json!({"statement_id": "st-1", "status": {"state": "PENDING"}}))
                }
            })
        };
        let status = {
            let polls = polls.clone();
            get(move |Path(id): Path<String>| {
                let polls = polls.clone();
                async move {
                    if polls.fetch_add(1, Ordering::SeqCst) == 0 {
                        return Json(json!({"statement_id": id, "status": {"state": "RUNNING"}}));
                    }
                    Json(json!({
                        "statement_id": id,
                        "status": {"state": "SUCCEEDED"},
                        "manifest": {"schema": {"columns": [{"name": "Feature"}]}},
                        "result": {
                            "chunk_index": 0,
                            "data_array": [["Alpha"], ["Beta"]],
                            "next_chunk_internal_link": CHUNK_LINK
                        }
                    }))
                }
            })
        };
        let router = Router::new()
            .route(STATEMENTS, submit)
            .route("/api/2.0/sql/statements/:id", status)
            .route(CHUNK_LINK, chunk_route(chunk_hits.clone()));
        let repo = repo_for(serve(router).await);

        let features = repo.list_distinct_features().await.unwrap();

        assert_eq!(features, vec!["Alpha", "Beta", "Zeta"]);
        assert_eq!(polls.load(Ordering::SeqCst), 2);
        assert_eq!(chunk_hits.load(Ordering::SeqCst), 1);
        assert_eq!(*auth.lock(), vec!["Bearer dapi-test".to_string()]);
    }

    #[tokio::test]
    async fn test_rejected_token_is_status_error() {
        let router = Router::new().route(
            STATEMENTS,
            post(|| async { (StatusCode::FORBIDDEN, "Invalid access token") }),
        );
        let repo = repo_for(serve(router).await);

        let err = repo.list_distinct_features().await.unwrap_err();

        match err {
            QueryError::Status { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "Invalid access token");
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_statement_surfaces_warehouse_message() {
        let router = Router::new().route(
            STATEMENTS,
            post(|| async {
                Json(json!({
                    "statement_id": "st-2",
                    "status": {
                        "state": "FAILED",
                        "error": {"error_code": "BAD_REQUEST", "message": "Table not found"}
                    }
                }))
            }),
        );
        let repo = repo_for(serve(router).await);

        let err = repo.fetch_feature_row("Latency").await.unwrap_err();

        assert_eq!(err.to_string(), "statement FAILED: [BAD_REQUEST] Table not found");
    }

    #[tokio::test]
    async fn test_point_lookup_reads_only_first_chunk() {
        let chunk_hits = Arc::new(AtomicUsize::new(0));
        let bodies = Arc::new(Mutex::new(Vec::<Value>::new()));

        let submit = {
            let bodies = bodies.clone();
            post(move |Json(body): Json<Value>| {
                let bodies = bodies.clone();
                async move {
                    bodies.lock().push(body);
                    Json(json!({
                        "statement_id": "st-1",
                        "status": {"state": "SUCCEEDED"},
                        "manifest": {"schema": {"columns": [
                            {"name": "Feature"}, {"name": "Current_Value"}, {"name": "Optimal_Value"}
                        ]}},
                        "result": {
                            "chunk_index": 0,
                            "data_array": [["Latency", "3.5", "7.0"]],
                            "next_chunk_internal_link": CHUNK_LINK
                        }
                    }))
                }
            })
        };
        let router = Router::new()
            .route(STATEMENTS, submit)
            .route(CHUNK_LINK, chunk_route(chunk_hits.clone()));
        let repo = repo_for(serve(router).await);

        let row = repo.fetch_feature_row("Latency").await.unwrap();

        assert_eq!(
            row,
            Some(FeatureRow::new("Latency".to_string(), Some(3.5), Some(7.0)))
        );
        assert_eq!(chunk_hits.load(Ordering::SeqCst), 0);
        assert_eq!(
            bodies.lock()[0]["parameters"],
            json!([{"name": "feature", "value": "Latency", "type": "STRING"}])
        );
    }
}

//! REST API pusher (PostgREST / Supabase).
//!
//! Clears destination tables with one `DELETE` per table and, when records
//! are available, re-inserts them with a `POST` of the JSON array. Each
//! table is handled on its own: a failure is reported and the next table
//! is processed.
//!
//! Records come straight from the parsed source document (or from the SQL
//! file through [`crate::artifact`]), never from ad-hoc text splitting.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use std::path::Path;

use crate::artifact::TableRows;
use crate::config::RestCredentials;
use crate::confirm::Confirm;
use crate::error::{RestError, RestResult};
use crate::logs::{
    log_error_indent, log_info, log_info_indent, log_success, log_success_indent, log_warning,
};
use crate::models::Record;

/// REST client bound to one project.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    credentials: RestCredentials,
}

impl RestClient {
    pub fn new(credentials: RestCredentials) -> Self {
        Self::with_http_client(credentials, reqwest::Client::new())
    }

    /// Use a preconfigured `reqwest` client (proxy, timeouts).
    pub fn with_http_client(credentials: RestCredentials, http: reqwest::Client) -> Self {
        Self { http, credentials }
    }

    pub fn base_url(&self) -> &str {
        &self.credentials.url
    }

    /// `<url>/rest/v1/<table>`
    pub fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.credentials.url, table)
    }

    fn headers(&self) -> RestResult<HeaderMap> {
        let key = &self.credentials.service_key;
        let apikey = HeaderValue::from_str(key).map_err(|_| RestError::InvalidKey)?;
        let bearer =
            HeaderValue::from_str(&format!("Bearer {}", key)).map_err(|_| RestError::InvalidKey)?;

        let mut headers = HeaderMap::new();
        headers.insert("apikey", apikey);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("Prefer", HeaderValue::from_static("return=minimal"));
        Ok(headers)
    }

    /// Delete all rows of a table.
    pub async fn clear_table(&self, table: &str) -> RestResult<()> {
        let response = self
            .http
            .delete(self.table_url(table))
            .headers(self.headers()?)
            .send()
            .await?;
        check_status(response).await
    }

    /// Insert records into a table in one request.
    pub async fn insert_records(&self, table: &str, records: &[Record]) -> RestResult<()> {
        let response = self
            .http
            .post(self.table_url(table))
            .headers(self.headers()?)
            .json(records)
            .send()
            .await?;
        check_status(response).await
    }
}

/// 2xx is success; anything else carries the response body.
async fn check_status(response: reqwest::Response) -> RestResult<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(RestError::Status {
        status: status.as_u16(),
        body,
    })
}

/// What happened to one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableStatus {
    /// Cleared; no records were sent.
    Cleared,
    /// Cleared and refilled with this many records.
    Inserted { count: usize },
    /// DELETE failed; table skipped.
    ClearFailed { error: String },
    /// Cleared but POST failed.
    InsertFailed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TablePush {
    pub table: String,
    #[serde(flatten)]
    pub status: TableStatus,
}

/// Outcome of a push over all tables.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PushReport {
    pub tables: Vec<TablePush>,
}

impl PushReport {
    pub fn cleared_count(&self) -> usize {
        self.tables
            .iter()
            .filter(|t| !matches!(t.status, TableStatus::ClearFailed { .. }))
            .count()
    }

    pub fn inserted_records(&self) -> usize {
        self.tables
            .iter()
            .map(|t| match t.status {
                TableStatus::Inserted { count } => count,
                _ => 0,
            })
            .sum()
    }

    pub fn failures(&self) -> usize {
        self.tables
            .iter()
            .filter(|t| {
                matches!(
                    t.status,
                    TableStatus::ClearFailed { .. } | TableStatus::InsertFailed { .. }
                )
            })
            .count()
    }
}

/// How a push run ended.
#[derive(Debug, Clone)]
pub enum PushOutcome {
    Cancelled,
    Done(PushReport),
}

/// Clear each table, then insert its records when `rows` has any.
///
/// Tables are processed in order; a failing table never stops the rest.
pub async fn push_tables(
    client: &RestClient,
    tables: &[String],
    rows: Option<&[TableRows]>,
) -> PushReport {
    let mut report = PushReport::default();

    for table in tables {
        log_info(format!("📋 Processing {}...", table));
        log_info_indent(format!("🗑️  Clearing {}...", table), 1);

        if let Err(e) = client.clear_table(table).await {
            log_error_indent(format!("Failed to clear {}: {}", table, e), 1);
            report.tables.push(TablePush {
                table: table.clone(),
                status: TableStatus::ClearFailed { error: e.to_string() },
            });
            continue;
        }
        log_success_indent(format!("{} cleared", table), 1);

        let records = rows
            .and_then(|rows| rows.iter().find(|r| &r.table == table))
            .map(|r| r.records.as_slice())
            .filter(|records| !records.is_empty());

        let status = match records {
            None => TableStatus::Cleared,
            Some(records) => match client.insert_records(table, records).await {
                Ok(()) => {
                    log_success_indent(format!("Inserted {} records into {}", records.len(), table), 1);
                    TableStatus::Inserted { count: records.len() }
                }
                Err(e) => {
                    log_error_indent(format!("Failed to insert into {}: {}", table, e), 1);
                    TableStatus::InsertFailed { error: e.to_string() }
                }
            },
        };

        report.tables.push(TablePush {
            table: table.clone(),
            status,
        });
    }

    report
}

/// Confirm, then [`push_tables`].
pub async fn push(
    client: &RestClient,
    tables: &[String],
    rows: Option<&[TableRows]>,
    confirm: &dyn Confirm,
) -> PushOutcome {
    let question = match rows {
        Some(_) => "⚠️  This will clear and insert data into staging tables. Continue?",
        None => "⚠️  This will clear staging tables. Continue?",
    };
    if !confirm.confirm(question) {
        log_warning("Operation cancelled");
        return PushOutcome::Cancelled;
    }

    log_info("🚀 Updating staging database...");
    let report = push_tables(client, tables, rows).await;
    log_success(format!(
        "Tables cleared: {}/{}",
        report.cleared_count(),
        tables.len()
    ));
    if rows.is_some() {
        log_success(format!("Records inserted: {}", report.inserted_records()));
    }

    PushOutcome::Done(report)
}

/// Copy-paste instructions for inserting the SQL file by hand.
pub fn manual_steps(base_url: &str, sql_file: &Path) -> Vec<String> {
    vec![
        format!("1. Go to your Supabase dashboard: {}", base_url),
        "2. Navigate to SQL Editor".to_string(),
        format!("3. Copy and paste the contents of {}", sql_file.display()),
        "4. Execute the SQL script".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::AutoApprove;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answers one connection per status in `statuses`, returning the raw requests.
    async fn responder(statuses: Vec<u16>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for status in statuses {
                let (mut socket, _) = listener.accept().await.unwrap();
                requests.push(read_request(&mut socket).await);

                let body = if status >= 300 { "{\"message\":\"nope\"}" } else { "" };
                let response = format!(
                    "HTTP/1.1 {} X\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
            requests
        });

        (url, handle)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let lower = l.to_ascii_lowercase();
                        lower
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return text;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn client(url: &str) -> RestClient {
        let http = reqwest::Client::builder().no_proxy().build().unwrap();
        RestClient::with_http_client(RestCredentials::new(url, "service-key").unwrap(), http)
    }

    fn rows() -> Vec<TableRows> {
        vec![TableRows {
            table: "categories".into(),
            records: vec![
                json!({"id": 1, "name": "Dairy"}).as_object().unwrap().clone(),
                json!({"id": 2, "name": "Produce"}).as_object().unwrap().clone(),
            ],
        }]
    }

    #[test]
    fn test_table_url() {
        let client = client("https://abc.supabase.co/");
        assert_eq!(client.table_url("orders"), "https://abc.supabase.co/rest/v1/orders");
    }

    #[tokio::test]
    async fn test_clear_sends_auth_headers() {
        let (url, server) = responder(vec![204]).await;
        client(&url).clear_table("orders").await.unwrap();

        let requests = server.await.unwrap();
        let request = requests[0].to_ascii_lowercase();
        assert!(request.starts_with("delete /rest/v1/orders "));
        assert!(request.contains("apikey: service-key"));
        assert!(request.contains("authorization: bearer service-key"));
        assert!(request.contains("prefer: return=minimal"));
    }

    #[tokio::test]
    async fn test_insert_posts_json_array() {
        let (url, server) = responder(vec![201]).await;
        client(&url)
            .insert_records("categories", &rows()[0].records)
            .await
            .unwrap();

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("POST /rest/v1/categories "));
        assert!(requests[0].contains(r#"[{"id":1,"name":"Dairy"},{"id":2,"name":"Produce"}]"#));
    }

    #[tokio::test]
    async fn test_error_status_reported() {
        let (url, server) = responder(vec![409]).await;
        let err = client(&url).clear_table("orders").await.unwrap_err();
        server.await.unwrap();

        match err {
            RestError::Status { status, body } => {
                assert_eq!(status, 409);
                assert!(body.contains("nope"));
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_table_does_not_stop_others() {
        // orders: DELETE fails; categories: DELETE + POST ok; customers: DELETE ok
        let (url, server) = responder(vec![500, 200, 201, 200]).await;
        let tables = vec!["orders".to_string(), "categories".to_string(), "customers".to_string()];
        let rows = rows();

        let report = push_tables(&client(&url), &tables, Some(&rows)).await;
        server.await.unwrap();

        assert_eq!(report.tables.len(), 3);
        assert!(matches!(report.tables[0].status, TableStatus::ClearFailed { .. }));
        assert_eq!(report.tables[1].status, TableStatus::Inserted { count: 2 });
        assert_eq!(report.tables[2].status, TableStatus::Cleared);
        assert_eq!(report.cleared_count(), 2);
        assert_eq!(report.inserted_records(), 2);
        assert_eq!(report.failures(), 1);
    }

    #[tokio::test]
    async fn test_transport_error_is_per_table() {
        // Nothing listens on port 1
        let tables = vec!["orders".to_string(), "customers".to_string()];
        let report = push_tables(&client("http://127.0.0.1:1"), &tables, None).await;

        assert_eq!(report.failures(), 2);
        assert_eq!(report.cleared_count(), 0);
    }

    #[tokio::test]
    async fn test_declined_push_sends_nothing() {
        let tables = vec!["orders".to_string()];
        let outcome = push(&client("http://127.0.0.1:1"), &tables, None, &|_: &str| false).await;
        assert!(matches!(outcome, PushOutcome::Cancelled));
    }

    #[tokio::test]
    async fn test_push_confirmed() {
        let (url, server) = responder(vec![200]).await;
        let tables = vec!["orders".to_string()];
        let outcome = push(&client(&url), &tables, None, &AutoApprove).await;
        server.await.unwrap();

        match outcome {
            PushOutcome::Done(report) => assert_eq!(report.cleared_count(), 1),
            other => panic!("expected done, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_key_never_sent_unauthenticated() {
        let credentials = RestCredentials {
            url: "http://127.0.0.1:1".to_string(),
            service_key: "bad\nkey".to_string(),
        };
        let client = RestClient::new(credentials);
        let err = client.clear_table("orders").await.unwrap_err();
        assert!(matches!(err, RestError::InvalidKey));
    }

    #[tokio::test]
    async fn test_pushed_rows_match_sql_rows() {
        let doc = "Categories -\n\
[{\"id\": 1, \"name\": \"A\"}, {\"id\": 2, \"email\": \"b@x\"}]\n\n";
        let plan = crate::models::default_plan();
        let extraction = crate::parser::extract_sections(doc, &plan.sections);
        let rows = crate::pipeline::records_by_table(&plan, &extraction);

        let (url, server) = responder(vec![204, 201]).await;
        let tables = vec!["categories".to_string()];
        let report = push_tables(&client(&url), &tables, Some(&rows)).await;
        let requests = server.await.unwrap();

        assert_eq!(report.tables[0].status, TableStatus::Inserted { count: 2 });
        assert!(requests[1].ends_with(r#"[{"id":1,"name":"A"},{"id":2,"name":null}]"#));
    }

    #[test]
    fn test_manual_steps_name_file() {
        let steps = manual_steps("https://abc.supabase.co", Path::new("inserts.sql"));
        assert_eq!(steps.len(), 4);
        assert!(steps[2].contains("inserts.sql"));
    }
}

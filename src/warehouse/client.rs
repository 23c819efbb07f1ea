use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use super::session::WarehouseSession;

const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Statement-level timeout passed to the warehouse, in seconds
const STATEMENT_TIMEOUT_SECS: u64 = 60;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Warehouse request failed")]
    Transport(#[from] reqwest::Error),

    #[error("Warehouse rejected the statement: {message} (code {code})")]
    Statement { code: String, message: String },

    #[error("Failed to decode warehouse response: {context}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Warehouse response carried no result set")]
    MissingResultSet,

    #[error("Result set is missing expected column '{name}'")]
    MissingColumn { name: &'static str },

    #[error("Malformed result row {index}: {reason}")]
    MalformedRow { index: usize, reason: String },
}

/// A tabular query result as it comes off the wire: column names plus rows
/// of optional string cells (the SQL API serializes every value, including
/// VARIANT columns, as JSON strings; NULL arrives as null).
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl ResultSet {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// The seam between the fetch pipeline and the warehouse. Production code
/// talks to the SQL API; tests substitute canned result sets behind a call
/// counter.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<ResultSet, FetchError>;
}

/// Snowflake SQL API v2 client
pub struct SqlApiClient {
    http: reqwest::Client,
    session: WarehouseSession,
}

impl SqlApiClient {
    pub fn new(session: WarehouseSession) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { http, session })
    }

    async fn fetch_partition(
        &self,
        handle: &str,
        partition: usize,
    ) -> Result<Vec<Vec<Option<String>>>, FetchError> {
        let response = self
            .http
            .get(self.session.statement_url(handle))
            .query(&[("partition", partition.to_string())])
            .bearer_auth(self.session.bearer_token())
            .header(
                "X-Snowflake-Authorization-Token-Type",
                self.session.token_kind().header_value(),
            )
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(statement_error(&body, status));
        }

        let payload: PartitionResponse =
            serde_json::from_str(&body).map_err(|source| FetchError::Decode {
                context: format!("result partition {}", partition),
                source,
            })?;
        Ok(payload.data)
    }
}

#[async_trait]
impl QueryExecutor for SqlApiClient {
    async fn execute(&self, sql: &str) -> Result<ResultSet, FetchError> {
        let body = json!({
            "statement": sql,
            "timeout": STATEMENT_TIMEOUT_SECS,
        });

        let response = self
            .http
            .post(self.session.statements_url())
            .bearer_auth(self.session.bearer_token())
            .header(
                "X-Snowflake-Authorization-Token-Type",
                self.session.token_kind().header_value(),
            )
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(statement_error(&text, status));
        }

        let payload = decode_statement_body(&text)?;
        let mut result = ResultSet {
            columns: payload.columns,
            rows: payload.rows,
        };

        // Large result sets arrive in partitions; the initial response holds
        // only the first one.
        if payload.partition_count > 1 {
            let handle = payload.handle.ok_or(FetchError::MissingResultSet)?;
            for partition in 1..payload.partition_count {
                let rows = self.fetch_partition(&handle, partition).await?;
                result.rows.extend(rows);
            }
        }

        Ok(result)
    }
}

#[derive(Debug)]
struct StatementPayload {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
    handle: Option<String>,
    partition_count: usize,
}

#[derive(Deserialize)]
struct StatementResponse {
    #[serde(rename = "resultSetMetaData")]
    metadata: Option<ResultSetMetaData>,
    data: Option<Vec<Vec<Option<String>>>>,
    #[serde(rename = "statementHandle")]
    statement_handle: Option<String>,
}

#[derive(Deserialize)]
struct ResultSetMetaData {
    #[serde(rename = "rowType")]
    row_type: Vec<ColumnType>,
    #[serde(rename = "partitionInfo", default)]
    partition_info: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct ColumnType {
    name: String,
}

#[derive(Deserialize)]
struct PartitionResponse {
    data: Vec<Vec<Option<String>>>,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

fn decode_statement_body(body: &str) -> Result<StatementPayload, FetchError> {
    let response: StatementResponse =
        serde_json::from_str(body).map_err(|source| FetchError::Decode {
            context: "statement response".to_string(),
            source,
        })?;

    let metadata = response.metadata.ok_or(FetchError::MissingResultSet)?;
    let rows = response.data.ok_or(FetchError::MissingResultSet)?;

    Ok(StatementPayload {
        columns: metadata.row_type.into_iter().map(|c| c.name).collect(),
        rows,
        handle: response.statement_handle,
        partition_count: metadata.partition_info.len().max(1),
    })
}

/// Map a non-2xx SQL API response to a statement error, falling back to the
/// raw body when it is not the usual {code, message} JSON shape.
fn statement_error(body: &str, status: reqwest::StatusCode) -> FetchError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => FetchError::Statement {
            code: parsed.code.unwrap_or_else(|| status.as_u16().to_string()),
            message: parsed
                .message
                .unwrap_or_else(|| "warehouse returned an error".to_string()),
        },
        Err(_) => FetchError::Statement {
            code: status.as_u16().to_string(),
            message: body.chars().take(200).collect(),
        },
    }
}

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::warehouse::{FetchError, ResultSet};

/// One row of the fetched usage table: a single query execution joined with
/// one of its model-usage events. A query with several usage events appears
/// once per event, with the query metadata duplicated on each row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageRecord {
    pub query_id: String,
    pub query_text: String,
    pub user_name: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    /// Total elapsed time in milliseconds
    pub elapsed_ms: Option<i64>,
    pub execution_status: Option<String>,
    pub model_name: Option<String>,
    pub function_name: Option<String>,
    pub tokens: Option<i64>,
    pub token_credits: Option<f64>,
    /// Token count per usage sub-category (e.g. input vs. output); absent
    /// when the warehouse recorded a single undifferentiated call
    pub tokens_granular: Option<BTreeMap<String, f64>>,
    pub credits_granular: Option<BTreeMap<String, f64>>,
}

impl UsageRecord {
    /// Format the start time the way the dashboard displays it
    pub fn start_time_display(&self) -> Option<String> {
        self.start_time
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
    }
}

struct ColumnLayout {
    query_id: usize,
    query_text: usize,
    user_name: usize,
    start_time: usize,
    elapsed: usize,
    status: usize,
    model_name: usize,
    function_name: usize,
    tokens: usize,
    token_credits: usize,
    tokens_granular: usize,
    credits_granular: usize,
}

impl ColumnLayout {
    fn resolve(result: &ResultSet) -> Result<Self, FetchError> {
        let index = |name: &'static str| {
            result
                .column_index(name)
                .ok_or(FetchError::MissingColumn { name })
        };
        Ok(Self {
            query_id: index("QUERY_ID")?,
            query_text: index("QUERY_TEXT")?,
            user_name: index("USER_NAME")?,
            start_time: index("START_TIME")?,
            elapsed: index("TOTAL_ELAPSED_TIME")?,
            status: index("EXECUTION_STATUS")?,
            model_name: index("MODEL_NAME")?,
            function_name: index("FUNCTION_NAME")?,
            tokens: index("TOKENS")?,
            token_credits: index("TOKEN_CREDITS")?,
            tokens_granular: index("TOKENS_GRANULAR")?,
            credits_granular: index("TOKEN_CREDITS_GRANULAR")?,
        })
    }
}

/// Convert a wire result set into usage records. Junk numeric or JSON cells
/// degrade to None; a row without a query id is rejected outright.
pub fn records_from_result(result: &ResultSet) -> Result<Vec<UsageRecord>, FetchError> {
    let layout = ColumnLayout::resolve(result)?;

    let mut records = Vec::with_capacity(result.rows.len());
    for (index, row) in result.rows.iter().enumerate() {
        let query_id = match cell(row, layout.query_id) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                return Err(FetchError::MalformedRow {
                    index,
                    reason: "QUERY_ID is null or empty".to_string(),
                })
            }
        };

        records.push(UsageRecord {
            query_id,
            query_text: cell(row, layout.query_text).unwrap_or_default().to_string(),
            user_name: cell(row, layout.user_name).map(str::to_string),
            start_time: cell(row, layout.start_time).and_then(parse_timestamp),
            elapsed_ms: cell(row, layout.elapsed).and_then(parse_i64),
            execution_status: cell(row, layout.status).map(str::to_string),
            model_name: cell(row, layout.model_name).map(str::to_string),
            function_name: cell(row, layout.function_name).map(str::to_string),
            tokens: cell(row, layout.tokens).and_then(parse_i64),
            token_credits: cell(row, layout.token_credits).and_then(parse_f64),
            tokens_granular: cell(row, layout.tokens_granular).and_then(parse_granular),
            credits_granular: cell(row, layout.credits_granular).and_then(parse_granular),
        });
    }

    Ok(records)
}

fn cell(row: &[Option<String>], index: usize) -> Option<&str> {
    row.get(index).and_then(|v| v.as_deref())
}

fn parse_i64(value: &str) -> Option<i64> {
    value
        .parse::<i64>()
        .ok()
        .or_else(|| value.parse::<f64>().ok().map(|f| f as i64))
}

fn parse_f64(value: &str) -> Option<f64> {
    value.parse::<f64>().ok()
}

/// Timestamps arrive either as epoch seconds with a fractional part (the SQL
/// API's JSON encoding for TIMESTAMP_LTZ) or as a formatted datetime string.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(epoch) = value.parse::<f64>() {
        let secs = epoch.trunc() as i64;
        let nanos = (epoch.fract() * 1e9).round() as u32;
        return Utc.timestamp_opt(secs, nanos).single();
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f %z") {
        return Some(parsed.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Parse a VARIANT breakdown cell: a JSON object mapping sub-category names
/// to numeric counts. Non-numeric entries are skipped; an empty object stays
/// an empty map, distinct from an absent cell.
fn parse_granular(value: &str) -> Option<BTreeMap<String, f64>> {
    let parsed: serde_json::Value = serde_json::from_str(value).ok()?;
    let object = parsed.as_object()?;
    Some(
        object
            .iter()
            .filter_map(|(key, v)| v.as_f64().map(|n| (key.clone(), n)))
            .collect(),
    )
}

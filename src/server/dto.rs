use std::collections::BTreeMap;

use serde::Serialize;

use crate::insights::metrics::{format_avg_tokens, format_count, format_credits, format_credits_precise};
use crate::insights::preview::query_preview;
use crate::insights::{FilterOptions, UsageMetrics};
use crate::usage::UsageRecord;

/// Sentinel dropdown entry meaning "no constraint on this dimension"
pub const ALL_SENTINEL: &str = "All";

/// Static remediation hint shown alongside any fetch failure
pub const ACCESS_HINT: &str = "Make sure you have access to SNOWFLAKE.ACCOUNT_USAGE views. \
     You may need the ACCOUNTADMIN role or appropriate privileges.";

/// Generic API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'static str>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            hint: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            hint: None,
        }
    }

    pub fn error_with_hint(message: impl Into<String>, hint: &'static str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            hint: Some(hint),
        }
    }
}

/// Which page state the dashboard payload represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardState {
    Listing,
    Empty,
}

/// Everything the page needs for one render: filter options, headline
/// metrics, and the filtered table rows
#[derive(Serialize)]
pub struct DashboardDto {
    pub state: DashboardState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<FilterOptionsDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsDto>,
    pub rows: Vec<DisplayRowDto>,
}

impl DashboardDto {
    pub fn empty() -> Self {
        Self {
            state: DashboardState::Empty,
            options: None,
            metrics: None,
            rows: Vec::new(),
        }
    }
}

/// Dropdown contents with the "All" sentinel prepended
#[derive(Serialize)]
pub struct FilterOptionsDto {
    pub users: Vec<String>,
    pub models: Vec<String>,
    pub functions: Vec<String>,
}

impl From<FilterOptions> for FilterOptionsDto {
    fn from(options: FilterOptions) -> Self {
        Self {
            users: with_sentinel(options.users),
            models: with_sentinel(options.models),
            functions: with_sentinel(options.functions),
        }
    }
}

fn with_sentinel(values: Vec<String>) -> Vec<String> {
    let mut options = Vec::with_capacity(values.len() + 1);
    options.push(ALL_SENTINEL.to_string());
    options.extend(values);
    options
}

/// The four-cell metrics row, raw numbers plus display strings
#[derive(Serialize)]
pub struct MetricsDto {
    pub query_count: usize,
    pub total_tokens: i64,
    pub total_tokens_display: String,
    pub total_credits: f64,
    pub total_credits_display: String,
    pub avg_tokens: f64,
    pub avg_tokens_display: String,
}

impl From<UsageMetrics> for MetricsDto {
    fn from(metrics: UsageMetrics) -> Self {
        Self {
            query_count: metrics.query_count,
            total_tokens: metrics.total_tokens,
            total_tokens_display: format_count(metrics.total_tokens),
            total_credits: metrics.total_credits,
            total_credits_display: format_credits(metrics.total_credits),
            avg_tokens: metrics.avg_tokens,
            avg_tokens_display: format_avg_tokens(metrics.avg_tokens),
        }
    }
}

/// One row of the selectable table: the fixed column projection plus the
/// query preview. `row_id` is the row's position in the full fetched table
/// and keys the detail endpoint.
#[derive(Serialize)]
pub struct DisplayRowDto {
    pub row_id: usize,
    pub query_id: String,
    pub start_time: Option<String>,
    pub user_name: Option<String>,
    pub model_name: Option<String>,
    pub function_name: Option<String>,
    pub tokens: Option<i64>,
    pub token_credits: Option<f64>,
    pub credits_display: Option<String>,
    pub query_preview: String,
}

impl DisplayRowDto {
    pub fn project(row_id: usize, record: &UsageRecord) -> Self {
        Self {
            row_id,
            query_id: record.query_id.clone(),
            start_time: record.start_time_display(),
            user_name: record.user_name.clone(),
            model_name: record.model_name.clone(),
            function_name: record.function_name.clone(),
            tokens: record.tokens,
            token_credits: record.token_credits,
            credits_display: record.token_credits.map(format_credits_precise),
            query_preview: query_preview(&record.query_text),
        }
    }
}

/// Full detail for one selected row. Granular breakdowns appear only when
/// present and non-empty, matching the table's source row byte for byte.
#[derive(Serialize)]
pub struct RowDetailDto {
    pub row_id: usize,
    pub query_id: String,
    pub user_name: Option<String>,
    pub model_name: Option<String>,
    pub function_name: Option<String>,
    pub start_time: Option<String>,
    pub elapsed_ms: Option<i64>,
    pub execution_status: Option<String>,
    pub tokens: Option<i64>,
    pub tokens_display: Option<String>,
    pub token_credits: Option<f64>,
    pub credits_display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_granular: Option<BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits_granular: Option<BTreeMap<String, f64>>,
    pub query_text: String,
}

impl RowDetailDto {
    pub fn from_record(row_id: usize, record: &UsageRecord) -> Self {
        Self {
            row_id,
            query_id: record.query_id.clone(),
            user_name: record.user_name.clone(),
            model_name: record.model_name.clone(),
            function_name: record.function_name.clone(),
            start_time: record.start_time_display(),
            elapsed_ms: record.elapsed_ms,
            execution_status: record.execution_status.clone(),
            tokens: record.tokens,
            tokens_display: record.tokens.map(format_count),
            token_credits: record.token_credits,
            credits_display: record.token_credits.map(format_credits_precise),
            tokens_granular: record
                .tokens_granular
                .clone()
                .filter(|breakdown| !breakdown.is_empty()),
            credits_granular: record
                .credits_granular
                .clone()
                .filter(|breakdown| !breakdown.is_empty()),
            query_text: record.query_text.clone(),
        }
    }
}

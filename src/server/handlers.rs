use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::collections::HashMap;
use std::sync::Arc;

use crate::insights::{FilterOptions, FilterSelection, UsageMetrics};
use crate::usage::{UsageCache, UsageRecord};
use crate::warehouse::QueryExecutor;

use super::dto::*;

/// Shared application state: the session-scoped executor and the usage
/// cache, constructed once at startup and threaded through every handler.
pub struct AppState {
    pub executor: Arc<dyn QueryExecutor>,
    pub cache: UsageCache,
    /// Cache key derived from the warehouse session identity
    pub session_key: String,
}

/// Serve one dashboard render: fetch (or reuse) the usage table, derive
/// filter options from the full table, then filter, aggregate, and project.
pub async fn get_usage(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let table = match state
        .cache
        .fetch_cached(&state.session_key, state.executor.as_ref())
        .await
    {
        Ok(table) => table,
        Err(e) => {
            return Json(ApiResponse::<DashboardDto>::error_with_hint(
                format!("Error loading data: {}", e),
                ACCESS_HINT,
            ))
        }
    };

    let selection = selection_from_params(&params);
    Json(ApiResponse::success(build_dashboard(&table, &selection)))
}

/// Assemble one dashboard render from the fetched table: empty check first,
/// then options from the full table, then the AND-composed filter, metrics,
/// and row projection. `row_id` is always the position in the full fetched
/// table, never in the filtered subset.
pub fn build_dashboard(table: &[UsageRecord], selection: &FilterSelection) -> DashboardDto {
    if table.is_empty() {
        return DashboardDto::empty();
    }

    let options = FilterOptions::derive(table);

    let filtered: Vec<(usize, &UsageRecord)> = table
        .iter()
        .enumerate()
        .filter(|(_, record)| selection.matches(record))
        .collect();

    let filtered_records: Vec<&UsageRecord> = filtered.iter().map(|(_, record)| *record).collect();
    let metrics = UsageMetrics::compute(&filtered_records);

    let rows = filtered
        .iter()
        .map(|(row_id, record)| DisplayRowDto::project(*row_id, record))
        .collect();

    DashboardDto {
        state: DashboardState::Listing,
        options: Some(options.into()),
        metrics: Some(metrics.into()),
        rows,
    }
}

/// Serve the detail panel for one selected row, re-derived from the cached
/// table so the fields match the listing byte for byte.
pub async fn get_row_detail(
    State(state): State<Arc<AppState>>,
    Path(row_id): Path<usize>,
) -> impl IntoResponse {
    let table = match state
        .cache
        .fetch_cached(&state.session_key, state.executor.as_ref())
        .await
    {
        Ok(table) => table,
        Err(e) => {
            return Json(ApiResponse::<RowDetailDto>::error_with_hint(
                format!("Error loading data: {}", e),
                ACCESS_HINT,
            ))
        }
    };

    match table.get(row_id) {
        Some(record) => Json(ApiResponse::success(RowDetailDto::from_record(
            row_id, record,
        ))),
        None => Json(ApiResponse::error(
            "Selected row is no longer present; the data may have refreshed",
        )),
    }
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Map query parameters to a filter selection. A missing, empty, or "All"
/// value leaves that dimension unconstrained.
pub fn selection_from_params(params: &HashMap<String, String>) -> FilterSelection {
    FilterSelection {
        user: dimension_param(params.get("user")),
        model: dimension_param(params.get("model")),
        function: dimension_param(params.get("function")),
    }
}

fn dimension_param(value: Option<&String>) -> Option<String> {
    value
        .filter(|v| !v.is_empty() && v.as_str() != ALL_SENTINEL)
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::testing::record;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn sample_table() -> Vec<UsageRecord> {
        vec![
            record("Q1", "alice", "gpt-4", "COMPLETE_FUNC", 100, 0.001),
            record("Q2", "bob", "gpt-4", "COMPLETE_FUNC", 200, 0.002),
            record("Q3", "alice", "claude", "EMBED_FUNC", 50, 0.0005),
        ]
    }

    #[test]
    fn test_missing_params_mean_all() {
        let selection = selection_from_params(&params(&[]));
        assert_eq!(selection, FilterSelection::default());
    }

    #[test]
    fn test_all_sentinel_means_unconstrained() {
        let selection = selection_from_params(&params(&[("user", "All"), ("model", "")]));
        assert!(selection.user.is_none());
        assert!(selection.model.is_none());
    }

    #[test]
    fn test_concrete_values_constrain() {
        let selection =
            selection_from_params(&params(&[("user", "alice"), ("function", "EMBED_FUNC")]));
        assert_eq!(selection.user.as_deref(), Some("alice"));
        assert!(selection.model.is_none());
        assert_eq!(selection.function.as_deref(), Some("EMBED_FUNC"));
    }

    #[test]
    fn test_empty_table_renders_empty_state() {
        let dashboard = build_dashboard(&[], &FilterSelection::default());
        assert_eq!(dashboard.state, DashboardState::Empty);
        assert!(dashboard.options.is_none());
        assert!(dashboard.metrics.is_none());
        assert!(dashboard.rows.is_empty());
    }

    #[test]
    fn test_listing_carries_options_metrics_rows() {
        let table = sample_table();
        let dashboard = build_dashboard(&table, &FilterSelection::default());
        assert_eq!(dashboard.state, DashboardState::Listing);
        let options = dashboard.options.unwrap();
        assert_eq!(options.users, vec!["All", "alice", "bob"]);
        assert_eq!(dashboard.metrics.unwrap().query_count, 3);
        assert_eq!(dashboard.rows.len(), 3);
    }

    #[test]
    fn test_filtered_rows_keep_full_table_row_ids() {
        let table = sample_table();
        let selection = FilterSelection {
            user: Some("alice".to_string()),
            ..Default::default()
        };
        let dashboard = build_dashboard(&table, &selection);
        let row_ids: Vec<usize> = dashboard.rows.iter().map(|r| r.row_id).collect();
        assert_eq!(row_ids, vec![0, 2]);
        let metrics = dashboard.metrics.unwrap();
        assert_eq!(metrics.total_tokens, 150);
        assert_eq!(metrics.avg_tokens, 75.0);
        // Options still reflect the full table, not the filtered subset
        let options = dashboard.options.unwrap();
        assert_eq!(options.users, vec!["All", "alice", "bob"]);
    }

    #[test]
    fn test_unmatched_filter_is_listing_with_zero_metrics() {
        let table = sample_table();
        let selection = FilterSelection {
            model: Some("mistral".to_string()),
            ..Default::default()
        };
        let dashboard = build_dashboard(&table, &selection);
        assert_eq!(dashboard.state, DashboardState::Listing);
        assert!(dashboard.rows.is_empty());
        let metrics = dashboard.metrics.unwrap();
        assert_eq!(metrics.query_count, 0);
        assert_eq!(metrics.total_credits_display, "0.0000");
        assert_eq!(metrics.avg_tokens_display, "0");
    }
}

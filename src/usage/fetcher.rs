use crate::warehouse::{FetchError, QueryExecutor};

use super::types::{records_from_result, UsageRecord};

/// The dashboard's one read query: execution history inner-joined with
/// Cortex model-usage events, trailing 30 days, newest first, capped at
/// 1000 rows. Fixed text, never parameterized by user input.
pub const USAGE_QUERY: &str = "\
SELECT
    qh.QUERY_ID,
    qh.QUERY_TEXT,
    qh.USER_NAME,
    qh.START_TIME,
    qh.TOTAL_ELAPSED_TIME,
    qh.EXECUTION_STATUS,
    cu.MODEL_NAME,
    cu.FUNCTION_NAME,
    cu.TOKENS,
    cu.TOKEN_CREDITS,
    cu.TOKENS_GRANULAR,
    cu.TOKEN_CREDITS_GRANULAR
FROM SNOWFLAKE.ACCOUNT_USAGE.QUERY_HISTORY qh
INNER JOIN SNOWFLAKE.ACCOUNT_USAGE.CORTEX_AISQL_USAGE_HISTORY cu
    ON qh.QUERY_ID = cu.QUERY_ID
WHERE qh.START_TIME >= DATEADD(day, -30, CURRENT_TIMESTAMP())
ORDER BY qh.START_TIME DESC
LIMIT 1000";

/// Run the fixed query and convert the wire rows. Errors propagate without
/// retry.
pub async fn fetch_usage(executor: &dyn QueryExecutor) -> Result<Vec<UsageRecord>, FetchError> {
    let result = executor.execute(USAGE_QUERY).await?;
    records_from_result(&result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::testing::{wire_result, CountingExecutor};

    #[tokio::test]
    async fn test_fetch_converts_rows() {
        let executor = CountingExecutor::new(wire_result(&[
            ("Q1", "alice", "gpt-4", "COMPLETE_FUNC", 100, 0.001),
            ("Q2", "bob", "gpt-4", "COMPLETE_FUNC", 200, 0.002),
        ]));
        let records = fetch_usage(&executor).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].query_id, "Q1");
        assert_eq!(records[1].tokens, Some(200));
        assert_eq!(executor.calls(), 1);
    }

    #[tokio::test]
    async fn test_fetch_empty_result() {
        let executor = CountingExecutor::new(wire_result(&[]));
        let records = fetch_usage(&executor).await.unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_query_shape() {
        assert!(USAGE_QUERY.contains("INNER JOIN"));
        assert!(USAGE_QUERY.contains("DATEADD(day, -30, CURRENT_TIMESTAMP())"));
        assert!(USAGE_QUERY.contains("ORDER BY qh.START_TIME DESC"));
        assert!(USAGE_QUERY.contains("LIMIT 1000"));
    }
}

use anyhow::{Context, Result};
use colored::Colorize;

use crate::config::load_config;
use crate::insights::metrics::{format_avg_tokens, format_count, format_credits};
use crate::insights::preview::query_preview;
use crate::insights::{FilterSelection, UsageMetrics};
use crate::server::dto::ACCESS_HINT;
use crate::usage::fetcher::fetch_usage;
use crate::warehouse::{SqlApiClient, WarehouseSession};

/// Run the report command: one fetch, then the same filter/aggregate
/// pipeline the dashboard uses, rendered to the terminal
pub async fn run(
    user: Option<String>,
    model: Option<String>,
    function: Option<String>,
    limit: usize,
) -> Result<()> {
    let config = load_config()?;

    let session = WarehouseSession::acquire(&config)
        .with_context(|| format!("Failed to acquire a warehouse session. {}", ACCESS_HINT))?;
    eprintln!("[tokenlens] Connected as {}", session.identity());

    let client = SqlApiClient::new(session)?;
    let table = fetch_usage(&client)
        .await
        .with_context(|| format!("Error loading data. {}", ACCESS_HINT))?;

    if table.is_empty() {
        println!("No queries with token usage found in the last 30 days.");
        return Ok(());
    }

    let selection = FilterSelection {
        user,
        model,
        function,
    };
    let filtered = selection.apply(&table);
    let metrics = UsageMetrics::compute(&filtered);

    println!(
        "\n{}",
        "  Token Consumption (last 30 days)".bold().bright_yellow()
    );
    println!("{}", "  ────────────────────────────────".dimmed());

    println!(
        "\n  {} {}",
        "Queries:".bold(),
        metrics.query_count.to_string().bright_yellow()
    );
    println!(
        "  {} {}",
        "Total Tokens:".bold(),
        format_count(metrics.total_tokens).bright_yellow()
    );
    println!(
        "  {} {}",
        "Total Credits:".bold(),
        format_credits(metrics.total_credits).bright_yellow()
    );
    println!(
        "  {} {}",
        "Avg Tokens/Query:".bold(),
        format_avg_tokens(metrics.avg_tokens).bright_yellow()
    );

    if filtered.is_empty() {
        println!("\n  {}", "No rows match the current filters.".dimmed());
        return Ok(());
    }

    println!("\n  {}", "Recent Queries:".bold());
    for record in filtered.iter().take(limit) {
        let start = record
            .start_time_display()
            .unwrap_or_else(|| "-".to_string());
        let user = record.user_name.as_deref().unwrap_or("-");
        let model = record.model_name.as_deref().unwrap_or("-");
        let function = record.function_name.as_deref().unwrap_or("-");
        let tokens = record.tokens.map(format_count).unwrap_or_else(|| "-".to_string());
        println!(
            "  {} {} {} {} {}",
            start.dimmed(),
            format!("{:>12}", user).cyan(),
            format!("{:>14}", model).bright_blue(),
            format!("{:>14}", function),
            format!("{:>10}", tokens).bright_yellow()
        );
        println!("      {}", query_preview(&record.query_text).dimmed());
    }

    if filtered.len() > limit {
        println!(
            "\n  {}",
            format!("… {} more rows (raise --limit to see them)", filtered.len() - limit).dimmed()
        );
    }

    println!();
    Ok(())
}

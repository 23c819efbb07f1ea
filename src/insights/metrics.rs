use serde::Serialize;

use crate::usage::UsageRecord;

/// The four headline numbers over the filtered table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageMetrics {
    pub query_count: usize,
    pub total_tokens: i64,
    pub total_credits: f64,
    /// Mean tokens across rows that carry a token count
    pub avg_tokens: f64,
}

impl UsageMetrics {
    /// Sums skip null cells; an empty input yields all zeros rather than
    /// NaN.
    pub fn compute(rows: &[&UsageRecord]) -> Self {
        let mut total_tokens = 0i64;
        let mut token_rows = 0usize;
        let mut total_credits = 0f64;

        for row in rows {
            if let Some(tokens) = row.tokens {
                total_tokens += tokens;
                token_rows += 1;
            }
            if let Some(credits) = row.token_credits {
                total_credits += credits;
            }
        }

        let avg_tokens = if token_rows == 0 {
            0.0
        } else {
            total_tokens as f64 / token_rows as f64
        };

        Self {
            query_count: rows.len(),
            total_tokens,
            total_credits,
            avg_tokens,
        }
    }
}

/// Render an integer with thousands separators ("1,234,567")
pub fn format_count(value: i64) -> String {
    let negative = value < 0;
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if negative {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Credits render at four decimal places
pub fn format_credits(value: f64) -> String {
    format!("{:.4}", value)
}

/// Per-row detail shows credits at full precision (six places)
pub fn format_credits_precise(value: f64) -> String {
    format!("{:.6}", value)
}

/// Mean tokens render as a whole number
pub fn format_avg_tokens(value: f64) -> String {
    format_count(value.round() as i64)
}

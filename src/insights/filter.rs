use std::collections::BTreeSet;

use crate::usage::UsageRecord;

/// Three independent optional equality constraints; `None` means the "All"
/// sentinel and constrains nothing. Constraints compose with logical AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSelection {
    pub user: Option<String>,
    pub model: Option<String>,
    pub function: Option<String>,
}

impl FilterSelection {
    pub fn matches(&self, record: &UsageRecord) -> bool {
        dimension_matches(&self.user, &record.user_name)
            && dimension_matches(&self.model, &record.model_name)
            && dimension_matches(&self.function, &record.function_name)
    }

    pub fn apply<'a>(&self, records: &'a [UsageRecord]) -> Vec<&'a UsageRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}

fn dimension_matches(selected: &Option<String>, value: &Option<String>) -> bool {
    match selected {
        None => true,
        Some(wanted) => value.as_deref() == Some(wanted.as_str()),
    }
}

/// The dropdown option sets: distinct non-null values present in the full
/// fetched table, never an independent catalog. Sorted lexicographically;
/// the "All" sentinel is prepended by the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOptions {
    pub users: Vec<String>,
    pub models: Vec<String>,
    pub functions: Vec<String>,
}

impl FilterOptions {
    pub fn derive(records: &[UsageRecord]) -> Self {
        Self {
            users: distinct(records, |r| r.user_name.as_deref()),
            models: distinct(records, |r| r.model_name.as_deref()),
            functions: distinct(records, |r| r.function_name.as_deref()),
        }
    }
}

fn distinct<'a, F>(records: &'a [UsageRecord], field: F) -> Vec<String>
where
    F: Fn(&'a UsageRecord) -> Option<&'a str>,
{
    let set: BTreeSet<&str> = records.iter().filter_map(field).collect();
    set.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::testing::record;

    fn sample_table() -> Vec<UsageRecord> {
        vec![
            record("Q1", "alice", "gpt-4", "COMPLETE_FUNC", 100, 0.001),
            record("Q2", "bob", "gpt-4", "COMPLETE_FUNC", 200, 0.002),
            record("Q3", "alice", "claude", "EMBED_FUNC", 50, 0.0005),
        ]
    }

    #[test]
    fn test_options_cover_distinct_values_sorted() {
        let table = sample_table();
        let options = FilterOptions::derive(&table);
        assert_eq!(options.users, vec!["alice", "bob"]);
        assert_eq!(options.models, vec!["claude", "gpt-4"]);
        assert_eq!(options.functions, vec!["COMPLETE_FUNC", "EMBED_FUNC"]);
    }

    #[test]
    fn test_options_skip_null_values() {
        let mut table = sample_table();
        table[1].model_name = None;
        let options = FilterOptions::derive(&table);
        assert_eq!(options.models, vec!["claude", "gpt-4"]);
    }

    #[test]
    fn test_options_independent_of_selection() {
        // Option derivation always sees the full table; selections only
        // narrow the rows.
        let table = sample_table();
        let selection = FilterSelection {
            user: Some("alice".to_string()),
            ..Default::default()
        };
        let _ = selection.apply(&table);
        let options = FilterOptions::derive(&table);
        assert_eq!(options.users, vec!["alice", "bob"]);
    }

    #[test]
    fn test_all_selection_is_noop() {
        let table = sample_table();
        let unfiltered = FilterSelection::default().apply(&table);
        assert_eq!(unfiltered.len(), table.len());
    }

    #[test]
    fn test_single_dimension_filter() {
        let table = sample_table();
        let selection = FilterSelection {
            user: Some("alice".to_string()),
            ..Default::default()
        };
        let filtered = selection.apply(&table);
        let ids: Vec<&str> = filtered.iter().map(|r| r.query_id.as_str()).collect();
        assert_eq!(ids, vec!["Q1", "Q3"]);
        assert!(filtered
            .iter()
            .all(|r| r.user_name.as_deref() == Some("alice")));
    }

    #[test]
    fn test_filters_compose_with_and() {
        let table = sample_table();
        let selection = FilterSelection {
            user: Some("alice".to_string()),
            model: Some("claude".to_string()),
            ..Default::default()
        };
        let filtered = selection.apply(&table);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].query_id, "Q3");
    }

    #[test]
    fn test_filter_excludes_null_field_rows() {
        let mut table = sample_table();
        table[0].user_name = None;
        let selection = FilterSelection {
            user: Some("alice".to_string()),
            ..Default::default()
        };
        let filtered = selection.apply(&table);
        let ids: Vec<&str> = filtered.iter().map(|r| r.query_id.as_str()).collect();
        assert_eq!(ids, vec!["Q3"]);
    }

    #[test]
    fn test_unmatched_filter_yields_empty() {
        let table = sample_table();
        let selection = FilterSelection {
            function: Some("TRANSLATE_FUNC".to_string()),
            ..Default::default()
        };
        assert!(selection.apply(&table).is_empty());
    }
}

//! Query criteria, spec.md §4.1 `Query`: a backend-local filter pass
//! (optionally scoped to a collection) plus a global sort/limit/offset
//! applied once by the manager after fanning out and concatenating every
//! backend's results.

use crate::record::{matches_filter, Filter, Record};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

/// `criteria = {collection, filter, sort, limit, offset}` (spec.md §4.1).
/// `collection` selects which backends/subtrees are searched; `filter`
/// narrows by metadata; `sort`/`limit`/`offset` are applied globally
/// across the concatenated results of every backend touched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Query {
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub filter: Filter,
    #[serde(default)]
    pub sort: Option<Sort>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

/// Backend-local pass: keeps only records matching `query.filter`. Does
/// not sort or paginate — that happens once, globally, after fan-out
/// (see [`paginate`]).
pub fn filter_records(query: &Query, mut records: Vec<Record>) -> Vec<Record> {
    records.retain(|r| matches_filter(&r.metadata, &query.filter));
    records
}

/// Applies `query`'s sort, offset, and limit, in that order, to the
/// already-filtered, already-concatenated result set from every backend
/// touched by a fan-out `Query`.
pub fn paginate(query: &Query, mut records: Vec<Record>) -> Vec<Record> {
    if let Some(sort) = &query.sort {
        records.sort_by(|a, b| {
            let av = a.metadata.get(&sort.field);
            let bv = b.metadata.get(&sort.field);
            let ordering = compare_json(av, bv);
            match sort.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
    }

    let offset = query.offset.unwrap_or(0);
    if offset > 0 {
        if offset >= records.len() {
            return Vec::new();
        }
        records.drain(0..offset);
    }

    if let Some(limit) = query.limit {
        records.truncate(limit);
    }

    records
}

/// Convenience composition of [`filter_records`] then [`paginate`], for
/// callers (tests, a single-backend shortcut) that want both passes
/// applied locally in one step.
pub fn apply(query: &Query, records: Vec<Record>) -> Vec<Record> {
    paginate(query, filter_records(query, records))
}

fn compare_json(
    a: Option<&serde_json::Value>,
    b: Option<&serde_json::Value>,
) -> std::cmp::Ordering {
    use serde_json::Value as J;
    match (a, b) {
        (None, None) => std::cmp::Ordering::Equal,
        (None, Some(_)) => std::cmp::Ordering::Less,
        (Some(_), None) => std::cmp::Ordering::Greater,
        (Some(J::Number(x)), Some(J::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(std::cmp::Ordering::Equal),
        (Some(J::String(x)), Some(J::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Metadata;
    use serde_json::json;

    fn record_with(key: &str, score: i64) -> Record {
        let mut metadata: Metadata = Metadata::new();
        metadata.insert("score".to_string(), json!(score));
        Record::new(key, "value", metadata)
    }

    #[test]
    fn applies_filter_sort_limit_offset() {
        let records = vec![
            record_with("a", 3),
            record_with("b", 1),
            record_with("c", 2),
        ];
        let query = Query {
            collection: None,
            filter: Filter::new(),
            sort: Some(Sort {
                field: "score".into(),
                direction: SortDirection::Ascending,
            }),
            limit: Some(2),
            offset: Some(1),
        };
        let result = apply(&query, records);
        let keys: Vec<&str> = result.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["c", "a"]);
    }

    #[test]
    fn offset_beyond_len_yields_empty() {
        let records = vec![record_with("a", 1)];
        let query = Query {
            offset: Some(5),
            ..Default::default()
        };
        assert!(paginate(&query, records).is_empty());
    }

    #[test]
    fn filter_and_paginate_are_independently_applicable() {
        let records = vec![record_with("a", 1), record_with("b", 2)];
        let query = Query::default();
        let filtered = filter_records(&query, records);
        assert_eq!(filtered.len(), 2);
    }
}

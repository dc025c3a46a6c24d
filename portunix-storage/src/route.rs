//! Route table: maps keys to the datastore that owns them.
//!
//! Generalizes the teacher's fixed hot/warm/cold/archive tiers
//! (`aerolithdb-storage/src/lib.rs`'s `StorageHierarchy`) into data-driven
//! routing — spec.md §4.1 routes are configured, not hardcoded, so the
//! manager holds a `Vec<Route>` rather than one field per tier.

use crate::pattern::{glob_match, CompiledPattern};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single routing rule: keys matching `pattern` are served by
/// `datastore`. Routes are evaluated in declaration order — first match
/// wins (spec.md §3 "Route") — `priority` is an optional tie-breaker on
/// top of that; routes sharing a priority (the default) keep declaration
/// order because `RouteTable::new`'s sort is stable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub name: String,
    pub pattern: String,
    pub datastore: String,
    #[serde(default)]
    pub priority: i32,
    /// Free-form per-route settings forwarded into a stored record's
    /// metadata under `route_<k>` keys at write time (spec.md §3, §4.1
    /// `Store`).
    #[serde(default)]
    pub config: HashMap<String, String>,
}

impl Route {
    pub fn matches(&self, key: &str) -> bool {
        glob_match(&self.pattern, key)
    }
}

/// An ordered collection of routes, resolved by first match. Each route's
/// pattern is parsed into a [`CompiledPattern`] once, at construction, so
/// repeated `resolve`/`datastores_for_glob` calls don't re-split the same
/// pattern string on every lookup.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    compiled: Vec<CompiledPattern>,
}

impl RouteTable {
    pub fn new(mut routes: Vec<Route>) -> Self {
        routes.sort_by(|a, b| b.priority.cmp(&a.priority));
        let compiled = routes.iter().map(|r| CompiledPattern::compile(&r.pattern)).collect();
        Self { routes, compiled }
    }

    /// Returns the first route (in priority, then declaration, order)
    /// whose pattern matches `key` (spec.md §4.1 `Store`/`Retrieve`/`Delete`
    /// routing).
    pub fn resolve(&self, key: &str) -> Option<&Route> {
        self.compiled
            .iter()
            .position(|p| p.matches(key))
            .map(|i| &self.routes[i])
    }

    /// All datastores whose route pattern could plausibly overlap a
    /// `List`/`Query` glob — spec.md §4.1 "the union of all matching
    /// routes' backends".
    pub fn datastores_for_glob(&self, glob: &str) -> Vec<&str> {
        let mut seen = Vec::new();
        for route in &self.routes {
            if patterns_could_overlap(&route.pattern, glob) && !seen.contains(&route.datastore.as_str()) {
                seen.push(route.datastore.as_str());
            }
        }
        seen
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn contains_datastore(&self, name: &str) -> bool {
        self.routes.iter().any(|r| r.datastore == name)
    }
}

/// Conservative overlap check between two glob patterns ("bi-directional
/// glob subsumption" per spec.md §4.1): true unless both patterns are
/// wildcard-free and literally different, since proving two wildcarded
/// patterns disjoint would require reasoning about the key space itself.
fn patterns_could_overlap(a: &str, b: &str) -> bool {
    if a.contains('*') || a.contains('?') || b.contains('*') || b.contains('?') {
        return true;
    }
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(name: &str, pattern: &str, datastore: &str, priority: i32) -> Route {
        Route {
            name: name.into(),
            pattern: pattern.into(),
            datastore: datastore.into(),
            priority,
            config: HashMap::new(),
        }
    }

    #[test]
    fn first_declared_match_wins_at_equal_priority() {
        let table = RouteTable::new(vec![
            route("logs", "logs/*", "file-plugin", 0),
            route("general", "*", "p2", 0),
        ]);
        assert_eq!(table.resolve("logs/2024").unwrap().datastore, "file-plugin");
        assert_eq!(table.resolve("users/1").unwrap().datastore, "p2");
    }

    #[test]
    fn no_match_returns_none() {
        let table = RouteTable::new(vec![route("users", "users/*", "user-store", 0)]);
        assert!(table.resolve("orders/1").is_none());
    }

    #[test]
    fn datastores_for_glob_collects_overlapping_routes() {
        let table = RouteTable::new(vec![
            route("users", "users/*", "user-store", 0),
            route("orders", "orders/*", "order-store", 0),
        ]);
        let matched = table.datastores_for_glob("users/*");
        assert!(matched.contains(&"user-store"));
    }
}

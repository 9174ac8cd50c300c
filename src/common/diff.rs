use std::collections::HashSet;

use crate::RouteEntry;

/// Changes needed to turn one set of routes into another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteDiff {
    pub to_remove: Vec<RouteEntry>,
    pub to_install: Vec<RouteEntry>,
}

impl RouteDiff {
    /// Compares the routes currently installed with the desired ones.
    ///
    /// Entries are compared on every field, so a route whose next hop
    /// changed shows up once in each list. Input order is preserved and
    /// duplicates are reported once.
    pub fn between(current: &[RouteEntry], desired: &[RouteEntry]) -> Self {
        let current_set: HashSet<&RouteEntry> = current.iter().collect();
        let desired_set: HashSet<&RouteEntry> = desired.iter().collect();
        let mut seen = HashSet::new();
        let to_remove = current
            .iter()
            .filter(|v| !desired_set.contains(v) && seen.insert(**v))
            .copied()
            .collect();
        let mut seen = HashSet::new();
        let to_install = desired
            .iter()
            .filter(|v| !current_set.contains(v) && seen.insert(**v))
            .copied()
            .collect();
        Self {
            to_remove,
            to_install,
        }
    }
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_install.is_empty()
    }
}

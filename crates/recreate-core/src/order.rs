//! # Dependency Ordering
//!
//! Orders object names so parents are created and filled before children.
//!
//! ## How It Works
//! ```text
//! names:     [units, audit_log, projects, fees]
//! priority:  [users, projects, units]
//!
//! step 1 (listed, priority order):  projects, units
//! step 2 (unlisted, input order):   audit_log, fees
//!
//! result:    [projects, units, audit_log, fees]
//! ```
//!
//! This is a curated allow-list, not a topological sort over foreign keys.
//! It is only correct when the priority list names every real dependency;
//! unlisted tables that reference each other keep their input order.

use std::collections::HashSet;

/// Tables known to be referenced by others, parents first.
///
/// Human-maintained. Deployments override it with `ordering.priority` in
/// the config document.
pub const DEFAULT_PRIORITY: &[&str] = &[
    "users",
    "roles",
    "user_roles",
    "projects",
    "buildings",
    "units",
    "owners",
    "unit_owners",
    "fees",
    "payments",
];

/// Orders `names`: every name on `priority` first, in priority order, then
/// the rest in their original order.
///
/// Duplicates are emitted once. Priority entries that are not in `names`
/// are ignored.
///
/// ## Example
/// ```rust
/// use recreate_core::order::order;
///
/// let ordered = order(["units", "projects", "notes"], &["projects", "units"]);
/// assert_eq!(ordered, vec!["projects", "units", "notes"]);
/// ```
pub fn order<I, S, P>(names: I, priority: &[P]) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    P: AsRef<str>,
{
    let mut remaining: Vec<String> = Vec::new();
    let mut present: HashSet<String> = HashSet::new();
    for name in names {
        let name = name.as_ref();
        if present.insert(name.to_string()) {
            remaining.push(name.to_string());
        }
    }

    let mut ordered = Vec::with_capacity(remaining.len());
    let mut placed: HashSet<&str> = HashSet::new();
    for listed in priority {
        let listed = listed.as_ref();
        if present.contains(listed) && placed.insert(listed) {
            ordered.push(listed.to_string());
        }
    }

    ordered.extend(remaining.into_iter().filter(|n| !placed.contains(n.as_str())));
    ordered
}

/// An orderer bound to one priority list.
#[derive(Debug, Clone)]
pub struct DependencyOrderer {
    priority: Vec<String>,
}

impl DependencyOrderer {
    pub fn new(priority: Vec<String>) -> Self {
        DependencyOrderer { priority }
    }

    pub fn priority(&self) -> &[String] {
        &self.priority
    }

    /// See [`order`].
    pub fn order<I, S>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        order(names, &self.priority)
    }
}

impl Default for DependencyOrderer {
    fn default() -> Self {
        DependencyOrderer::new(DEFAULT_PRIORITY.iter().map(|s| s.to_string()).collect())
    }
}

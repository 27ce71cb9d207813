//! Join construction
//!
//! Connects a source table to every table a query needs by unioning the
//! shortest paths from the source, then orders the edges so that each JOIN
//! attaches exactly one new table.

use std::collections::BTreeSet;
use std::fmt;

use crate::registry::{JoinEdge, SchemaRegistry};
use crate::{Error, Result};

use super::path::{find_path, DEFAULT_MAX_DEPTH};

/// One `JOIN <table> ON (<condition>)` clause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinClause {
    /// Table attached by this clause
    pub table: &'static str,
    pub edge: JoinEdge,
}

/// The FROM part of a query: a source table and its join clauses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinPlan {
    source: &'static str,
    clauses: Vec<JoinClause>,
}

impl JoinPlan {
    pub fn source(&self) -> &'static str {
        self.source
    }

    pub fn clauses(&self) -> &[JoinClause] {
        &self.clauses
    }

    /// Every table present in the FROM clause
    pub fn tables(&self) -> BTreeSet<&'static str> {
        std::iter::once(self.source)
            .chain(self.clauses.iter().map(|c| c.table))
            .collect()
    }
}

impl fmt::Display for JoinPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)?;
        for clause in &self.clauses {
            write!(f, " JOIN {} ON ({})", clause.table, clause.edge.condition())?;
        }
        Ok(())
    }
}

/// Build the joins needed to reach every table of `needed` from `source`.
///
/// Fails with [`Error::CannotJoin`] when a table is unreachable, and never
/// returns a plan that misses one of the needed tables.
pub fn build_join(registry: &SchemaRegistry, source: &str, needed: &[&str]) -> Result<JoinPlan> {
    let source = registry.table(source)?.name;

    let mut targets = BTreeSet::new();
    for name in needed {
        let table = registry.table(name)?.name;
        if table != source {
            targets.insert(table);
        }
    }

    let mut edges: Vec<JoinEdge> = Vec::new();
    for target in &targets {
        let path = find_path(registry, source, target, &[], DEFAULT_MAX_DEPTH)?.ok_or_else(|| {
            Error::CannotJoin {
                from: source.to_string(),
                to: target.to_string(),
            }
        })?;
        for edge in path.edges() {
            if !edges.iter().any(|e| e.same_link(edge)) {
                edges.push(*edge);
            }
        }
    }

    let mut joined = BTreeSet::from([source]);
    let mut clauses = Vec::with_capacity(edges.len());
    for edge in edges {
        let table = match (joined.contains(edge.from), joined.contains(edge.to)) {
            (true, false) => edge.to,
            (false, true) => edge.from,
            (true, true) => {
                return Err(Error::AlreadyJoined {
                    left: edge.from.to_string(),
                    right: edge.to.to_string(),
                });
            }
            (false, false) => {
                return Err(Error::JoinOrder {
                    left: edge.from.to_string(),
                    right: edge.to.to_string(),
                });
            }
        };
        joined.insert(table);
        clauses.push(JoinClause { table, edge });
    }

    let missing: Vec<String> = targets
        .iter()
        .filter(|t| !joined.contains(*t))
        .map(|t| t.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(Error::MissingTables(missing));
    }

    tracing::debug!("join from {}: {} clause(s)", source, clauses.len());
    Ok(JoinPlan { source, clauses })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{
        registry, Link, TableDescription, CLASSES, CONFIG, DESCRIPTORS, IMAGES, SCENES,
    };

    #[test]
    fn test_no_join_needed() {
        let plan = build_join(registry(), IMAGES, &[]).unwrap();
        assert!(plan.clauses().is_empty());
        assert_eq!(plan.to_string(), "images");

        let plan = build_join(registry(), IMAGES, &[IMAGES, IMAGES]).unwrap();
        assert_eq!(plan.to_string(), "images");
    }

    #[test]
    fn test_single_join() {
        let plan = build_join(registry(), IMAGES, &[SCENES]).unwrap();
        assert_eq!(
            plan.to_string(),
            "images JOIN scenes ON (scenes.imageID = images.imageID)"
        );
    }

    #[test]
    fn test_join_through_intermediate_tables() {
        let plan = build_join(registry(), IMAGES, &[DESCRIPTORS]).unwrap();
        assert_eq!(plan.clauses().len(), 3);
        let tables = plan.tables();
        assert!(tables.contains("scenes"));
        assert!(tables.contains("mandragores"));
        assert!(tables.contains("descriptors"));
    }

    #[test]
    fn test_shared_edges_are_joined_once() {
        let plan = build_join(registry(), IMAGES, &[SCENES, DESCRIPTORS, CLASSES]).unwrap();
        assert_eq!(plan.clauses().len(), 4);

        let mut joined = BTreeSet::from([IMAGES]);
        for clause in plan.clauses() {
            let other = clause.edge.other(clause.table).unwrap();
            assert!(joined.contains(other), "{} attached to an unjoined table", clause.table);
            assert!(joined.insert(clause.table), "{} joined twice", clause.table);
        }
        for needed in [IMAGES, SCENES, DESCRIPTORS, CLASSES] {
            assert!(plan.tables().contains(needed));
        }
    }

    #[test]
    fn test_unreachable_table() {
        let err = build_join(registry(), IMAGES, &[CONFIG]).unwrap_err();
        assert!(matches!(err, Error::CannotJoin { ref to, .. } if to == "config"));
    }

    #[test]
    fn test_unknown_table() {
        let err = build_join(registry(), IMAGES, &["pages"]).unwrap_err();
        assert!(matches!(err, Error::UnknownTable(_)));
    }

    #[test]
    fn test_custom_registry_star() {
        const TO_HUB: &[Link] = &[Link::new("hub", "k")];
        let tables = vec![
            TableDescription::new("hub", &["k"], &[], &[]),
            TableDescription::new("left", &["k"], &[], TO_HUB),
            TableDescription::new("right", &["k"], &[], TO_HUB),
        ];
        let custom = SchemaRegistry::new(tables).unwrap();
        let plan = build_join(&custom, "left", &["right"]).unwrap();
        assert_eq!(
            plan.to_string(),
            "left JOIN hub ON (left.k = hub.k) JOIN right ON (right.k = hub.k)"
        );
    }
}

//! Join path discovery
//!
//! Breadth-first search over the schema graph. Links are followed in both
//! directions, so `images` reaches `descriptors` through `scenes` and
//! `mandragores` even though every link points away from `images`' side.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::Result;
use crate::registry::{JoinEdge, SchemaRegistry};

/// Upper bound on the number of edges a join path may use
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// An ordered chain of edges connecting two tables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinPath {
    edges: Vec<JoinEdge>,
}

impl JoinPath {
    pub fn new(edges: Vec<JoinEdge>) -> Self {
        Self { edges }
    }

    /// Number of edges
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn edges(&self) -> &[JoinEdge] {
        &self.edges
    }

    /// True if the path uses this link, in either direction
    pub fn contains_link(&self, edge: &JoinEdge) -> bool {
        self.edges.iter().any(|e| e.same_link(edge))
    }
}

/// Find a shortest join path from `from` to `to`.
///
/// Tables listed in `excluded` are never used as intermediate hops.
/// Returns `Ok(None)` when no path of at most `max_depth` edges exists.
pub fn find_path(
    registry: &SchemaRegistry,
    from: &str,
    to: &str,
    excluded: &[&str],
    max_depth: usize,
) -> Result<Option<JoinPath>> {
    let start = registry.table(from)?.name;
    let goal = registry.table(to)?.name;

    if start == goal {
        return Ok(Some(JoinPath::default()));
    }

    let mut visited: HashSet<&'static str> = HashSet::new();
    let mut parents: HashMap<&'static str, (&'static str, JoinEdge)> = HashMap::new();
    let mut queue = VecDeque::new();

    visited.insert(start);
    queue.push_back((start, 0usize));

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }

        for neighbor in registry.graph().neighbors(current) {
            let next = neighbor.table;
            if visited.contains(next) {
                continue;
            }
            if next != goal && excluded.contains(&next) {
                continue;
            }

            visited.insert(next);
            parents.insert(next, (current, neighbor.edge));

            if next == goal {
                return Ok(Some(unwind(&parents, start, goal)));
            }
            queue.push_back((next, depth + 1));
        }
    }

    Ok(None)
}

/// Rebuild the path from the BFS parent links
fn unwind(
    parents: &HashMap<&'static str, (&'static str, JoinEdge)>,
    start: &'static str,
    goal: &'static str,
) -> JoinPath {
    let mut edges = Vec::new();
    let mut current = goal;
    while current != start {
        match parents.get(current) {
            Some((previous, edge)) => {
                edges.push(*edge);
                current = *previous;
            }
            None => break,
        }
    }
    edges.reverse();
    JoinPath::new(edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{
        registry, Link, TableDescription, CLASSES, CONFIG, DESCRIPTORS, IMAGES, MANDRAGORES,
        SCENES,
    };
    use std::collections::HashSet;

    fn path(from: &str, to: &str, excluded: &[&str]) -> Option<JoinPath> {
        find_path(registry(), from, to, excluded, DEFAULT_MAX_DEPTH).unwrap()
    }

    #[test]
    fn test_same_table_zero_hops() {
        let p = path(IMAGES, IMAGES, &[]).unwrap();
        assert!(p.is_empty());
    }

    #[test]
    fn test_direct_link_both_directions() {
        let forward = path(SCENES, IMAGES, &[]).unwrap();
        assert_eq!(forward.edges(), &[JoinEdge::new(SCENES, IMAGES, "imageID")]);

        let backward = path(IMAGES, SCENES, &[]).unwrap();
        assert_eq!(backward.edges(), &[JoinEdge::new(SCENES, IMAGES, "imageID")]);
    }

    #[test]
    fn test_two_hops() {
        let p = path(IMAGES, MANDRAGORES, &[]).unwrap();
        assert_eq!(p.len(), 2);

        let p = path(SCENES, DESCRIPTORS, &[]).unwrap();
        assert_eq!(p.len(), 2);
        assert!(p.contains_link(&JoinEdge::new(SCENES, MANDRAGORES, "mandragoreID")));
        assert!(p.contains_link(&JoinEdge::new(DESCRIPTORS, MANDRAGORES, "mandragoreID")));
    }

    #[test]
    fn test_three_hops_images_to_descriptors() {
        let p = path(IMAGES, DESCRIPTORS, &[]).unwrap();
        let got: HashSet<_> = p.edges().iter().copied().collect();
        let expected: HashSet<_> = [
            JoinEdge::new(SCENES, IMAGES, "imageID"),
            JoinEdge::new(SCENES, MANDRAGORES, "mandragoreID"),
            JoinEdge::new(DESCRIPTORS, MANDRAGORES, "mandragoreID"),
        ]
        .into_iter()
        .collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_path_is_ordered_from_source() {
        let p = path(IMAGES, CLASSES, &[]).unwrap();
        assert_eq!(p.len(), 4);
        assert!(p.edges()[0].touches(IMAGES));
        assert!(p.edges()[3].touches(CLASSES));
        for pair in p.edges().windows(2) {
            let shared = [pair[0].from, pair[0].to]
                .into_iter()
                .any(|t| pair[1].touches(t));
            assert!(shared, "consecutive edges must share a table");
        }
    }

    #[test]
    fn test_disconnected_table() {
        assert!(path(IMAGES, CONFIG, &[]).is_none());
        assert!(path(CONFIG, SCENES, &[]).is_none());
    }

    #[test]
    fn test_excluded_intermediate() {
        assert!(path(IMAGES, DESCRIPTORS, &[SCENES]).is_none());
        assert!(path(IMAGES, MANDRAGORES, &[SCENES]).is_none());
        // endpoints are never excluded
        assert_eq!(path(IMAGES, SCENES, &[SCENES]).unwrap().len(), 1);
    }

    #[test]
    fn test_depth_limit() {
        let p = find_path(registry(), IMAGES, DESCRIPTORS, &[], 2).unwrap();
        assert!(p.is_none());
        let p = find_path(registry(), IMAGES, DESCRIPTORS, &[], 3).unwrap();
        assert_eq!(p.unwrap().len(), 3);
    }

    #[test]
    fn test_unknown_table_is_an_error() {
        assert!(find_path(registry(), IMAGES, "pages", &[], DEFAULT_MAX_DEPTH).is_err());
    }

    #[test]
    fn test_prefers_shortest_path() {
        // a -> b -> c -> d plus a shortcut a -> d
        const A_LINKS: &[Link] = &[Link::new("b", "k"), Link::new("d", "k")];
        const B_LINKS: &[Link] = &[Link::new("c", "k")];
        const C_LINKS: &[Link] = &[Link::new("d", "k")];
        let tables = vec![
            TableDescription::new("a", &["k"], &[], A_LINKS),
            TableDescription::new("b", &["k"], &[], B_LINKS),
            TableDescription::new("c", &["k"], &[], C_LINKS),
            TableDescription::new("d", &["k"], &[], &[]),
        ];
        let custom = SchemaRegistry::new(tables).unwrap();
        let p = find_path(&custom, "b", "d", &[], DEFAULT_MAX_DEPTH).unwrap().unwrap();
        assert_eq!(p.len(), 2);

        let p = find_path(&custom, "b", "d", &["a", "c"], DEFAULT_MAX_DEPTH).unwrap();
        assert!(p.is_none());
    }
}

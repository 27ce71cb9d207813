//! Schema graph - tables as nodes, links as edges
//!
//! Every declared link becomes one [`JoinEdge`]. The edge keeps its declared
//! direction (`from` holds the link) but is reachable from both endpoints,
//! so path searches can walk links backwards.

use std::collections::HashMap;

use super::table::TableDescription;

/// A link between two tables through a shared column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JoinEdge {
    /// Table declaring the link
    pub from: &'static str,
    /// Referenced table
    pub to: &'static str,
    /// Column present in both tables
    pub column: &'static str,
}

impl JoinEdge {
    pub fn new(from: &'static str, to: &'static str, column: &'static str) -> Self {
        Self { from, to, column }
    }

    /// Swap the endpoints
    pub fn reversed(&self) -> Self {
        Self {
            from: self.to,
            to: self.from,
            column: self.column,
        }
    }

    /// An edge and its reverse denote the same link
    pub fn same_link(&self, other: &JoinEdge) -> bool {
        self == other || *self == other.reversed()
    }

    pub fn touches(&self, table: &str) -> bool {
        self.from == table || self.to == table
    }

    /// The endpoint opposite to `table`, if `table` is an endpoint
    pub fn other(&self, table: &str) -> Option<&'static str> {
        if self.from == table {
            Some(self.to)
        } else if self.to == table {
            Some(self.from)
        } else {
            None
        }
    }

    /// Equality predicate joining both endpoints
    pub fn condition(&self) -> String {
        format!("{}.{} = {}.{}", self.from, self.column, self.to, self.column)
    }
}

impl std::fmt::Display for JoinEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -[{}]-> {}", self.from, self.column, self.to)
    }
}

/// A table reachable in one hop, with the edge used to reach it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    pub table: &'static str,
    pub edge: JoinEdge,
}

/// Adjacency lists over the registry's tables
#[derive(Debug, Default)]
pub struct SchemaGraph {
    adjacency: HashMap<&'static str, Vec<Neighbor>>,
    edges: Vec<JoinEdge>,
}

impl SchemaGraph {
    /// Build the graph. Outgoing links of a table come before the links
    /// pointing at it, in declaration order.
    pub fn build(tables: &[TableDescription]) -> Self {
        let mut graph = Self::default();
        for table in tables {
            graph.adjacency.entry(table.name).or_default();
        }

        for table in tables {
            for link in table.links {
                let edge = JoinEdge::new(table.name, link.target, link.column);
                graph.edges.push(edge);
                graph.adjacency.entry(table.name).or_default().push(Neighbor {
                    table: link.target,
                    edge,
                });
            }
        }

        for edge in graph.edges.clone() {
            graph.adjacency.entry(edge.to).or_default().push(Neighbor {
                table: edge.from,
                edge,
            });
        }

        graph
    }

    pub fn neighbors(&self, table: &str) -> &[Neighbor] {
        self.adjacency.get(table).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn edges(&self) -> &[JoinEdge] {
        &self.edges
    }
}

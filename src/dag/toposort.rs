//! Topological ordering over the change DAG (spec §4.4): Kahn's algorithm
//! with cycle detection and diagnostic reporting.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::error::{Error, Result};

/// One concrete cycle plus the full set of nodes still blocked when Kahn's
/// algorithm terminates early (spec §4.4 "Cycle diagnostics").
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub participants: Vec<String>,
    pub cycle_path: Vec<String>,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} node(s) could not be ordered: {}",
            self.participants.len(),
            self.participants.join(", ")
        )?;
        if !self.cycle_path.is_empty() {
            write!(f, " (cycle: {})", self.cycle_path.join(" -> "))?;
        }
        Ok(())
    }
}

/// Run Kahn's algorithm over `graph`, whose node weights are change IDs.
/// Returns the change IDs in execution order, or a `CycleReport` wrapped in
/// `Error::Dependency` if the graph has a cycle (spec §4.4).
pub fn order(graph: &DiGraph<String, ()>) -> Result<Vec<String>> {
    let mut in_degree: HashMap<NodeIndex, usize> = HashMap::with_capacity(graph.node_count());
    for node in graph.node_indices() {
        in_degree.insert(node, graph.edges_directed(node, Direction::Incoming).count());
    }

    let mut queue: VecDeque<NodeIndex> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&n, _)| n)
        .collect();
    // Deterministic output: process ready nodes in node-index order.
    queue.make_contiguous().sort_by_key(|n| n.index());

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(node) = queue.pop_front() {
        order.push(graph[node].clone());
        let mut newly_ready = Vec::new();
        for edge in graph.edges_directed(node, Direction::Outgoing) {
            let target = edge.target();
            let deg = in_degree.get_mut(&target).expect("node present");
            *deg -= 1;
            if *deg == 0 {
                newly_ready.push(target);
            }
        }
        newly_ready.sort_by_key(|n| n.index());
        for n in newly_ready {
            queue.push_back(n);
        }
    }

    if order.len() == graph.node_count() {
        return Ok(order);
    }

    let blocked: Vec<NodeIndex> = in_degree
        .iter()
        .filter(|(_, &deg)| deg > 0)
        .map(|(&n, _)| n)
        .collect();
    let participants: Vec<String> = {
        let mut names: Vec<String> = blocked.iter().map(|&n| graph[n].clone()).collect();
        names.sort();
        names
    };
    let cycle_path = find_one_cycle(graph, &blocked);

    Err(Error::Dependency {
        report: CycleReport {
            participants,
            cycle_path,
        },
    })
}

/// Best-effort DFS from any still-blocked node to recover one concrete cycle
/// path for the diagnostic message (spec §4.4).
fn find_one_cycle(graph: &DiGraph<String, ()>, blocked: &[NodeIndex]) -> Vec<String> {
    let blocked_set: std::collections::HashSet<NodeIndex> = blocked.iter().copied().collect();
    for &start in blocked {
        let mut stack = vec![start];
        let mut visiting: HashMap<NodeIndex, usize> = HashMap::new();
        visiting.insert(start, 0);
        let mut path = vec![start];

        while let Some(&current) = path.last() {
            let children: Vec<NodeIndex> = graph
                .edges_directed(current, Direction::Outgoing)
                .map(|e| e.target())
                .filter(|t| blocked_set.contains(t))
                .collect();
            let idx = visiting.entry(current).or_insert(0);
            if *idx < children.len() {
                let next = children[*idx];
                *idx += 1;
                if next == start && path.len() > 1 {
                    path.push(next);
                    return path.iter().map(|&n| graph[n].clone()).collect();
                }
                if !path.contains(&next) {
                    path.push(next);
                }
            } else {
                path.pop();
            }
        }
        stack.clear();
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_a_simple_chain() {
        let mut g = DiGraph::<String, ()>::new();
        let a = g.add_node("a".into());
        let b = g.add_node("b".into());
        let c = g.add_node("c".into());
        g.add_edge(a, b, ());
        g.add_edge(b, c, ());
        let order = order(&g).unwrap();
        assert_eq!(order, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    }

    #[test]
    fn reports_a_three_node_cycle() {
        let mut g = DiGraph::<String, ()>::new();
        let a = g.add_node("A".into());
        let b = g.add_node("B".into());
        let c = g.add_node("C".into());
        g.add_edge(a, c, ());
        g.add_edge(b, a, ());
        g.add_edge(c, b, ());
        let err = order(&g).unwrap_err();
        match err {
            Error::Dependency { report } => {
                assert_eq!(report.participants, vec!["A".to_string(), "B".to_string(), "C".to_string()]);
                assert_eq!(report.cycle_path.len(), 4);
            }
            other => panic!("expected Dependency error, got {other:?}"),
        }
    }
}

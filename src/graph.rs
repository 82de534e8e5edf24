//! The dependency graph and its query primitives (spec §3.3, §4.4–§4.8).
//!
//! Vertices are plain package indices into [`crate::model::State::packages`].
//! An edge `u -> v` means "`v` build-depends on `u`": `u` must be built
//! before `v`.
use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction};

use crate::model::Package;

pub type Graph = petgraph::Graph<usize, (), Directed>;

/// Build the directed dependency graph described in spec §4.4. Returns the
/// graph only; unresolved dependencies are reported separately by
/// [`crate::resolver`].
pub fn build_dep_graph(packages: &[Package], provider_index: &HashMap<String, usize>) -> Graph {
    let mut graph = Graph::new();
    let node_indices: Vec<NodeIndex> = (0..packages.len()).map(|i| graph.add_node(i)).collect();

    for (i, pkg) in packages.iter().enumerate() {
        for dep in &pkg.build_deps {
            if crate::resolver::is_ignored(pkg, dep) {
                continue;
            }
            let Some(&j) = provider_index.get(dep) else {
                continue;
            };
            if j == i {
                continue;
            }
            let (from, to) = (node_indices[j], node_indices[i]);
            if graph.find_edge(from, to).is_none() {
                graph.add_edge(from, to, ());
            }
        }
    }

    graph
}

/// Ascending-order successors of `node`, per the determinism requirement
/// of spec §4.4/§5 ("adjacency enumeration ... ordered by ascending
/// vertex index").
fn sorted_successors(graph: &Graph, node: NodeIndex) -> Vec<NodeIndex> {
    let mut succ: Vec<NodeIndex> = graph.neighbors_directed(node, Direction::Outgoing).collect();
    succ.sort_by_key(|n| n.index());
    succ
}

/// Contraction of a directed graph onto a chosen vertex subset, preserving
/// reachability (spec §4.5).
///
/// Ported from the original `liftgraph`/`liftDfs` in
/// `examples/original_source/subgraph.go`: a DFS from every vertex that
/// tracks the nearest chosen ancestor seen so far along the current path.
/// `subgraph.go:184` seeds the very first call with `liftDfs(node, node,
/// …)` — the parent of a start vertex is itself, not a sentinel — so a
/// chosen start vertex becomes its own ancestor for its successors rather
/// than only ever being promoted to ancestor when some other node inspects
/// it. `lift_dfs` mirrors that by promoting `node` to the ancestor on
/// entry, before walking its successors, whenever `node` itself is chosen.
/// The visited set is consulted only to avoid re-expanding a vertex's
/// *own* successors twice — it does not suppress the edge into that
/// vertex, since a vertex reachable from two different chosen ancestors
/// must record both edges.
pub fn lift(graph: &Graph, chosen: impl Fn(usize) -> bool) -> Graph {
    let mut lifted = Graph::new();
    let mut lifted_index: HashMap<usize, NodeIndex> = HashMap::new();

    for node in graph.node_indices() {
        let payload = graph[node];
        if chosen(payload) {
            lifted_index.insert(payload, lifted.add_node(payload));
        }
    }

    let mut visited = HashSet::new();
    for start in graph.node_indices() {
        lift_dfs(graph, start, None, &chosen, &mut visited, &mut lifted, &lifted_index);
    }

    lifted
}

#[allow(clippy::too_many_arguments)]
fn lift_dfs(
    graph: &Graph,
    node: NodeIndex,
    ancestor: Option<NodeIndex>,
    chosen: &impl Fn(usize) -> bool,
    visited: &mut HashSet<NodeIndex>,
    lifted: &mut Graph,
    lifted_index: &HashMap<usize, NodeIndex>,
) {
    if visited.contains(&node) {
        return;
    }
    visited.insert(node);

    let ancestor = if chosen(graph[node]) {
        Some(lifted_index[&graph[node]])
    } else {
        ancestor
    };

    for adj in sorted_successors(graph, node) {
        if let Some(from) = ancestor {
            if chosen(graph[adj]) {
                let adj_lifted = lifted_index[&graph[adj]];
                if lifted.find_edge(from, adj_lifted).is_none() {
                    lifted.add_edge(from, adj_lifted, ());
                }
            }
        }

        lift_dfs(graph, adj, ancestor, chosen, visited, lifted, lifted_index);
    }
}

/// Breadth-first traversal from `start`, calling `visit(vertex, depth)` for
/// each reached vertex (start is depth 0). `visit` returning `true` prunes
/// that vertex's successors. Direction is caller-selected so forward and
/// reverse neighborhood expansion (spec §4.10) share one implementation.
pub fn bfs_with_depth(
    graph: &Graph,
    start: NodeIndex,
    direction: Direction,
    mut visit: impl FnMut(NodeIndex, usize) -> bool,
) {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back((start, 0usize));
    seen.insert(start);

    while let Some((node, depth)) = queue.pop_front() {
        let prune = visit(node, depth);
        if prune {
            continue;
        }
        let mut succ: Vec<NodeIndex> = graph.neighbors_directed(node, direction).collect();
        succ.sort_by_key(|n| n.index());
        for next in succ {
            if seen.insert(next) {
                queue.push_back((next, depth + 1));
            }
        }
    }
}

/// Tiered topological sort (spec §4.6): Kahn's algorithm, emitting each
/// in-degree-zero frontier as one tier, breaking ties by ascending vertex
/// index within a tier. `Err` carries nothing extra — callers that need a
/// cycle report invoke [`strongly_connected_components`] and
/// [`longer_shortest_path`] on the same graph.
pub fn tiered_topological_sort(graph: &Graph) -> Result<Vec<Vec<NodeIndex>>, ()> {
    let mut in_degree: HashMap<NodeIndex, usize> = graph
        .node_indices()
        .map(|n| (n, graph.edges_directed(n, Direction::Incoming).count()))
        .collect();

    let mut tiers = Vec::new();
    let mut frontier: Vec<NodeIndex> = in_degree
        .iter()
        .filter(|&(_, &deg)| deg == 0)
        .map(|(&n, _)| n)
        .collect();
    frontier.sort_by_key(|n| n.index());

    let mut emitted = 0usize;
    while !frontier.is_empty() {
        emitted += frontier.len();
        let mut next_frontier = Vec::new();

        for &node in &frontier {
            for succ in sorted_successors(graph, node) {
                let deg = in_degree.get_mut(&succ).expect("successor must have an in-degree entry");
                *deg -= 1;
                if *deg == 0 {
                    next_frontier.push(succ);
                }
            }
        }

        tiers.push(std::mem::take(&mut frontier));
        next_frontier.sort_by_key(|n| n.index());
        frontier = next_frontier;
    }

    if emitted == graph.node_count() {
        Ok(tiers)
    } else {
        Err(())
    }
}

/// Flatten tiers into a conventional topological order.
pub fn flatten_tiers(tiers: &[Vec<NodeIndex>]) -> Vec<NodeIndex> {
    tiers.iter().flatten().copied().collect()
}

/// Strongly connected components, sorted (each component ascending by
/// member, components themselves ascending by minimum member) per the
/// determinism requirement in spec §4.8/§9. Singletons without a
/// self-loop are dropped; a singleton with a self-loop is reported (a
/// package build-depending on itself).
pub fn strongly_connected_components(graph: &Graph) -> Vec<Vec<NodeIndex>> {
    let mut sccs = petgraph::algo::tarjan_scc(graph);
    for component in &mut sccs {
        component.sort_by_key(|n| n.index());
    }
    sccs.retain(|component| {
        component.len() > 1
            || (component.len() == 1 && graph.find_edge(component[0], component[0]).is_some())
    });
    sccs.sort_by_key(|component| component[0].index());
    sccs
}

/// Shortest path between `from` and `to` (inclusive), by vertex count, via
/// plain unweighted BFS. `None` if unreachable.
fn shortest_path(graph: &Graph, from: NodeIndex, to: NodeIndex) -> Option<Vec<NodeIndex>> {
    let mut predecessor: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    let mut seen = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(from);
    seen.insert(from);

    while let Some(node) = queue.pop_front() {
        if node == to {
            let mut path = vec![to];
            let mut cur = to;
            while let Some(&prev) = predecessor.get(&cur) {
                path.push(prev);
                cur = prev;
            }
            path.reverse();
            return Some(path);
        }
        for next in sorted_successors(graph, node) {
            if seen.insert(next) {
                predecessor.insert(next, node);
                queue.push_back(next);
            }
        }
    }

    None
}

/// The "longer shortest path" witness chain for one cycle (spec §4.8):
/// `s = min(cycle)`, `t` is `s`'s successor in the cycle's sorted order;
/// emit whichever of `s -> t` / `t -> s` (computed on the *original*,
/// unlifted graph) has more vertices.
pub fn longer_shortest_path(original_graph: &Graph, cycle: &[NodeIndex]) -> Vec<NodeIndex> {
    debug_assert!(cycle.windows(2).all(|w| w[0].index() < w[1].index()));
    let s = cycle[0];
    let s_pos = cycle.iter().position(|&n| n == s).unwrap_or(0);
    let t = cycle[(s_pos + 1) % cycle.len()];

    let forward = shortest_path(original_graph, s, t);
    let backward = shortest_path(original_graph, t, s);

    match (forward, backward) {
        (Some(f), Some(b)) => {
            if f.len() >= b.len() {
                f
            } else {
                b
            }
        }
        (Some(f), None) => f,
        (None, Some(b)) => b,
        (None, None) => cycle.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_graph(n: usize) -> Graph {
        let mut g = Graph::new();
        let nodes: Vec<_> = (0..n).map(|i| g.add_node(i)).collect();
        for w in nodes.windows(2) {
            g.add_edge(w[0], w[1], ());
        }
        g
    }

    #[test]
    fn lift_preserves_reachability_over_unchosen_interior() {
        // a -> b -> c -> d, choose {a, c}: expect edge a -> c only.
        let g = chain_graph(4);
        let lifted = lift(&g, |v| v == 0 || v == 2);
        assert_eq!(lifted.node_count(), 2);
        assert_eq!(lifted.edge_count(), 1);
    }

    #[test]
    fn lift_idempotent() {
        let g = chain_graph(5);
        let chosen = |v: usize| v % 2 == 0;
        let once = lift(&g, chosen);
        let twice = lift(&once, chosen);
        assert_eq!(once.node_count(), twice.node_count());
        assert_eq!(once.edge_count(), twice.edge_count());
    }

    #[test]
    fn tiered_topo_sort_diamond() {
        // a -> b, a -> c, b -> d, c -> d
        let mut g = Graph::new();
        let a = g.add_node(0);
        let b = g.add_node(1);
        let c = g.add_node(2);
        let d = g.add_node(3);
        g.add_edge(a, b, ());
        g.add_edge(a, c, ());
        g.add_edge(b, d, ());
        g.add_edge(c, d, ());

        let tiers = tiered_topological_sort(&g).expect("acyclic graph must sort");
        assert_eq!(tiers.len(), 3);
        assert_eq!(tiers[0], vec![a]);
        assert_eq!(tiers[1], vec![b, c]);
        assert_eq!(tiers[2], vec![d]);
    }

    #[test]
    fn tiered_topo_sort_detects_cycle() {
        let mut g = Graph::new();
        let x = g.add_node(0);
        let y = g.add_node(1);
        let z = g.add_node(2);
        g.add_edge(x, y, ());
        g.add_edge(y, z, ());
        g.add_edge(z, x, ());

        assert!(tiered_topological_sort(&g).is_err());
        let sccs = strongly_connected_components(&g);
        assert_eq!(sccs.len(), 1);
        assert_eq!(sccs[0].len(), 3);
    }

    #[test]
    fn bfs_depth_is_monotonic() {
        let g = chain_graph(5);
        let mut depths = Vec::new();
        bfs_with_depth(&g, NodeIndex::new(0), Direction::Outgoing, |_, depth| {
            depths.push(depth);
            false
        });
        assert!(depths.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn self_loop_is_reported_as_a_cycle() {
        let mut g = Graph::new();
        let a = g.add_node(0);
        g.add_edge(a, a, ());
        let sccs = strongly_connected_components(&g);
        assert_eq!(sccs, vec![vec![a]]);
    }
}

//! `QueryEngine::query` (spec §4.10), the orchestration entry point tying
//! together name resolution, neighborhood expansion, `lift`, and tiered
//! sort / cycle reporting.
//!
//! Grounded on `original_source/cmd/query.go`'s `runQuery` (qset
//! construction, `LiftGraph`, `graph.TopologicalSort`), generalized with
//! forward/reverse neighborhood expansion (absent from the original
//! command, requested by spec §4.10 step 3) and tiered rather than flat
//! output.
use std::collections::HashSet;

use petgraph::graph::NodeIndex;
use petgraph::Direction;

use crate::error::{Cycle, GraphError, InputError};
use crate::graph;
use crate::model::State;

/// The result of a successful query: package indices grouped into
/// dependency tiers.
pub type TierList = Vec<Vec<usize>>;

pub enum QueryResult {
    Tiers(TierList),
    Cycles(Vec<Cycle>),
}

/// Resolve a user-supplied name to a package index: exact source match
/// first, then provider lookup (spec §4.10 step 1).
fn resolve_name(state: &State, name: &str) -> Result<usize, InputError> {
    if let Some(&idx) = state.packages_by_source(name).first() {
        return Ok(idx);
    }
    if let Some(pkg) = state.package_by_provider(name) {
        return state
            .packages_by_source(&pkg.source)
            .first()
            .copied()
            .ok_or_else(|| InputError::UnknownSymbol(name.to_string()));
    }
    Err(InputError::UnknownSymbol(name.to_string()))
}

/// Run a query over `state` (spec §4.10). `names` seeds the chosen set;
/// `forward`/`reverse` bound the neighborhood expansion in each direction.
pub fn query(
    state: &State,
    names: &[String],
    forward: usize,
    reverse: usize,
) -> Result<QueryResult, crate::error::Error> {
    let mut chosen: HashSet<usize> = HashSet::new();
    let mut seeds = Vec::new();
    for name in names {
        let idx = resolve_name(state, name)?;
        chosen.insert(idx);
        seeds.push(idx);
    }

    for &seed in &seeds {
        let start = NodeIndex::new(seed);
        graph::bfs_with_depth(&state.dep_graph, start, Direction::Outgoing, |node, depth| {
            if depth > forward {
                return true;
            }
            chosen.insert(node.index());
            false
        });
        if reverse > 0 {
            graph::bfs_with_depth(&state.dep_graph, start, Direction::Incoming, |node, depth| {
                if depth > reverse {
                    return true;
                }
                chosen.insert(node.index());
                false
            });
        }
    }

    let lifted = graph::lift(&state.dep_graph, |v| chosen.contains(&v));

    match graph::tiered_topological_sort(&lifted) {
        Ok(tiers) => {
            let translated = tiers
                .into_iter()
                .map(|tier| tier.into_iter().map(|n| lifted[n]).collect())
                .collect();
            Ok(QueryResult::Tiers(translated))
        }
        Err(()) => {
            let sccs = graph::strongly_connected_components(&lifted);
            let cycles = sccs
                .into_iter()
                .map(|component| {
                    // `component` holds NodeIndex values in the *lifted*
                    // graph's index space, which differs from the
                    // original dep_graph's whenever some vertices were
                    // dropped by `lift`. Translate through the shared
                    // `usize` payload (== original NodeIndex, since
                    // `build_dep_graph` adds nodes 0..n in order) before
                    // touching `state.dep_graph`.
                    let original_component: Vec<NodeIndex> =
                        component.iter().map(|&n| NodeIndex::new(lifted[n])).collect();
                    render_cycle(state, &state.dep_graph, &original_component)
                })
                .collect();
            Err(crate::error::Error::Graph(GraphError::CyclesDetected(cycles)))
        }
    }
}

fn render_cycle(state: &State, original_graph: &graph::Graph, component: &[NodeIndex]) -> Cycle {
    let witness = graph::longer_shortest_path(original_graph, component);
    Cycle {
        members: component
            .iter()
            .map(|&n| state.packages[original_graph[n]].source.clone())
            .collect(),
        witness_chain: witness
            .iter()
            .map(|&n| state.packages[original_graph[n]].source.clone())
            .collect(),
    }
}

/// Render a tier list as DOT (spec §6.1 `--dot`). `show_sub` renders each
/// node as `source{sub1, sub2}` instead of bare `source`.
pub fn render_dot(state: &State, graph: &graph::Graph, show_sub: bool) -> String {
    let mut out = String::from("digraph recipeforge {\n");
    for node in graph.node_indices() {
        let idx = graph[node];
        let label = node_label(state, idx, show_sub);
        out.push_str(&format!("  \"{label}\";\n"));
    }
    for edge in graph.edge_indices() {
        let (from, to) = graph.edge_endpoints(edge).expect("edge index from this graph");
        let from_label = node_label(state, graph[from], show_sub);
        let to_label = node_label(state, graph[to], show_sub);
        out.push_str(&format!("  \"{from_label}\" -> \"{to_label}\";\n"));
    }
    out.push_str("}\n");
    out
}

fn node_label(state: &State, idx: usize, show_sub: bool) -> String {
    let pkg = &state.packages[idx];
    if show_sub {
        format!("{}{{{}}}", pkg.source, pkg.names.join(", "))
    } else {
        pkg.source.clone()
    }
}

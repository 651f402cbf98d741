//! Event dispatch: which chains run, and in what order.
//!
//! Precedence is fixed. Specific handlers run first (per active branch, the
//! node nearest the leaf that declares one, branches in declaration order),
//! then every active node's wildcard chain, deepest first. Wildcards always
//! run, whether or not a specific handler matched.

use super::tree::TreeState;
use crate::graph::{Graph, NodeId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainRef {
    pub node: NodeId,
    pub wildcard: bool,
}

/// Resolve the ordered list of chains eligible for `event` against the
/// current active set. The list is fixed here; owners that get exited by
/// an earlier chain in the same dispatch are skipped at run time.
pub fn plan<D>(graph: &Graph<D>, tree: &TreeState, event: &str) -> Vec<ChainRef> {
    let mut refs: Vec<ChainRef> = Vec::new();

    for leaf in tree.active_leaves(graph) {
        let mut cursor = Some(leaf);
        while let Some(node) = cursor {
            if graph.node(node).handlers.contains_key(event) {
                if !refs.iter().any(|r| r.node == node) {
                    refs.push(ChainRef {
                        node,
                        wildcard: false,
                    });
                }
                break;
            }
            cursor = graph.node(node).parent;
        }
    }

    for node in tree.active_nodes_deepest_first(graph) {
        if graph.node(node).on_event.is_some() {
            refs.push(ChainRef {
                node,
                wildcard: true,
            });
        }
    }

    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use crate::design::{to, Design, StateConfig};
    use crate::graph::TargetMode;
    use crate::runtime::transaction::Txn;
    use crate::runtime::transition::boot_enter;

    #[derive(Clone)]
    struct Data;

    fn booted(design: Design<Data>) -> (Graph<Data>, TreeState, Data) {
        let (graph, data) = compile(design).unwrap();
        let mut tree = TreeState::new(graph.len());
        let mut txn = Txn::new(&graph, &mut tree, data.clone(), "@init");
        boot_enter(&mut txn).unwrap();
        drop(txn);
        (graph, tree, data)
    }

    #[test]
    fn nearest_handler_wins_along_a_branch() {
        // Both the leaf and its parent declare GO; only the leaf's runs.
        let design = Design::new(Data).root(
            StateConfig::new()
                .on("GO", to("root"))
                .initial("a")
                .state("a", StateConfig::new().on("GO", to("root"))),
        );
        let (graph, tree, _) = booted(design);
        let refs = plan(&graph, &tree, "GO");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].node, graph.get("root.a").unwrap());
    }

    #[test]
    fn parallel_branches_match_in_declaration_order() {
        let design = Design::new(Data).root(
            StateConfig::new()
                .parallel()
                .state("first", StateConfig::new().on("GO", to("root")))
                .state("second", StateConfig::new().on("GO", to("root"))),
        );
        let (graph, tree, _) = booted(design);
        let refs = plan(&graph, &tree, "GO");
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].node, graph.get("root.first").unwrap());
        assert_eq!(refs[1].node, graph.get("root.second").unwrap());
    }

    #[test]
    fn wildcards_follow_specifics_even_when_no_specific_matched() {
        let design = Design::new(Data).root(
            StateConfig::new()
                .on_event(to::<Data>("root"))
                .initial("a")
                .state("a", StateConfig::new()),
        );
        let (graph, tree, _) = booted(design);
        let refs = plan(&graph, &tree, "ANYTHING");
        assert_eq!(refs.len(), 1);
        assert!(refs[0].wildcard);
        assert_eq!(refs[0].node, NodeId::ROOT);
    }

    #[test]
    fn shared_ancestor_matches_once_for_parallel_leaves() {
        let design = Design::new(Data).root(
            StateConfig::new()
                .on("GO", to("root"))
                .parallel()
                .state("a", StateConfig::new())
                .state("b", StateConfig::new()),
        );
        let (graph, tree, _) = booted(design);
        let refs = plan(&graph, &tree, "GO");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].node, NodeId::ROOT);
    }

    #[test]
    fn booted_tree_respects_target_modes() {
        // Sanity: TargetMode is compiled, not parsed at dispatch time.
        let design = Design::new(Data).root(
            StateConfig::new()
                .initial("a")
                .state("a", StateConfig::new().on("GO", to("a.restore"))),
        );
        let (graph, _) = compile(design).unwrap();
        let a = graph.get("root.a").unwrap();
        let step = graph.node(a).handlers.get("GO").unwrap()[0]
            .target
            .as_ref()
            .unwrap()
            .steps[0];
        assert_eq!(step.mode, TargetMode::Restore);
    }
}

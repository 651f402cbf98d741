//! The design compiler: [`Design`] → immutable [`Graph`].
//!
//! Compilation does all the work dispatch must never do: assigning paths,
//! inferring node kinds, binding every named function reference to its
//! registered closure, and resolving every target string to a concrete
//! node. Anything unresolved here is a [`DesignError`]; after compilation
//! the graph contains no names left to look up.

use crate::design::{
    ActionFn, ActionRef, ConditionFn, ConditionRef, Design, DesignError, EventHandler, Handler,
    RepeatConfig, ResultFn, ResultRef, StateConfig, Task, TaskFn, TaskRef, TimeFn, Wait,
};
use crate::graph::target::split_mode;
use crate::graph::{
    CompiledChain, CompiledHandler, CompiledRepeat, CompiledTarget, CompiledTask, CompiledWait,
    Graph, NodeId, NodeKind, StateNode, TargetStep,
};
use std::collections::HashMap;

/// Named-function registries moved out of the design for resolution.
struct Registries<D> {
    actions: HashMap<String, ActionFn<D>>,
    conditions: HashMap<String, ConditionFn<D>>,
    results: HashMap<String, ResultFn<D>>,
    times: HashMap<String, TimeFn<D>>,
    tasks: HashMap<String, TaskFn<D>>,
}

/// Per-node leftovers from the first pass, compiled in the second.
struct NodeCfg<D> {
    on: Vec<(String, EventHandler<D>)>,
    on_enter: Option<EventHandler<D>>,
    on_exit: Option<EventHandler<D>>,
    on_event: Option<EventHandler<D>>,
    repeat: Option<RepeatConfig<D>>,
    task: Option<Task<D>>,
}

pub fn compile<D>(design: Design<D>) -> Result<(Graph<D>, D), DesignError> {
    let Design {
        data,
        root,
        actions,
        conditions,
        results,
        times,
        values,
        tasks,
    } = design;

    let registries = Registries {
        actions,
        conditions,
        results,
        times,
        tasks,
    };

    let mut nodes: Vec<StateNode<D>> = Vec::new();
    let mut index: HashMap<String, NodeId> = HashMap::new();
    let mut cfgs: Vec<NodeCfg<D>> = Vec::new();

    add_state(&mut nodes, &mut index, &mut cfgs, "root", root, None, 0)?;

    // Second pass: every path exists now, so names and targets can resolve.
    let mut compiled: Vec<CompiledNode<D>> = Vec::with_capacity(cfgs.len());
    for (i, cfg) in cfgs.into_iter().enumerate() {
        let id = NodeId(i as u32);
        compiled.push(compile_node(cfg, id, &nodes, &index, &registries)?);
    }
    for (node, c) in nodes.iter_mut().zip(compiled) {
        node.handlers = c.handlers;
        node.on_enter = c.on_enter;
        node.on_exit = c.on_exit;
        node.on_event = c.on_event;
        node.repeat = c.repeat;
        node.task = c.task;
    }

    Ok((
        Graph {
            nodes,
            index,
            values,
        },
        data,
    ))
}

/// First pass: build the skeleton (paths, kinds, child order), stashing the
/// handler configs for the second pass.
fn add_state<D>(
    nodes: &mut Vec<StateNode<D>>,
    index: &mut HashMap<String, NodeId>,
    cfgs: &mut Vec<NodeCfg<D>>,
    name: &str,
    config: StateConfig<D>,
    parent: Option<NodeId>,
    depth: usize,
) -> Result<NodeId, DesignError> {
    let path = match parent {
        Some(p) => format!("{}.{}", nodes[p.index()].path, name),
        None => "root".to_string(),
    };
    if index.contains_key(&path) {
        let parent_path = parent
            .map(|p| nodes[p.index()].path.clone())
            .unwrap_or_default();
        return Err(DesignError::DuplicateState {
            name: name.to_string(),
            path: parent_path,
        });
    }

    let id = NodeId(nodes.len() as u32);
    index.insert(path.clone(), id);
    nodes.push(StateNode {
        path,
        name: name.to_string(),
        kind: NodeKind::Leaf,
        parent,
        children: Vec::new(),
        depth,
        handlers: HashMap::new(),
        on_enter: None,
        on_exit: None,
        on_event: None,
        repeat: None,
        task: None,
    });
    cfgs.push(NodeCfg {
        on: config.on,
        on_enter: config.on_enter,
        on_exit: config.on_exit,
        on_event: config.on_event,
        repeat: config.repeat,
        task: config.task,
    });

    let mut child_names: Vec<String> = Vec::new();
    for (child_name, child_cfg) in config.states {
        let child = add_state(nodes, index, cfgs, &child_name, child_cfg, Some(id), depth + 1)?;
        nodes[id.index()].children.push(child);
        child_names.push(child_name);
    }

    nodes[id.index()].kind = if child_names.is_empty() {
        NodeKind::Leaf
    } else if config.parallel {
        if config.initial.is_some() {
            return Err(DesignError::ParallelInitial {
                path: nodes[id.index()].path.clone(),
            });
        }
        NodeKind::Parallel
    } else {
        let initial = match config.initial {
            Some(ref wanted) => child_names
                .iter()
                .position(|n| n == wanted)
                .ok_or_else(|| DesignError::UnknownInitial {
                    name: wanted.clone(),
                    path: nodes[id.index()].path.clone(),
                })?,
            None => 0,
        };
        NodeKind::Compound { initial }
    };

    Ok(id)
}

struct CompiledNode<D> {
    handlers: HashMap<String, CompiledChain<D>>,
    on_enter: Option<CompiledChain<D>>,
    on_exit: Option<CompiledChain<D>>,
    on_event: Option<CompiledChain<D>>,
    repeat: Option<CompiledRepeat<D>>,
    task: Option<CompiledTask<D>>,
}

fn compile_node<D>(
    cfg: NodeCfg<D>,
    id: NodeId,
    nodes: &[StateNode<D>],
    index: &HashMap<String, NodeId>,
    reg: &Registries<D>,
) -> Result<CompiledNode<D>, DesignError> {
    let mut handlers: HashMap<String, CompiledChain<D>> = HashMap::new();
    for (event, chain) in cfg.on {
        let compiled = compile_chain(chain, id, nodes, index, reg)?;
        handlers.entry(event).or_default().extend(compiled);
    }

    let on_enter = cfg
        .on_enter
        .map(|c| compile_chain(c, id, nodes, index, reg))
        .transpose()?;
    let on_exit = cfg
        .on_exit
        .map(|c| compile_chain(c, id, nodes, index, reg))
        .transpose()?;
    let on_event = cfg
        .on_event
        .map(|c| compile_chain(c, id, nodes, index, reg))
        .transpose()?;

    let repeat = match cfg.repeat {
        Some(r) => Some(CompiledRepeat {
            delay: compile_wait(r.delay, id, nodes, reg)?,
            chain: compile_chain(r.on_repeat, id, nodes, index, reg)?,
        }),
        None => None,
    };

    let task = match cfg.task {
        Some(t) => {
            let run = match t.run {
                TaskRef::Named(name) => (
                    name.clone(),
                    reg.tasks
                        .get(&name)
                        .cloned()
                        .ok_or_else(|| unresolved("task", &name, id, nodes))?,
                ),
                TaskRef::Inline(f) => (crate::design::INLINE.to_string(), f),
            };
            Some(CompiledTask {
                run,
                on_resolve: t
                    .on_resolve
                    .map(|c| compile_chain(c, id, nodes, index, reg))
                    .transpose()?,
                on_reject: t
                    .on_reject
                    .map(|c| compile_chain(c, id, nodes, index, reg))
                    .transpose()?,
            })
        }
        None => None,
    };

    Ok(CompiledNode {
        handlers,
        on_enter,
        on_exit,
        on_event,
        repeat,
        task,
    })
}

fn compile_chain<D>(
    chain: EventHandler<D>,
    id: NodeId,
    nodes: &[StateNode<D>],
    index: &HashMap<String, NodeId>,
    reg: &Registries<D>,
) -> Result<CompiledChain<D>, DesignError> {
    chain
        .handlers
        .into_iter()
        .map(|h| compile_handler(h, id, nodes, index, reg))
        .collect()
}

fn compile_handler<D>(
    handler: Handler<D>,
    id: NodeId,
    nodes: &[StateNode<D>],
    index: &HashMap<String, NodeId>,
    reg: &Registries<D>,
) -> Result<CompiledHandler<D>, DesignError> {
    let get = handler
        .get
        .into_iter()
        .map(|(name, r)| {
            Ok((
                name.clone(),
                match r {
                    ResultRef::Named(n) => reg
                        .results
                        .get(&n)
                        .cloned()
                        .ok_or_else(|| unresolved("result", &n, id, nodes))?,
                    ResultRef::Inline(f) => f,
                },
            ))
        })
        .collect::<Result<Vec<_>, DesignError>>()?;

    let resolve_conditions = |refs: Vec<(String, ConditionRef<D>)>| {
        refs.into_iter()
            .map(|(name, r)| {
                Ok((
                    name.clone(),
                    match r {
                        ConditionRef::Named(n) => reg
                            .conditions
                            .get(&n)
                            .cloned()
                            .ok_or_else(|| unresolved("condition", &n, id, nodes))?,
                        ConditionRef::Inline(f) => f,
                    },
                ))
            })
            .collect::<Result<Vec<_>, DesignError>>()
    };
    let if_all = resolve_conditions(handler.if_all)?;
    let unless = resolve_conditions(handler.unless)?;
    let if_any = resolve_conditions(handler.if_any)?;

    let resolve_actions = |refs: Vec<(String, ActionRef<D>)>| {
        refs.into_iter()
            .map(|(name, r)| {
                Ok((
                    name.clone(),
                    match r {
                        ActionRef::Named(n) => reg
                            .actions
                            .get(&n)
                            .cloned()
                            .ok_or_else(|| unresolved("action", &n, id, nodes))?,
                        ActionRef::Inline(f) => f,
                    },
                ))
            })
            .collect::<Result<Vec<_>, DesignError>>()
    };
    let actions = resolve_actions(handler.actions)?;
    let else_actions = resolve_actions(handler.else_actions)?;

    let target = if handler.targets.is_empty() {
        None
    } else {
        let steps = handler
            .targets
            .iter()
            .map(|raw| resolve_target(raw, id, nodes, index))
            .collect::<Result<Vec<TargetStep>, DesignError>>()?;
        Some(CompiledTarget { steps })
    };

    let wait = handler
        .wait
        .map(|w| compile_wait(w, id, nodes, reg))
        .transpose()?;

    let otherwise = handler
        .otherwise
        .map(|h| compile_handler(*h, id, nodes, index, reg).map(Box::new))
        .transpose()?;

    Ok(CompiledHandler {
        get,
        if_all,
        unless,
        if_any,
        actions,
        target,
        wait,
        else_actions,
        otherwise,
        halt: handler.halt,
        secret: handler.secret,
    })
}

fn compile_wait<D>(
    wait: Wait<D>,
    id: NodeId,
    nodes: &[StateNode<D>],
    reg: &Registries<D>,
) -> Result<CompiledWait<D>, DesignError> {
    Ok(match wait {
        Wait::Secs(s) => CompiledWait::Secs(s),
        Wait::Named(n) => CompiledWait::Func(
            n.clone(),
            reg.times
                .get(&n)
                .cloned()
                .ok_or_else(|| unresolved("time", &n, id, nodes))?,
        ),
        Wait::Inline(f) => CompiledWait::Func(crate::design::INLINE.to_string(), f),
    })
}

/// Resolve a target string from `source`. Absolute targets (`root...`) hit
/// the index directly; relative ones search outward, nearest enclosing
/// scope first.
fn resolve_target<D>(
    raw: &str,
    source: NodeId,
    nodes: &[StateNode<D>],
    index: &HashMap<String, NodeId>,
) -> Result<TargetStep, DesignError> {
    let (expr, mode) = split_mode(raw);
    if expr.is_empty() {
        return Err(DesignError::EmptyTarget {
            path: nodes[source.index()].path.clone(),
        });
    }

    let found = if expr == "root" || expr.starts_with("root.") {
        index.get(expr).copied()
    } else {
        let mut scope = Some(source);
        let mut hit = None;
        while let Some(anc) = scope {
            let candidate = format!("{}.{}", nodes[anc.index()].path, expr);
            if let Some(&node) = index.get(&candidate) {
                hit = Some(node);
                break;
            }
            scope = nodes[anc.index()].parent;
        }
        hit
    };

    found
        .map(|node| TargetStep { node, mode })
        .ok_or_else(|| DesignError::UnresolvedTarget {
            target: raw.to_string(),
            path: nodes[source.index()].path.clone(),
        })
}

fn unresolved<D>(kind: &'static str, name: &str, id: NodeId, nodes: &[StateNode<D>]) -> DesignError {
    DesignError::UnresolvedFunction {
        kind,
        name: name.to_string(),
        path: nodes[id.index()].path.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::to;
    use crate::graph::TargetMode;

    #[derive(Clone)]
    struct Data;

    fn two_level() -> Design<Data> {
        Design::new(Data).root(
            StateConfig::new()
                .initial("off")
                .state("off", StateConfig::new().on("TOGGLE", to("on")))
                .state(
                    "on",
                    StateConfig::new()
                        .initial("dim")
                        .state("dim", StateConfig::new().on("BRIGHTEN", to("bright")))
                        .state("bright", StateConfig::new()),
                ),
        )
    }

    #[test]
    fn paths_are_dot_joined_from_root() {
        let (graph, _) = compile(two_level()).unwrap();
        assert!(graph.get("root").is_some());
        assert!(graph.get("root.off").is_some());
        assert!(graph.get("root.on.bright").is_some());
        assert_eq!(graph.len(), 5);
    }

    #[test]
    fn kinds_follow_children_and_markers() {
        let (graph, _) = compile(two_level()).unwrap();
        let root = graph.node(NodeId::ROOT);
        assert!(matches!(root.kind, NodeKind::Compound { initial: 0 }));
        let off = graph.node(graph.get("root.off").unwrap());
        assert_eq!(off.kind, NodeKind::Leaf);
    }

    #[test]
    fn parallel_nodes_reject_initial() {
        let design: Design<Data> = Design::new(Data).root(
            StateConfig::new()
                .parallel()
                .initial("a")
                .state("a", StateConfig::new())
                .state("b", StateConfig::new()),
        );
        assert!(matches!(
            compile(design),
            Err(DesignError::ParallelInitial { .. })
        ));
    }

    #[test]
    fn unknown_initial_is_a_design_error() {
        let design: Design<Data> = Design::new(Data)
            .root(StateConfig::new().initial("nope").state("a", StateConfig::new()));
        assert!(matches!(
            compile(design),
            Err(DesignError::UnknownInitial { .. })
        ));
    }

    #[test]
    fn duplicate_siblings_are_a_design_error() {
        let design: Design<Data> = Design::new(Data).root(
            StateConfig::new()
                .state("a", StateConfig::new())
                .state("a", StateConfig::new()),
        );
        assert!(matches!(
            compile(design),
            Err(DesignError::DuplicateState { .. })
        ));
    }

    #[test]
    fn named_references_must_resolve() {
        let design: Design<Data> = Design::new(Data).root(
            StateConfig::new().state(
                "a",
                StateConfig::new().on("GO", Handler::new().run_named("missing")),
            ),
        );
        assert!(matches!(
            compile(design),
            Err(DesignError::UnresolvedFunction { kind: "action", .. })
        ));
    }

    #[test]
    fn relative_targets_resolve_outward() {
        // "bright" is a sibling of the source, found through the shared parent.
        let (graph, _) = compile(two_level()).unwrap();
        let dim = graph.get("root.on.dim").unwrap();
        let chain = graph.node(dim).handlers.get("BRIGHTEN").unwrap();
        let step = chain[0].target.as_ref().unwrap().steps[0];
        assert_eq!(step.node, graph.get("root.on.bright").unwrap());
    }

    #[test]
    fn cross_branch_targets_resolve_through_the_root() {
        let (graph, _) = compile(two_level()).unwrap();
        let off = graph.get("root.off").unwrap();
        let chain = graph.node(off).handlers.get("TOGGLE").unwrap();
        let step = chain[0].target.as_ref().unwrap().steps[0];
        assert_eq!(step.node, graph.get("root.on").unwrap());
    }

    #[test]
    fn unresolvable_targets_fail_compilation() {
        let design: Design<Data> = Design::new(Data)
            .root(StateConfig::new().state("a", StateConfig::new().on("GO", to("nowhere"))));
        assert!(matches!(
            compile(design),
            Err(DesignError::UnresolvedTarget { .. })
        ));
    }

    #[test]
    fn restore_suffix_compiles_to_a_mode() {
        let design: Design<Data> = Design::new(Data).root(
            StateConfig::new()
                .initial("a")
                .state("a", StateConfig::new().on("BACK", to("b.restore")))
                .state(
                    "b",
                    StateConfig::new()
                        .initial("x")
                        .state("x", StateConfig::new())
                        .state("y", StateConfig::new()),
                ),
        );
        let (graph, _) = compile(design).unwrap();
        let a = graph.get("root.a").unwrap();
        let step = graph.node(a).handlers.get("BACK").unwrap()[0]
            .target
            .as_ref()
            .unwrap()
            .steps[0];
        assert_eq!(step.node, graph.get("root.b").unwrap());
        assert_eq!(step.mode, TargetMode::Restore);
    }
}

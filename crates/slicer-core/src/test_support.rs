//! Shared fixtures for unit tests.

use crate::config::CallGraphConfig;
use crate::indexer::callgraph::CallGraph;
use crate::indexer::hierarchy::ClassGraph;
use crate::indexer::pipeline::load_sources;
use crate::indexer::points::StatementIndex;
use crate::indexer::resolver::SymbolResolver;
use crate::models::{NodeId, NodeKind, Program};

/// Reference collaborators over one program.
pub(crate) struct Harness<'p> {
    pub program: &'p Program,
    pub resolver: SymbolResolver<'p>,
    pub points: StatementIndex<'p>,
}

impl<'p> Harness<'p> {
    pub fn new(program: &'p Program) -> Self {
        Self {
            program,
            resolver: SymbolResolver::new(ClassGraph::build(program)),
            points: StatementIndex::build(program),
        }
    }

    pub fn graph(&self, config: CallGraphConfig) -> CallGraph<'_> {
        CallGraph::with_config(
            self.program,
            &self.resolver,
            self.resolver.hierarchy(),
            &self.points,
            config,
        )
    }

    pub fn built(&self) -> CallGraph<'_> {
        let mut graph = self.graph(CallGraphConfig::default());
        graph.build(self.program.units()).expect("build failed");
        graph
    }
}

pub(crate) fn java(sources: &[(&str, &str)]) -> Program {
    load_sources(sources).expect("fixture does not parse")
}

/// The callable named `owner.name`, e.g. `"A.bar"`; constructors use the
/// type name, e.g. `"A.A"`. Panics unless exactly one matches.
pub(crate) fn callable(program: &Program, qualified: &str) -> NodeId {
    let (owner, name) = qualified.rsplit_once('.').expect("expected Owner.name");
    let found: Vec<NodeId> = program
        .units()
        .iter()
        .flat_map(|u| program.descendants(*u))
        .filter(|id| program.callable(*id).is_some_and(|c| c.name == name))
        .filter(|id| {
            program
                .enclosing_type(*id)
                .and_then(|t| program.simple_name(t))
                == Some(owner)
        })
        .collect();
    assert_eq!(found.len(), 1, "{qualified} matched {found:?}");
    found[0]
}

/// Method calls named `name` beneath `root`, in source order.
pub(crate) fn calls_named(program: &Program, root: NodeId, name: &str) -> Vec<NodeId> {
    program
        .descendants(root)
        .into_iter()
        .filter(|id| matches!(program.kind(*id), NodeKind::MethodCall(mc) if mc.name == name))
        .collect()
}

//! Call graph over method and constructor declarations.
//!
//! Vertices are declarations, edges are call sites. Construction runs in two
//! passes over the requested compilation units:
//!
//! 1. every method and constructor declaration becomes a vertex;
//! 2. a scoped walk attributes each call expression to the innermost
//!    enclosing callable, resolves it through the `Resolver`, widens virtual
//!    calls to their possible dispatch targets through the `ClassHierarchy`,
//!    and anchors each edge at the program point that contains the call.
//!
//! Call sites that cannot be linked never abort the build; each one is kept
//! in a `CallSiteReport` so under-approximation is observable.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::IndexSet;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{CallGraphConfig, ZeroTargetPolicy};
use crate::errors::{SlicerError, SlicerResult};
use crate::indexer::hierarchy::{qualified_super_root, ClassHierarchy};
use crate::indexer::points::{ProgramPoint, ProgramPointIndex};
use crate::indexer::resolver::{Resolution, Resolver};
use crate::indexer::traversal::{walk_scoped, Descend, Scope, ScopedVisitor};
use crate::models::{CallScope, CallableKind, NodeId, NodeKind, Program};

// ---------------------------------------------------------------------------
// Vertices
// ---------------------------------------------------------------------------

fn owner_name(program: &Program, decl: NodeId) -> Option<String> {
    program
        .nearest_named_ancestor(decl)
        .and_then(|a| program.simple_name(a))
        .map(str::to_string)
}

/// Two declarations denote the same vertex: same node, or same signature
/// under equally named innermost named ancestors.
pub fn same_declaration(program: &Program, a: NodeId, b: NodeId) -> bool {
    if a == b {
        return true;
    }
    match (program.signature(a), program.signature(b)) {
        (Some(sa), Some(sb)) if sa == sb => {
            let owner = owner_name(program, a);
            owner.is_some() && owner == owner_name(program, b)
        }
        _ => false,
    }
}

/// A method or constructor declaration in the graph.
#[derive(Clone, Debug)]
pub struct Vertex {
    declaration: NodeId,
    kind: CallableKind,
    signature: String,
    owner: Option<String>,
}

impl Vertex {
    pub fn new(program: &Program, declaration: NodeId) -> SlicerResult<Self> {
        let callable = program.callable(declaration).ok_or_else(|| {
            SlicerError::IllegalState(format!(
                "{} is not a method or constructor",
                program.describe(declaration)
            ))
        })?;
        Ok(Self {
            declaration,
            kind: callable.kind,
            signature: callable.signature(),
            owner: owner_name(program, declaration),
        })
    }

    pub fn declaration(&self) -> NodeId {
        self.declaration
    }

    pub fn kind(&self) -> CallableKind {
        self.kind
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Simple name of the innermost named ancestor of the declaration.
    pub fn owner_name(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn matches(&self, program: &Program, declaration: NodeId) -> bool {
        if self.declaration == declaration {
            return true;
        }
        if program.signature(declaration).as_deref() != Some(self.signature.as_str()) {
            return false;
        }
        self.owner.is_some() && self.owner == owner_name(program, declaration)
    }
}

impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        self.declaration == other.declaration
            || (self.signature == other.signature && self.owner.is_some() && self.owner == other.owner)
    }
}

impl Eq for Vertex {}

impl Hash for Vertex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.signature.hash(state);
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner {
            Some(owner) => write!(f, "{}.{}", owner, self.signature),
            None => write!(f, "{}", self.signature),
        }
    }
}

// ---------------------------------------------------------------------------
// Edges
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    MethodCall,
    ObjectCreation,
    ConstructorInvocation,
}

impl CallKind {
    pub fn of(kind: &NodeKind) -> Option<CallKind> {
        match kind {
            NodeKind::MethodCall(_) => Some(CallKind::MethodCall),
            NodeKind::ObjectCreation(_) => Some(CallKind::ObjectCreation),
            NodeKind::ConstructorInvocation(_) => Some(CallKind::ConstructorInvocation),
            _ => None,
        }
    }
}

/// A call site: the call expression and the program point holding it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edge {
    kind: CallKind,
    call: NodeId,
    point: ProgramPoint,
}

impl Edge {
    /// The call must be of `kind` and lie inside the point's node.
    pub fn new(program: &Program, kind: CallKind, call: NodeId, point: ProgramPoint) -> SlicerResult<Self> {
        if CallKind::of(program.kind(call)) != Some(kind) {
            return Err(SlicerError::IllegalState(format!(
                "{} is not a {:?}",
                program.describe(call),
                kind
            )));
        }
        if !program.contains(point.node, call) {
            return Err(SlicerError::ProgramPointNotFound {
                call: program.describe(call),
                declaration: program.describe(point.declaration),
            });
        }
        Ok(Self { kind, call, point })
    }

    pub fn kind(&self) -> CallKind {
        self.kind
    }

    pub fn call(&self) -> NodeId {
        self.call
    }

    pub fn point(&self) -> ProgramPoint {
        self.point
    }
}

/// Borrowed view of one edge with its endpoints.
#[derive(Clone, Copy, Debug)]
pub struct CallEdgeRef<'g> {
    pub source: NodeId,
    pub target: NodeId,
    pub edge: &'g Edge,
}

// ---------------------------------------------------------------------------
// Build report
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CallOutcome {
    Linked { edges: usize },
    /// Attributed to a type rather than a callable; no edge.
    TypeLevel,
    Unresolved { reason: String },
    /// Resolved, but dispatch left nothing to call.
    NoTargets,
    /// Targets found, but none of the edges could be anchored.
    Dropped { reason: String },
}

#[derive(Clone, Debug, Serialize)]
pub struct CallSiteReport {
    pub call: NodeId,
    pub kind: CallKind,
    pub caller: Option<NodeId>,
    #[serde(flatten)]
    pub outcome: CallOutcome,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    pub vertices: usize,
    pub edges: usize,
    pub call_sites: usize,
    pub linked: usize,
    pub type_level: usize,
    pub unresolved: usize,
    pub no_targets: usize,
    pub dropped: usize,
}

/// Result of widening a resolved call to its runtime targets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatch {
    Targets(Vec<NodeId>),
    NoTargets,
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

pub struct CallGraph<'a> {
    pub(crate) program: &'a Program,
    resolver: &'a dyn Resolver,
    hierarchy: &'a dyn ClassHierarchy,
    points: &'a dyn ProgramPointIndex,
    config: CallGraphConfig,
    pub(crate) graph: StableDiGraph<Vertex, Edge>,
    by_signature: HashMap<String, Vec<NodeIndex>>,
    reports: Vec<CallSiteReport>,
    built: bool,
}

impl<'a> CallGraph<'a> {
    pub fn new(
        program: &'a Program,
        resolver: &'a dyn Resolver,
        hierarchy: &'a dyn ClassHierarchy,
        points: &'a dyn ProgramPointIndex,
    ) -> Self {
        Self::with_config(program, resolver, hierarchy, points, CallGraphConfig::default())
    }

    pub fn with_config(
        program: &'a Program,
        resolver: &'a dyn Resolver,
        hierarchy: &'a dyn ClassHierarchy,
        points: &'a dyn ProgramPointIndex,
        config: CallGraphConfig,
    ) -> Self {
        Self {
            program,
            resolver,
            hierarchy,
            points,
            config,
            graph: StableDiGraph::new(),
            by_signature: HashMap::new(),
            reports: Vec::new(),
            built: false,
        }
    }

    pub fn program(&self) -> &'a Program {
        self.program
    }

    pub fn config(&self) -> &CallGraphConfig {
        &self.config
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Build vertices and edges for `units`. A second call is a no-op.
    pub fn build(&mut self, units: &[NodeId]) -> SlicerResult<()> {
        if self.built {
            return Ok(());
        }
        self.add_vertices(units)?;
        self.add_edges(units)?;
        self.built = true;

        let stats = self.stats();
        info!(
            "Call graph built: {} vertices, {} edges, {} call sites ({} linked, {} type-level, {} unresolved, {} without targets, {} dropped)",
            stats.vertices,
            stats.edges,
            stats.call_sites,
            stats.linked,
            stats.type_level,
            stats.unresolved,
            stats.no_targets,
            stats.dropped
        );
        Ok(())
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> + '_ {
        self.graph.node_weights()
    }

    pub fn edges(&self) -> impl Iterator<Item = CallEdgeRef<'_>> + '_ {
        self.graph.edge_indices().filter_map(|ix| self.edge_ref(ix))
    }

    pub fn reports(&self) -> &[CallSiteReport] {
        &self.reports
    }

    pub fn stats(&self) -> BuildStats {
        let mut stats = BuildStats {
            vertices: self.vertex_count(),
            edges: self.edge_count(),
            call_sites: self.reports.len(),
            ..BuildStats::default()
        };
        for report in &self.reports {
            match report.outcome {
                CallOutcome::Linked { .. } => stats.linked += 1,
                CallOutcome::TypeLevel => stats.type_level += 1,
                CallOutcome::Unresolved { .. } => stats.unresolved += 1,
                CallOutcome::NoTargets => stats.no_targets += 1,
                CallOutcome::Dropped { .. } => stats.dropped += 1,
            }
        }
        stats
    }

    pub(crate) fn edge_ref(&self, ix: EdgeIndex) -> Option<CallEdgeRef<'_>> {
        let (from, to) = self.graph.edge_endpoints(ix)?;
        Some(CallEdgeRef {
            source: self.graph[from].declaration,
            target: self.graph[to].declaration,
            edge: self.graph.edge_weight(ix)?,
        })
    }

    // -- vertices -----------------------------------------------------------

    fn add_vertices(&mut self, units: &[NodeId]) -> SlicerResult<()> {
        let program = self.program;
        for &unit in units {
            for id in program.descendants(unit) {
                if program.is_callable(id) {
                    self.add_vertex(id)?;
                }
            }
        }
        Ok(())
    }

    fn add_vertex(&mut self, declaration: NodeId) -> SlicerResult<NodeIndex> {
        if let Ok(existing) = self.find_vertex(declaration) {
            return Ok(existing);
        }
        let vertex = Vertex::new(self.program, declaration)?;
        let signature = vertex.signature.clone();
        let ix = self.graph.add_node(vertex);
        self.by_signature.entry(signature).or_default().push(ix);
        Ok(ix)
    }

    /// Vertex of `declaration`, matched by identity or signature + owner name.
    pub(crate) fn find_vertex(&self, declaration: NodeId) -> SlicerResult<NodeIndex> {
        let not_found = || SlicerError::VertexNotFound(self.program.describe(declaration));
        let signature = self
            .program
            .signature(declaration)
            .ok_or_else(not_found)?;
        self.by_signature
            .get(&signature)
            .and_then(|bucket| {
                bucket
                    .iter()
                    .find(|ix| self.graph[**ix].matches(self.program, declaration))
            })
            .copied()
            .ok_or_else(not_found)
    }

    pub fn vertex(&self, declaration: NodeId) -> SlicerResult<&Vertex> {
        self.find_vertex(declaration).map(|ix| &self.graph[ix])
    }

    // -- edges --------------------------------------------------------------

    fn add_edges(&mut self, units: &[NodeId]) -> SlicerResult<()> {
        let program = self.program;
        let mut linker = Linker { graph: self };
        walk_scoped(program, units, &mut linker)
    }

    fn record(&mut self, call: NodeId, kind: CallKind, caller: Option<NodeId>, outcome: CallOutcome) {
        match &outcome {
            CallOutcome::Linked { .. } => {}
            other => debug!(
                "Call site {} not linked: {:?}",
                self.program.describe(call),
                other
            ),
        }
        self.reports.push(CallSiteReport {
            call,
            kind,
            caller,
            outcome,
        });
    }

    fn link_call(&mut self, call: NodeId, scope: &Scope) -> SlicerResult<()> {
        let Some(kind) = CallKind::of(self.program.kind(call)) else {
            return Ok(());
        };
        let caller = match (scope.current_callable(), scope.current_type()) {
            (Some(callable), _) => callable,
            (None, Some(_)) => {
                self.record(call, kind, None, CallOutcome::TypeLevel);
                return Ok(());
            }
            (None, None) => {
                return Err(SlicerError::IllegalState(format!(
                    "Call {} is outside of any type or callable declaration",
                    self.program.describe(call)
                )))
            }
        };

        let outcome = match self.targets(call, kind, scope) {
            Ok(Dispatch::Targets(targets)) => self.connect(caller, &targets, kind, call)?,
            Ok(Dispatch::NoTargets) => match self.config.zero_target_policy {
                ZeroTargetPolicy::Discard => CallOutcome::NoTargets,
                ZeroTargetPolicy::Strict => {
                    return Err(SlicerError::NoDispatchTargets(self.program.describe(call)))
                }
            },
            Err(e) if e.is_recoverable() => CallOutcome::Unresolved {
                reason: e.to_string(),
            },
            Err(e) => return Err(e),
        };
        self.record(call, kind, Some(caller), outcome);
        Ok(())
    }

    fn connect(
        &mut self,
        caller: NodeId,
        targets: &[NodeId],
        kind: CallKind,
        call: NodeId,
    ) -> SlicerResult<CallOutcome> {
        let mut linked = 0;
        let mut last_error = None;
        for &target in targets {
            match self.add_edge(caller, target, kind, call) {
                Ok(_) => linked += 1,
                Err(e) if e.is_recoverable() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }
        Ok(match last_error {
            Some(e) if linked == 0 => CallOutcome::Dropped {
                reason: e.to_string(),
            },
            _ => CallOutcome::Linked { edges: linked },
        })
    }

    fn add_edge(&mut self, source: NodeId, target: NodeId, kind: CallKind, call: NodeId) -> SlicerResult<EdgeIndex> {
        let point = self.points.containing_point(source, call)?;
        let edge = Edge::new(self.program, kind, call, point)?;
        let from = self.find_vertex(source)?;
        let to = self.find_vertex(target)?;
        Ok(self.graph.add_edge(from, to, edge))
    }

    // -- resolution and dispatch --------------------------------------------

    fn targets(&self, call: NodeId, kind: CallKind, scope: &Scope) -> SlicerResult<Dispatch> {
        let declaration = match self.resolver.resolve(call)? {
            Resolution::Declaration(decl) => decl,
            Resolution::Signature(signature) if kind != CallKind::ConstructorInvocation => self
                .hierarchy
                .lookup_by_signature(&signature)
                .ok_or_else(|| SlicerError::Unresolved(format!("No declaration for {signature}")))?,
            Resolution::Signature(signature) => {
                return Err(SlicerError::Unresolved(format!(
                    "Constructor {signature} has no declaration in the program"
                )))
            }
        };
        match kind {
            CallKind::MethodCall => self.dispatch(call, declaration, scope),
            CallKind::ObjectCreation | CallKind::ConstructorInvocation => {
                Ok(Dispatch::Targets(vec![declaration]))
            }
        }
    }

    /// Widen a statically resolved method call to the declarations it may
    /// execute at runtime.
    fn dispatch(&self, call: NodeId, target: NodeId, scope: &Scope) -> SlicerResult<Dispatch> {
        let program = self.program;
        let callable = program.callable(target).ok_or_else(|| {
            SlicerError::Unresolved(format!("{} is not callable", program.describe(target)))
        })?;
        if callable.is_static {
            return Ok(Dispatch::Targets(vec![target]));
        }
        let NodeKind::MethodCall(method_call) = program.kind(call) else {
            return Err(SlicerError::IllegalState(format!(
                "{} is not a method call",
                program.describe(call)
            )));
        };

        let current_type = || {
            scope.current_type().ok_or_else(|| {
                SlicerError::Unresolved(format!("{} has no enclosing type", program.describe(call)))
            })
        };
        let dynamic_types = match &method_call.scope {
            CallScope::Implicit => {
                return Ok(self.collect(self.hierarchy.overridden_by(target)));
            }
            CallScope::This => self.hierarchy.subclasses_of(current_type()?),
            CallScope::QualifiedThis(name) => {
                let ty = self.resolver.resolve_type_name(call, name)?;
                self.hierarchy.subclasses_of(ty)
            }
            CallScope::Super => {
                let ty = current_type()?;
                let parent = self.hierarchy.parent_of(ty).ok_or_else(|| {
                    SlicerError::Unresolved(format!("No parent found for {}", program.describe(ty)))
                })?;
                vec![parent]
            }
            CallScope::QualifiedSuper(name) => {
                let named = self.resolver.resolve_type_name(call, name)?;
                let root = qualified_super_root(program, self.hierarchy, named).ok_or_else(|| {
                    SlicerError::Unresolved(format!("No parent found for {}", program.describe(named)))
                })?;
                vec![root]
            }
            CallScope::Expression(expr) => {
                let ty = self.resolver.static_type(*expr)?;
                self.hierarchy.subclasses_of(ty)
            }
        };
        Ok(self.collect(
            dynamic_types
                .into_iter()
                .filter_map(|ty| self.hierarchy.find_by_signature(ty, target)),
        ))
    }

    /// Deduplicate by node and by vertex identity.
    fn collect(&self, candidates: impl IntoIterator<Item = NodeId>) -> Dispatch {
        let mut kept: IndexSet<NodeId> = IndexSet::new();
        for candidate in candidates {
            if !kept.iter().any(|k| same_declaration(self.program, *k, candidate)) {
                kept.insert(candidate);
            }
        }
        if kept.is_empty() {
            Dispatch::NoTargets
        } else {
            Dispatch::Targets(kept.into_iter().collect())
        }
    }
}

/// Pass-2 visitor: links every call expression it meets.
struct Linker<'g, 'a> {
    graph: &'g mut CallGraph<'a>,
}

impl ScopedVisitor for Linker<'_, '_> {
    fn visit(&mut self, program: &Program, node: NodeId, scope: &Scope) -> SlicerResult<Descend> {
        match program.kind(node) {
            NodeKind::Field(field) => {
                if scope.current_callable().is_some() {
                    return Ok(Descend::Skip);
                }
                if field.is_static || !self.graph.config.field_initializers_to_constructors {
                    return Ok(Descend::Children);
                }
                let constructors = scope
                    .current_type()
                    .map(|ty| program.constructors_of(ty))
                    .unwrap_or_default();
                if constructors.is_empty() {
                    Ok(Descend::Children)
                } else {
                    Ok(Descend::PerCallable(constructors))
                }
            }
            kind if kind.is_call() => {
                self.graph.link_call(node, scope)?;
                Ok(Descend::Children)
            }
            _ => Ok(Descend::Children),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::hierarchy::ClassGraph;
    use crate::models::{CallableDecl, CompilationUnit, Expression, QualifiedSignature, Span, UnitOrigin};
    use crate::test_support::{callable, calls_named, java, Harness};

    fn name(n: &str) -> NodeKind {
        NodeKind::Expression(Expression::Name(n.to_string()))
    }

    fn targets_of(graph: &CallGraph<'_>, call: NodeId) -> Vec<NodeId> {
        graph.call_targets(call)
    }

    /// ```text
    /// class A { A() {}  void foo() { this.bar(); }  void bar() {}
    ///           static void util() {}  void rec() { rec(); } }
    /// class B extends A { void bar() { super.bar(); } }
    /// class C { C() { new A(); }
    ///           void m() { A a; a.bar(); unknown(); A.util(); } }
    /// ```
    struct DispatchFixture {
        program: Program,
        a_ctor: NodeId,
        foo: NodeId,
        a_bar: NodeId,
        util: NodeId,
        rec: NodeId,
        b_bar: NodeId,
        c_ctor: NodeId,
        m: NodeId,
        this_bar: NodeId,
        rec_call: NodeId,
        super_bar: NodeId,
        new_a: NodeId,
        a_dot_bar: NodeId,
        unknown: NodeId,
        util_call: NodeId,
    }

    fn dispatch_fixture() -> DispatchFixture {
        let mut p = Program::new();
        let unit = p.add_unit(CompilationUnit::source("Dispatch.java"));
        let a = p.add_class(unit, "A", None);
        let a_ctor = p.add_constructor(a, &[]);
        let foo = p.add_method(a, "foo");
        let s = p.add_statement(foo);
        let this_bar = p.add_method_call(s, "bar", CallScope::This);
        let a_bar = p.add_method(a, "bar");
        let util = p.add_callable(a, CallableDecl::method("util").with_static(true));
        let rec = p.add_method(a, "rec");
        let s = p.add_statement(rec);
        let rec_call = p.add_method_call(s, "rec", CallScope::Implicit);

        let b = p.add_class(unit, "B", Some("A"));
        let b_bar = p.add_method(b, "bar");
        let s = p.add_statement(b_bar);
        let super_bar = p.add_method_call(s, "bar", CallScope::Super);

        let c = p.add_class(unit, "C", None);
        let c_ctor = p.add_constructor(c, &[]);
        let s = p.add_statement(c_ctor);
        let new_a = p.add_object_creation(s, "A");
        let m = p.add_method(c, "m");
        p.add_local_variable(m, "A", "a");
        let s = p.add_statement(m);
        let a_dot_bar = p.add_method_call(s, "bar", CallScope::Implicit);
        p.set_scope_expression(a_dot_bar, name("a"), Span::default());
        let unknown = p.add_method_call(s, "unknown", CallScope::Implicit);
        let util_call = p.add_method_call(s, "util", CallScope::Implicit);
        p.set_scope_expression(util_call, name("A"), Span::default());

        DispatchFixture {
            program: p,
            a_ctor,
            foo,
            a_bar,
            util,
            rec,
            b_bar,
            c_ctor,
            m,
            this_bar,
            rec_call,
            super_bar,
            new_a,
            a_dot_bar,
            unknown,
            util_call,
        }
    }

    #[test]
    fn test_vertices_cover_every_declaration() {
        let f = dispatch_fixture();
        let harness = Harness::new(&f.program);
        let graph = harness.built();
        assert_eq!(graph.vertex_count(), 8);
        for decl in [f.a_ctor, f.foo, f.a_bar, f.util, f.rec, f.b_bar, f.c_ctor, f.m] {
            assert_eq!(graph.vertex(decl).unwrap().declaration(), decl);
        }
    }

    #[test]
    fn test_vertices_include_nested_and_anonymous_declarations() {
        let mut p = Program::new();
        let unit = p.add_unit(CompilationUnit::source("Outer.java"));
        let outer = p.add_class(unit, "Outer", None);
        let inner = p.add_class(outer, "Inner", None);
        let deep = p.add_method(inner, "deep");
        let m = p.add_method(outer, "m");
        let s = p.add_statement(m);
        let anon = p.add_object_creation(s, "Runnable");
        let run = p.add_method(anon, "run");
        let local = p.add_class(m, "Local", None);
        let local_m = p.add_method(local, "m");

        let harness = Harness::new(&p);
        let graph = harness.built();
        assert_eq!(graph.vertex_count(), 4);
        for decl in [deep, m, run, local_m] {
            assert!(graph.vertex(decl).is_ok());
        }
        assert_eq!(graph.vertex(run).unwrap().owner_name(), Some("m"));
    }

    #[test]
    fn test_build_is_idempotent() {
        let f = dispatch_fixture();
        let harness = Harness::new(&f.program);
        let mut graph = harness.graph(CallGraphConfig::default());
        graph.build(f.program.units()).unwrap();
        let (vertices, edges, reports) = (graph.vertex_count(), graph.edge_count(), graph.reports().len());
        graph.build(f.program.units()).unwrap();
        assert!(graph.is_built());
        assert_eq!(graph.vertex_count(), vertices);
        assert_eq!(graph.edge_count(), edges);
        assert_eq!(graph.reports().len(), reports);
        assert_eq!(edges, 8);
    }

    #[test]
    fn test_this_call_reaches_every_override() {
        let f = dispatch_fixture();
        let harness = Harness::new(&f.program);
        let graph = harness.built();
        assert_eq!(targets_of(&graph, f.this_bar), vec![f.a_bar, f.b_bar]);
        assert_eq!(graph.callees_of(f.foo).unwrap(), vec![f.a_bar, f.b_bar]);
    }

    #[test]
    fn test_receiver_expression_dispatch() {
        let f = dispatch_fixture();
        let harness = Harness::new(&f.program);
        let graph = harness.built();
        assert_eq!(targets_of(&graph, f.a_dot_bar), vec![f.a_bar, f.b_bar]);
    }

    #[test]
    fn test_super_call_links_nearest_ancestor_only() {
        let f = dispatch_fixture();
        let harness = Harness::new(&f.program);
        let graph = harness.built();
        assert_eq!(targets_of(&graph, f.super_bar), vec![f.a_bar]);
    }

    #[test]
    fn test_static_call_single_edge() {
        let f = dispatch_fixture();
        let harness = Harness::new(&f.program);
        let graph = harness.built();
        assert_eq!(targets_of(&graph, f.util_call), vec![f.util]);
    }

    #[test]
    fn test_recursion_is_a_self_loop() {
        let f = dispatch_fixture();
        let harness = Harness::new(&f.program);
        let graph = harness.built();
        assert_eq!(graph.callees_of(f.rec).unwrap(), vec![f.rec]);
        assert_eq!(graph.callers_of(f.rec).unwrap(), vec![f.rec]);
        assert_eq!(graph.calls_from(f.rec).unwrap(), vec![f.rec_call]);
    }

    #[test]
    fn test_construction_site_links_constructor() {
        let f = dispatch_fixture();
        let harness = Harness::new(&f.program);
        let graph = harness.built();
        assert_eq!(targets_of(&graph, f.new_a), vec![f.a_ctor]);
        assert_eq!(graph.callers_of(f.a_ctor).unwrap(), vec![f.c_ctor]);
        let edges = graph.edges_to(f.a_ctor).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].edge.kind(), CallKind::ObjectCreation);
    }

    #[test]
    fn test_unresolved_call_is_reported_not_fatal() {
        let f = dispatch_fixture();
        let harness = Harness::new(&f.program);
        let graph = harness.built();
        assert!(targets_of(&graph, f.unknown).is_empty());
        let report = graph.reports().iter().find(|r| r.call == f.unknown).unwrap();
        assert_eq!(report.caller, Some(f.m));
        assert!(matches!(report.outcome, CallOutcome::Unresolved { .. }));

        let stats = graph.stats();
        assert_eq!(stats.call_sites, 7);
        assert_eq!(stats.linked, 6);
        assert_eq!(stats.unresolved, 1);
        assert_eq!(stats.edges, 8);
    }

    #[test]
    fn test_callers_of_callees_include_caller() {
        let f = dispatch_fixture();
        let harness = Harness::new(&f.program);
        let graph = harness.built();
        for vertex in graph.vertices() {
            let decl = vertex.declaration();
            for callee in graph.callees_of(decl).unwrap() {
                assert!(graph.callers_of(callee).unwrap().contains(&decl));
            }
        }
    }

    fn field_fixture() -> (Program, NodeId, NodeId, NodeId, NodeId, NodeId) {
        // class A { B b = new B(); static B s = new B(); { init(); } A() {} A(int x) {} void init() {} }
        // class B { B() {} }
        let mut p = Program::new();
        let unit = p.add_unit(CompilationUnit::source("Fields.java"));
        let a = p.add_class(unit, "A", None);
        let field = p.add_field(a, "B", "b", false);
        let in_field = p.add_object_creation(field, "B");
        let static_field = p.add_field(a, "B", "s", true);
        let in_static = p.add_object_creation(static_field, "B");
        let init_block = p.add_node(a, NodeKind::Initializer { is_static: false }, Span::default());
        p.add_method_call(init_block, "init", CallScope::Implicit);
        let c1 = p.add_constructor(a, &[]);
        let c2 = p.add_constructor(a, &[("int", "x")]);
        p.add_method(a, "init");
        let b = p.add_class(unit, "B", None);
        p.add_constructor(b, &[]);
        (p, in_field, in_static, c1, c2, b)
    }

    #[test]
    fn test_field_initializer_attributed_to_every_constructor() {
        let (p, in_field, in_static, c1, c2, b) = field_fixture();
        let harness = Harness::new(&p);
        let graph = harness.built();
        let b_ctor = p.constructors_of(b)[0];
        assert_eq!(graph.callers_of(b_ctor).unwrap(), vec![c1, c2]);
        assert_eq!(targets_of(&graph, in_field), vec![b_ctor, b_ctor]);

        let static_report = graph.reports().iter().find(|r| r.call == in_static).unwrap();
        assert_eq!(static_report.outcome, CallOutcome::TypeLevel);
        assert_eq!(graph.stats().type_level, 2);
    }

    #[test]
    fn test_field_attribution_can_be_disabled() {
        let (p, in_field, _, _, _, _) = field_fixture();
        let harness = Harness::new(&p);
        let config = CallGraphConfig {
            field_initializers_to_constructors: false,
            ..CallGraphConfig::default()
        };
        let mut graph = harness.graph(config);
        graph.build(p.units()).unwrap();
        assert!(targets_of(&graph, in_field).is_empty());
        assert_eq!(graph.stats().type_level, 3);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_context_free_call_is_illegal_state() {
        let mut p = Program::new();
        let unit = p.add_unit(CompilationUnit::source("Broken.java"));
        p.add_method_call(unit, "orphan", CallScope::Implicit);
        let harness = Harness::new(&p);
        let mut graph = harness.graph(CallGraphConfig::default());
        let err = graph.build(p.units()).unwrap_err();
        assert!(matches!(err, SlicerError::IllegalState(_)));
        assert!(!graph.is_built());
    }

    #[test]
    fn test_vertex_identity_across_views_of_a_file() {
        fn view(p: &mut Program) -> (NodeId, NodeId, NodeId) {
            let unit = p.add_unit(CompilationUnit::source("Same.java"));
            let a = p.add_class(unit, "A", None);
            p.set_span(a, Span::lines(1, 6));
            let caller = p.add_method(a, "caller");
            p.set_span(caller, Span::lines(2, 4));
            let s = p.add_statement(caller);
            p.set_span(s, Span::lines(3, 3));
            let call = p.add_method_call(s, "callee", CallScope::Implicit);
            p.set_span(call, Span::lines(3, 3));
            let callee = p.add_method(a, "callee");
            p.set_span(callee, Span::lines(5, 5));
            (caller, call, callee)
        }
        let mut p = Program::new();
        let (caller, call, callee) = view(&mut p);
        let (caller2, call2, callee2) = view(&mut p);
        let first = p.units()[0];

        let harness = Harness::new(&p);
        let mut graph = harness.graph(CallGraphConfig::default());
        graph.build(&[first]).unwrap();
        assert_eq!(graph.vertex_count(), 2);
        assert_eq!(graph.vertex(caller2).unwrap().declaration(), caller);
        assert_eq!(graph.callees_of(caller2).unwrap(), vec![callee]);
        assert_eq!(graph.callers_of(callee2).unwrap(), vec![caller]);
        assert_eq!(graph.call_targets(call2), vec![callee]);
        assert_eq!(graph.call_targets(call), vec![callee]);
    }

    /// Hierarchy that never finds a dispatch target.
    struct Hollow<'p>(ClassGraph<'p>);

    impl ClassHierarchy for Hollow<'_> {
        fn subclasses_of(&self, ty: NodeId) -> Vec<NodeId> {
            self.0.subclasses_of(ty)
        }
        fn parent_of(&self, ty: NodeId) -> Option<NodeId> {
            self.0.parent_of(ty)
        }
        fn overridden_by(&self, decl: NodeId) -> Vec<NodeId> {
            self.0.overridden_by(decl)
        }
        fn find_by_signature(&self, _: NodeId, _: NodeId) -> Option<NodeId> {
            None
        }
        fn lookup_by_signature(&self, signature: &QualifiedSignature) -> Option<NodeId> {
            self.0.lookup_by_signature(signature)
        }
    }

    #[test]
    fn test_zero_target_policy() {
        let f = dispatch_fixture();
        let harness = Harness::new(&f.program);
        let hollow = Hollow(ClassGraph::build(&f.program));

        let mut lenient = CallGraph::new(&f.program, &harness.resolver, &hollow, &harness.points);
        lenient.build(f.program.units()).unwrap();
        let report = lenient.reports().iter().find(|r| r.call == f.this_bar).unwrap();
        assert_eq!(report.outcome, CallOutcome::NoTargets);
        assert!(lenient.call_targets(f.this_bar).is_empty());
        // Implicit and static calls do not go through the signature search.
        assert_eq!(lenient.call_targets(f.rec_call), vec![f.rec]);

        let strict_config = CallGraphConfig {
            zero_target_policy: ZeroTargetPolicy::Strict,
            ..CallGraphConfig::default()
        };
        let mut strict = CallGraph::with_config(
            &f.program,
            &harness.resolver,
            &hollow,
            &harness.points,
            strict_config,
        );
        let err = strict.build(f.program.units()).unwrap_err();
        assert!(matches!(err, SlicerError::NoDispatchTargets(_)));
    }

    #[test]
    fn test_library_targets_go_through_signature_lookup() {
        let mut p = Program::new();
        let mut lib = CompilationUnit::source("lib/Base.java");
        lib.origin = UnitOrigin::Library;
        let lib = p.add_unit(lib);
        let base = p.add_class(lib, "Base", None);
        let base_ctor = p.add_constructor(base, &[]);
        let helper = p.add_callable(base, CallableDecl::method("helper").with_static(true));

        let unit = p.add_unit(CompilationUnit::source("App.java"));
        let app = p.add_class(unit, "App", Some("Base"));
        let ctor = p.add_constructor(app, &[]);
        let s = p.add_statement(ctor);
        let super_call = p.add_constructor_invocation(s, false);
        let m = p.add_method(app, "m");
        let s = p.add_statement(m);
        let helper_call = p.add_method_call(s, "helper", CallScope::Implicit);
        let creation = p.add_object_creation(s, "Base");

        let harness = Harness::new(&p);
        let graph = harness.built();
        assert_eq!(graph.call_targets(helper_call), vec![helper]);
        assert_eq!(graph.call_targets(creation), vec![base_ctor]);
        // Explicit constructor invocations need the declaration itself.
        assert!(graph.call_targets(super_call).is_empty());
        let report = graph.reports().iter().find(|r| r.call == super_call).unwrap();
        assert!(matches!(report.outcome, CallOutcome::Unresolved { .. }));
    }

    #[test]
    fn test_missing_program_point_drops_the_edge() {
        let mut p = Program::new();
        let unit = p.add_unit(CompilationUnit::source("A.java"));
        let a = p.add_class(unit, "A", None);
        let m = p.add_method(a, "m");
        let call = p.add_method_call(m, "m", CallScope::Implicit);

        let harness = Harness::new(&p);
        let graph = harness.built();
        assert_eq!(graph.edge_count(), 0);
        let report = &graph.reports()[0];
        assert_eq!(report.call, call);
        assert!(matches!(report.outcome, CallOutcome::Dropped { .. }));
    }

    #[test]
    fn test_edge_validation() {
        let f = dispatch_fixture();
        let harness = Harness::new(&f.program);
        let point = harness.points.containing_point(f.foo, f.this_bar).unwrap();
        assert!(Edge::new(&f.program, CallKind::MethodCall, f.this_bar, point).is_ok());
        assert!(matches!(
            Edge::new(&f.program, CallKind::ObjectCreation, f.this_bar, point),
            Err(SlicerError::IllegalState(_))
        ));
        assert!(matches!(
            Edge::new(&f.program, CallKind::MethodCall, f.rec_call, point),
            Err(SlicerError::ProgramPointNotFound { .. })
        ));
    }

    #[test]
    fn test_stats_serialize() {
        let f = dispatch_fixture();
        let harness = Harness::new(&f.program);
        let graph = harness.built();
        let json = serde_json::to_value(graph.stats()).unwrap();
        assert_eq!(json["vertices"], 8);
        let report = serde_json::to_value(&graph.reports()[0]).unwrap();
        assert_eq!(report["outcome"], "linked");
    }

    #[test]
    fn test_qualified_this_reaches_overrides_of_named_type() {
        let p = java(&[
            ("Outer.java", "class Outer { void f() {} class Inner { void g() { Outer.this.f(); } } }"),
            ("Sub.java", "class Sub extends Outer { void f() {} }"),
        ]);
        let harness = Harness::new(&p);
        let graph = harness.built();
        assert_eq!(
            graph.callees_of(callable(&p, "Inner.g")).unwrap(),
            vec![callable(&p, "Outer.f"), callable(&p, "Sub.f")]
        );
    }

    #[test]
    fn test_implicit_call_reaches_overriders() {
        let p = java(&[
            ("A.java", "class A { void run() { step(); } void step() {} }"),
            ("B.java", "class B extends A { void step() {} }"),
        ]);
        let harness = Harness::new(&p);
        let graph = harness.built();
        let run = callable(&p, "A.run");
        assert_eq!(
            graph.callees_of(run).unwrap(),
            vec![callable(&p, "A.step"), callable(&p, "B.step")]
        );
        assert_eq!(graph.edges_from(run).unwrap().len(), 2);
    }

    #[test]
    fn test_inherited_declaration_is_linked_once() {
        let p = java(&[
            ("A.java", "class A { void bar() {} void foo() { this.bar(); } }"),
            ("B.java", "class B extends A {}"),
            ("C.java", "class C extends B {}"),
            ("Use.java", "class Use { void use(B b) { b.bar(); } }"),
        ]);
        let harness = Harness::new(&p);
        let graph = harness.built();
        let bar = callable(&p, "A.bar");
        assert_eq!(graph.callees_of(callable(&p, "A.foo")).unwrap(), vec![bar]);
        assert_eq!(graph.callees_of(callable(&p, "Use.use")).unwrap(), vec![bar]);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_qualified_super_targets_named_type() {
        let p = java(&[
            ("I.java", "interface I { default void m() {} }"),
            ("P.java", "class P { void m() {} }"),
            ("C.java", "class C extends P implements I { void x() { I.super.m(); } void y() { super.m(); } }"),
            ("D.java", "class D implements I { void x() { I.super.m(); } }"),
            ("Outer.java", "class Outer extends P { void m() {} class Inner { void z() { Outer.super.m(); } } }"),
        ]);
        let harness = Harness::new(&p);
        let graph = harness.built();
        let i_m = callable(&p, "I.m");
        let p_m = callable(&p, "P.m");
        assert_eq!(graph.callees_of(callable(&p, "C.x")).unwrap(), vec![i_m]);
        assert_eq!(graph.callees_of(callable(&p, "C.y")).unwrap(), vec![p_m]);
        assert_eq!(graph.callees_of(callable(&p, "D.x")).unwrap(), vec![i_m]);
        assert_eq!(graph.callees_of(callable(&p, "Inner.z")).unwrap(), vec![p_m]);
        assert_eq!(graph.stats().unresolved, 0);
    }

    #[test]
    fn test_anonymous_body_in_field_initializer_linked_once() {
        let p = java(&[(
            "A.java",
            "class A { A() {} A(int x) {} \
             Runnable r = new Runnable() { public void run() { helper(); } }; \
             void helper() {} }",
        )]);
        let harness = Harness::new(&p);
        let graph = harness.built();
        let helper = callable(&p, "A.helper");
        let run = callable(&p, "A.run");
        assert_eq!(graph.callers_of(helper).unwrap(), vec![run]);
        assert_eq!(graph.calls_to(helper).unwrap(), calls_named(&p, run, "helper"));
        // `new Runnable()` once per constructor, `helper()` once.
        assert_eq!(graph.stats().call_sites, 3);
    }
}

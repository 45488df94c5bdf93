//! Arena-backed program model shared by the front end, the resolution
//! collaborators, and the call-graph builder.
//!
//! Every syntax node lives in a single `Program` arena and is addressed by a
//! copyable `NodeId`.  Nodes only hold the facts the analyses need: names,
//! modifiers, declared types, call scopes and source spans.  The Java front
//! end (`indexer::parser`) produces programs from source text; tests and
//! benchmarks build them directly through the `add_*` helpers.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers and spans
// ---------------------------------------------------------------------------

/// Stable index of a node inside its `Program`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Source range of a node. All-zero means "unknown" (synthetic nodes).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start_line: u32,
    pub end_line: u32,
    pub start_byte: u32,
    pub end_byte: u32,
}

impl Span {
    pub fn lines(start_line: u32, end_line: u32) -> Self {
        Self {
            start_line,
            end_line,
            start_byte: 0,
            end_byte: 0,
        }
    }

    pub fn is_unknown(&self) -> bool {
        *self == Span::default()
    }
}

// ---------------------------------------------------------------------------
// Node payloads
// ---------------------------------------------------------------------------

/// Where a compilation unit came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitOrigin {
    /// Project source: declarations are fully available to the resolver.
    Source,
    /// Structure ingested from a dependency (e.g. decompiled classes). The
    /// resolver only reports qualified signatures for these.
    Library,
}

#[derive(Clone, Debug)]
pub struct CompilationUnit {
    pub path: String,
    pub package: Option<String>,
    pub origin: UnitOrigin,
    pub content_hash: String,
}

impl CompilationUnit {
    pub fn source(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            package: None,
            origin: UnitOrigin::Source,
            content_hash: String::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Class,
    Interface,
    Enum,
    Record,
}

#[derive(Clone, Debug)]
pub struct TypeDecl {
    pub kind: TypeKind,
    pub name: String,
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallableKind {
    Method,
    Constructor,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub type_name: String,
}

#[derive(Clone, Debug)]
pub struct CallableDecl {
    pub kind: CallableKind,
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<String>,
    pub is_static: bool,
}

impl CallableDecl {
    pub fn method(name: impl Into<String>) -> Self {
        Self {
            kind: CallableKind::Method,
            name: name.into(),
            parameters: Vec::new(),
            return_type: Some("void".to_string()),
            is_static: false,
        }
    }

    pub fn constructor(name: impl Into<String>) -> Self {
        Self {
            kind: CallableKind::Constructor,
            name: name.into(),
            parameters: Vec::new(),
            return_type: None,
            is_static: false,
        }
    }

    pub fn with_parameter(mut self, type_name: &str, name: &str) -> Self {
        self.parameters.push(Parameter {
            name: name.to_string(),
            type_name: type_name.to_string(),
        });
        self
    }

    pub fn with_return_type(mut self, type_name: &str) -> Self {
        self.return_type = Some(type_name.to_string());
        self
    }

    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// Declaration signature, `name(T1, T2)`, with parameter types as written
    /// (whitespace collapsed).
    pub fn signature(&self) -> String {
        let types: Vec<String> = self
            .parameters
            .iter()
            .map(|p| collapse_whitespace(&p.type_name))
            .collect();
        format!("{}({})", self.name, types.join(", "))
    }
}

#[derive(Clone, Debug)]
pub struct FieldDecl {
    pub type_name: String,
    pub names: Vec<String>,
    pub is_static: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatementKind {
    LocalVariable { type_name: String, names: Vec<String> },
    /// Any other statement; holds the syntactic kind for diagnostics.
    Other(String),
}

/// Syntactic receiver of a method call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallScope {
    /// `foo()`
    Implicit,
    /// `this.foo()`
    This,
    /// `Outer.this.foo()`
    QualifiedThis(String),
    /// `super.foo()`
    Super,
    /// `T.super.foo()`, with `T` an enclosing class or a direct interface.
    QualifiedSuper(String),
    /// `expr.foo()`; the expression is a child node of the call.
    Expression(NodeId),
}

#[derive(Clone, Debug)]
pub struct MethodCall {
    pub name: String,
    pub scope: CallScope,
    pub arguments: Vec<NodeId>,
}

#[derive(Clone, Debug)]
pub struct ObjectCreation {
    pub type_name: String,
    pub arguments: Vec<NodeId>,
}

/// `this(...)` or `super(...)` as the first statement of a constructor.
#[derive(Clone, Debug)]
pub struct ConstructorInvocation {
    pub is_this: bool,
    pub arguments: Vec<NodeId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expression {
    Name(String),
    This,
    QualifiedThis(String),
    /// Field access; the object expression is the first child.
    FieldAccess(String),
    /// Cast to the given type; the operand is the first child.
    Cast(String),
    /// Literal of a known primitive or `String` type.
    Literal(String),
    Other,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Unit(CompilationUnit),
    Type(TypeDecl),
    Callable(CallableDecl),
    Field(FieldDecl),
    Initializer { is_static: bool },
    Statement(StatementKind),
    MethodCall(MethodCall),
    ObjectCreation(ObjectCreation),
    ConstructorInvocation(ConstructorInvocation),
    Expression(Expression),
}

impl NodeKind {
    pub fn is_call(&self) -> bool {
        matches!(
            self,
            NodeKind::MethodCall(_) | NodeKind::ObjectCreation(_) | NodeKind::ConstructorInvocation(_)
        )
    }

    fn label(&self) -> &'static str {
        match self {
            NodeKind::Unit(_) => "unit",
            NodeKind::Type(_) => "type",
            NodeKind::Callable(_) => "callable",
            NodeKind::Field(_) => "field",
            NodeKind::Initializer { .. } => "initializer",
            NodeKind::Statement(_) => "statement",
            NodeKind::MethodCall(_) => "method_call",
            NodeKind::ObjectCreation(_) => "object_creation",
            NodeKind::ConstructorInvocation(_) => "constructor_invocation",
            NodeKind::Expression(_) => "expression",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub span: Span,
}

// ---------------------------------------------------------------------------
// Qualified signatures
// ---------------------------------------------------------------------------

static PACKAGE_QUALIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:[a-z_][A-Za-z0-9_]*\.)+").unwrap());

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

fn collapse_whitespace(value: &str) -> String {
    WHITESPACE_RE.replace_all(value.trim(), " ").into_owned()
}

/// Drop generic arguments, package qualifiers and whitespace from a type
/// name: `java.util.List<String>` becomes `List`, `Map.Entry<K, V>[]`
/// becomes `Map.Entry[]`.
pub fn normalize_type_name(raw: &str) -> String {
    let mut depth = 0usize;
    let mut erased = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            c if depth == 0 && !c.is_whitespace() => erased.push(c),
            _ => {}
        }
    }
    PACKAGE_QUALIFIER_RE.replace_all(&erased, "").into_owned()
}

/// Last segment of a normalized type name, without array or varargs
/// suffixes: `Map.Entry[]` becomes `Entry`.
pub fn simple_type_name(raw: &str) -> String {
    let normalized = normalize_type_name(raw);
    let base = normalized.trim_end_matches("...").trim_end_matches("[]");
    base.rsplit('.').next().unwrap_or(base).to_string()
}

/// A declaration signature qualified by its owning type, as a resolver
/// reports it when the declaration body is not available.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedSignature {
    /// Qualified owner type, e.g. `com.acme.Outer.Inner`.
    pub owner: String,
    pub name: String,
    pub parameter_types: Vec<String>,
}

impl QualifiedSignature {
    /// Canonical lookup key: simple owner name, method name, and normalized
    /// parameter types.
    pub fn key(&self) -> String {
        let owner = self.owner.rsplit('.').next().unwrap_or(&self.owner);
        let params: Vec<String> = self
            .parameter_types
            .iter()
            .map(|t| normalize_type_name(t))
            .collect();
        format!("{}.{}({})", owner, self.name, params.join(","))
    }
}

impl fmt::Display for QualifiedSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}({})",
            self.owner,
            self.name,
            self.parameter_types.join(", ")
        )
    }
}

// ---------------------------------------------------------------------------
// Program arena
// ---------------------------------------------------------------------------

/// All compilation units of an analyzed program.
#[derive(Clone, Debug, Default)]
pub struct Program {
    nodes: Vec<Node>,
    units: Vec<NodeId>,
}

/// Iterator over the strict ancestors of a node, innermost first.
pub struct Ancestors<'p> {
    program: &'p Program,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.program.parent(current);
        Some(current)
    }
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Compilation units in insertion order.
    pub fn units(&self) -> &[NodeId] {
        &self.units
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.node(id).span
    }

    // -- construction -------------------------------------------------------

    fn push(&mut self, parent: Option<NodeId>, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            parent,
            children: Vec::new(),
            span,
        });
        if let Some(parent) = parent {
            self.nodes[parent.index()].children.push(id);
        }
        id
    }

    pub fn add_unit(&mut self, unit: CompilationUnit) -> NodeId {
        let id = self.push(None, NodeKind::Unit(unit), Span::default());
        self.units.push(id);
        id
    }

    pub fn add_node(&mut self, parent: NodeId, kind: NodeKind, span: Span) -> NodeId {
        self.push(Some(parent), kind, span)
    }

    pub fn set_span(&mut self, id: NodeId, span: Span) {
        self.nodes[id.index()].span = span;
    }

    pub fn add_type(
        &mut self,
        parent: NodeId,
        kind: TypeKind,
        name: &str,
        superclass: Option<&str>,
        interfaces: &[&str],
    ) -> NodeId {
        let decl = TypeDecl {
            kind,
            name: name.to_string(),
            superclass: superclass.map(str::to_string),
            interfaces: interfaces.iter().map(|i| i.to_string()).collect(),
        };
        self.push(Some(parent), NodeKind::Type(decl), Span::default())
    }

    pub fn add_class(&mut self, parent: NodeId, name: &str, superclass: Option<&str>) -> NodeId {
        self.add_type(parent, TypeKind::Class, name, superclass, &[])
    }

    pub fn add_callable(&mut self, owner: NodeId, decl: CallableDecl) -> NodeId {
        self.push(Some(owner), NodeKind::Callable(decl), Span::default())
    }

    /// Parameterless instance method returning `void`.
    pub fn add_method(&mut self, owner: NodeId, name: &str) -> NodeId {
        self.add_callable(owner, CallableDecl::method(name))
    }

    /// Constructor named after the owning type.
    pub fn add_constructor(&mut self, owner: NodeId, parameters: &[(&str, &str)]) -> NodeId {
        let name = self.simple_name(owner).unwrap_or_default().to_string();
        let mut decl = CallableDecl::constructor(name);
        for (type_name, param_name) in parameters {
            decl = decl.with_parameter(type_name, param_name);
        }
        self.add_callable(owner, decl)
    }

    pub fn add_field(&mut self, owner: NodeId, type_name: &str, name: &str, is_static: bool) -> NodeId {
        let decl = FieldDecl {
            type_name: type_name.to_string(),
            names: vec![name.to_string()],
            is_static,
        };
        self.push(Some(owner), NodeKind::Field(decl), Span::default())
    }

    pub fn add_statement(&mut self, parent: NodeId) -> NodeId {
        self.push(
            Some(parent),
            NodeKind::Statement(StatementKind::Other("expression_statement".to_string())),
            Span::default(),
        )
    }

    pub fn add_local_variable(&mut self, parent: NodeId, type_name: &str, name: &str) -> NodeId {
        let kind = StatementKind::LocalVariable {
            type_name: type_name.to_string(),
            names: vec![name.to_string()],
        };
        self.push(Some(parent), NodeKind::Statement(kind), Span::default())
    }

    pub fn add_method_call(&mut self, parent: NodeId, name: &str, scope: CallScope) -> NodeId {
        let call = MethodCall {
            name: name.to_string(),
            scope,
            arguments: Vec::new(),
        };
        self.push(Some(parent), NodeKind::MethodCall(call), Span::default())
    }

    pub fn add_object_creation(&mut self, parent: NodeId, type_name: &str) -> NodeId {
        let creation = ObjectCreation {
            type_name: type_name.to_string(),
            arguments: Vec::new(),
        };
        self.push(Some(parent), NodeKind::ObjectCreation(creation), Span::default())
    }

    pub fn add_constructor_invocation(&mut self, parent: NodeId, is_this: bool) -> NodeId {
        let invocation = ConstructorInvocation {
            is_this,
            arguments: Vec::new(),
        };
        self.push(
            Some(parent),
            NodeKind::ConstructorInvocation(invocation),
            Span::default(),
        )
    }

    /// Attach `expression` as the receiver of a method call and switch the
    /// call's scope to `CallScope::Expression`.
    pub fn set_scope_expression(&mut self, call: NodeId, expression: NodeKind, span: Span) -> NodeId {
        let expr = self.push(Some(call), expression, span);
        if let NodeKind::MethodCall(mc) = &mut self.nodes[call.index()].kind {
            mc.scope = CallScope::Expression(expr);
        }
        expr
    }

    /// Append an argument node to a call. Non-call parents just get a child.
    pub fn add_argument(&mut self, call: NodeId, argument: NodeKind, span: Span) -> NodeId {
        let arg = self.push(Some(call), argument, span);
        match &mut self.nodes[call.index()].kind {
            NodeKind::MethodCall(mc) => mc.arguments.push(arg),
            NodeKind::ObjectCreation(oc) => oc.arguments.push(arg),
            NodeKind::ConstructorInvocation(ci) => ci.arguments.push(arg),
            _ => {}
        }
        arg
    }

    // -- structural queries -------------------------------------------------

    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            program: self,
            next: self.parent(id),
        }
    }

    /// Whether `node` is `container` or lies beneath it.
    pub fn contains(&self, container: NodeId, node: NodeId) -> bool {
        node == container || self.ancestors(node).any(|a| a == container)
    }

    /// Pre-order listing of `root` and everything beneath it.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    pub fn unit_of(&self, id: NodeId) -> Option<NodeId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|a| matches!(self.kind(*a), NodeKind::Unit(_)))
    }

    pub fn unit(&self, id: NodeId) -> Option<&CompilationUnit> {
        match self.kind(self.unit_of(id)?) {
            NodeKind::Unit(unit) => Some(unit),
            _ => None,
        }
    }

    pub fn type_decl(&self, id: NodeId) -> Option<&TypeDecl> {
        match self.get(id).map(|n| &n.kind) {
            Some(NodeKind::Type(decl)) => Some(decl),
            _ => None,
        }
    }

    pub fn callable(&self, id: NodeId) -> Option<&CallableDecl> {
        match self.get(id).map(|n| &n.kind) {
            Some(NodeKind::Callable(decl)) => Some(decl),
            _ => None,
        }
    }

    pub fn is_type(&self, id: NodeId) -> bool {
        self.type_decl(id).is_some()
    }

    pub fn is_callable(&self, id: NodeId) -> bool {
        self.callable(id).is_some()
    }

    /// Nearest type declaration strictly above `id`.
    pub fn enclosing_type(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id).find(|a| self.is_type(*a))
    }

    /// Type declarations strictly above `id`, innermost first.
    pub fn enclosing_types(&self, id: NodeId) -> Vec<NodeId> {
        self.ancestors(id).filter(|a| self.is_type(*a)).collect()
    }

    /// Nearest method or constructor strictly above `id`.
    pub fn enclosing_callable(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id).find(|a| self.is_callable(*a))
    }

    /// Simple name of a type or callable declaration.
    pub fn simple_name(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Type(decl) => Some(&decl.name),
            NodeKind::Callable(decl) => Some(&decl.name),
            _ => None,
        }
    }

    /// Innermost ancestor carrying a simple name.
    pub fn nearest_named_ancestor(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id).find(|a| self.simple_name(*a).is_some())
    }

    pub fn signature(&self, id: NodeId) -> Option<String> {
        self.callable(id).map(CallableDecl::signature)
    }

    /// `package.Outer.Inner` for a type declaration.
    pub fn qualified_type_name(&self, ty: NodeId) -> String {
        let mut segments: Vec<&str> = std::iter::once(ty)
            .chain(self.ancestors(ty))
            .filter_map(|a| self.type_decl(a).map(|d| d.name.as_str()))
            .collect();
        segments.reverse();
        let nested = segments.join(".");
        match self.unit(ty).and_then(|u| u.package.as_deref()) {
            Some(package) if !package.is_empty() => format!("{package}.{nested}"),
            _ => nested,
        }
    }

    pub fn qualified_signature(&self, decl: NodeId) -> Option<QualifiedSignature> {
        let callable = self.callable(decl)?;
        let owner = self.enclosing_type(decl)?;
        Some(QualifiedSignature {
            owner: self.qualified_type_name(owner),
            name: callable.name.clone(),
            parameter_types: callable
                .parameters
                .iter()
                .map(|p| collapse_whitespace(&p.type_name))
                .collect(),
        })
    }

    fn members_where(&self, ty: NodeId, kind: CallableKind) -> Vec<NodeId> {
        self.children(ty)
            .iter()
            .copied()
            .filter(|c| self.callable(*c).map(|d| d.kind) == Some(kind))
            .collect()
    }

    pub fn constructors_of(&self, ty: NodeId) -> Vec<NodeId> {
        self.members_where(ty, CallableKind::Constructor)
    }

    pub fn methods_of(&self, ty: NodeId) -> Vec<NodeId> {
        self.members_where(ty, CallableKind::Method)
    }

    pub fn fields_of(&self, ty: NodeId) -> Vec<NodeId> {
        self.children(ty)
            .iter()
            .copied()
            .filter(|c| matches!(self.kind(*c), NodeKind::Field(_)))
            .collect()
    }

    /// Argument nodes of a call expression; empty for any other node.
    pub fn call_arguments(&self, call: NodeId) -> &[NodeId] {
        match self.kind(call) {
            NodeKind::MethodCall(mc) => &mc.arguments,
            NodeKind::ObjectCreation(oc) => &oc.arguments,
            NodeKind::ConstructorInvocation(ci) => &ci.arguments,
            _ => &[],
        }
    }

    /// Node equality that also accepts the same syntax seen through another
    /// view of the same file: same unit path, same span, same node kind.
    pub fn equals_with_range(&self, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return true;
        }
        let (span_a, span_b) = (self.span(a), self.span(b));
        if span_a.is_unknown() || span_a != span_b {
            return false;
        }
        if self.kind(a).label() != self.kind(b).label() {
            return false;
        }
        match (self.unit(a), self.unit(b)) {
            (Some(ua), Some(ub)) => ua.path == ub.path,
            _ => false,
        }
    }

    /// Short human-readable description used in logs and error messages.
    pub fn describe(&self, id: NodeId) -> String {
        match self.get(id).map(|n| &n.kind) {
            None => format!("<unknown node {id}>"),
            Some(NodeKind::Unit(unit)) => unit.path.clone(),
            Some(NodeKind::Type(_)) => self.qualified_type_name(id),
            Some(NodeKind::Callable(decl)) => match self.enclosing_type(id) {
                Some(owner) => format!("{}.{}", self.qualified_type_name(owner), decl.signature()),
                None => decl.signature(),
            },
            Some(NodeKind::MethodCall(mc)) => {
                format!("{}(..)@{}", mc.name, self.span(id).start_line)
            }
            Some(NodeKind::ObjectCreation(oc)) => {
                format!("new {}(..)@{}", oc.type_name, self.span(id).start_line)
            }
            Some(NodeKind::ConstructorInvocation(ci)) => {
                let target = if ci.is_this { "this" } else { "super" };
                format!("{target}(..)@{}", self.span(id).start_line)
            }
            Some(other) => format!("{}{}@{}", other.label(), id, self.span(id).start_line),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Symbol resolution for call expressions.
//!
//! `Resolver` is the contract the call-graph builder consumes. `SymbolResolver`
//! implements it over the program model by name and arity: implicit calls are
//! looked up in the enclosing types (innermost first) and their ancestry,
//! qualified calls in the static type of their receiver. Overloads with the
//! same arity are ranked by how many argument types match the declared
//! parameter types. Declarations that live in library units are reported as
//! qualified signatures only, the way a resolver backed by compiled
//! dependencies would report them.

use crate::errors::{SlicerError, SlicerResult};
use crate::indexer::hierarchy::{qualified_super_root, ClassGraph, ClassHierarchy};
use crate::models::{
    simple_type_name, CallScope, CallableKind, Expression, NodeId, NodeKind, Program,
    QualifiedSignature, StatementKind, UnitOrigin,
};

/// Outcome of resolving a call expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// The declaration, with its body available in the program.
    Declaration(NodeId),
    /// Only the qualified signature of the target is known.
    Signature(QualifiedSignature),
}

pub trait Resolver {
    /// Statically resolve a method call, object creation or explicit
    /// constructor invocation.
    fn resolve(&self, call: NodeId) -> SlicerResult<Resolution>;

    /// Resolve a type name as written at `context` (used for `T.this`).
    fn resolve_type_name(&self, context: NodeId, name: &str) -> SlicerResult<NodeId>;

    /// Static type of an expression node.
    fn static_type(&self, expr: NodeId) -> SlicerResult<NodeId>;
}

fn unresolved(message: String) -> SlicerError {
    SlicerError::Unresolved(message)
}

/// Name/arity resolver backed by a `ClassGraph`.
pub struct SymbolResolver<'p> {
    program: &'p Program,
    classes: ClassGraph<'p>,
}

impl<'p> SymbolResolver<'p> {
    pub fn new(classes: ClassGraph<'p>) -> Self {
        Self {
            program: classes.program(),
            classes,
        }
    }

    /// The class graph the resolver searches; it doubles as the hierarchy
    /// oracle for the call graph.
    pub fn hierarchy(&self) -> &ClassGraph<'p> {
        &self.classes
    }

    fn report(&self, decl: NodeId) -> SlicerResult<Resolution> {
        let library = self
            .program
            .unit(decl)
            .is_some_and(|u| u.origin == UnitOrigin::Library);
        if !library {
            return Ok(Resolution::Declaration(decl));
        }
        self.program
            .qualified_signature(decl)
            .map(Resolution::Signature)
            .ok_or_else(|| unresolved(format!("No signature for {}", self.program.describe(decl))))
    }

    fn enclosing_type(&self, node: NodeId) -> SlicerResult<NodeId> {
        self.program
            .enclosing_type(node)
            .ok_or_else(|| unresolved(format!("{} has no enclosing type", self.program.describe(node))))
    }

    // -- overload selection -------------------------------------------------

    /// Simple type name of an argument, when it can be derived.
    fn argument_type(&self, arg: NodeId) -> Option<String> {
        match self.program.kind(arg) {
            NodeKind::Expression(Expression::Literal(type_name)) => Some(type_name.clone()),
            NodeKind::Expression(Expression::Name(name)) => self
                .variable_type(arg, name)
                .map(|(type_name, _)| simple_type_name(&type_name)),
            _ => self
                .static_type(arg)
                .ok()
                .and_then(|ty| self.program.simple_name(ty).map(str::to_string)),
        }
    }

    fn best_candidate(&self, candidates: Vec<NodeId>, call: NodeId) -> Option<NodeId> {
        if candidates.len() <= 1 {
            return candidates.into_iter().next();
        }
        let arg_types: Vec<Option<String>> = self
            .program
            .call_arguments(call)
            .iter()
            .map(|a| self.argument_type(*a))
            .collect();
        let score = |decl: &NodeId| -> usize {
            self.program.callable(*decl).map_or(0, |c| {
                c.parameters
                    .iter()
                    .zip(&arg_types)
                    .filter(|(p, a)| a.as_deref() == Some(simple_type_name(&p.type_name).as_str()))
                    .count()
            })
        };
        // Stable: the first declared overload wins ties.
        let mut best: Option<(NodeId, usize)> = None;
        for candidate in candidates {
            let s = score(&candidate);
            if best.map_or(true, |(_, b)| s > b) {
                best = Some((candidate, s));
            }
        }
        best.map(|(decl, _)| decl)
    }

    fn find_in_ancestry(&self, ty: NodeId, name: &str, call: NodeId) -> Option<NodeId> {
        let arity = self.program.call_arguments(call).len();
        self.classes.ancestry(ty).into_iter().find_map(|t| {
            let candidates: Vec<NodeId> = self
                .program
                .methods_of(t)
                .into_iter()
                .filter(|m| {
                    self.program
                        .callable(*m)
                        .is_some_and(|c| c.name == name && c.arity() == arity)
                })
                .collect();
            self.best_candidate(candidates, call)
        })
    }

    fn find_constructor(&self, ty: NodeId, call: NodeId) -> Option<NodeId> {
        let arity = self.program.call_arguments(call).len();
        let candidates: Vec<NodeId> = self
            .program
            .constructors_of(ty)
            .into_iter()
            .filter(|c| self.program.callable(*c).is_some_and(|d| d.arity() == arity))
            .collect();
        self.best_candidate(candidates, call)
    }

    // -- per call kind ------------------------------------------------------

    fn resolve_method_call(&self, call: NodeId, name: &str, scope: &CallScope) -> SlicerResult<Resolution> {
        let roots: Vec<NodeId> = match scope {
            CallScope::Implicit => self.program.enclosing_types(call),
            CallScope::This => vec![self.enclosing_type(call)?],
            CallScope::QualifiedThis(type_name) => vec![self.resolve_type_name(call, type_name)?],
            CallScope::Super => {
                let current = self.enclosing_type(call)?;
                let parent = self.classes.parent_of(current).ok_or_else(|| {
                    unresolved(format!("No parent found for {}", self.program.describe(current)))
                })?;
                vec![parent]
            }
            CallScope::QualifiedSuper(type_name) => {
                let named = self.resolve_type_name(call, type_name)?;
                let root = qualified_super_root(self.program, &self.classes, named).ok_or_else(|| {
                    unresolved(format!("No parent found for {}", self.program.describe(named)))
                })?;
                vec![root]
            }
            CallScope::Expression(expr) => vec![self.static_type(*expr)?],
        };
        roots
            .into_iter()
            .find_map(|root| self.find_in_ancestry(root, name, call))
            .ok_or_else(|| unresolved(format!("No declaration for {}", self.program.describe(call))))
            .and_then(|decl| self.report(decl))
    }

    fn resolve_creation(&self, call: NodeId, type_name: &str) -> SlicerResult<Resolution> {
        let ty = self.resolve_type_name(call, type_name)?;
        let ctor = self.find_constructor(ty, call).ok_or_else(|| {
            unresolved(format!("No constructor of {} matches {}", type_name, self.program.describe(call)))
        })?;
        self.report(ctor)
    }

    fn resolve_explicit_invocation(&self, call: NodeId, is_this: bool) -> SlicerResult<Resolution> {
        let current = self.enclosing_type(call)?;
        let ty = if is_this {
            current
        } else {
            self.classes.parent_of(current).ok_or_else(|| {
                unresolved(format!("No parent found for {}", self.program.describe(current)))
            })?
        };
        let ctor = self.find_constructor(ty, call).ok_or_else(|| {
            unresolved(format!("No constructor matches {}", self.program.describe(call)))
        })?;
        self.report(ctor)
    }

    // -- variables ----------------------------------------------------------

    /// Declared type of a variable visible at `at`, with the node the type
    /// name should be resolved from. Looks at locals and parameters of the
    /// enclosing callables, then at fields of the enclosing types and their
    /// ancestry.
    fn variable_type(&self, at: NodeId, name: &str) -> Option<(String, NodeId)> {
        for ancestor in self.program.ancestors(at) {
            match self.program.kind(ancestor) {
                NodeKind::Callable(decl) => {
                    let local = self.program.descendants(ancestor).into_iter().find_map(|d| {
                        match self.program.kind(d) {
                            NodeKind::Statement(StatementKind::LocalVariable { type_name, names })
                                if names.iter().any(|n| n == name) =>
                            {
                                Some(type_name.clone())
                            }
                            _ => None,
                        }
                    });
                    if let Some(type_name) = local {
                        return Some((type_name, ancestor));
                    }
                    if let Some(param) = decl.parameters.iter().find(|p| p.name == name) {
                        return Some((param.type_name.clone(), ancestor));
                    }
                }
                NodeKind::Type(_) => {
                    for ty in self.classes.ancestry(ancestor) {
                        if let Some(type_name) = self.field_type(ty, name) {
                            return Some((type_name, ty));
                        }
                    }
                }
                _ => {}
            }
        }
        None
    }

    fn field_type(&self, ty: NodeId, name: &str) -> Option<String> {
        self.program.fields_of(ty).into_iter().find_map(|f| match self.program.kind(f) {
            NodeKind::Field(field) if field.names.iter().any(|n| n == name) => Some(field.type_name.clone()),
            _ => None,
        })
    }
}

impl Resolver for SymbolResolver<'_> {
    fn resolve(&self, call: NodeId) -> SlicerResult<Resolution> {
        match self.program.kind(call) {
            NodeKind::MethodCall(mc) => self.resolve_method_call(call, &mc.name, &mc.scope),
            NodeKind::ObjectCreation(oc) => self.resolve_creation(call, &oc.type_name),
            NodeKind::ConstructorInvocation(ci) => self.resolve_explicit_invocation(call, ci.is_this),
            _ => Err(unresolved(format!("{} is not a call", self.program.describe(call)))),
        }
    }

    fn resolve_type_name(&self, context: NodeId, name: &str) -> SlicerResult<NodeId> {
        self.classes
            .resolve_type_name(context, name)
            .ok_or_else(|| unresolved(format!("Type {name} is not declared in the program")))
    }

    fn static_type(&self, expr: NodeId) -> SlicerResult<NodeId> {
        match self.program.kind(expr) {
            NodeKind::Expression(Expression::Name(name)) => match self.variable_type(expr, name) {
                Some((type_name, context)) => self.resolve_type_name(context, &type_name),
                // Not a variable: a type name used as the receiver of a static call.
                None => self.resolve_type_name(expr, name),
            },
            NodeKind::Expression(Expression::This) => self.enclosing_type(expr),
            NodeKind::Expression(Expression::QualifiedThis(name)) => self.resolve_type_name(expr, name),
            NodeKind::Expression(Expression::FieldAccess(field)) => {
                let object = self.program.children(expr).first().copied().ok_or_else(|| {
                    unresolved(format!("Field access {field} without object"))
                })?;
                let owner = self.static_type(object)?;
                let type_name = self
                    .classes
                    .ancestry(owner)
                    .into_iter()
                    .find_map(|t| self.field_type(t, field).map(|ty| (ty, t)));
                match type_name {
                    Some((type_name, context)) => self.resolve_type_name(context, &type_name),
                    None => Err(unresolved(format!(
                        "Field {field} not found in {}",
                        self.program.describe(owner)
                    ))),
                }
            }
            NodeKind::Expression(Expression::Cast(type_name))
            | NodeKind::Expression(Expression::Literal(type_name)) => self.resolve_type_name(expr, type_name),
            NodeKind::ObjectCreation(oc) => self.resolve_type_name(expr, &oc.type_name),
            NodeKind::MethodCall(_) => match self.resolve(expr)? {
                Resolution::Declaration(decl) => {
                    let callable = self.program.callable(decl).ok_or_else(|| {
                        unresolved(format!("{} is not callable", self.program.describe(decl)))
                    })?;
                    match (&callable.kind, &callable.return_type) {
                        (CallableKind::Method, Some(ret)) => self.resolve_type_name(decl, ret),
                        _ => Err(unresolved(format!(
                            "{} has no return type",
                            self.program.describe(decl)
                        ))),
                    }
                }
                Resolution::Signature(sig) => Err(unresolved(format!(
                    "Return type of {sig} is not available"
                ))),
            },
            _ => Err(unresolved(format!(
                "Cannot compute the type of {}",
                self.program.describe(expr)
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CallableDecl, CompilationUnit, Span};

    fn name_expr(name: &str) -> NodeKind {
        NodeKind::Expression(Expression::Name(name.to_string()))
    }

    #[test]
    fn test_implicit_call_finds_inherited_method() {
        let mut program = Program::new();
        let unit = program.add_unit(CompilationUnit::source("A.java"));
        let base = program.add_class(unit, "Base", None);
        let helper = program.add_method(base, "helper");
        let derived = program.add_class(unit, "Derived", Some("Base"));
        let run = program.add_method(derived, "run");
        let stmt = program.add_statement(run);
        let call = program.add_method_call(stmt, "helper", CallScope::Implicit);

        let resolver = SymbolResolver::new(ClassGraph::build(&program));
        assert_eq!(resolver.resolve(call).unwrap(), Resolution::Declaration(helper));
    }

    #[test]
    fn test_implicit_call_searches_outer_types() {
        let mut program = Program::new();
        let unit = program.add_unit(CompilationUnit::source("Outer.java"));
        let outer = program.add_class(unit, "Outer", None);
        let log = program.add_method(outer, "log");
        let inner = program.add_class(outer, "Inner", None);
        let work = program.add_method(inner, "work");
        let stmt = program.add_statement(work);
        let call = program.add_method_call(stmt, "log", CallScope::Implicit);

        let resolver = SymbolResolver::new(ClassGraph::build(&program));
        assert_eq!(resolver.resolve(call).unwrap(), Resolution::Declaration(log));
    }

    #[test]
    fn test_receiver_static_type_from_local_variable() {
        let mut program = Program::new();
        let unit = program.add_unit(CompilationUnit::source("App.java"));
        let repo = program.add_class(unit, "Repo", None);
        let save = program.add_method(repo, "save");
        let app = program.add_class(unit, "App", None);
        let main = program.add_method(app, "main");
        program.add_local_variable(main, "Repo", "repo");
        let stmt = program.add_statement(main);
        let call = program.add_method_call(stmt, "save", CallScope::Implicit);
        let receiver = program.set_scope_expression(call, name_expr("repo"), Span::default());

        let resolver = SymbolResolver::new(ClassGraph::build(&program));
        assert_eq!(resolver.static_type(receiver).unwrap(), repo);
        assert_eq!(resolver.resolve(call).unwrap(), Resolution::Declaration(save));
    }

    #[test]
    fn test_static_type_from_inherited_field_and_type_name() {
        let mut program = Program::new();
        let unit = program.add_unit(CompilationUnit::source("A.java"));
        let util = program.add_class(unit, "Util", None);
        let base = program.add_class(unit, "Base", None);
        program.add_field(base, "Util", "util", false);
        let derived = program.add_class(unit, "Derived", Some("Base"));
        let m = program.add_method(derived, "m");
        let stmt = program.add_statement(m);
        let first = program.add_method_call(stmt, "a", CallScope::Implicit);
        let via_field = program.set_scope_expression(first, name_expr("util"), Span::default());
        let second = program.add_method_call(stmt, "b", CallScope::Implicit);
        let via_type = program.set_scope_expression(second, name_expr("Util"), Span::default());

        let resolver = SymbolResolver::new(ClassGraph::build(&program));
        assert_eq!(resolver.static_type(via_field).unwrap(), util);
        assert_eq!(resolver.static_type(via_type).unwrap(), util);
    }

    #[test]
    fn test_overload_selection_by_argument_type() {
        let mut program = Program::new();
        let unit = program.add_unit(CompilationUnit::source("P.java"));
        let printer = program.add_class(unit, "Printer", None);
        let print_int = program.add_callable(printer, CallableDecl::method("print").with_parameter("int", "v"));
        let print_str = program.add_callable(printer, CallableDecl::method("print").with_parameter("String", "v"));
        let go = program.add_method(printer, "go");
        let stmt = program.add_statement(go);
        let call = program.add_method_call(stmt, "print", CallScope::This);
        program.add_argument(
            call,
            NodeKind::Expression(Expression::Literal("String".to_string())),
            Span::default(),
        );
        let other = program.add_method_call(stmt, "print", CallScope::This);
        program.add_argument(
            other,
            NodeKind::Expression(Expression::Literal("int".to_string())),
            Span::default(),
        );

        let resolver = SymbolResolver::new(ClassGraph::build(&program));
        assert_eq!(resolver.resolve(call).unwrap(), Resolution::Declaration(print_str));
        assert_eq!(resolver.resolve(other).unwrap(), Resolution::Declaration(print_int));
    }

    #[test]
    fn test_constructor_resolution() {
        let mut program = Program::new();
        let unit = program.add_unit(CompilationUnit::source("A.java"));
        let base = program.add_class(unit, "Base", None);
        let base_ctor = program.add_constructor(base, &[("int", "x")]);
        let derived = program.add_class(unit, "Derived", Some("Base"));
        let derived_ctor = program.add_constructor(derived, &[]);
        let stmt = program.add_statement(derived_ctor);
        let sup = program.add_constructor_invocation(stmt, false);
        program.add_argument(
            sup,
            NodeKind::Expression(Expression::Literal("int".to_string())),
            Span::default(),
        );
        let creation = program.add_object_creation(stmt, "Derived");
        let missing = program.add_object_creation(stmt, "java.util.ArrayList<String>");

        let resolver = SymbolResolver::new(ClassGraph::build(&program));
        assert_eq!(resolver.resolve(sup).unwrap(), Resolution::Declaration(base_ctor));
        assert_eq!(resolver.resolve(creation).unwrap(), Resolution::Declaration(derived_ctor));
        assert!(matches!(resolver.resolve(missing), Err(SlicerError::Unresolved(_))));
    }

    #[test]
    fn test_library_declarations_resolve_to_signatures() {
        let mut program = Program::new();
        let mut lib = CompilationUnit::source("lib/Codec.java");
        lib.origin = UnitOrigin::Library;
        lib.package = Some("org.lib".to_string());
        let lib = program.add_unit(lib);
        let codec = program.add_class(lib, "Codec", None);
        program.add_callable(
            codec,
            CallableDecl::method("encode")
                .with_parameter("String", "s")
                .with_static(true),
        );
        let unit = program.add_unit(CompilationUnit::source("App.java"));
        let app = program.add_class(unit, "App", None);
        let main = program.add_method(app, "main");
        let stmt = program.add_statement(main);
        let call = program.add_method_call(stmt, "encode", CallScope::Implicit);
        program.set_scope_expression(call, name_expr("Codec"), Span::default());
        program.add_argument(
            call,
            NodeKind::Expression(Expression::Literal("String".to_string())),
            Span::default(),
        );

        let resolver = SymbolResolver::new(ClassGraph::build(&program));
        match resolver.resolve(call).unwrap() {
            Resolution::Signature(sig) => {
                assert_eq!(sig.to_string(), "org.lib.Codec.encode(String)");
            }
            other => panic!("expected a signature, got {other:?}"),
        }
    }

    #[test]
    fn test_super_call_without_parent_fails() {
        let mut program = Program::new();
        let unit = program.add_unit(CompilationUnit::source("A.java"));
        let a = program.add_class(unit, "A", Some("java.lang.Thread"));
        let run = program.add_method(a, "run");
        let stmt = program.add_statement(run);
        let call = program.add_method_call(stmt, "run", CallScope::Super);

        let resolver = SymbolResolver::new(ClassGraph::build(&program));
        assert!(matches!(resolver.resolve(call), Err(SlicerError::Unresolved(_))));
    }
}

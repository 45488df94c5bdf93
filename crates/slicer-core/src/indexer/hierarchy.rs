//! Class hierarchy oracle consumed by dispatch resolution.
//!
//! `ClassHierarchy` is the contract the call-graph builder depends on;
//! `ClassGraph` answers it from the declarations of a `Program`, resolving
//! `extends`/`implements` clauses by simple type name.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexSet;
use tracing::debug;

use crate::models::{simple_type_name, NodeId, NodeKind, Program, QualifiedSignature, TypeKind};

pub trait ClassHierarchy {
    /// `ty` and every type that transitively extends or implements it.
    fn subclasses_of(&self, ty: NodeId) -> Vec<NodeId>;

    /// Direct superclass of `ty`, when declared in the program.
    fn parent_of(&self, ty: NodeId) -> Option<NodeId>;

    /// `decl` and every method that overrides it in a subtype of its owner.
    fn overridden_by(&self, decl: NodeId) -> Vec<NodeId>;

    /// The declaration with the signature of `decl` that an instance of `ty`
    /// would execute: `ty` itself, then its superclass chain, then interfaces.
    fn find_by_signature(&self, ty: NodeId, decl: NodeId) -> Option<NodeId>;

    /// Declaration matching a qualified signature reported by the resolver.
    fn lookup_by_signature(&self, signature: &QualifiedSignature) -> Option<NodeId>;
}

/// Type a `T.super.m()` call starts its search from: `T` itself when it is
/// an interface, otherwise the superclass of the class `T`.
pub fn qualified_super_root(
    program: &Program,
    hierarchy: &dyn ClassHierarchy,
    named: NodeId,
) -> Option<NodeId> {
    match program.type_decl(named)?.kind {
        TypeKind::Interface => Some(named),
        _ => hierarchy.parent_of(named),
    }
}

/// Hierarchy built from the type declarations of every unit in a program,
/// library units included.
pub struct ClassGraph<'p> {
    program: &'p Program,
    types_by_name: HashMap<String, Vec<NodeId>>,
    supertypes: HashMap<NodeId, Vec<NodeId>>,
    subtypes: HashMap<NodeId, Vec<NodeId>>,
    by_signature: HashMap<String, NodeId>,
}

impl<'p> ClassGraph<'p> {
    pub fn build(program: &'p Program) -> Self {
        let mut graph = ClassGraph {
            program,
            types_by_name: HashMap::new(),
            supertypes: HashMap::new(),
            subtypes: HashMap::new(),
            by_signature: HashMap::new(),
        };

        let mut types = Vec::new();
        for &unit in program.units() {
            for id in program.descendants(unit) {
                match program.kind(id) {
                    NodeKind::Type(decl) => {
                        graph
                            .types_by_name
                            .entry(decl.name.clone())
                            .or_default()
                            .push(id);
                        types.push(id);
                    }
                    NodeKind::Callable(_) => {
                        if let Some(qsig) = program.qualified_signature(id) {
                            graph.by_signature.entry(qsig.key()).or_insert(id);
                        }
                    }
                    _ => {}
                }
            }
        }

        for &ty in &types {
            let Some(decl) = program.type_decl(ty) else {
                continue;
            };
            let declared = decl.superclass.iter().chain(decl.interfaces.iter());
            let mut supers = Vec::new();
            for name in declared {
                match graph.resolve_type_name(ty, name) {
                    Some(sup) if sup != ty => {
                        supers.push(sup);
                        graph.subtypes.entry(sup).or_default().push(ty);
                    }
                    _ => debug!(
                        "Supertype {} of {} is not declared in the program",
                        name,
                        program.describe(ty)
                    ),
                }
            }
            graph.supertypes.insert(ty, supers);
        }

        graph
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    /// Type declarations with the given simple name.
    pub fn types_named(&self, name: &str) -> &[NodeId] {
        self.types_by_name
            .get(&simple_type_name(name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Resolve a type name as written at `context` to a declaration.
    ///
    /// Ambiguous simple names prefer a type nested in (or enclosing) the
    /// context, then one in the same unit, then one in the same package.
    pub fn resolve_type_name(&self, context: NodeId, name: &str) -> Option<NodeId> {
        let candidates = self.types_named(name);
        match candidates {
            [] => None,
            [only] => Some(*only),
            _ => {
                let program = self.program;
                let enclosing: HashSet<NodeId> = std::iter::once(context)
                    .chain(program.ancestors(context))
                    .collect();
                let nested = candidates.iter().find(|c| {
                    program
                        .parent(**c)
                        .is_some_and(|p| enclosing.contains(&p) || enclosing.contains(*c))
                });
                if let Some(found) = nested {
                    return Some(*found);
                }
                let unit = program.unit_of(context);
                if let Some(found) = candidates.iter().find(|c| program.unit_of(**c) == unit) {
                    return Some(*found);
                }
                let package = program.unit(context).and_then(|u| u.package.clone());
                candidates
                    .iter()
                    .find(|c| program.unit(**c).and_then(|u| u.package.clone()) == package)
                    .or_else(|| candidates.first())
                    .copied()
            }
        }
    }

    /// Direct supertypes, superclass first.
    pub fn supertypes_of(&self, ty: NodeId) -> &[NodeId] {
        self.supertypes.get(&ty).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `ty`, its superclass chain, then every interface reachable from any
    /// of them, breadth first.
    pub fn ancestry(&self, ty: NodeId) -> Vec<NodeId> {
        let mut order: IndexSet<NodeId> = IndexSet::new();
        let mut current = Some(ty);
        while let Some(t) = current {
            if !order.insert(t) {
                break;
            }
            current = self.parent_of(t);
        }

        let mut queue: VecDeque<NodeId> = order.iter().copied().collect();
        while let Some(t) = queue.pop_front() {
            for &sup in self.supertypes_of(t) {
                if order.insert(sup) {
                    queue.push_back(sup);
                }
            }
        }
        order.into_iter().collect()
    }

    fn method_with_signature(&self, ty: NodeId, signature: &str) -> Option<NodeId> {
        self.program
            .methods_of(ty)
            .into_iter()
            .find(|m| self.program.signature(*m).as_deref() == Some(signature))
    }
}

impl ClassHierarchy for ClassGraph<'_> {
    fn subclasses_of(&self, ty: NodeId) -> Vec<NodeId> {
        let mut seen: IndexSet<NodeId> = IndexSet::new();
        let mut queue = VecDeque::from([ty]);
        while let Some(t) = queue.pop_front() {
            if !seen.insert(t) {
                continue;
            }
            if let Some(children) = self.subtypes.get(&t) {
                queue.extend(children.iter().copied());
            }
        }
        seen.into_iter().collect()
    }

    fn parent_of(&self, ty: NodeId) -> Option<NodeId> {
        let decl = self.program.type_decl(ty)?;
        let name = decl.superclass.as_deref()?;
        self.supertypes_of(ty)
            .first()
            .copied()
            .filter(|sup| self.program.simple_name(*sup) == Some(simple_type_name(name).as_str()))
    }

    fn overridden_by(&self, decl: NodeId) -> Vec<NodeId> {
        let mut result = vec![decl];
        let (Some(owner), Some(signature)) = (
            self.program.enclosing_type(decl),
            self.program.signature(decl),
        ) else {
            return result;
        };
        for sub in self.subclasses_of(owner).into_iter().skip(1) {
            if let Some(m) = self.method_with_signature(sub, &signature) {
                let is_static = self.program.callable(m).is_some_and(|c| c.is_static);
                if !is_static && !result.contains(&m) {
                    result.push(m);
                }
            }
        }
        result
    }

    fn find_by_signature(&self, ty: NodeId, decl: NodeId) -> Option<NodeId> {
        let signature = self.program.signature(decl)?;
        self.ancestry(ty)
            .into_iter()
            .find_map(|t| self.method_with_signature(t, &signature))
    }

    fn lookup_by_signature(&self, signature: &QualifiedSignature) -> Option<NodeId> {
        self.by_signature.get(&signature.key()).copied()
    }
}

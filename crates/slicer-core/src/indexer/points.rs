//! Program points: the statements of a declaration's body that call edges
//! are anchored to.

use std::collections::HashMap;

use serde::Serialize;

use crate::errors::{SlicerError, SlicerResult};
use crate::models::{CallableKind, NodeId, NodeKind, Program};

/// A statement-level location inside a declaration's body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ProgramPoint {
    pub id: u32,
    /// Method or constructor owning the point.
    pub declaration: NodeId,
    /// Statement (or field declaration) the point stands for.
    pub node: NodeId,
}

pub trait ProgramPointIndex {
    /// Innermost program point of `declaration` whose node contains `call`.
    fn containing_point(&self, declaration: NodeId, call: NodeId) -> SlicerResult<ProgramPoint>;
}

/// Statement-granularity point index.
///
/// Every statement in a callable's own body is a point; statements inside
/// nested callables or local types belong to those instead. Constructors also
/// own the non-static field declarations of their type, since field
/// initializers run as part of construction.
pub struct StatementIndex<'p> {
    program: &'p Program,
    points: HashMap<(NodeId, NodeId), ProgramPoint>,
    by_declaration: HashMap<NodeId, Vec<ProgramPoint>>,
}

impl<'p> StatementIndex<'p> {
    pub fn build(program: &'p Program) -> Self {
        let mut index = StatementIndex {
            program,
            points: HashMap::new(),
            by_declaration: HashMap::new(),
        };
        let mut next_id = 0u32;

        for &unit in program.units() {
            for decl in program.descendants(unit) {
                let Some(callable) = program.callable(decl) else {
                    continue;
                };
                let mut owned = Vec::new();
                if callable.kind == CallableKind::Constructor {
                    if let Some(ty) = program.enclosing_type(decl) {
                        owned.extend(program.fields_of(ty).into_iter().filter(|f| {
                            matches!(program.kind(*f), NodeKind::Field(field) if !field.is_static)
                        }));
                    }
                }
                owned.extend(own_statements(program, decl));

                for node in owned {
                    let point = ProgramPoint {
                        id: next_id,
                        declaration: decl,
                        node,
                    };
                    next_id += 1;
                    index.points.insert((decl, node), point);
                    index.by_declaration.entry(decl).or_default().push(point);
                }
            }
        }
        index
    }

    /// Points of a declaration in source order (field points first for
    /// constructors).
    pub fn points_of(&self, declaration: NodeId) -> &[ProgramPoint] {
        self.by_declaration
            .get(&declaration)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Statements under `decl` that are not inside a nested callable or type.
fn own_statements(program: &Program, decl: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = program.children(decl).iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
        match program.kind(id) {
            NodeKind::Type(_) | NodeKind::Callable(_) => continue,
            NodeKind::Statement(_) => out.push(id),
            _ => {}
        }
        stack.extend(program.children(id).iter().rev().copied());
    }
    out
}

impl ProgramPointIndex for StatementIndex<'_> {
    fn containing_point(&self, declaration: NodeId, call: NodeId) -> SlicerResult<ProgramPoint> {
        std::iter::once(call)
            .chain(self.program.ancestors(call))
            .find_map(|node| self.points.get(&(declaration, node)).copied())
            .ok_or_else(|| SlicerError::ProgramPointNotFound {
                call: self.program.describe(call),
                declaration: self.program.describe(declaration),
            })
    }
}

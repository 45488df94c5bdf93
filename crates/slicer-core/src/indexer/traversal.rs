//! Scoped pre-order walk over the program model.
//!
//! The walk keeps two stacks, the enclosing type declarations and the
//! enclosing callables, and hands them to a visitor for every node. It runs on
//! an explicit work stack: entering a type or callable schedules the matching
//! pop before any child is scheduled, so pushes and pops are always paired and
//! deep trees never touch the native call stack.
//!
//! `Descend::PerCallable` replays a subtree once per listed callable. Nested
//! type and callable declarations inside that subtree belong to themselves,
//! not to the replayed callable, so they are entered on the first pass only.

use crate::errors::SlicerResult;
use crate::models::{NodeId, NodeKind, Program};

/// Enclosing declarations at the node being visited (the node itself is not
/// on the stacks yet).
#[derive(Debug, Default)]
pub struct Scope {
    types: Vec<NodeId>,
    callables: Vec<NodeId>,
    replays: usize,
}

impl Scope {
    pub fn current_type(&self) -> Option<NodeId> {
        self.types.last().copied()
    }

    pub fn current_callable(&self) -> Option<NodeId> {
        self.callables.last().copied()
    }
}

/// What the walk does with the children of a visited node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descend {
    Children,
    Skip,
    /// Walk the children once per listed callable, each time with that
    /// callable pushed on the callable stack. Nested declarations are only
    /// walked on the first pass.
    PerCallable(Vec<NodeId>),
}

pub trait ScopedVisitor {
    fn visit(&mut self, program: &Program, node: NodeId, scope: &Scope) -> SlicerResult<Descend>;
}

enum Step {
    Enter(NodeId),
    PushCallable { callable: NodeId, replay: bool },
    PopCallable { replay: bool },
    PopType,
}

fn schedule_children(program: &Program, node: NodeId, work: &mut Vec<Step>) {
    work.extend(program.children(node).iter().rev().map(|c| Step::Enter(*c)));
}

/// Walk every root in order, calling `visitor` on each node before its
/// children.
pub fn walk_scoped<V: ScopedVisitor>(
    program: &Program,
    roots: &[NodeId],
    visitor: &mut V,
) -> SlicerResult<()> {
    let mut scope = Scope::default();
    let mut work: Vec<Step> = roots.iter().rev().map(|r| Step::Enter(*r)).collect();

    while let Some(step) = work.pop() {
        let node = match step {
            Step::Enter(node) => node,
            Step::PushCallable { callable, replay } => {
                scope.callables.push(callable);
                scope.replays += usize::from(replay);
                continue;
            }
            Step::PopCallable { replay } => {
                scope.callables.pop();
                scope.replays -= usize::from(replay);
                continue;
            }
            Step::PopType => {
                scope.types.pop();
                continue;
            }
        };
        if scope.replays > 0 && matches!(program.kind(node), NodeKind::Type(_) | NodeKind::Callable(_)) {
            continue;
        }

        match visitor.visit(program, node, &scope)? {
            Descend::Skip => {}
            Descend::Children => match program.kind(node) {
                NodeKind::Type(_) => {
                    scope.types.push(node);
                    work.push(Step::PopType);
                    schedule_children(program, node, &mut work);
                }
                NodeKind::Callable(_) => {
                    scope.callables.push(node);
                    work.push(Step::PopCallable { replay: false });
                    schedule_children(program, node, &mut work);
                }
                _ => schedule_children(program, node, &mut work),
            },
            Descend::PerCallable(callables) => {
                for (pass, callable) in callables.iter().enumerate().rev() {
                    let replay = pass > 0;
                    work.push(Step::PopCallable { replay });
                    schedule_children(program, node, &mut work);
                    work.push(Step::PushCallable {
                        callable: *callable,
                        replay,
                    });
                }
            }
        }
    }
    Ok(())
}

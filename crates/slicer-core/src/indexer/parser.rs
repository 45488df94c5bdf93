//! Java front end: parses source text with tree-sitter-java and lowers the
//! syntax tree into the program model.
//!
//! Lowering keeps declarations, statements and call expressions and flattens
//! everything else (blocks, lambdas, operators) into the nearest kept
//! ancestor. Receivers, arguments, field-access objects and cast operands are
//! kept as expression nodes so the resolver can compute static types.

use tree_sitter::{Node as TsNode, Parser, Tree};
use tracing::warn;

use crate::errors::{SlicerError, SlicerResult};
use crate::indexer::filesystem::compute_content_hash;
use crate::models::{
    CallScope, CallableDecl, CallableKind, CompilationUnit, ConstructorInvocation, Expression,
    FieldDecl, MethodCall, NodeId, NodeKind, ObjectCreation, Parameter, Program, Span,
    StatementKind, TypeDecl, TypeKind, UnitOrigin,
};

const STATEMENT_KINDS: &[&str] = &[
    "expression_statement",
    "return_statement",
    "if_statement",
    "while_statement",
    "for_statement",
    "enhanced_for_statement",
    "do_statement",
    "try_statement",
    "try_with_resources_statement",
    "throw_statement",
    "synchronized_statement",
    "labeled_statement",
    "assert_statement",
    "yield_statement",
    "switch_statement",
];

/// Source text parsed but not yet lowered.
pub struct ParsedSource {
    pub path: String,
    pub origin: UnitOrigin,
    pub source: String,
    pub tree: Tree,
}

pub fn java_parser() -> SlicerResult<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_java::LANGUAGE.into())
        .map_err(|e| SlicerError::Parse(format!("Failed to set language: {e}")))?;
    Ok(parser)
}

pub fn parse_source(path: &str, source: String, origin: UnitOrigin) -> SlicerResult<ParsedSource> {
    let mut parser = java_parser()?;
    let tree = parser
        .parse(source.as_bytes(), None)
        .ok_or_else(|| SlicerError::Parse(format!("Failed to parse {path}")))?;
    Ok(ParsedSource {
        path: path.to_string(),
        origin,
        source,
        tree,
    })
}

/// Parse `source` and append it to `program` as a compilation unit.
pub fn parse_java(program: &mut Program, path: &str, source: &str, origin: UnitOrigin) -> SlicerResult<NodeId> {
    let parsed = parse_source(path, source.to_string(), origin)?;
    Ok(lower(program, &parsed))
}

/// Lower a parsed file into `program`, returning the unit node.
pub fn lower(program: &mut Program, parsed: &ParsedSource) -> NodeId {
    let root = parsed.tree.root_node();
    if root.has_error() {
        warn!("Syntax errors in {}; lowering what parsed", parsed.path);
    }
    let source = parsed.source.as_bytes();

    let package = {
        let mut cursor = root.walk();
        let declaration = root
            .named_children(&mut cursor)
            .find(|c| c.kind() == "package_declaration");
        declaration.and_then(|d| {
            let mut cursor = d.walk();
            let name = d
                .named_children(&mut cursor)
                .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"));
            name.and_then(|n| n.utf8_text(source).ok()).map(str::to_string)
        })
    };
    let unit = program.add_unit(CompilationUnit {
        path: parsed.path.clone(),
        package,
        origin: parsed.origin,
        content_hash: compute_content_hash(&parsed.source),
    });

    let mut lowerer = Lowerer {
        program,
        source,
        work: Vec::new(),
    };
    lowerer.schedule_children(root, unit);
    lowerer.run();
    unit
}

// ---------------------------------------------------------------------------
// Lowering
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Attach {
    Child(NodeId),
    Argument(NodeId),
    Receiver(NodeId),
}

enum Task<'t> {
    /// Statement-level lowering: keep declarations, statements and calls.
    Lower(TsNode<'t>, NodeId),
    /// Keep the node as an expression, whatever its kind.
    Expr(TsNode<'t>, Attach),
}

struct Lowerer<'p, 't> {
    program: &'p mut Program,
    source: &'t [u8],
    work: Vec<Task<'t>>,
}

fn is_comment(node: &TsNode<'_>) -> bool {
    matches!(node.kind(), "line_comment" | "block_comment")
}

fn span_of(node: TsNode<'_>) -> Span {
    Span {
        start_line: node.start_position().row as u32 + 1,
        end_line: node.end_position().row as u32 + 1,
        start_byte: node.start_byte() as u32,
        end_byte: node.end_byte() as u32,
    }
}

fn literal_type(kind: &str, text: &str) -> Option<&'static str> {
    match kind {
        "decimal_integer_literal" | "hex_integer_literal" | "octal_integer_literal"
        | "binary_integer_literal" => Some(if text.ends_with(['l', 'L']) { "long" } else { "int" }),
        "decimal_floating_point_literal" | "hex_floating_point_literal" => {
            Some(if text.ends_with(['f', 'F']) { "float" } else { "double" })
        }
        "string_literal" | "text_block" => Some("String"),
        "character_literal" => Some("char"),
        "true" | "false" => Some("boolean"),
        _ => None,
    }
}

impl<'t> Lowerer<'_, 't> {
    fn run(&mut self) {
        while let Some(task) = self.work.pop() {
            match task {
                Task::Lower(node, parent) => self.lower(node, parent),
                Task::Expr(node, attach) => self.lower_expression(node, attach),
            }
        }
    }

    fn text(&self, node: TsNode<'t>) -> &'t str {
        node.utf8_text(self.source).unwrap_or("")
    }

    fn field_text(&self, node: TsNode<'t>, field: &str) -> Option<String> {
        node.child_by_field_name(field)
            .map(|n| self.text(n).to_string())
    }

    fn named_children(node: TsNode<'t>) -> Vec<TsNode<'t>> {
        let mut cursor = node.walk();
        let children = node
            .named_children(&mut cursor)
            .filter(|c| !is_comment(c))
            .collect();
        children
    }

    /// Queue the named children of `node` for lowering under `parent`, in
    /// source order.
    fn schedule_children(&mut self, node: TsNode<'t>, parent: NodeId) {
        for child in Self::named_children(node).into_iter().rev() {
            self.work.push(Task::Lower(child, parent));
        }
    }

    fn schedule_arguments(&mut self, node: TsNode<'t>, call: NodeId) {
        if let Some(arguments) = node.child_by_field_name("arguments") {
            for arg in Self::named_children(arguments).into_iter().rev() {
                self.work.push(Task::Expr(arg, Attach::Argument(call)));
            }
        }
    }

    fn attach(&mut self, attach: Attach, kind: NodeKind, span: Span) -> NodeId {
        match attach {
            Attach::Child(parent) => self.program.add_node(parent, kind, span),
            Attach::Argument(call) => self.program.add_argument(call, kind, span),
            Attach::Receiver(call) => self.program.set_scope_expression(call, kind, span),
        }
    }

    fn modifiers(&self, node: TsNode<'t>) -> Vec<&'t str> {
        Self::named_children(node)
            .into_iter()
            .find(|c| c.kind() == "modifiers")
            .map(|m| self.text(m).split_whitespace().collect())
            .unwrap_or_default()
    }

    fn lower(&mut self, node: TsNode<'t>, parent: NodeId) {
        match node.kind() {
            "package_declaration" | "import_declaration" => {}
            "class_declaration" | "interface_declaration" | "enum_declaration" | "record_declaration"
            | "annotation_type_declaration" => self.lower_type(node, parent),
            "method_declaration" | "constructor_declaration" | "compact_constructor_declaration" => {
                self.lower_callable(node, parent)
            }
            "field_declaration" | "constant_declaration" => self.lower_field(node, parent),
            // Constant bodies are not modelled; only the arguments are kept.
            "enum_constant" => {
                if let Some(arguments) = node.child_by_field_name("arguments") {
                    self.schedule_children(arguments, parent);
                }
            }
            "static_initializer" => {
                let id = self.program.add_node(
                    parent,
                    NodeKind::Initializer { is_static: true },
                    span_of(node),
                );
                self.schedule_children(node, id);
            }
            "block" if node
                .parent()
                .is_some_and(|p| matches!(p.kind(), "class_body" | "enum_body_declarations")) =>
            {
                let id = self.program.add_node(
                    parent,
                    NodeKind::Initializer { is_static: false },
                    span_of(node),
                );
                self.schedule_children(node, id);
            }
            "local_variable_declaration" => self.lower_local_variable(node, parent),
            "explicit_constructor_invocation" => self.lower_constructor_invocation(node, parent),
            "method_invocation" | "object_creation_expression" => {
                self.lower_expression(node, Attach::Child(parent))
            }
            kind if STATEMENT_KINDS.contains(&kind) => {
                let id = self.program.add_node(
                    parent,
                    NodeKind::Statement(StatementKind::Other(kind.to_string())),
                    span_of(node),
                );
                self.schedule_children(node, id);
            }
            _ => self.schedule_children(node, parent),
        }
    }

    // -- declarations -------------------------------------------------------

    fn type_list(&self, clause: TsNode<'t>) -> Vec<String> {
        Self::named_children(clause)
            .into_iter()
            .filter(|c| c.kind() == "type_list")
            .flat_map(Self::named_children)
            .map(|t| self.text(t).to_string())
            .collect()
    }

    fn lower_type(&mut self, node: TsNode<'t>, parent: NodeId) {
        let kind = match node.kind() {
            "interface_declaration" | "annotation_type_declaration" => TypeKind::Interface,
            "enum_declaration" => TypeKind::Enum,
            "record_declaration" => TypeKind::Record,
            _ => TypeKind::Class,
        };
        let superclass = node
            .child_by_field_name("superclass")
            .and_then(|s| Self::named_children(s).into_iter().next())
            .map(|t| self.text(t).to_string());
        let interfaces: Vec<String> = Self::named_children(node)
            .into_iter()
            .filter(|c| matches!(c.kind(), "super_interfaces" | "extends_interfaces"))
            .flat_map(|c| self.type_list(c))
            .collect();
        let decl = TypeDecl {
            kind,
            name: self.field_text(node, "name").unwrap_or_default(),
            superclass,
            interfaces,
        };
        let id = self.program.add_node(parent, NodeKind::Type(decl), span_of(node));

        if kind == TypeKind::Record {
            let components = node
                .child_by_field_name("parameters")
                .map(|p| self.parameters(p))
                .unwrap_or_default();
            for component in components {
                let field = FieldDecl {
                    type_name: component.type_name,
                    names: vec![component.name],
                    is_static: false,
                };
                self.program.add_node(id, NodeKind::Field(field), span_of(node));
            }
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.schedule_children(body, id);
        }
    }

    fn parameters(&self, list: TsNode<'t>) -> Vec<Parameter> {
        let mut out = Vec::new();
        for param in Self::named_children(list) {
            match param.kind() {
                "formal_parameter" => out.push(Parameter {
                    name: self.field_text(param, "name").unwrap_or_default(),
                    type_name: self.field_text(param, "type").unwrap_or_default(),
                }),
                "spread_parameter" => {
                    let parts: Vec<TsNode<'t>> = Self::named_children(param)
                        .into_iter()
                        .filter(|c| c.kind() != "modifiers")
                        .collect();
                    let type_name = parts
                        .first()
                        .map(|t| format!("{}...", self.text(*t)))
                        .unwrap_or_default();
                    let name = parts
                        .iter()
                        .find(|c| c.kind() == "variable_declarator")
                        .and_then(|d| self.field_text(*d, "name"))
                        .unwrap_or_default();
                    out.push(Parameter { name, type_name });
                }
                _ => {}
            }
        }
        out
    }

    fn lower_callable(&mut self, node: TsNode<'t>, parent: NodeId) {
        let kind = if node.kind() == "method_declaration" {
            CallableKind::Method
        } else {
            CallableKind::Constructor
        };
        let parameters = match node.child_by_field_name("parameters") {
            Some(list) => self.parameters(list),
            // Compact canonical constructor: the record components.
            None => node
                .parent()
                .and_then(|body| body.parent())
                .and_then(|record| record.child_by_field_name("parameters"))
                .map(|list| self.parameters(list))
                .unwrap_or_default(),
        };
        let body = node.child_by_field_name("body");
        let decl = CallableDecl {
            kind,
            name: self.field_text(node, "name").unwrap_or_default(),
            parameters,
            return_type: match kind {
                CallableKind::Method => self.field_text(node, "type"),
                CallableKind::Constructor => None,
            },
            is_static: self.modifiers(node).contains(&"static"),
        };
        let id = self.program.add_node(parent, NodeKind::Callable(decl), span_of(node));
        if let Some(body) = body {
            self.schedule_children(body, id);
        }
    }

    fn declarators(node: TsNode<'t>) -> Vec<TsNode<'t>> {
        let mut cursor = node.walk();
        let declarators = node.children_by_field_name("declarator", &mut cursor).collect();
        declarators
    }

    fn schedule_initializers(&mut self, declarators: &[TsNode<'t>], parent: NodeId) {
        for declarator in declarators.iter().rev() {
            if let Some(value) = declarator.child_by_field_name("value") {
                self.work.push(Task::Lower(value, parent));
            }
        }
    }

    fn lower_field(&mut self, node: TsNode<'t>, parent: NodeId) {
        let declarators = Self::declarators(node);
        let in_interface = self
            .program
            .type_decl(parent)
            .is_some_and(|t| t.kind == TypeKind::Interface);
        let field = FieldDecl {
            type_name: self.field_text(node, "type").unwrap_or_default(),
            names: declarators
                .iter()
                .filter_map(|d| self.field_text(*d, "name"))
                .collect(),
            is_static: node.kind() == "constant_declaration"
                || in_interface
                || self.modifiers(node).contains(&"static"),
        };
        let id = self.program.add_node(parent, NodeKind::Field(field), span_of(node));
        self.schedule_initializers(&declarators, id);
    }

    fn lower_local_variable(&mut self, node: TsNode<'t>, parent: NodeId) {
        let declarators = Self::declarators(node);
        let statement = StatementKind::LocalVariable {
            type_name: self.field_text(node, "type").unwrap_or_default(),
            names: declarators
                .iter()
                .filter_map(|d| self.field_text(*d, "name"))
                .collect(),
        };
        let id = self
            .program
            .add_node(parent, NodeKind::Statement(statement), span_of(node));
        self.schedule_initializers(&declarators, id);
    }

    fn lower_constructor_invocation(&mut self, node: TsNode<'t>, parent: NodeId) {
        let span = span_of(node);
        let statement = self.program.add_node(
            parent,
            NodeKind::Statement(StatementKind::Other(node.kind().to_string())),
            span,
        );
        let is_this = node
            .child_by_field_name("constructor")
            .is_some_and(|c| c.kind() == "this");
        let invocation = ConstructorInvocation {
            is_this,
            arguments: Vec::new(),
        };
        let id = self
            .program
            .add_node(statement, NodeKind::ConstructorInvocation(invocation), span);
        self.schedule_arguments(node, id);
    }

    // -- expressions --------------------------------------------------------

    fn lower_expression(&mut self, node: TsNode<'t>, attach: Attach) {
        let span = span_of(node);
        match node.kind() {
            "parenthesized_expression" => match Self::named_children(node).into_iter().next() {
                Some(inner) => self.work.push(Task::Expr(inner, attach)),
                None => {
                    self.attach(attach, NodeKind::Expression(Expression::Other), span);
                }
            },
            "method_invocation" => self.lower_method_invocation(node, attach),
            "object_creation_expression" => {
                let creation = ObjectCreation {
                    type_name: self.field_text(node, "type").unwrap_or_default(),
                    arguments: Vec::new(),
                };
                let id = self.attach(attach, NodeKind::ObjectCreation(creation), span);
                // Anonymous class body members become children of the creation.
                for body in Self::named_children(node)
                    .into_iter()
                    .filter(|c| c.kind() == "class_body")
                    .rev()
                {
                    self.schedule_children(body, id);
                }
                self.schedule_arguments(node, id);
            }
            "identifier" => {
                let name = self.text(node).to_string();
                self.attach(attach, NodeKind::Expression(Expression::Name(name)), span);
            }
            "this" => {
                self.attach(attach, NodeKind::Expression(Expression::This), span);
            }
            "field_access" => {
                let object = node.child_by_field_name("object");
                let field = node.child_by_field_name("field");
                if field.is_some_and(|f| f.kind() == "this") {
                    let owner = object.map(|o| self.text(o).to_string()).unwrap_or_default();
                    self.attach(attach, NodeKind::Expression(Expression::QualifiedThis(owner)), span);
                } else {
                    let name = field.map(|f| self.text(f).to_string()).unwrap_or_default();
                    let id = self.attach(attach, NodeKind::Expression(Expression::FieldAccess(name)), span);
                    if let Some(object) = object {
                        self.work.push(Task::Expr(object, Attach::Child(id)));
                    }
                }
            }
            "cast_expression" => {
                let type_name = self.field_text(node, "type").unwrap_or_default();
                let id = self.attach(attach, NodeKind::Expression(Expression::Cast(type_name)), span);
                if let Some(value) = node.child_by_field_name("value") {
                    self.work.push(Task::Expr(value, Attach::Child(id)));
                }
            }
            kind => match literal_type(kind, self.text(node)) {
                Some(type_name) => {
                    let literal = Expression::Literal(type_name.to_string());
                    self.attach(attach, NodeKind::Expression(literal), span);
                }
                None => {
                    let id = self.attach(attach, NodeKind::Expression(Expression::Other), span);
                    self.schedule_children(node, id);
                }
            },
        }
    }

    fn lower_method_invocation(&mut self, node: TsNode<'t>, attach: Attach) {
        let object = node.child_by_field_name("object");
        // `T.super.m()` carries a `super` child besides the object `T`.
        let qualified_super = Self::named_children(node)
            .into_iter()
            .any(|c| c.kind() == "super" && Some(c) != object);

        let (scope, receiver) = match object {
            Some(o) if qualified_super => (CallScope::QualifiedSuper(self.text(o).to_string()), None),
            None => (CallScope::Implicit, None),
            Some(o) => match o.kind() {
                "this" => (CallScope::This, None),
                "super" => (CallScope::Super, None),
                "field_access"
                    if o.child_by_field_name("field").is_some_and(|f| f.kind() == "this") =>
                {
                    let owner = self.field_text(o, "object").unwrap_or_default();
                    (CallScope::QualifiedThis(owner), None)
                }
                _ => (CallScope::Implicit, Some(o)),
            },
        };
        let call = MethodCall {
            name: self.field_text(node, "name").unwrap_or_default(),
            scope,
            arguments: Vec::new(),
        };
        let id = self.attach(attach, NodeKind::MethodCall(call), span_of(node));
        self.schedule_arguments(node, id);
        if let Some(receiver) = receiver {
            self.work.push(Task::Expr(receiver, Attach::Receiver(id)));
        }
    }
}

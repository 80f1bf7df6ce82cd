//! Filepath: src/parsers/python_parser.rs
//! ------------------------------------------------------------------
//! Python AST query layer built on Tree-sitter 0.25.x.
//! Goals:
//!   - Parse a whole document once; refuse trees with ERROR or
//!     MISSING nodes instead of returning partial answers.
//!   - Report *declarations*: names bound by assignment, loops,
//!     comprehensions, def/class, parameters, imports, `as`.
//!   - Report *references*: identifiers in parameter-like
//!     positions only (bare expression, comparison operand,
//!     return value, call argument, callee).
//!
//! Notes:
//!   - The walk matches on node kinds rather than compiling
//!     queries, so a kind renamed by a grammar release only stops
//!     matching instead of failing query construction.
//!   - Positions are 1-based lines and 0-based byte columns.
//!   - Identifiers nested deeper (arithmetic operands, subscripts,
//!     attribute tails) are deliberately not references.
//! ------------------------------------------------------------------

use miette::SourceSpan;
use serde::{Deserialize, Serialize};
use tree_sitter::{Language, Node, Parser, Tree};

use crate::core::error::{EngineError, ParseFailure};
use crate::infra::utils::{TsNodeUtils, Utf8Utils};

/// Syntactic position a reference was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// The identifier is (part of) a bare expression statement.
    Expression,
    /// Operand of a comparison (`a < b`, `x in ys`).
    Comparison,
    /// Returned value (`return x`, `return x, y`).
    Return,
    /// Call argument, positional, keyword value, or splat.
    Argument,
    /// Called function, or the receiver of a called attribute.
    Callee,
}

impl ReferenceKind {
    /// Call and return positions consume values from outside the
    /// snippet; only declarations inside the snippet bind them.
    pub fn is_input_position(self) -> bool {
        matches!(self, Self::Return | Self::Argument | Self::Callee)
    }
}

/// How a declaration binds its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationKind {
    Assignment,
    LoopTarget,
    Function,
    Class,
    Parameter,
    Import,
    Alias,
}

/// A name bound somewhere in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub line: usize,
    pub column: usize,
    pub kind: DeclarationKind,
}

/// An identifier read in a parameter-like position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub name: String,
    pub line: usize,
    pub column: usize,
    /// Start byte in the parsed text.
    pub start: usize,
    /// End byte (exclusive) in the parsed text.
    pub end: usize,
    pub kind: ReferenceKind,
}

/// Python parser front-end. Cheap to construct; one parser is
/// created per `parse` call so the value can be shared freely.
#[derive(Clone)]
pub struct PythonAst {
    /// Python language handle for Tree-sitter.
    language: Language,
}

impl Default for PythonAst {
    fn default() -> Self {
        Self::new()
    }
}

impl PythonAst {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_python::LANGUAGE.into(),
        }
    }

    /// Parse `source`. Fails with a located `ParseFailure` when the
    /// tree contains syntax errors.
    pub fn parse<'s>(&self, source: &'s str) -> Result<ParsedSource<'s>, EngineError> {
        // Create a parser instance and set the language.
        let mut parser = Parser::new();
        parser.set_language(&self.language)?;

        // Parse the source; no tree only happens on cancellation.
        let tree = parser.parse(source, None).ok_or_else(|| ParseFailure {
            line: 1,
            column: 0,
            message: "parser produced no syntax tree".to_string(),
            src: source.to_string(),
            span: SourceSpan::from((0, 0)),
            help: None,
        })?;

        // Reject broken input up front; callers never see a tree
        // with holes in it.
        if let Some(bad) = TsNodeUtils::first_error(tree.root_node()) {
            return Err(syntax_failure(source, bad).into());
        }

        Ok(ParsedSource { source, tree })
    }
}

/// A successfully parsed document.
pub struct ParsedSource<'s> {
    source: &'s str,
    tree: Tree,
}

impl<'s> ParsedSource<'s> {
    /// Every binding site in the document, in tree order.
    pub fn declarations(&self) -> Vec<Declaration> {
        let mut out = Vec::new();

        for node in preorder(self.tree.root_node()) {
            match node.kind() {
                "assignment" | "augmented_assignment" => {
                    self.bind_field(node, "left", DeclarationKind::Assignment, &mut out);
                }
                "named_expression" => {
                    self.bind_field(node, "name", DeclarationKind::Assignment, &mut out);
                }
                "for_statement" | "for_in_clause" => {
                    self.bind_field(node, "left", DeclarationKind::LoopTarget, &mut out);
                }
                "function_definition" => {
                    self.bind_field(node, "name", DeclarationKind::Function, &mut out);
                }
                "class_definition" => {
                    self.bind_field(node, "name", DeclarationKind::Class, &mut out);
                }
                "parameters" | "lambda_parameters" => {
                    for param in TsNodeUtils::named_children(node) {
                        self.bind_parameter(param, &mut out);
                    }
                }
                "import_statement" | "import_from_statement" => {
                    self.bind_imports(node, &mut out);
                }
                "as_pattern" => {
                    self.bind_field(node, "alias", DeclarationKind::Alias, &mut out);
                }
                _ => {}
            }
        }

        out
    }

    /// Identifiers in parameter-like positions, in tree order.
    pub fn references(&self) -> Vec<Reference> {
        let mut out = Vec::new();

        for node in preorder(self.tree.root_node()) {
            match node.kind() {
                // `x` or `x, y` as a whole statement
                "expression_statement" => {
                    self.refer_direct(node, ReferenceKind::Expression, &mut out);
                }
                "comparison_operator" => {
                    self.refer_direct(node, ReferenceKind::Comparison, &mut out);
                }
                "return_statement" => {
                    for child in TsNodeUtils::named_children(node) {
                        match child.kind() {
                            "identifier" => self.refer(child, ReferenceKind::Return, &mut out),
                            "expression_list" => {
                                self.refer_direct(child, ReferenceKind::Return, &mut out)
                            }
                            _ => {}
                        }
                    }
                }
                "call" => {
                    self.refer_callee(node, &mut out);
                    if let Some(args) = node.child_by_field_name("arguments")
                        && args.kind() == "argument_list"
                    {
                        self.refer_arguments(args, &mut out);
                    }
                }
                _ => {}
            }
        }

        out
    }

    /// Text of a node; empty if the node splits a char boundary.
    fn text(&self, node: Node<'_>) -> &'s str {
        Utf8Utils::slice_node_text(self.source, node).unwrap_or("")
    }

    /// Record one declaration for an identifier node.
    fn declare(&self, node: Node<'_>, kind: DeclarationKind, out: &mut Vec<Declaration>) {
        let pos = node.start_position();
        out.push(Declaration {
            name: self.text(node).to_string(),
            line: pos.row + 1,
            column: pos.column,
            kind,
        });
    }

    /// Declare every identifier bound by the pattern in `field`.
    fn bind_field(
        &self,
        node: Node<'_>,
        field: &str,
        kind: DeclarationKind,
        out: &mut Vec<Declaration>,
    ) {
        let Some(target) = node.child_by_field_name(field) else { return };

        let mut idents = Vec::new();
        collect_binding_identifiers(target, &mut idents);

        for ident in idents {
            self.declare(ident, kind, out);
        }
    }

    /// Formal parameters: plain, defaulted, typed, and splats.
    fn bind_parameter(&self, param: Node<'_>, out: &mut Vec<Declaration>) {
        match param.kind() {
            "identifier" => self.declare(param, DeclarationKind::Parameter, out),
            "default_parameter" | "typed_default_parameter" => {
                self.bind_field(param, "name", DeclarationKind::Parameter, out);
            }
            // The annotation follows the name; only the first named
            // child is the bound pattern.
            "typed_parameter" => {
                if let Some(first) = param.named_child(0) {
                    self.bind_parameter(first, out);
                }
            }
            "list_splat_pattern" | "dictionary_splat_pattern" | "tuple_pattern" => {
                let mut idents = Vec::new();
                collect_binding_identifiers(param, &mut idents);
                for ident in idents {
                    self.declare(ident, DeclarationKind::Parameter, out);
                }
            }
            _ => {}
        }
    }

    /// `import a.b` binds `a`; `from m import x` binds `x`;
    /// `... as y` binds `y`.
    fn bind_imports(&self, node: Node<'_>, out: &mut Vec<Declaration>) {
        let from_import = node.kind() == "import_from_statement";
        let mut cursor = node.walk();
        let names: Vec<Node> = node.children_by_field_name("name", &mut cursor).collect();

        for name in names {
            let bound = match name.kind() {
                "aliased_import" => name.child_by_field_name("alias"),
                "dotted_name" => {
                    let parts = TsNodeUtils::named_children(name);
                    if from_import { parts.last().copied() } else { parts.first().copied() }
                }
                "identifier" => Some(name),
                _ => None,
            };

            if let Some(ident) = bound.filter(|n| n.kind() == "identifier") {
                self.declare(ident, DeclarationKind::Import, out);
            }
        }
    }

    /// Record one reference for an identifier node.
    fn refer(&self, node: Node<'_>, kind: ReferenceKind, out: &mut Vec<Reference>) {
        let pos = node.start_position();
        out.push(Reference {
            name: self.text(node).to_string(),
            line: pos.row + 1,
            column: pos.column,
            start: node.start_byte(),
            end: node.end_byte(),
            kind,
        });
    }

    /// Reference every identifier that is a direct named child.
    fn refer_direct(&self, node: Node<'_>, kind: ReferenceKind, out: &mut Vec<Reference>) {
        for child in TsNodeUtils::named_children(node) {
            if child.kind() == "identifier" {
                self.refer(child, kind, out);
            }
        }
    }

    /// `f(...)` references `f`; `p.m(...)` references `p`.
    fn refer_callee(&self, call: Node<'_>, out: &mut Vec<Reference>) {
        let Some(function) = call.child_by_field_name("function") else { return };

        let target = match function.kind() {
            "identifier" => Some(function),
            "attribute" => TsNodeUtils::attribute_root(function),
            _ => None,
        };

        if let Some(ident) = target {
            self.refer(ident, ReferenceKind::Callee, out);
        }
    }

    /// Positional arguments, keyword values and splat operands.
    fn refer_arguments(&self, args: Node<'_>, out: &mut Vec<Reference>) {
        for arg in TsNodeUtils::named_children(args) {
            let value = match arg.kind() {
                "identifier" => Some(arg),
                "keyword_argument" => arg.child_by_field_name("value"),
                "list_splat" | "dictionary_splat" => arg.named_child(0),
                _ => None,
            };

            if let Some(ident) = value.filter(|n| n.kind() == "identifier") {
                self.refer(ident, ReferenceKind::Argument, out);
            }
        }
    }
}

/// Pre-order list of every node under `root`.
fn preorder(root: Node<'_>) -> Vec<Node<'_>> {
    let mut out = Vec::new();
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        out.push(node);

        // Push children reversed so the leftmost pops first.
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }

    out
}

/// Identifiers bound by an assignment/loop/`as` target pattern.
/// Attribute and subscript targets bind nothing locally.
fn collect_binding_identifiers<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) {
    match node.kind() {
        "identifier" => out.push(node),
        "pattern_list"
        | "tuple_pattern"
        | "list_pattern"
        | "list_splat_pattern"
        | "dictionary_splat_pattern"
        | "as_pattern_target"
        | "expression_list"
        | "parenthesized_expression"
        | "tuple"
        | "list" => {
            for child in TsNodeUtils::named_children(node) {
                collect_binding_identifiers(child, out);
            }
        }
        _ => {}
    }
}

/// Build a located failure for the first ERROR/MISSING node.
fn syntax_failure(source: &str, bad: Node<'_>) -> ParseFailure {
    let pos = bad.start_position();
    let message = if bad.is_missing() {
        format!("missing `{}`", bad.kind())
    } else {
        "invalid syntax".to_string()
    };

    ParseFailure {
        line: pos.row + 1,
        column: pos.column,
        message,
        src: source.to_string(),
        span: SourceSpan::from((bad.start_byte(), bad.end_byte() - bad.start_byte())),
        help: Some("only syntactically valid Python documents can be parametrized".to_string()),
    }
}

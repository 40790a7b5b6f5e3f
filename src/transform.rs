//! CommonJS → ES module rewriter.
//!
//! One depth-first walk over the module detects `require` calls, `module` /
//! `exports` usage and `this` / `global` / `typeof` / `define` patterns,
//! recording text edits as it goes. Whether the module can be rewritten
//! statically or has to be wrapped in a factory is decided along the way;
//! [`crate::codegen`] then assembles the import and export scaffolding.

use crate::classify::has_interop_marker;
use crate::codegen::{self, Analysis};
use crate::error::{CommonJsError, Result};
use crate::names::is_legal_identifier;
use crate::reference::{self, Parent, ParentStack};
use crate::scope::{deconflict, ScopeTree};
use crate::splice::{SourceEdits, SourceMap};
use crate::static_eval;
use indexmap::{IndexMap, IndexSet};
use oxc_ast::ast::{
    ArrowFunctionExpression, AssignmentExpression, AssignmentTarget, BindingIdentifier,
    BindingPattern, CallExpression, Class, ConditionalExpression, Expression, Function,
    IdentifierReference, IfStatement, ObjectPropertyKind, Program, PropertyKey, ReturnStatement,
    Statement, StaticMemberExpression, ThisExpression, UnaryExpression, VariableDeclaration,
    VariableDeclarator,
};
use oxc_ast::AstKind;
use oxc_ast_visit::{walk, Visit};
use oxc_semantic::{Scoping, SemanticBuilder};
use oxc_span::{GetSpan, Span};
use oxc_syntax::operator::{AssignmentOperator, UnaryOperator};
use oxc_syntax::scope::{ScopeFlags, ScopeId};
use oxc_syntax::symbol::SymbolId;
use regex::Regex;
use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

lazy_static::lazy_static! {
    static ref EXPORTS_PATTERN: Regex =
        Regex::new(r"^(?:module\.)?exports(?:\.([a-zA-Z_$][a-zA-Z_$0-9]*))?$").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// INPUT / OUTPUT
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-module settings for one rewrite.
#[derive(Debug, Clone, Default)]
pub struct RewriteOptions<'o> {
    pub is_entry: bool,
    pub ignore_global: bool,
    /// Route non-static `require` references to the runtime-dispatch helper.
    pub allow_dynamic_require: bool,
    /// Require targets that stay runtime `require` calls.
    pub ignored_requires: &'o [String],
    /// Explicitly configured named exports for this module.
    pub custom_named_exports: &'o [String],
    /// The module already has an ES `export default`.
    pub has_es_default_export: bool,
    pub source_map: bool,
}

impl RewriteOptions<'_> {
    fn is_ignored(&self, source: &str) -> bool {
        self.ignored_requires.iter().any(|ignored| ignored == source)
    }
}

/// One distinct static `require` target of a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredEntry {
    pub source: String,
    pub name: String,
    /// The value of the call is consumed somewhere.
    pub imports_default: bool,
}

/// Which CommonJS free variables the module touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Uses {
    pub module: bool,
    pub exports: bool,
    pub global: bool,
    pub require: bool,
}

impl Uses {
    pub fn any(&self) -> bool {
        self.module || self.exports || self.global || self.require
    }
}

#[derive(Debug, Clone)]
pub struct TransformedModule {
    pub code: String,
    pub map: Option<SourceMap>,
    /// Require targets in first-occurrence order.
    pub sources: Vec<String>,
    /// Emitted named exports, excluding the internal whole-module re-export.
    pub named_exports: Vec<String>,
    pub has_default_export: bool,
    pub should_wrap: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINT
// ═══════════════════════════════════════════════════════════════════════════════

/// Rewrites a parsed module, or returns `None` when it uses no CommonJS at all.
pub fn transform_commonjs(
    program: &Program,
    code: &str,
    id: &str,
    options: &RewriteOptions,
) -> Result<Option<TransformedModule>> {
    let semantic = SemanticBuilder::new().build(program).semantic;
    let scoping = semantic.scoping();

    let mut prescan = Prescan::new(scoping);
    prescan.visit_program(program);

    let mut rewriter = Rewriter::new(code, id, options, scoping, prescan);
    rewriter.visit_program(program);

    if rewriter.required.is_empty() && !rewriter.uses.any() {
        if !options.custom_named_exports.is_empty() {
            return Err(CommonJsError::NamedExportsMismatch { id: id.to_string() });
        }
        trace!(id, "no CommonJS usage found");
        return Ok(None);
    }

    debug!(
        id,
        wrap = rewriter.should_wrap,
        requires = rewriter.required.len(),
        "rewriting CommonJS module"
    );
    codegen::assemble(rewriter.into_analysis(), program, id, options).map(Some)
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRESCAN
// ═══════════════════════════════════════════════════════════════════════════════

/// Collects free names and binding mutations before the main walk.
struct Prescan<'s> {
    scoping: &'s Scoping,
    free_names: HashSet<String>,
    written: HashSet<SymbolId>,
    declarations: HashMap<SymbolId, usize>,
}

impl<'s> Prescan<'s> {
    fn new(scoping: &'s Scoping) -> Self {
        Self {
            scoping,
            free_names: HashSet::new(),
            written: HashSet::new(),
            declarations: HashMap::new(),
        }
    }

    /// Whether a binding is assigned to or declared more than once.
    fn is_reassigned(&self, binding: &BindingIdentifier) -> bool {
        match binding.symbol_id.get() {
            Some(symbol) => {
                self.written.contains(&symbol)
                    || self.declarations.get(&symbol).copied().unwrap_or(0) > 1
            }
            None => true,
        }
    }
}

impl<'a> Visit<'a> for Prescan<'_> {
    fn visit_identifier_reference(&mut self, it: &IdentifierReference<'a>) {
        let Some(reference_id) = it.reference_id.get() else {
            return;
        };
        let reference = self.scoping.get_reference(reference_id);
        match reference.symbol_id() {
            None => {
                self.free_names.insert(it.name.to_string());
            }
            Some(symbol) if reference.is_write() => {
                self.written.insert(symbol);
            }
            Some(_) => {}
        }
    }

    fn visit_binding_identifier(&mut self, it: &BindingIdentifier<'a>) {
        if let Some(symbol) = it.symbol_id.get() {
            *self.declarations.entry(symbol).or_default() += 1;
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REWRITER
// ═══════════════════════════════════════════════════════════════════════════════

/// `exports.a.b` style access chain rooted at an identifier.
pub(crate) struct Flattened<'n, 'a> {
    pub(crate) base: &'n IdentifierReference<'a>,
    pub(crate) keypath: String,
}

fn flatten<'n, 'a>(expr: &'n Expression<'a>) -> Option<Flattened<'n, 'a>> {
    match expr {
        Expression::Identifier(base) => Some(Flattened {
            base,
            keypath: base.name.to_string(),
        }),
        Expression::StaticMemberExpression(member) => flatten_member(member),
        _ => None,
    }
}

fn flatten_member<'n, 'a>(member: &'n StaticMemberExpression<'a>) -> Option<Flattened<'n, 'a>> {
    let mut flat = flatten(&member.object)?;
    flat.keypath.push('.');
    flat.keypath.push_str(member.property.name.as_str());
    Some(flat)
}

pub(crate) fn flatten_target<'n, 'a>(target: &'n AssignmentTarget<'a>) -> Option<Flattened<'n, 'a>> {
    match target {
        AssignmentTarget::StaticMemberExpression(member) => flatten_member(member),
        _ => None,
    }
}

/// `Some(name)` for `module.exports` (`None` inside) and `exports.name` style paths.
pub(crate) fn match_exports_path(keypath: &str) -> Option<Option<String>> {
    EXPORTS_PATTERN
        .captures(keypath)
        .map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
}

pub(crate) fn is_free_reference(scoping: &Scoping, ident: &IdentifierReference) -> bool {
    ident
        .reference_id
        .get()
        .map_or(true, |id| scoping.get_reference(id).symbol_id().is_none())
}

struct Rewriter<'s, 'o> {
    code: &'s str,
    id: &'s str,
    options: &'o RewriteOptions<'o>,
    scopes: ScopeTree<'s>,
    prescan: Prescan<'s>,
    edits: SourceEdits<'s>,
    parents: ParentStack,
    scope_stack: Vec<ScopeId>,
    function_depth: usize,
    top_level_assignments: HashSet<Span>,
    dead_statements: HashSet<Span>,
    dead_expressions: HashSet<Span>,
    removed_declarators: HashSet<Span>,
    in_exported_declaration: bool,
    globals: HashSet<String>,
    uses: Uses,
    should_wrap: bool,
    required: IndexMap<String, RequiredEntry>,
    named_exports: IndexSet<String>,
    helpers_name: String,
    uid: usize,
}

impl<'s, 'o> Rewriter<'s, 'o> {
    fn new(
        code: &'s str,
        id: &'s str,
        options: &'o RewriteOptions<'o>,
        scoping: &'s Scoping,
        prescan: Prescan<'s>,
    ) -> Self {
        let mut scopes = ScopeTree::new(scoping);
        let globals = prescan.free_names.clone();
        let root = scopes.root();
        let helpers_name = deconflict(&mut scopes, root, &globals, "commonjsHelpers");

        Self {
            code,
            id,
            options,
            scopes,
            prescan,
            edits: SourceEdits::new(code),
            parents: ParentStack::default(),
            scope_stack: Vec::new(),
            function_depth: 0,
            top_level_assignments: HashSet::new(),
            dead_statements: HashSet::new(),
            dead_expressions: HashSet::new(),
            removed_declarators: HashSet::new(),
            in_exported_declaration: false,
            globals,
            uses: Uses::default(),
            should_wrap: has_interop_marker(code),
            required: IndexMap::new(),
            named_exports: IndexSet::new(),
            helpers_name,
            uid: 0,
        }
    }

    fn into_analysis(self) -> Analysis<'s> {
        Analysis {
            code: self.code,
            scopes: self.scopes,
            edits: self.edits,
            globals: self.globals,
            uses: self.uses,
            should_wrap: self.should_wrap,
            required: self.required,
            named_exports: self.named_exports,
            helpers_name: self.helpers_name,
        }
    }

    fn current_scope(&self) -> ScopeId {
        self.scope_stack
            .last()
            .copied()
            .unwrap_or_else(|| self.scopes.root())
    }

    fn is_free(&self, ident: &IdentifierReference) -> bool {
        is_free_reference(self.scopes.scoping(), ident)
    }

    fn force_wrap(&mut self, reason: &'static str) {
        if !self.should_wrap {
            debug!(id = self.id, reason, "module will be wrapped");
        }
        self.should_wrap = true;
    }

    fn helper(&self, name: &str) -> String {
        format!("{}.{}", self.helpers_name, name)
    }

    /// Replaces a reference, keeping shorthand properties well-formed.
    fn replace_reference(&mut self, it: &IdentifierReference, parent: Parent, replacement: &str) {
        let text = match parent {
            Parent::Property {
                shorthand: true, ..
            } => format!("{}: {}", it.name, replacement),
            _ => replacement.to_string(),
        };
        self.edits.overwrite(it.span.start, it.span.end, text);
    }

    /// Usage bookkeeping for a free `module` / `exports` occurrence.
    fn record_module_use(&mut self, name: &str) {
        match name {
            "module" => self.uses.module = true,
            "exports" => self.uses.exports = true,
            _ => return,
        }
        self.globals.insert(name.to_string());
        self.force_wrap("free module/exports reference");
    }

    // ═══════════════════════════════════════════════════════════════════════
    // REQUIRE BOOKKEEPING
    // ═══════════════════════════════════════════════════════════════════════

    /// Target of a `require('x')` call that can be turned into an import.
    fn static_require_source(&self, call: &CallExpression) -> Option<String> {
        let Expression::Identifier(callee) = &call.callee else {
            return None;
        };
        if callee.name.as_str() != "require" || !self.is_free(callee) {
            return None;
        }
        if call.arguments.len() != 1 {
            return None;
        }
        let source = match call.arguments[0].as_expression()? {
            Expression::StringLiteral(lit) => lit.value.to_string(),
            Expression::TemplateLiteral(tpl) if tpl.expressions.is_empty() => tpl
                .quasis
                .first()
                .and_then(|quasi| quasi.value.cooked.as_ref())
                .map(|cooked| cooked.to_string())?,
            _ => return None,
        };
        if self.options.is_ignored(&source) {
            return None;
        }
        Some(source)
    }

    fn static_require_init(&self, init: &Expression) -> Option<String> {
        match init {
            Expression::CallExpression(call) => self.static_require_source(call),
            _ => None,
        }
    }

    fn generate_require_name(&mut self) -> String {
        let scope = self.current_scope();
        loop {
            let name = format!("require$${}", self.uid);
            self.uid += 1;
            if !self.scopes.contains(scope, &name) && !self.globals.contains(&name) {
                let root = self.scopes.root();
                self.scopes.declare(root, &name);
                return name;
            }
        }
    }

    fn require_entry(&mut self, source: &str, preferred: Option<&str>) -> &mut RequiredEntry {
        if let Some(index) = self.required.get_index_of(source) {
            return &mut self.required[index];
        }
        let name = match preferred {
            Some(name) => name.to_string(),
            None => self.generate_require_name(),
        };
        trace!(id = self.id, source, name = name.as_str(), "registered require");
        self.required
            .entry(source.to_string())
            .or_insert(RequiredEntry {
                source: source.to_string(),
                name,
                imports_default: false,
            })
    }

    fn remove_elided_declarators(&mut self, decl: &VariableDeclaration) {
        let flags: Vec<(Span, bool)> = decl
            .declarations
            .iter()
            .map(|d| (d.span, self.removed_declarators.contains(&d.span)))
            .collect();
        if !flags.iter().any(|(_, removed)| *removed) {
            return;
        }
        if flags.iter().all(|(_, removed)| *removed) {
            self.remove_statement(decl.span);
            return;
        }
        for (start, end) in elision_ranges(&flags) {
            self.edits.remove(start, end);
        }
    }

    /// Drops a statement, leaving an empty statement where one is syntactically required.
    fn remove_statement(&mut self, span: Span) {
        match self.parents.parent_of(span) {
            Parent::StatementList => self.edits.remove(span.start, span.end),
            _ => self.edits.overwrite(span.start, span.end, ";"),
        }
    }
}

/// Ranges to delete so that only the kept declarators (and their separators) remain.
fn elision_ranges(declarators: &[(Span, bool)]) -> Vec<(u32, u32)> {
    let mut ranges: Vec<(u32, u32)> = Vec::new();
    let mut push = |start: u32, end: u32| {
        if start >= end {
            return;
        }
        match ranges.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => ranges.push((start, end)),
        }
    };

    let mut cursor = declarators.first().map_or(0, |(span, _)| span.start);
    let mut keep = false;
    for (span, removed) in declarators {
        if *removed {
            push(cursor, span.end);
        } else {
            if !keep {
                push(cursor, span.start);
                keep = true;
            }
            cursor = span.end;
        }
    }
    ranges
}

impl<'a> Visit<'a> for Rewriter<'_, '_> {
    fn enter_node(&mut self, kind: AstKind<'a>) {
        self.parents.push(kind);
    }

    fn leave_node(&mut self, _kind: AstKind<'a>) {
        self.parents.pop();
    }

    fn enter_scope(&mut self, _flags: ScopeFlags, scope_id: &Cell<Option<ScopeId>>) {
        let scope = scope_id.get().unwrap_or_else(|| self.current_scope());
        self.scope_stack.push(scope);
    }

    fn leave_scope(&mut self) {
        self.scope_stack.pop();
    }

    fn visit_program(&mut self, program: &Program<'a>) {
        for stmt in &program.body {
            if let Statement::ExpressionStatement(stmt) = stmt {
                if let Expression::AssignmentExpression(assign) = &stmt.expression {
                    self.top_level_assignments.insert(assign.span);
                }
            }
        }
        walk::walk_program(self, program);
    }

    fn visit_statement(&mut self, stmt: &Statement<'a>) {
        if self.dead_statements.contains(&stmt.span()) {
            return;
        }
        walk::walk_statement(self, stmt);
    }

    fn visit_expression(&mut self, expr: &Expression<'a>) {
        if self.dead_expressions.contains(&expr.span()) {
            return;
        }
        walk::walk_expression(self, expr);
    }

    fn visit_if_statement(&mut self, it: &IfStatement<'a>) {
        match static_eval::is_truthy(&it.test) {
            Some(true) => {
                if let Some(alternate) = &it.alternate {
                    self.dead_statements.insert(alternate.span());
                }
            }
            Some(false) => {
                self.dead_statements.insert(it.consequent.span());
            }
            None => {}
        }
        walk::walk_if_statement(self, it);
    }

    fn visit_conditional_expression(&mut self, it: &ConditionalExpression<'a>) {
        match static_eval::is_truthy(&it.test) {
            Some(true) => {
                self.dead_expressions.insert(it.alternate.span());
            }
            Some(false) => {
                self.dead_expressions.insert(it.consequent.span());
            }
            None => {}
        }
        walk::walk_conditional_expression(self, it);
    }

    fn visit_function(&mut self, it: &Function<'a>, flags: ScopeFlags) {
        self.function_depth += 1;
        walk::walk_function(self, it, flags);
        self.function_depth -= 1;
    }

    fn visit_arrow_function_expression(&mut self, it: &ArrowFunctionExpression<'a>) {
        self.function_depth += 1;
        walk::walk_arrow_function_expression(self, it);
        self.function_depth -= 1;
    }

    /// `this` inside class bodies refers to the class, never the module.
    fn visit_class(&mut self, it: &Class<'a>) {
        self.function_depth += 1;
        walk::walk_class(self, it);
        self.function_depth -= 1;
    }

    fn visit_return_statement(&mut self, it: &ReturnStatement<'a>) {
        if self.function_depth == 0 {
            self.force_wrap("top-level return");
        }
        walk::walk_return_statement(self, it);
    }

    fn visit_this_expression(&mut self, it: &ThisExpression) {
        if self.function_depth == 0 && !self.options.ignore_global {
            self.uses.global = true;
            let replacement = self.helper("commonjsGlobal");
            self.edits.overwrite(it.span.start, it.span.end, replacement);
        }
    }

    fn visit_unary_expression(&mut self, it: &UnaryExpression<'a>) {
        if it.operator == UnaryOperator::Typeof {
            if let Some(flat) = flatten(&it.argument) {
                let is_module_object =
                    matches!(flat.keypath.as_str(), "module" | "exports" | "module.exports");
                if is_module_object && self.is_free(flat.base) {
                    self.edits.overwrite(it.span.start, it.span.end, "'object'");
                    let base = flat.base.name.to_string();
                    self.record_module_use(&base);
                    return;
                }
            }
        }
        walk::walk_unary_expression(self, it);
    }

    fn visit_identifier_reference(&mut self, it: &IdentifierReference<'a>) {
        let parent = self.parents.parent_of(it.span);
        if !reference::is_reference(it.span, parent) || !self.is_free(it) {
            return;
        }
        let name = it.name.as_str();
        match name {
            "require" => {
                self.uses.require = true;
                let helper = if self.options.allow_dynamic_require {
                    "commonjsDynamicRequire"
                } else {
                    "commonjsRequire"
                };
                let replacement = self.helper(helper);
                self.replace_reference(it, parent, &replacement);
            }
            "module" | "exports" => self.record_module_use(name),
            "global" if !self.options.ignore_global => {
                self.uses.global = true;
                let replacement = self.helper("commonjsGlobal");
                self.replace_reference(it, parent, &replacement);
            }
            "define" => self.replace_reference(it, parent, "undefined"),
            _ => {}
        }
        self.globals.insert(name.to_string());
    }

    fn visit_assignment_expression(&mut self, it: &AssignmentExpression<'a>) {
        let export_path = flatten_target(&it.left)
            .filter(|flat| flat.keypath != "exports" && self.is_free(flat.base))
            .and_then(|flat| {
                match_exports_path(&flat.keypath).map(|name| (flat.base.name.to_string(), name))
            });

        let Some((base, exported_name)) = export_path else {
            walk::walk_assignment_expression(self, it);
            return;
        };

        match base.as_str() {
            "module" => self.uses.module = true,
            _ => self.uses.exports = true,
        }
        if !self.top_level_assignments.contains(&it.span) {
            self.force_wrap("export assignment below top level");
        }
        if it.operator != AssignmentOperator::Assign {
            self.force_wrap("compound export assignment");
        }

        match exported_name {
            Some(name) => {
                self.named_exports.insert(name);
            }
            None => {
                if let Expression::ObjectExpression(object) = &it.right {
                    for prop in &object.properties {
                        let ObjectPropertyKind::ObjectProperty(prop) = prop else {
                            continue;
                        };
                        if prop.computed {
                            continue;
                        }
                        if let PropertyKey::StaticIdentifier(key) = &prop.key {
                            if is_legal_identifier(key.name.as_str()) {
                                self.named_exports.insert(key.name.to_string());
                            }
                        }
                    }
                }
            }
        }

        // The left-hand side is elided from output; only the value is walked.
        self.parents.push_frame(it.span, Parent::Other);
        self.visit_expression(&it.right);
        self.parents.pop();
    }

    fn visit_variable_declaration(&mut self, it: &VariableDeclaration<'a>) {
        let exported = self.parents.parent_of(it.span) == Parent::ExportDeclaration;
        let saved = std::mem::replace(&mut self.in_exported_declaration, exported);
        walk::walk_variable_declaration(self, it);
        self.in_exported_declaration = saved;
        self.remove_elided_declarators(it);
    }

    fn visit_variable_declarator(&mut self, it: &VariableDeclarator<'a>) {
        if let (BindingPattern::BindingIdentifier(binding), Some(init)) = (&it.id, &it.init) {
            let eligible = !self.in_exported_declaration
                && self.current_scope() == self.scopes.root()
                && !self.prescan.is_reassigned(binding);
            if let Some(source) = eligible.then(|| self.static_require_init(init)).flatten() {
                let name = binding.name.as_str();
                let entry = self.require_entry(&source, Some(name));
                entry.imports_default = true;
                if entry.name == name {
                    self.removed_declarators.insert(it.span);
                    return;
                }
            }
        }
        walk::walk_variable_declarator(self, it);
    }

    fn visit_call_expression(&mut self, it: &CallExpression<'a>) {
        let Some(source) = self.static_require_source(it) else {
            walk::walk_call_expression(self, it);
            return;
        };

        let (index, parent) = self.parents.enclosing(it.span);
        if let Parent::ExpressionStatement(stmt_span) = parent {
            self.require_entry(&source, None);
            let (_, container) = self.parents.enclosing_below(index, stmt_span);
            if container == Parent::StatementList {
                self.edits.remove(stmt_span.start, stmt_span.end);
            } else {
                self.edits.overwrite(stmt_span.start, stmt_span.end, ";");
            }
            return;
        }

        let entry = self.require_entry(&source, None);
        entry.imports_default = true;
        let name = entry.name.clone();
        self.edits.overwrite(it.span.start, it.span.end, name);
    }
}

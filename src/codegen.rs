//! Output assembly for rewritten CommonJS modules.
//!
//! Turns the rewriter's findings into an import block, either a factory
//! wrapper or statically hoisted `exports.x` bindings, and an export block.

use crate::classify::has_interop_marker;
use crate::error::Result;
use crate::names::{get_name, is_legal_identifier};
use crate::proxy::{proxy_id, quote, HELPERS_ID};
use crate::scope::{deconflict, ScopeTree, BLACKLIST};
use crate::splice::SourceEdits;
use crate::transform::{
    flatten_target, is_free_reference, match_exports_path, RequiredEntry, RewriteOptions,
    TransformedModule, Uses,
};
use indexmap::{IndexMap, IndexSet};
use oxc_ast::ast::{Expression, Program, Statement};
use oxc_span::GetSpan;
use std::collections::HashSet;
use tracing::warn;

/// Everything the rewriter learned about one module.
pub(crate) struct Analysis<'s> {
    pub(crate) code: &'s str,
    pub(crate) scopes: ScopeTree<'s>,
    pub(crate) edits: SourceEdits<'s>,
    pub(crate) globals: HashSet<String>,
    pub(crate) uses: Uses,
    pub(crate) should_wrap: bool,
    pub(crate) required: IndexMap<String, RequiredEntry>,
    pub(crate) named_exports: IndexSet<String>,
    pub(crate) helpers_name: String,
}

struct NamedExport {
    name: String,
    declaration: String,
}

pub(crate) fn assemble(
    analysis: Analysis<'_>,
    program: &Program,
    id: &str,
    options: &RewriteOptions,
) -> Result<TransformedModule> {
    let Analysis {
        code,
        mut scopes,
        mut edits,
        globals,
        uses,
        should_wrap,
        required,
        mut named_exports,
        helpers_name,
    } = analysis;
    let root = scopes.root();

    let include_helpers = should_wrap || uses.global || uses.require;
    let import_block = import_block(&required, &helpers_name, include_helpers);
    let module_name = deconflict(&mut scopes, root, &globals, &get_name(id));

    let mut named: Vec<NamedExport> = Vec::new();
    if !options.is_entry {
        named.push(NamedExport {
            name: "__moduleExports".to_string(),
            declaration: format!("export {{ {} as __moduleExports }};", module_name),
        });
    }

    let mut property_assignments = Vec::new();
    let mut has_default_export = false;
    let wrapper_start;
    let wrapper_end;

    if should_wrap {
        let args = if uses.exports {
            "module, exports"
        } else {
            "module"
        };
        wrapper_start = format!(
            "var {} = {}.createCommonjsModule(function ({}) {{\n",
            module_name, helpers_name, args
        );
        wrapper_end = "\n});".to_string();
    } else {
        // name -> local binding, in first-assignment order
        let mut locals: IndexMap<String, String> = IndexMap::new();

        for stmt in &program.body {
            let Statement::ExpressionStatement(stmt) = stmt else {
                continue;
            };
            let Expression::AssignmentExpression(assign) = &stmt.expression else {
                continue;
            };
            let Some(flat) = flatten_target(&assign.left) else {
                continue;
            };
            if !is_free_reference(scopes.scoping(), flat.base) {
                continue;
            }
            let Some(exported) = match_exports_path(&flat.keypath) else {
                continue;
            };
            let left = assign.left.span();

            match exported {
                None => {
                    has_default_export = true;
                    edits.overwrite(left.start, left.end, format!("var {}", module_name));
                }
                Some(name) => {
                    if let Some(local) = locals.get(&name) {
                        edits.overwrite(stmt.span.start, left.end, local.clone());
                        continue;
                    }
                    let local = deconflict(&mut scopes, root, &globals, &name);
                    edits.overwrite(stmt.span.start, left.end, format!("var {}", local));
                    if name != "default" {
                        let declaration = if local == name {
                            format!("export {{ {} }};", name)
                        } else {
                            format!("export {{ {} as {} }};", local, name)
                        };
                        named.push(NamedExport {
                            name: name.clone(),
                            declaration,
                        });
                        named_exports.shift_remove(&name);
                    }
                    property_assignments.push(format!("{}.{} = {};", module_name, name, local));
                    locals.insert(name, local);
                }
            }
        }

        wrapper_start = String::new();
        wrapper_end = if has_default_export {
            String::new()
        } else {
            let props: Vec<String> = locals
                .iter()
                .map(|(name, local)| format!("\t{}: {}", name, local))
                .collect();
            format!("\n\nvar {} = {{\n{}\n}};", module_name, props.join(",\n"))
        };
    }

    let mut exporter = Exporter {
        module_name: &module_name,
        globals: &globals,
        exported: named.iter().map(|n| n.name.clone()).collect(),
    };
    for name in options.custom_named_exports {
        if name == "default" || !is_legal_identifier(name) {
            warn!(id, name = name.as_str(), "ignoring named export that is not a legal identifier");
            continue;
        }
        exporter.add(name, &mut scopes, &mut named);
    }
    for name in named_exports.iter().filter(|n| !BLACKLIST.contains(n.as_str())) {
        exporter.add(name, &mut scopes, &mut named);
    }

    let default_export = if options.has_es_default_export {
        None
    } else if has_interop_marker(code) {
        Some(format!(
            "export default {}.unwrapExports({});",
            helpers_name, module_name
        ))
    } else {
        Some(format!("export default {};", module_name))
    };

    let has_any_default = has_default_export || options.has_es_default_export;
    let emitted: Vec<&NamedExport> = named
        .iter()
        .filter(|n| n.name != "default" || !has_any_default)
        .collect();

    let synthesized_default = default_export.is_some();
    let mut export_lines: Vec<String> = default_export.into_iter().collect();
    export_lines.extend(emitted.iter().map(|n| n.declaration.clone()));
    if has_default_export {
        export_lines.extend(property_assignments);
    }
    let export_block = format!("\n\n{}", export_lines.join("\n"));

    let mut rendered = edits.render()?;
    rendered
        .trim()
        .prepend(format!("{}{}", import_block, wrapper_start))
        .trim()
        .append(format!("{}{}", wrapper_end, export_block));

    Ok(TransformedModule {
        code: rendered.code(),
        map: options.source_map.then(|| rendered.source_map(id)),
        sources: required.keys().cloned().collect(),
        named_exports: emitted
            .iter()
            .filter(|n| n.name != "__moduleExports")
            .map(|n| n.name.clone())
            .collect(),
        has_default_export: synthesized_default,
        should_wrap,
    })
}

/// Emits `export var x = M.x;` style re-exports of module properties.
struct Exporter<'e> {
    module_name: &'e str,
    globals: &'e HashSet<String>,
    exported: HashSet<String>,
}

impl Exporter<'_> {
    fn add(&mut self, name: &str, scopes: &mut ScopeTree<'_>, named: &mut Vec<NamedExport>) {
        if !self.exported.insert(name.to_string()) {
            return;
        }
        let root = scopes.root();
        let local = deconflict(scopes, root, self.globals, name);
        let declaration = if local == name {
            format!("export var {} = {}.{};", name, self.module_name, name)
        } else {
            format!(
                "var {} = {}.{};\nexport {{ {} as {} }};",
                local, self.module_name, name, local, name
            )
        };
        named.push(NamedExport {
            name: name.to_string(),
            declaration,
        });
    }
}

fn import_block(
    required: &IndexMap<String, RequiredEntry>,
    helpers_name: &str,
    include_helpers: bool,
) -> String {
    let mut lines = Vec::with_capacity(required.len() * 2 + 1);
    if include_helpers {
        lines.push(format!("import * as {} from {};", helpers_name, quote(HELPERS_ID)));
    }
    for source in required.keys() {
        lines.push(format!("import {};", quote(source)));
    }
    for entry in required.values() {
        let proxy = quote(&proxy_id(&entry.source));
        if entry.imports_default {
            lines.push(format!("import {} from {};", entry.name, proxy));
        } else {
            lines.push(format!("import {};", proxy));
        }
    }
    format!("{}\n\n", lines.join("\n"))
}

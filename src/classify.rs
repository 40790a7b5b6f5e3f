//! Module Classifier
//!
//! Cheap textual pre-filters that decide whether a module needs parsing at
//! all, plus the top-level scan that tells ES modules (and whether they carry
//! a default export) apart from everything else.

use crate::error::{CommonJsError, Result};
use oxc_allocator::Allocator;
use oxc_ast::ast::{ModuleExportName, Program, Statement};
use oxc_parser::{ParseOptions, Parser};
use oxc_span::SourceType;
use regex::Regex;

lazy_static::lazy_static! {
    static ref CJS_KEYWORDS: Regex = Regex::new(r"\b(?:require|module|exports|global)\b").unwrap();
    static ref CJS_KEYWORDS_WITHOUT_GLOBAL: Regex = Regex::new(r"\b(?:require|module|exports)\b").unwrap();
    static ref MODULE_SYNTAX: Regex = Regex::new(r"\b(?:import|export)\b").unwrap();
}

/// Literal token left behind by ESM-to-CommonJS transpilers.
pub const INTEROP_MARKER: &str = "__esModule";

/// Whether `code` mentions any CommonJS keyword as a whole word.
pub fn has_cjs_keywords(code: &str, ignore_global: bool) -> bool {
    if ignore_global {
        CJS_KEYWORDS_WITHOUT_GLOBAL.is_match(code)
    } else {
        CJS_KEYWORDS.is_match(code)
    }
}

/// Whether `code` could contain import or export statements.
pub fn may_have_module_syntax(code: &str) -> bool {
    MODULE_SYNTAX.is_match(code)
}

pub fn has_interop_marker(code: &str) -> bool {
    code.contains(INTEROP_MARKER)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EsModuleInfo {
    pub is_es_module: bool,
    pub has_default_export: bool,
}

/// Scans top-level statements for ES module syntax.
pub fn check_es_module(program: &Program) -> EsModuleInfo {
    let mut info = EsModuleInfo::default();
    for stmt in &program.body {
        match stmt {
            Statement::ExportDefaultDeclaration(_) => {
                return EsModuleInfo {
                    is_es_module: true,
                    has_default_export: true,
                };
            }
            Statement::ExportNamedDeclaration(decl) => {
                if decl
                    .specifiers
                    .iter()
                    .any(|spec| export_name(&spec.exported) == "default")
                {
                    return EsModuleInfo {
                        is_es_module: true,
                        has_default_export: true,
                    };
                }
                info.is_es_module = true;
            }
            Statement::ImportDeclaration(_) | Statement::ExportAllDeclaration(_) => {
                info.is_es_module = true;
            }
            _ => {}
        }
    }
    info
}

fn export_name<'n>(name: &'n ModuleExportName) -> &'n str {
    match name {
        ModuleExportName::IdentifierName(id) => id.name.as_str(),
        ModuleExportName::IdentifierReference(id) => id.name.as_str(),
        ModuleExportName::StringLiteral(lit) => lit.value.as_str(),
    }
}

/// Parses `code` as a module that may `return` at top level.
pub fn parse_module<'a>(allocator: &'a Allocator, code: &'a str, id: &str) -> Result<Program<'a>> {
    let options = ParseOptions {
        allow_return_outside_function: true,
        ..ParseOptions::default()
    };
    let ret = Parser::new(allocator, code, SourceType::mjs())
        .with_options(options)
        .parse();

    if let Some(err) = ret.errors.first() {
        let offset = err
            .labels
            .as_ref()
            .and_then(|labels| labels.first())
            .map(|label| label.offset())
            .unwrap_or(0);
        let (line, column) = line_column(code, offset);
        return Err(CommonJsError::Syntax {
            id: id.to_string(),
            message: err.to_string(),
            line,
            column,
        });
    }
    if ret.panicked {
        return Err(CommonJsError::Syntax {
            id: id.to_string(),
            message: "Unexpected end of input".to_string(),
            line: 1,
            column: 0,
        });
    }
    Ok(ret.program)
}

/// One-based line, zero-based column.
fn line_column(code: &str, offset: usize) -> (u32, u32) {
    let offset = offset.min(code.len());
    let before = code.get(..offset).unwrap_or(code);
    let line = before.matches('\n').count() + 1;
    let column = before
        .rsplit('\n')
        .next()
        .map(|tail| tail.chars().count())
        .unwrap_or(0);
    (line as u32, column as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn es_info(code: &str) -> EsModuleInfo {
        let allocator = Allocator::default();
        let program = parse_module(&allocator, code, "test.js").unwrap();
        check_es_module(&program)
    }

    #[test]
    fn test_keyword_prefilter() {
        assert!(has_cjs_keywords("const x = require('x');", false));
        assert!(has_cjs_keywords("module.exports = 1;", true));
        assert!(has_cjs_keywords("global.foo = 1;", false));
        assert!(!has_cjs_keywords("global.foo = 1;", true));
        assert!(!has_cjs_keywords("const requirement = modules + exportsCount;", false));
    }

    #[test]
    fn test_module_syntax_prefilter() {
        assert!(may_have_module_syntax("export const a = 1;"));
        assert!(!may_have_module_syntax("const exporter = 1;"));
    }

    #[test]
    fn test_default_export_detection() {
        assert_eq!(
            es_info("export default 42;"),
            EsModuleInfo {
                is_es_module: true,
                has_default_export: true
            }
        );
        assert!(es_info("const a = 1; export { a as default };").has_default_export);
        assert!(es_info("export { default } from './other.js';").has_default_export);
    }

    #[test]
    fn test_es_module_without_default() {
        let info = es_info("import x from 'x'; export const y = x;");
        assert!(info.is_es_module);
        assert!(!info.has_default_export);
        assert!(es_info("export * from './all.js';").is_es_module);
    }

    #[test]
    fn test_plain_script_is_not_es_module() {
        assert_eq!(es_info("module.exports = 1;"), EsModuleInfo::default());
    }

    #[test]
    fn test_top_level_return_parses() {
        assert!(es_info("if (x) return;\nmodule.exports = 1;") == EsModuleInfo::default());
    }

    #[test]
    fn test_syntax_error_carries_id_and_location() {
        let allocator = Allocator::default();
        let err = parse_module(&allocator, "var a = 1;\nvar = ;", "/src/bad.js").unwrap_err();
        match err {
            CommonJsError::Syntax { id, line, .. } => {
                assert_eq!(id, "/src/bad.js");
                assert_eq!(line, 2);
            }
            other => panic!("expected syntax error, got: {}", other),
        }
    }
}

//! Synthetic modules: the runtime helpers and per-edge interop proxies.

use crate::names::get_name;
use crate::registry::Classification;

pub const PROXY_PREFIX: &str = "\0commonjs-proxy:";
pub const EXTERNAL_PREFIX: &str = "\0commonjs-external:";
pub const HELPERS_ID: &str = "\0commonjsHelpers";

/// Runtime support imported by every rewritten module that needs it.
pub const HELPERS: &str = r#"
export var commonjsGlobal = typeof globalThis !== 'undefined' ? globalThis : typeof window !== 'undefined' ? window : typeof global !== 'undefined' ? global : typeof self !== 'undefined' ? self : {};

export function commonjsRequire () {
	throw new Error('Dynamic requires are not currently supported by rollup-plugin-commonjs');
}

export function commonjsDynamicRequire (id) {
	if (typeof require === 'function') return require(id);
	throw new Error('Could not dynamically require "' + id + '"');
}

export function unwrapExports (x) {
	return x && x.__esModule && Object.prototype.hasOwnProperty.call(x, 'default') ? x['default'] : x;
}

export function createCommonjsModule(fn, module) {
	return module = { exports: {} }, fn(module, module.exports), module.exports;
}

export function getCjsExportFromNamespace (n) {
	return n && n['default'] || n;
}"#;

/// JSON string literal, which is also a valid JavaScript string literal.
pub fn quote(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("'{}'", value))
}

pub fn proxy_id(target: &str) -> String {
    format!("{}{}", PROXY_PREFIX, target)
}

pub fn external_id(target: &str) -> String {
    format!("{}{}", EXTERNAL_PREFIX, target)
}

/// Adapter whose default export is what a CommonJS consumer of `target` would get.
pub fn proxy_module(target: &str, classification: Classification) -> String {
    let source = quote(target);
    let name = get_name(target);
    match classification {
        Classification::EsmWithDefault => format!("export {{default}} from {};", source),
        Classification::Cjs => format!(
            "import {{ __moduleExports }} from {}; export default __moduleExports;",
            source
        ),
        Classification::EsmWithoutDefault => format!(
            "import * as {} from {}; export default {};",
            name, source, name
        ),
        Classification::Unknown => format!(
            "import * as {name} from {source}; import {{getCjsExportFromNamespace}} from {helpers}; export default getCjsExportFromNamespace({name})",
            name = name,
            source = source,
            helpers = quote(HELPERS_ID),
        ),
    }
}

/// Default-import passthrough for a dependency outside the graph.
pub fn external_proxy(target: &str) -> String {
    let name = get_name(target);
    format!(
        "import {} from {}; export default {};",
        name,
        quote(target),
        name
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_escapes_reserved_prefix() {
        assert_eq!(quote("./a.js"), "\"./a.js\"");
        assert_eq!(quote(HELPERS_ID), "\"\\u0000commonjsHelpers\"");
    }

    #[test]
    fn test_proxy_shapes() {
        assert_eq!(
            proxy_module("/src/a.js", Classification::EsmWithDefault),
            "export {default} from \"/src/a.js\";"
        );
        assert_eq!(
            proxy_module("/src/a.js", Classification::Cjs),
            "import { __moduleExports } from \"/src/a.js\"; export default __moduleExports;"
        );
        assert_eq!(
            proxy_module("/src/a.js", Classification::EsmWithoutDefault),
            "import * as a from \"/src/a.js\"; export default a;"
        );
        let unknown = proxy_module("/src/a.js", Classification::Unknown);
        assert!(unknown.contains("getCjsExportFromNamespace(a)"), "got: {}", unknown);
        assert!(unknown.contains("\\u0000commonjsHelpers"), "got: {}", unknown);
    }

    #[test]
    fn test_external_proxy() {
        assert_eq!(
            external_proxy("lodash-es"),
            "import lodashEs from \"lodash-es\"; export default lodashEs;"
        );
    }

    #[test]
    fn test_helpers_export_every_runtime_function() {
        for name in [
            "commonjsGlobal",
            "commonjsRequire",
            "commonjsDynamicRequire",
            "unwrapExports",
            "createCommonjsModule",
            "getCjsExportFromNamespace",
        ] {
            assert!(HELPERS.contains(name), "missing helper {}", name);
        }
    }
}

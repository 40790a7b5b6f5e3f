//! Identifier derivation from module ids.

use regex::Regex;
use std::collections::HashSet;
use std::path::Path;

lazy_static::lazy_static! {
    static ref DASH_LETTER: Regex = Regex::new(r"-(\w)").unwrap();
    static ref ILLEGAL_CHARS: Regex = Regex::new(r"[^$_a-zA-Z0-9]").unwrap();

    /// Words that cannot be used as a binding name, plus globals a generated
    /// binding must never shadow.
    static ref FORBIDDEN_IDENTIFIERS: HashSet<&'static str> = {
        let reserved = "break case class catch const continue debugger default delete do else \
            export extends finally for function if import in instanceof let new return super \
            switch this throw try typeof var void while with yield enum await implements \
            package protected static interface private public";
        let builtins = "Infinity NaN undefined null true false eval uneval isFinite isNaN \
            parseFloat parseInt decodeURI decodeURIComponent encodeURI encodeURIComponent \
            escape unescape Object Function Boolean Symbol Error EvalError InternalError \
            RangeError ReferenceError SyntaxError TypeError URIError Number Math Date String \
            RegExp Array Int8Array Uint8Array Uint8ClampedArray Int16Array Uint16Array \
            Int32Array Uint32Array Float32Array Float64Array Map Set WeakMap WeakSet SIMD \
            ArrayBuffer DataView JSON Promise Generator GeneratorFunction Reflect Proxy Intl";
        let mut s: HashSet<&'static str> = reserved.split_whitespace().collect();
        s.extend(builtins.split_whitespace());
        s.insert("");
        s
    };
}

/// Turns an arbitrary string into a legal JavaScript identifier.
///
/// `-x` sequences are camel-cased, any other illegal character becomes `_`,
/// and names starting with a digit or colliding with a reserved word or
/// builtin get a leading underscore.
pub fn make_legal_identifier(input: &str) -> String {
    let camel = DASH_LETTER.replace_all(input, |caps: &regex::Captures| caps[1].to_uppercase());
    let mut name = ILLEGAL_CHARS.replace_all(&camel, "_").into_owned();

    let starts_with_digit = name.chars().next().is_some_and(|c| c.is_ascii_digit());
    if starts_with_digit || FORBIDDEN_IDENTIFIERS.contains(name.as_str()) {
        name.insert(0, '_');
    }
    name
}

/// Binding name used for a module's own exports object and for proxies of it.
///
/// Derived from the file stem of `id`; `index` files take their directory's name.
pub fn get_name(id: &str) -> String {
    let path = Path::new(id);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    if stem == "index" {
        let dir = path
            .parent()
            .and_then(Path::file_name)
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        return make_legal_identifier(&dir);
    }
    make_legal_identifier(&stem)
}

pub fn is_legal_identifier(name: &str) -> bool {
    make_legal_identifier(name) == name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_legal_identifier() {
        assert_eq!(make_legal_identifier("foo"), "foo");
        assert_eq!(make_legal_identifier("lodash-es"), "lodashEs");
        assert_eq!(make_legal_identifier("foo.bar"), "foo_bar");
        assert_eq!(make_legal_identifier("2d"), "_2d");
        assert_eq!(make_legal_identifier("default"), "_default");
        assert_eq!(make_legal_identifier("Object"), "_Object");
        assert_eq!(make_legal_identifier(""), "_");
    }

    #[test]
    fn test_get_name_uses_stem() {
        assert_eq!(get_name("/project/node_modules/left-pad/lib/left-pad.js"), "leftPad");
        assert_eq!(get_name("src/util.min.js"), "util_min");
    }

    #[test]
    fn test_get_name_index_uses_directory() {
        assert_eq!(get_name("/project/node_modules/object-assign/index.js"), "objectAssign");
        assert_eq!(get_name("index.js"), "_");
    }

    #[test]
    fn test_is_legal_identifier() {
        assert!(is_legal_identifier("bar"));
        assert!(is_legal_identifier("$x_1"));
        assert!(!is_legal_identifier("class"));
        assert!(!is_legal_identifier("a-b"));
    }
}

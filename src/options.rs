use crate::error::{CommonJsError, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Build-level configuration, deserialized from the host's camelCase JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommonJsOptions {
    /// Extensions (with the leading dot) of files eligible for rewriting.
    pub extensions: Vec<String>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub ignore_global: bool,
    pub source_map: bool,
    /// Explicit named exports, keyed by module id.
    pub named_exports: HashMap<String, Vec<String>>,
    /// Require targets that stay runtime `require` calls.
    pub ignore: Vec<String>,
    pub allow_dynamic_require: bool,
    pub external: Vec<String>,
}

impl Default for CommonJsOptions {
    fn default() -> Self {
        Self {
            extensions: vec![".js".to_string()],
            include: Vec::new(),
            exclude: Vec::new(),
            ignore_global: false,
            source_map: true,
            named_exports: HashMap::new(),
            ignore: Vec::new(),
            allow_dynamic_require: false,
            external: Vec::new(),
        }
    }
}

impl CommonJsOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Ignored requires only make sense if `require` survives at runtime.
    pub fn dynamic_require_allowed(&self) -> bool {
        self.allow_dynamic_require || !self.ignore.is_empty()
    }

    pub fn named_exports_for(&self, id: &str) -> &[String] {
        self.named_exports.get(id).map_or(&[], Vec::as_slice)
    }

    pub fn is_external(&self, id: &str) -> bool {
        self.external.iter().any(|external| external == id)
    }
}

/// Why a module id is not handed to the rewriter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Virtual,
    Excluded,
    NotIncluded,
    Extension,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::Virtual => "virtual module",
            SkipReason::Excluded => "excluded",
            SkipReason::NotIncluded => "not included",
            SkipReason::Extension => "extension not eligible",
        }
    }
}

/// Compiled include / exclude / extension filter.
#[derive(Debug, Clone)]
pub struct IdFilter {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
    extensions: Vec<String>,
}

impl IdFilter {
    pub fn new(options: &CommonJsOptions) -> Result<Self> {
        Ok(Self {
            include: compile(&options.include)?,
            exclude: compile(&options.exclude)?,
            extensions: options.extensions.clone(),
        })
    }

    pub fn skip_reason(&self, id: &str) -> Option<SkipReason> {
        if id.starts_with('\0') {
            return Some(SkipReason::Virtual);
        }
        if self.exclude.as_ref().is_some_and(|set| set.is_match(id)) {
            return Some(SkipReason::Excluded);
        }
        if self.include.as_ref().is_some_and(|set| !set.is_match(id)) {
            return Some(SkipReason::NotIncluded);
        }
        let extension = Path::new(id)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        if !self.extensions.iter().any(|allowed| *allowed == extension) {
            return Some(SkipReason::Extension);
        }
        None
    }

    pub fn accepts(&self, id: &str) -> bool {
        self.skip_reason(id).is_none()
    }
}

fn compile(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| CommonJsError::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    let set = builder.build().map_err(|source| CommonJsError::InvalidPattern {
        pattern: patterns.join(", "),
        source,
    })?;
    Ok(Some(set))
}

//! Per-build session: the transform, load and resolve hooks a host drives.
//!
//! A session owns the classification registry for one build. Hosts create one
//! per build and discard it afterwards; clones share the same state and can
//! be moved into concurrently scheduled tasks.

use crate::classify::{
    check_es_module, has_cjs_keywords, may_have_module_syntax, parse_module, EsModuleInfo,
};
use crate::error::{CommonJsError, Result};
use crate::options::{CommonJsOptions, IdFilter};
use crate::proxy::{external_proxy, proxy_module, EXTERNAL_PREFIX, HELPERS, HELPERS_ID, PROXY_PREFIX};
use crate::registry::{Classification, ClassificationRegistry};
use crate::resolve::{self, ResolverChain};
use crate::splice::SourceMap;
use crate::transform::{transform_commonjs, RewriteOptions, TransformedModule};
use dashmap::DashMap;
use oxc_allocator::Allocator;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of a successful rewrite.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformOutput {
    pub code: String,
    pub map: Option<SourceMap>,
}

/// What the session learned about one transformed module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRecord {
    pub classification: Classification,
    pub is_es_module: bool,
    pub has_default_export: bool,
    pub wrapped: bool,
    /// Static require targets, in first-occurrence order.
    pub sources: Vec<String>,
    pub named_exports: Vec<String>,
}

impl ModuleRecord {
    fn untransformed(classification: Classification, info: EsModuleInfo) -> Self {
        Self {
            classification,
            is_es_module: info.is_es_module,
            has_default_export: info.has_default_export,
            wrapped: false,
            sources: Vec::new(),
            named_exports: Vec::new(),
        }
    }
}

struct SessionInner {
    options: CommonJsOptions,
    filter: IdFilter,
    resolvers: ResolverChain,
    registry: Arc<ClassificationRegistry>,
    records: DashMap<String, ModuleRecord>,
}

#[derive(Clone)]
pub struct BuildSession {
    inner: Arc<SessionInner>,
}

impl BuildSession {
    pub fn new(options: CommonJsOptions) -> Result<Self> {
        Self::with_resolvers(options, ResolverChain::new())
    }

    pub fn with_resolvers(options: CommonJsOptions, resolvers: ResolverChain) -> Result<Self> {
        let filter = IdFilter::new(&options)?;
        Ok(Self {
            inner: Arc::new(SessionInner {
                options,
                filter,
                resolvers,
                registry: Arc::new(ClassificationRegistry::new()),
                records: DashMap::new(),
            }),
        })
    }

    pub fn options(&self) -> &CommonJsOptions {
        &self.inner.options
    }

    pub fn registry(&self) -> &Arc<ClassificationRegistry> {
        &self.inner.registry
    }

    pub fn module_record(&self, id: &str) -> Option<ModuleRecord> {
        self.inner.records.get(id).map(|record| record.clone())
    }

    /// Rewrites one module, or returns `None` when its source should be used unchanged.
    ///
    /// A classification for `id` is published on every path, errors included.
    pub fn transform(&self, code: &str, id: &str, is_entry: bool) -> Result<Option<TransformOutput>> {
        let options = &self.inner.options;
        if let Some(reason) = self.inner.filter.skip_reason(id) {
            debug!(id, reason = reason.as_str(), "skipping module");
            self.publish(id, Classification::Unknown, false);
            return Ok(None);
        }

        let custom_named_exports = options.named_exports_for(id);
        let has_keywords = has_cjs_keywords(code, options.ignore_global);
        if !has_keywords && !may_have_module_syntax(code) {
            let record = ModuleRecord::untransformed(Classification::EsmWithoutDefault, EsModuleInfo::default());
            self.settle(id, record, false);
            return self.not_commonjs(id, custom_named_exports);
        }

        let allocator = Allocator::default();
        let program = match parse_module(&allocator, code, id) {
            Ok(program) => program,
            Err(err) => {
                warn!(id, error = %err, "parse failed");
                self.publish(id, Classification::Unknown, true);
                return Err(err);
            }
        };

        let info = check_es_module(&program);
        let es_classification = if info.has_default_export {
            Classification::EsmWithDefault
        } else {
            Classification::EsmWithoutDefault
        };

        if !has_keywords {
            self.settle(id, ModuleRecord::untransformed(es_classification, info), false);
            return self.not_commonjs(id, custom_named_exports);
        }

        let rewrite = RewriteOptions {
            is_entry,
            ignore_global: options.ignore_global,
            allow_dynamic_require: options.dynamic_require_allowed(),
            ignored_requires: &options.ignore,
            custom_named_exports,
            has_es_default_export: info.has_default_export,
            source_map: options.source_map,
        };

        match transform_commonjs(&program, code, id, &rewrite) {
            Ok(Some(transformed)) => {
                let classification = if info.has_default_export {
                    Classification::EsmWithDefault
                } else {
                    Classification::Cjs
                };
                let TransformedModule {
                    code,
                    map,
                    sources,
                    named_exports,
                    has_default_export,
                    should_wrap,
                } = transformed;
                let record = ModuleRecord {
                    classification,
                    is_es_module: info.is_es_module,
                    has_default_export: has_default_export || info.has_default_export,
                    wrapped: should_wrap,
                    sources,
                    named_exports,
                };
                self.settle(id, record, false);
                Ok(Some(TransformOutput { code, map }))
            }
            Ok(None) => {
                self.settle(id, ModuleRecord::untransformed(es_classification, info), false);
                Ok(None)
            }
            Err(err @ CommonJsError::NamedExportsMismatch { .. }) => {
                self.settle(id, ModuleRecord::untransformed(es_classification, info), false);
                Err(err)
            }
            Err(err) => {
                warn!(id, error = %err, "transform failed");
                self.publish(id, Classification::Unknown, true);
                Err(err)
            }
        }
    }

    /// Text of a synthetic module, or `None` for ids this session does not own.
    ///
    /// Interop proxies suspend until their target has been classified.
    pub async fn load(&self, id: &str) -> Option<String> {
        if id == HELPERS_ID {
            return Some(HELPERS.to_string());
        }
        if let Some(target) = id.strip_prefix(EXTERNAL_PREFIX) {
            return Some(external_proxy(target));
        }
        let target = id.strip_prefix(PROXY_PREFIX)?;
        debug!(id = target, "proxy waiting for classification");
        let classification = self.inner.registry.wait(target).await;
        debug!(id = target, ?classification, "proxy classification received");
        Some(proxy_module(target, classification))
    }

    pub async fn resolve_id(&self, importee: &str, importer: Option<&str>) -> Option<String> {
        resolve::resolve_id(&self.inner.resolvers, &self.inner.options, importee, importer).await
    }

    fn not_commonjs(&self, id: &str, custom_named_exports: &[String]) -> Result<Option<TransformOutput>> {
        if custom_named_exports.is_empty() {
            Ok(None)
        } else {
            Err(CommonJsError::NamedExportsMismatch { id: id.to_string() })
        }
    }

    fn settle(&self, id: &str, record: ModuleRecord, fallback: bool) {
        self.publish(id, record.classification, fallback);
        self.inner.records.insert(id.to_string(), record);
    }

    fn publish(&self, id: &str, classification: Classification, fallback: bool) {
        if self.inner.registry.resolve(id, classification) {
            debug!(id, ?classification, fallback, "classification published");
        } else {
            debug!(id, ?classification, "module was already classified");
        }
    }
}

impl std::fmt::Debug for BuildSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildSession")
            .field("options", &self.inner.options)
            .field("classified", &self.inner.registry.len())
            .finish()
    }
}

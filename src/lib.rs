//! # CommonJS Interop Engine
//!
//! Rewrites CommonJS modules into ES modules that a static bundler can link.
//!
//! ## Pipeline
//!
//! 1. **Classify**: cheap keyword checks, then a parse to tell ES modules apart
//!    from CommonJS and to find ES default exports.
//! 2. **Rewrite**: one scope-aware walk turns static `require` calls into
//!    imports and either hoists `exports.x =` assignments or wraps the module
//!    body in a factory.
//! 3. **Coordinate**: every transformed id publishes a [`Classification`].
//!    Interop proxies for dependency edges wait on it, so modules may be
//!    transformed in any order.
//!
//! A [`BuildSession`] owns the state of one build.

mod classify;
mod codegen;
mod error;
mod names;
mod options;
mod proxy;
mod reference;
mod registry;
mod resolve;
mod scope;
mod session;
mod splice;
mod static_eval;
mod transform;

#[cfg(feature = "napi")]
mod bindings;

#[cfg(test)]
mod interop_tests;

pub use classify::{check_es_module, has_cjs_keywords, parse_module, EsModuleInfo};
pub use error::{CommonJsError, Diagnostic, Result};
pub use names::{get_name, is_legal_identifier, make_legal_identifier};
pub use options::{CommonJsOptions, IdFilter, SkipReason};
pub use proxy::{external_proxy, proxy_module, EXTERNAL_PREFIX, HELPERS, HELPERS_ID, PROXY_PREFIX};
pub use registry::{Classification, ClassificationRegistry, ClassificationState};
pub use resolve::{Resolver, ResolverChain};
pub use session::{BuildSession, ModuleRecord, TransformOutput};
pub use splice::{Rendered, SourceEdits, SourceMap};
pub use static_eval::{is_falsy, is_truthy};
pub use transform::{transform_commonjs, RewriteOptions, TransformedModule};

#[cfg(feature = "napi")]
pub use bindings::CommonJsSession;

//! Import resolution bookkeeping for proxied dependency edges.
//!
//! Resolution itself belongs to the host; this layer strips and re-applies the
//! reserved prefixes around an ordered chain of host resolvers.

use crate::options::CommonJsOptions;
use crate::proxy::{external_id, proxy_id, PROXY_PREFIX};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolved id for `importee`, or `None` to defer to the next resolver.
    async fn resolve(&self, importee: &str, importer: Option<&str>) -> Option<String>;
}

#[async_trait]
impl<F> Resolver for F
where
    F: Fn(&str, Option<&str>) -> Option<String> + Send + Sync,
{
    async fn resolve(&self, importee: &str, importer: Option<&str>) -> Option<String> {
        self(importee, importer)
    }
}

/// Resolvers consulted in registration order; the first answer wins.
#[derive(Clone, Default)]
pub struct ResolverChain {
    resolvers: Vec<Arc<dyn Resolver>>,
}

impl ResolverChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, resolver: impl Resolver + 'static) {
        self.resolvers.push(Arc::new(resolver));
    }

    pub fn with(mut self, resolver: impl Resolver + 'static) -> Self {
        self.push(resolver);
        self
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    pub async fn resolve(&self, importee: &str, importer: Option<&str>) -> Option<String> {
        for resolver in &self.resolvers {
            if let Some(resolved) = resolver.resolve(importee, importer).await {
                return Some(resolved);
            }
        }
        None
    }
}

impl fmt::Debug for ResolverChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverChain")
            .field("resolvers", &self.resolvers.len())
            .finish()
    }
}

pub async fn resolve_id(
    chain: &ResolverChain,
    options: &CommonJsOptions,
    importee: &str,
    importer: Option<&str>,
) -> Option<String> {
    let (importee, is_proxy) = match importee.strip_prefix(PROXY_PREFIX) {
        Some(target) => (target, true),
        None if importee.starts_with('\0') => return Some(importee.to_string()),
        None => (importee, false),
    };
    let importer = importer.map(|importer| importer.strip_prefix(PROXY_PREFIX).unwrap_or(importer));

    if options.is_external(importee) {
        return is_proxy.then(|| external_id(importee));
    }

    match chain.resolve(importee, importer).await {
        Some(resolved) if is_proxy => Some(proxy_id(&resolved)),
        Some(resolved) => Some(resolved),
        None if is_proxy => Some(external_id(importee)),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::EXTERNAL_PREFIX;

    fn relative(importee: &str, importer: Option<&str>) -> Option<String> {
        let importee = importee.strip_prefix("./")?;
        let dir = importer?.rsplit_once('/')?.0;
        Some(format!("{}/{}.js", dir, importee))
    }

    #[tokio::test]
    async fn test_first_resolver_wins() {
        let chain = ResolverChain::new()
            .with(|_: &str, _: Option<&str>| -> Option<String> { None })
            .with(|importee: &str, _: Option<&str>| -> Option<String> {
                Some(format!("/first/{}", importee))
            })
            .with(|importee: &str, _: Option<&str>| -> Option<String> {
                Some(format!("/second/{}", importee))
            });
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.resolve("x", None).await.as_deref(), Some("/first/x"));
    }

    #[tokio::test]
    async fn test_proxy_prefix_round_trip() {
        let chain = ResolverChain::new().with(relative);
        let options = CommonJsOptions::default();
        let importee = format!("{}./dep", PROXY_PREFIX);
        let importer = format!("{}/src/main.js", PROXY_PREFIX);

        let resolved = resolve_id(&chain, &options, &importee, Some(&importer)).await;
        assert_eq!(resolved, Some(format!("{}/src/dep.js", PROXY_PREFIX)));

        let plain = resolve_id(&chain, &options, "./dep", Some("/src/main.js")).await;
        assert_eq!(plain.as_deref(), Some("/src/dep.js"));
    }

    #[tokio::test]
    async fn test_unresolved_proxy_becomes_external() {
        let chain = ResolverChain::new().with(relative);
        let options = CommonJsOptions::default();
        let importee = format!("{}lodash", PROXY_PREFIX);
        let resolved = resolve_id(&chain, &options, &importee, Some("/src/main.js")).await;
        assert_eq!(resolved, Some(format!("{}lodash", EXTERNAL_PREFIX)));

        assert_eq!(resolve_id(&chain, &options, "lodash", None).await, None);
    }

    #[tokio::test]
    async fn test_configured_externals_skip_resolvers() {
        let chain = ResolverChain::new().with(|_: &str, _: Option<&str>| -> Option<String> {
            Some("/resolved.js".to_string())
        });
        let options = CommonJsOptions {
            external: vec!["react".to_string()],
            ..CommonJsOptions::default()
        };
        let importee = format!("{}react", PROXY_PREFIX);
        let resolved = resolve_id(&chain, &options, &importee, None).await;
        assert_eq!(resolved, Some(format!("{}react", EXTERNAL_PREFIX)));
        assert_eq!(resolve_id(&chain, &options, "react", None).await, None);
    }

    #[tokio::test]
    async fn test_other_virtual_ids_pass_through() {
        let chain = ResolverChain::new();
        let options = CommonJsOptions::default();
        let resolved = resolve_id(&chain, &options, "\0commonjsHelpers", None).await;
        assert_eq!(resolved.as_deref(), Some("\0commonjsHelpers"));
    }
}

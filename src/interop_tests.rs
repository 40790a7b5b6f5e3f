#[cfg(test)]
mod tests {
    use crate::error::CommonJsError;
    use crate::options::CommonJsOptions;
    use crate::proxy::{EXTERNAL_PREFIX, HELPERS, HELPERS_ID, PROXY_PREFIX};
    use crate::registry::{Classification, ClassificationState};
    use crate::resolve::ResolverChain;
    use crate::session::BuildSession;
    use std::time::Duration;

    fn session() -> BuildSession {
        BuildSession::new(CommonJsOptions::default()).unwrap()
    }

    fn proxy(id: &str) -> String {
        format!("{}{}", PROXY_PREFIX, id)
    }

    #[tokio::test]
    async fn test_proxy_requested_before_transform() {
        let sess = session();
        let waiting = {
            let sess = sess.clone();
            tokio::spawn(async move { sess.load(&proxy("/src/dep.js")).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());
        assert_eq!(sess.registry().peek("/src/dep.js"), ClassificationState::Pending);

        sess.transform("module.exports = 1;", "/src/dep.js", false).unwrap().unwrap();
        let code = waiting.await.unwrap().unwrap();
        assert_eq!(
            code,
            "import { __moduleExports } from \"/src/dep.js\"; export default __moduleExports;"
        );
    }

    #[tokio::test]
    async fn test_proxy_requested_after_transform() {
        let sess = session();
        sess.transform("module.exports = 1;", "/src/dep.js", false).unwrap().unwrap();
        let code = sess.load(&proxy("/src/dep.js")).await.unwrap();
        assert!(code.contains("__moduleExports"), "got: {}", code);
    }

    #[tokio::test]
    async fn test_es_module_without_default_proxy() {
        let sess = session();
        assert!(sess.transform("export const a = 1;", "/src/dep.js", false).unwrap().is_none());
        let code = sess.load(&proxy("/src/dep.js")).await.unwrap();
        assert_eq!(code, "import * as dep from \"/src/dep.js\"; export default dep;");
    }

    #[tokio::test]
    async fn test_es_module_with_default_proxy() {
        let sess = session();
        assert!(sess.transform("export default 1;", "/src/dep.js", false).unwrap().is_none());
        let code = sess.load(&proxy("/src/dep.js")).await.unwrap();
        assert_eq!(code, "export {default} from \"/src/dep.js\";");
    }

    #[tokio::test]
    async fn test_hybrid_module_with_default_keeps_default() {
        let sess = session();
        let output = sess
            .transform("var a = require('a');\nexport default a;", "/src/dep.js", false)
            .unwrap()
            .unwrap();
        assert!(output.code.contains("export default a;"), "got: {}", output.code);
        assert!(!output.code.contains("export default dep"), "got: {}", output.code);
        assert_eq!(
            sess.registry().peek("/src/dep.js"),
            ClassificationState::Resolved(Classification::EsmWithDefault)
        );
    }

    #[tokio::test]
    async fn test_failed_transform_settles_to_fallback() {
        let sess = session();
        let waiting = {
            let sess = sess.clone();
            tokio::spawn(async move { sess.load(&proxy("/src/broken.js")).await })
        };

        let err = sess.transform("module.exports = (", "/src/broken.js", false).unwrap_err();
        assert!(matches!(err, CommonJsError::Syntax { .. }), "got: {}", err);

        let code = tokio::time::timeout(Duration::from_secs(5), waiting)
            .await
            .expect("proxy must not hang")
            .unwrap()
            .unwrap();
        assert!(
            code.contains("export default getCjsExportFromNamespace(broken)"),
            "got: {}",
            code
        );
    }

    #[tokio::test]
    async fn test_skipped_module_is_classified() {
        let sess = session();
        assert!(sess.transform("body {}", "/src/style.css", false).unwrap().is_none());
        assert_eq!(
            sess.registry().peek("/src/style.css"),
            ClassificationState::Resolved(Classification::Unknown)
        );
    }

    #[tokio::test]
    async fn test_excluded_module_proxy_unwraps_namespace() {
        let options = CommonJsOptions {
            exclude: vec!["**/node_modules/**".to_string()],
            ..CommonJsOptions::default()
        };
        let sess = BuildSession::new(options).unwrap();
        let id = "/app/node_modules/x/index.js";
        assert!(sess.transform("export default 42;", id, false).unwrap().is_none());

        let code = sess.load(&proxy(id)).await.unwrap();
        assert!(
            code.starts_with("import * as x from \"/app/node_modules/x/index.js\";"),
            "got: {}",
            code
        );
        assert!(
            code.ends_with("export default getCjsExportFromNamespace(x)"),
            "got: {}",
            code
        );
    }

    #[tokio::test]
    async fn test_classification_is_settled_once() {
        let sess = session();
        sess.transform("module.exports = 1;", "/src/dep.js", false).unwrap();
        sess.transform("export default 1;", "/src/dep.js", false).unwrap();
        assert_eq!(
            sess.registry().peek("/src/dep.js"),
            ClassificationState::Resolved(Classification::Cjs)
        );
    }

    #[tokio::test]
    async fn test_many_modules_in_any_order() {
        let sess = session();
        let ids: Vec<String> = (0..16).map(|i| format!("/src/mod{}.js", i)).collect();

        let mut handles = Vec::new();
        for id in &ids {
            let sess = sess.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move { sess.load(&proxy(&id)).await }));
        }

        let mut tasks = Vec::new();
        for (i, id) in ids.iter().enumerate().rev() {
            let sess = sess.clone();
            let id = id.clone();
            tasks.push(tokio::spawn(async move {
                let code = if i % 2 == 0 {
                    "module.exports = 1;"
                } else {
                    "export const a = 1;"
                };
                sess.transform(code, &id, false).map(|output| output.is_some())
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        for (i, handle) in handles.into_iter().enumerate() {
            let code = handle.await.unwrap().unwrap();
            if i % 2 == 0 {
                assert!(code.contains("__moduleExports"), "mod{} got: {}", i, code);
            } else {
                assert!(code.contains("import * as"), "mod{} got: {}", i, code);
            }
        }
    }

    #[tokio::test]
    async fn test_helpers_and_external_loads() {
        let sess = session();
        assert_eq!(sess.load(HELPERS_ID).await.as_deref(), Some(HELPERS));

        let external = format!("{}lodash-es", EXTERNAL_PREFIX);
        assert_eq!(
            sess.load(&external).await.as_deref(),
            Some("import lodashEs from \"lodash-es\"; export default lodashEs;")
        );
        assert_eq!(sess.load("/src/plain.js").await, None);
    }

    #[tokio::test]
    async fn test_session_resolve_id() {
        let resolvers = ResolverChain::new().with(|importee: &str, _: Option<&str>| -> Option<String> {
            importee.strip_prefix("./").map(|rest| format!("/src/{}.js", rest))
        });
        let sess = BuildSession::with_resolvers(CommonJsOptions::default(), resolvers).unwrap();

        let resolved = sess.resolve_id(&proxy("./dep"), Some("/src/main.js")).await;
        assert_eq!(resolved, Some(proxy("/src/dep.js")));

        let resolved = sess.resolve_id(&proxy("left-pad"), Some("/src/main.js")).await;
        assert_eq!(resolved, Some(format!("{}left-pad", EXTERNAL_PREFIX)));
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_classifications() {
        let first = session();
        first.transform("module.exports = 1;", "/src/dep.js", false).unwrap();

        let second = session();
        assert_eq!(second.registry().peek("/src/dep.js"), ClassificationState::Pending);
    }
}

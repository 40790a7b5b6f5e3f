//! Node bindings.

use crate::options::CommonJsOptions;
use crate::session::BuildSession;
use napi_derive::napi;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Routes library logs to stderr, filtered by `COMMONJS_LOG` (default `warn`).
fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_env("COMMONJS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    });
}

fn to_napi_error(err: crate::error::CommonJsError) -> napi::Error {
    let diagnostic = err.to_diagnostic();
    let reason = serde_json::to_string(&diagnostic).unwrap_or_else(|_| err.to_string());
    napi::Error::from_reason(reason)
}

#[napi]
pub struct CommonJsSession {
    session: BuildSession,
}

#[napi]
impl CommonJsSession {
    #[napi(constructor)]
    pub fn new(options_json: Option<String>) -> napi::Result<Self> {
        init_tracing();
        let options = match options_json {
            Some(json) => CommonJsOptions::from_json(&json).map_err(to_napi_error)?,
            None => CommonJsOptions::default(),
        };
        let session = BuildSession::new(options).map_err(to_napi_error)?;
        Ok(Self { session })
    }

    /// JSON `{ code, map }`, or `null` when the module is left unchanged.
    #[napi]
    pub fn transform(&self, code: String, id: String, is_entry: bool) -> napi::Result<Option<String>> {
        match self.session.transform(&code, &id, is_entry).map_err(to_napi_error)? {
            Some(output) => serde_json::to_string(&output)
                .map(Some)
                .map_err(|e| napi::Error::from_reason(e.to_string())),
            None => Ok(None),
        }
    }

    #[napi]
    pub async fn load(&self, id: String) -> Option<String> {
        self.session.load(&id).await
    }

    #[napi]
    pub async fn resolve_id(&self, importee: String, importer: Option<String>) -> Option<String> {
        self.session.resolve_id(&importee, importer.as_deref()).await
    }

    /// JSON module record for an already transformed id.
    #[napi]
    pub fn module_record(&self, id: String) -> Option<String> {
        self.session
            .module_record(&id)
            .and_then(|record| serde_json::to_string(&record).ok())
    }
}

//! Service wiring: picks the storage engine and holds shared state.

use std::sync::Arc;

use stockline_infra::{Engine, InMemoryEngine, PostgresEngine};

use crate::signature::WebhookVerifier;

/// Shared state handed to every handler via `Extension`.
pub struct AppServices {
    pub engine: Arc<dyn Engine>,
    pub verifier: WebhookVerifier,
}

impl AppServices {
    pub fn new(engine: Arc<dyn Engine>, verifier: WebhookVerifier) -> Self {
        Self { engine, verifier }
    }
}

/// Build services from the environment.
///
/// `USE_PERSISTENT_STORES=1` (or `true`) selects the Postgres engine, which
/// requires `DATABASE_URL` and runs migrations on startup. Anything else
/// falls back to the in-memory engine, which loses all data on restart.
pub async fn build_services() -> AppServices {
    let persistent = std::env::var("USE_PERSISTENT_STORES")
        .is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));

    let engine: Arc<dyn Engine> = if persistent {
        let url = std::env::var("DATABASE_URL")
            .expect("USE_PERSISTENT_STORES=1 requires DATABASE_URL");
        let engine = PostgresEngine::connect(&url)
            .await
            .expect("failed to connect to postgres");
        engine.migrate().await.expect("failed to run migrations");
        tracing::info!("using postgres engine");
        Arc::new(engine)
    } else {
        tracing::warn!("persistent stores disabled; using in-memory engine");
        Arc::new(InMemoryEngine::new())
    };

    AppServices::new(engine, WebhookVerifier::from_env())
}

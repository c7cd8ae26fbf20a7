use std::sync::Once;

use codegraph::adapters::sqlite::{create_test_pool, run_migrations};
use codegraph::services::config::CoreConfig;
use codegraph::CodegraphApi;

static TRACING: Once = Once::new();

/// Route core tracing through the test writer; `RUST_LOG` controls verbosity.
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Assemble the core over a fresh in-memory SQLite database.
#[allow(dead_code)]
pub async fn setup_api() -> CodegraphApi {
    setup_api_with(CoreConfig::default()).await
}

#[allow(dead_code)]
pub async fn setup_api_with(config: CoreConfig) -> CodegraphApi {
    init_tracing();
    let pool = create_test_pool()
        .await
        .expect("failed to create test database");
    run_migrations(&pool).await.expect("failed to run migrations");
    CodegraphApi::with_pool(pool, &config)
}

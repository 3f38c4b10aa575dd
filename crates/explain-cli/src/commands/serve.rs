//! The serve command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use explain_ai::{LlmClient, SearchClient};
use explain_core::{ExplainService, ServiceConfig};

#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on.
    #[arg(long, env = "EXPLAIN_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Path of the shared service database.
    #[arg(long, env = "EXPLAIN_DB", default_value = "data/explain.sqlite")]
    pub db_path: PathBuf,

    /// Directory of per-tenant database files (`{tenant}.sqlite`).
    #[arg(long, env = "EXPLAIN_TENANT_DB_DIR", default_value = "data/tenants")]
    pub tenant_db_dir: PathBuf,

    /// Redis connection URL.
    #[arg(long, env = "EXPLAIN_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Language-model API base URL.
    #[arg(long, env = "EXPLAIN_LLM_URL", default_value = "https://api.anthropic.com")]
    pub llm_url: String,

    /// Language-model API key.
    #[arg(long, env = "EXPLAIN_LLM_API_KEY", hide_env_values = true)]
    pub llm_api_key: String,

    /// Model used for classification and explanations.
    #[arg(long, env = "EXPLAIN_LLM_MODEL", default_value = "claude-3-5-haiku-latest")]
    pub llm_model: String,

    /// Semantic-search service base URL.
    #[arg(long, env = "EXPLAIN_SEARCH_URL", default_value = "http://127.0.0.1:7700")]
    pub search_url: String,

    /// Semantic-search corpus name.
    #[arg(long, env = "EXPLAIN_CORPUS", default_value = "roam-platform")]
    pub corpus: String,

    /// Tenant used when the request names none.
    #[arg(long, env = "EXPLAIN_DEFAULT_TENANT", default_value = "roam")]
    pub default_tenant: String,

    /// Environment label.
    #[arg(long, env = "EXPLAIN_ENV", default_value = "development")]
    pub environment: String,
}

pub async fn run(args: ServeArgs) -> Result<()> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %args.environment,
        "Starting roam-explain"
    );

    let db = explain_db::open_pool(&args.db_path)?;
    let kv = explain_redis::init_pool(&args.redis_url).await?;
    let llm = LlmClient::new(&args.llm_url, &args.llm_api_key, &args.llm_model);
    let search = SearchClient::new(&args.search_url, &args.corpus);

    let config = ServiceConfig::new(&args.default_tenant, &args.corpus, &args.environment)
        .with_tenant_db_dir(args.tenant_db_dir);

    let service = Arc::new(ExplainService::new(db, kv, llm, search, config));
    explain_web::run_server(service, args.port).await
}

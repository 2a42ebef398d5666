use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use helpmate_auth::Authenticator;
use helpmate_chats::ConversationStore;
use helpmate_config::AppConfig;
use helpmate_database::initialize_database;
use helpmate_knowledge::{ContextAssembler, HttpPageFetcher};
use helpmate_orchestrator::{Orchestrator, OrchestratorError};
use sqlx::SqlitePool;
use tracing::{info, warn};

pub mod telemetry {
    use anyhow::Result;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: SqlitePool,
    pub authenticator: Authenticator,
    pub orchestrator: Arc<Orchestrator>,
    pub assembler: Arc<ContextAssembler>,
    pub conversations: ConversationStore,
}

impl BackendServices {
    /// Open the database and build every shared service. Must be called inside a
    /// tokio runtime: the conversation sweeper is spawned here.
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let db_pool = initialize_database(&config.database).await?;
        let authenticator = Authenticator::new(db_pool.clone(), config.auth.clone());

        let orchestrator = match Orchestrator::new(config).bootstrap() {
            Ok(orchestrator) => orchestrator,
            Err(OrchestratorError::ApiKeyMissing) => {
                warn!("no LLM API key configured; chat endpoints will answer 503");
                Orchestrator::new(config)
            }
            Err(error) => return Err(error).context("failed to bootstrap orchestrator"),
        };
        let orchestrator = Arc::new(orchestrator);

        let fetcher = HttpPageFetcher::new(
            Duration::from_secs(config.knowledge.fetch_timeout_seconds),
            config.knowledge.max_page_bytes,
        )
        .context("failed to build page fetcher")?;
        let assembler = Arc::new(
            ContextAssembler::new(config.knowledge.clone(), Arc::new(fetcher))
                .with_summarizer(orchestrator.clone()),
        );

        let conversations = ConversationStore::from_config(&config.sessions);
        let sweep_every = Duration::from_secs(config.sessions.sweep_interval_seconds.max(1));
        conversations.spawn_sweeper(sweep_every);

        info!(
            chat_model = orchestrator.chat_model(),
            llm_ready = orchestrator.is_ready(),
            "backend services ready"
        );

        Ok(Self {
            db_pool,
            authenticator,
            orchestrator,
            assembler,
            conversations,
        })
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}

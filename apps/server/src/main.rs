use anyhow::Context;
use clap::{Parser, Subcommand};
use helpmate_config::load as load_config;
use helpmate_database::{ChatRepository, IntegrationRepository};
use helpmate_gateway::{build_router, AppState};
use helpmate_runtime::{telemetry, BackendServices};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(name = "helpmate")]
#[command(about = "HelpMate customer-support chat backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Serve,
    /// Print integrations and chats stored in the database
    DumpData,
    /// Delete expired login sessions
    PruneSessions,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing().context("failed to initialise tracing")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server().await,
        Commands::DumpData => dump_data().await,
        Commands::PruneSessions => prune_sessions().await,
    }
}

async fn services() -> anyhow::Result<(helpmate_config::AppConfig, BackendServices)> {
    let config = load_config().context("failed to load configuration")?;
    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;
    Ok((config, services))
}

async fn run_server() -> anyhow::Result<()> {
    info!("starting HelpMate backend");
    let (config, services) = services().await?;

    let state = AppState::new(
        &config,
        services.db_pool.clone(),
        services.authenticator.clone(),
        services.orchestrator.clone(),
        services.assembler.clone(),
        services.conversations.clone(),
    );
    let app = build_router(state);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(helpmate_runtime::shutdown_signal())
        .await
        .context("http server error")?;

    info!("backend shut down");
    Ok(())
}

async fn dump_data() -> anyhow::Result<()> {
    let (_, services) = services().await?;

    let integrations = IntegrationRepository::new(services.db_pool.clone())
        .list_all()
        .await
        .context("failed to fetch integrations")?;

    println!("=== INTEGRATIONS ===");
    if integrations.is_empty() {
        println!("No integrations found in database");
    } else {
        println!("Found {} integrations:", integrations.len());
        println!(
            "{:<5} {:<26} {:<8} {:<24} {:<30} {:<7} {:<10} {:<25}",
            "ID", "Public ID", "User ID", "Name", "Domain", "Active", "Knowledge", "Created At"
        );
        println!("{}", "-".repeat(140));
        for integration in integrations {
            println!(
                "{:<5} {:<26} {:<8} {:<24} {:<30} {:<7} {:<10} {:<25}",
                integration.id,
                integration.public_id,
                integration.user_id,
                integration.name,
                integration.domain,
                integration.active,
                integration.knowledge_enabled,
                integration.created_at
            );
        }
    }

    let chats = ChatRepository::new(services.db_pool.clone())
        .list_all()
        .await
        .context("failed to fetch chats")?;

    println!("\n=== CHATS ===");
    if chats.is_empty() {
        println!("No chats found in database");
    } else {
        println!("Found {} chats:", chats.len());
        println!(
            "{:<5} {:<26} {:<8} {:<12} {:<36} {:<9} {:<9} {:<8} {:<25}",
            "ID",
            "Public ID",
            "User ID",
            "Integration",
            "Title",
            "Messages",
            "Escalated",
            "Rating",
            "Updated At"
        );
        println!("{}", "-".repeat(150));
        for chat in chats {
            println!(
                "{:<5} {:<26} {:<8} {:<12} {:<36} {:<9} {:<9} {:<8} {:<25}",
                chat.id,
                chat.public_id,
                chat.user_id,
                chat.integration_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "NULL".to_string()),
                chat.title.chars().take(35).collect::<String>(),
                chat.message_count,
                chat.escalated,
                chat.feedback_rating
                    .map(|rating| rating.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                chat.updated_at
            );
        }
    }

    Ok(())
}

async fn prune_sessions() -> anyhow::Result<()> {
    let (_, services) = services().await?;
    let removed = services
        .authenticator
        .prune_expired_sessions()
        .await
        .context("failed to prune sessions")?;
    println!("Removed {removed} expired sessions");
    Ok(())
}

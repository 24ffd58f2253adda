use anyhow::Context;
use clap::{Parser, Subcommand};
use db::DBService;
use server::AppState;
use services::services::config::Config;
use tracing::info;
use utils::logging::init_tracing;

#[derive(Debug, Parser)]
#[command(name = "server", about = "Solar back-office API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API (default)
    Serve,
    /// Issue a bearer session for an existing profile and print the token
    IssueSession {
        /// Email of the profile to sign in
        email: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    let config = Config::from_env().context("loading configuration")?;
    let db = DBService::new(&config.database_url)
        .await
        .context("opening database")?;
    let state = AppState::new(db, config);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state).await,
        Command::IssueSession { email } => {
            let issued = state
                .issue_session(&email)
                .await
                .with_context(|| format!("issuing session for {email}"))?;
            info!(
                user_id = %issued.identity.user_id,
                expires_at = %issued.expires_at,
                "Session issued"
            );
            println!("{}", issued.token);
            Ok(())
        }
    }
}

async fn serve(state: AppState) -> anyhow::Result<()> {
    let address = state.config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!(
        address = %address,
        validate_url = %state.config.admin_validate_url,
        "Server listening"
    );

    axum::serve(listener, server::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use folio::auth::session;
use folio::config::{Cli, Command, Config};
use folio::content::{ContentRepository, SqliteContentRepository};
use folio::db;
use folio::routes;
use folio::state::{AppState, DbPool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli)?;
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    match cli.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => serve(pool, config).await,
        Command::AddGroup {
            slug,
            title,
            description,
        } => {
            let content = SqliteContentRepository::new(pool);
            let group = content.create_group(&slug, &title, &description).await?;
            tracing::info!("Created group {} ({})", group.slug, group.title);
            Ok(())
        }
        Command::ListGroups => {
            let content = SqliteContentRepository::new(pool);
            for group in content.list_groups().await? {
                println!("{}\t{}\t{}", group.slug, group.title, group.description);
            }
            Ok(())
        }
        Command::DeletePost { id } => {
            let content = SqliteContentRepository::new(pool);
            content.delete_post(id).await?;
            tracing::info!("Deleted post {}", id);
            Ok(())
        }
    }
}

async fn serve(pool: DbPool, config: Config) -> anyhow::Result<()> {
    let purged = session::purge_expired(&pool)?;
    if purged > 0 {
        tracing::info!("Purged {} expired sessions", purged);
    }

    // Ensure media directory exists
    std::fs::create_dir_all(config.media_path())?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state = AppState::new(pool, config);
    tracing::info!("Media root: {}", state.media.root().display());
    tracing::info!(
        "Feed pages of {}, timeline cached for {}s",
        state.feed.page_size(),
        state.timeline_cache.ttl().as_secs()
    );
    let app = routes::app(state);

    // Start server
    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

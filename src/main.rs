mod auth;
mod chain;
mod chunking;
mod config;
mod embedding;
mod error;
mod llm;
mod models;
mod parsing;
mod pipeline;
mod repository;
mod routes;
mod serving;
mod storage;
mod vectordb;

use clap::{Parser, Subcommand};
use tracing::{Level, info};

use crate::config::{DatabaseArgs, ServeArgs, Settings};

#[derive(Parser)]
#[command(version, about = "Chat with your PDF documents")]
struct CliArgs {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the PDF chat API.
    /// Every option can also be set through the environment variable named
    /// in its help text, or through a `.env` file in the working directory.
    Serve(ServeArgs),
    /// Apply pending database migrations and exit.
    Migrate(DatabaseArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = CliArgs::parse();
    match args.cmd {
        Commands::Serve(serve_args) => {
            let settings = Settings::from_args(serve_args)?;
            serving::init_tracing(settings.log_level, settings.log_json);
            serving::serve(settings).await?;
        }
        Commands::Migrate(database) => {
            serving::init_tracing(Level::INFO, false);
            let pool = repository::create_pool(&database).await?;
            repository::migrate(&pool).await?;
            info!("Database is up to date");
        }
    }
    Ok(())
}

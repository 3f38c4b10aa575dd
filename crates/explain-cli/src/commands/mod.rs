//! CLI commands.

mod schema;
mod serve;

use anyhow::Result;
use clap::{Parser, Subcommand};

pub use serve::ServeArgs;

#[derive(Parser)]
#[command(
    name = "roam-explain",
    about = "Explains why products do or don't appear on tenant websites",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service.
    Serve(ServeArgs),

    /// Schema cache maintenance.
    Schema {
        #[command(subcommand)]
        command: SchemaCommand,
    },
}

#[derive(Subcommand)]
enum SchemaCommand {
    /// Drop a tenant's cached schema so the next request rebuilds it.
    Refresh {
        /// Tenant identifier.
        #[arg(long, env = "EXPLAIN_DEFAULT_TENANT")]
        tenant: String,

        /// Redis connection URL.
        #[arg(long, env = "EXPLAIN_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
        redis_url: String,
    },
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Command::Serve(args) => serve::run(args).await,
            Command::Schema { command } => match command {
                SchemaCommand::Refresh { tenant, redis_url } => {
                    schema::refresh(&tenant, &redis_url).await
                }
            },
        }
    }
}

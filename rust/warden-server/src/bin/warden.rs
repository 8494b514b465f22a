use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use warden_common::now_ms;
use warden_envelope::Identity;
use warden_server::{WardenServer, WardenService, load_or_generate_authority};
use warden_storage::FileSystemStorageBackend;
use warden_trust::TrustGraphStore;

#[derive(Parser)]
#[command(name = "warden", about = "Trust-gated resource server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the resource server
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:9533")]
        listen: String,

        /// Directory holding the server key and persisted state
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },

    /// Create the root trust record directly (out-of-band bootstrap)
    AddRoot {
        /// The root identity string
        identity: String,

        /// Directory holding the server key and persisted state
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },
}

#[tokio::main]
pub async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { listen, data_dir } => {
            let authority = load_or_generate_authority(&data_dir).await?;
            let backend =
                FileSystemStorageBackend::<Vec<u8>, Vec<u8>>::new(data_dir.join("store")).await?;
            let service = WardenService::new(backend, authority);
            info!(identity = %service.identity(), "loaded server identity");

            let server = WardenServer::start(service, &listen).await?;
            info!(endpoint = %server.endpoint, "listening");

            tokio::signal::ctrl_c().await?;
            server.stop();
        }
        Command::AddRoot { identity, data_dir } => {
            let backend =
                FileSystemStorageBackend::<Vec<u8>, Vec<u8>>::new(data_dir.join("store")).await?;
            let trust = TrustGraphStore::new(backend);
            trust
                .insert_root(&Identity::from(identity), now_ms())
                .await?;
            println!("Root identity added.");
        }
    }

    Ok(())
}

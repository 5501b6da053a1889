use std::path::PathBuf;

use clap::Parser;

use prefixd_node::{
    DurableStore, ManagerConfig, MemoryKvStore, MemoryStorage, NodeConfig, NodeError,
    PrefixManager, Storage,
};

#[derive(Parser)]
#[command(name = "prefixd", about = "Prefix advertisement manager")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/prefixd/config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match NodeConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config from {}: {e}", cli.config.display());
            std::process::exit(1);
        }
    };

    prefixd_node::logging::init_from_env(&config.logging.level);

    let manager_config = match ManagerConfig::from_node_config(&config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    // The KV store client is in-process until a distributed backend is
    // configured.
    let kv = MemoryKvStore::new();

    let result = if config.node.enable_storage {
        let storage = match &config.node.storage_path {
            Some(path) => Storage::new(PathBuf::from(path)),
            None => Storage::default_path(),
        };
        match storage {
            Ok(storage) => {
                tracing::info!(path = %storage.base_dir().display(), "storage initialized");
                serve(manager_config, kv, storage).await
            }
            Err(e) => {
                tracing::error!("failed to initialize storage: {e}");
                std::process::exit(1);
            }
        }
    } else {
        tracing::warn!("storage disabled, persistent prefixes will not survive restart");
        serve(manager_config, kv, MemoryStorage::new()).await
    };

    if let Err(e) = result {
        tracing::error!("failed to start prefix manager: {e}");
        std::process::exit(1);
    }
}

async fn serve<S: DurableStore>(
    config: ManagerConfig,
    kv: MemoryKvStore,
    store: S,
) -> Result<(), NodeError> {
    let mut manager = PrefixManager::new(config, kv, store)?;
    let handle = manager.shutdown_handle();

    // Spawn signal handler
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received SIGINT, shutting down");
        handle.shutdown();
    });

    manager.start().await?;
    manager.run().await;
    Ok(())
}

//! wrb-node: single-process witness request board host.
//!
//! Runs the board on a local development chain and serves it via JSON-RPC
//! over a Unix socket.

use tracing::{error, info};

use wrb_node::config::NodeConfig;
use wrb_node::rpc::RpcServer;
use wrb_node::{unix_now, NodeState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = NodeConfig::load()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("wrb={}", config.advanced.log_level).parse()?),
        )
        .init();

    info!("wrb node starting");

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // 2. Open the event journal
    let journal = if config.storage.journal_enabled {
        let db_path = data_dir.join("wrb.db");
        info!("Journaling events to {:?}", db_path);
        Some(wrb_db::Journal::open(&db_path)?)
    } else {
        None
    };

    // 3. Deploy the board at genesis
    let socket_path = config.socket_path();
    let state = NodeState::new(config, journal, unix_now())?;
    {
        let host = state.host.lock().await;
        info!(
            owner = %host.board.owner(),
            feeds = host.feeds.len(),
            dev_mode = state.config.advanced.dev_mode,
            "Board deployed"
        );
    }

    // 4. Run the RPC server until shutdown
    let rpc_server = RpcServer::new(state.clone(), socket_path.clone());
    let mut shutdown_rx = state.shutdown_tx.subscribe();
    tokio::select! {
        result = rpc_server.run() => {
            if let Err(e) = result {
                error!("RPC server error: {}", e);
            }
        }
        _ = shutdown_rx.recv() => {
            info!("Shutdown signal received");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    // Clean up socket file
    let _ = std::fs::remove_file(&socket_path);

    info!("wrb node stopped");
    Ok(())
}

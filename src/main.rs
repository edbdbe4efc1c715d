mod config;
mod relay;
mod routes;
mod state;
mod ws;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use config::{generate_config_template, Config};
use relay::router::{Router, RouterEvent};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "huddle_server=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "huddle_server=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("Huddle relay v{} starting", env!("CARGO_PKG_VERSION"));

    // Live-connection map shared between the transport and the router task
    let connections = ws::new_connection_registry();

    // Spawn the router: the single task that owns all relay state
    let (router_tx, router_rx) = mpsc::unbounded_channel::<RouterEvent>();
    let router = Router::new(connections.clone());
    tokio::spawn(router.run(router_rx));

    let app_state = state::AppState {
        connections,
        router_tx,
    };

    // Build router
    let app = routes::build_router(app_state, &config.public_dir);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

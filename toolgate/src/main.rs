//! Gateway entrypoint.

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;

use toolgate::backend::OpenAiBackend;
use toolgate::model_routes::RoutingTable;
use toolgate::routes::{router, AppState};
use toolgate::tool_registry::ToolRegistry;

#[derive(Parser, Debug)]
#[command(name = "toolgate", about = "OpenAI-compatible model gateway with a two-stage toolchain pipeline")]
struct CliArgs {
    /// Interface to bind
    #[arg(long, env = "TOOLGATE_HOST", default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, env = "TOOLGATE_PORT", default_value_t = 8000)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let state = AppState {
        routes: Arc::new(RoutingTable::from_env()),
        registry: Arc::new(ToolRegistry::builtin()),
        backend: Arc::new(OpenAiBackend::new()),
    };

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    println!("[Toolgate] Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

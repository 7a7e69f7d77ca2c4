use anyhow::Context;
use clap::Parser;
use message_gateway::configuration::{get_configuration, Overrides};
use message_gateway::startup::Application;
use message_gateway::telemetry::{get_subscriber, init_subscriber};

/// Messaging tools served over MCP (Streamable HTTP and WebSocket).
#[derive(Debug, Parser)]
#[command(name = "server", version)]
struct Cli {
    /// Host to listen on [default: 0.0.0.0]
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on [default: 8765]
    #[arg(long)]
    port: Option<u16>,

    /// Configuration file (yaml, toml or json) [default: ./configuration.*]
    #[arg(long, env = "GATEWAY_CONFIG")]
    config: Option<String>,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let subscriber = get_subscriber("message-gateway".into(), "info".into(), std::io::stdout);
    init_subscriber(subscriber)?;

    let settings = get_configuration(Overrides {
        config_file: cli.config,
        host: cli.host,
        port: cli.port,
    })
    .context("Failed to read configuration.")?;

    let application = Application::build(settings)?;
    application.run_until_stopped().await?;

    Ok(())
}

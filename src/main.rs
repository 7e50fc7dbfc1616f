use clap::{Parser, ValueEnum};
use gh_secret_broker::{
    config::{Config, ConfigLoader},
    error::AppError,
    logging,
    server::run_server,
};
use tracing::info;

#[cfg(test)]
use serial_test::serial;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "gh-secret-broker")]
#[command(about = "Manage GitHub Actions repository secrets for organization maintainers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub enum Cli {
    /// Start the broker
    Server {
        #[arg(short, long, default_value = "config.toml")]
        config: String,
        /// Host to bind to (overrides config)
        #[arg(long, env = "SERVER_HOST")]
        host: Option<String>,
        /// Port to bind to (overrides config)
        #[arg(long, env = "SERVER_PORT")]
        port: Option<u16>,
        #[arg(long, value_enum, default_value = "text")]
        log_format: LogFormat,
    },
    /// Load and validate the configuration, then print a redacted summary
    CheckConfig {
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
}

fn init_tracing(format: LogFormat) {
    let builder = tracing_subscriber::fmt().with_env_filter(logging::env_filter());

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    match cli {
        Cli::Server {
            config,
            host,
            port,
            log_format,
        } => {
            init_tracing(log_format);
            info!("Starting GitHub secret broker");
            handle_server_command(&config, host, port).await
        }
        Cli::CheckConfig { config } => {
            init_tracing(LogFormat::Text);
            handle_check_config(&config)
        }
    }
}

/// Load the file, then environment, then CLI overrides, and validate the result
fn load_config(
    config_path: &str,
    host_override: Option<String>,
    port_override: Option<u16>,
) -> Result<Config, AppError> {
    let mut config = ConfigLoader::load(config_path)?;

    if let Some(host) = host_override {
        config.server.host = host;
    }

    if let Some(port) = port_override {
        config.server.port = port;
    }

    Ok(ConfigLoader::finalize(config)?)
}

async fn handle_server_command(
    config_path: &str,
    host_override: Option<String>,
    port_override: Option<u16>,
) -> Result<(), AppError> {
    let config = load_config(config_path, host_override, port_override)?;
    info!("Configuration:\n{}", config.summary());

    run_server(config).await
}

fn handle_check_config(config_path: &str) -> Result<(), AppError> {
    let config = load_config(config_path, None, None)?;

    println!("Configuration is valid.");
    println!();
    println!("{}", config.summary());
    Ok(())
}

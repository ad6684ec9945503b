use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use arc_swap::ArcSwap;
use clap::Parser;
use color_eyre::{Result, eyre::Context};
use maprelay::{
    adapters::{FileConfigProvider, HttpHandler, build_dispatcher, router},
    config::{AppConfig, AppConfigValidator, loader::load_config},
    ports::ConfigProvider,
    tracing_setup::{self, LoggingSetup},
    utils::{shutdown_signal, spawn_config_reloader},
};
use tower_http::trace::TraceLayer;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(short, long, default_value = "maprelay.toml")]
    config: String,

    /// Logging configuration file (overrides `log_conf` from the config)
    #[clap(long)]
    log_conf: Option<PathBuf>,

    /// Let service failures reach the diagnostic page instead of a plain 500
    #[clap(long)]
    debug: bool,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        #[clap(short, long, default_value = "maprelay.toml")]
        config: String,
    },
    /// Initialize a new configuration file
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "maprelay.toml")]
        config: String,
    },
    /// Start the dispatcher (default)
    Serve {
        /// Configuration file to use
        #[clap(short, long, default_value = "maprelay.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    let config_path = match args.command {
        Some(Commands::Validate { config }) => return validate_config_command(&config).await,
        Some(Commands::Init { config }) => return init_config_command(&config).await,
        Some(Commands::Serve { config }) => config,
        None => args.config,
    };

    serve(&config_path, args.log_conf.as_deref(), args.debug).await
}

async fn serve(config_path: &str, log_conf: Option<&Path>, force_debug: bool) -> Result<()> {
    let mut app_config: AppConfig = load_config(config_path)
        .await
        .with_context(|| format!("Failed to load config from {config_path}"))?;
    if force_debug {
        app_config.debug_mode = true;
    }

    if tracing_setup::init_logging(log_conf, &app_config) == LoggingSetup::AlreadyInitialized {
        eprintln!("WARNING: a global logger was already installed, log configuration ignored");
    }

    let addr: SocketAddr = app_config
        .listen_addr
        .parse()
        .context("Failed to parse listen address")?;

    let config_holder = Arc::new(ArcSwap::from_pointee(app_config));
    let dispatcher = Arc::new(build_dispatcher(&config_holder)?);
    let http_handler = Arc::new(HttpHandler::new(dispatcher));

    // A reload would drop the --debug override.
    let _reloader = if force_debug {
        None
    } else {
        let provider: Arc<dyn ConfigProvider> = Arc::new(
            FileConfigProvider::new(config_path).context("Failed to create config provider")?,
        );
        let changes = provider.watch()?;
        Some(spawn_config_reloader(
            provider,
            config_holder.clone(),
            changes,
        ))
    };

    let app = router(http_handler).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    tracing::info!(
        "maprelay listening on {} (debug mode: {})",
        addr,
        config_holder.load().debug_mode
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    tracing::info!("Graceful shutdown completed");
    Ok(())
}

/// Validate configuration file and exit
async fn validate_config_command(config_path: &str) -> Result<()> {
    println!("🔍 Validating configuration file: {config_path}");

    if !Path::new(config_path).exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' not found");
        std::process::exit(1);
    }

    let config = match load_config(config_path).await {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e:#}");
            std::process::exit(1);
        }
    };

    match AppConfigValidator::validate(&config) {
        Ok(warnings) => {
            println!("✅ Configuration validation: OK");
            for warning in &warnings {
                println!("⚠️  {warning}");
            }
            println!();
            println!("📋 Configuration Summary:");
            println!("   • Listen Address: {}", config.listen_addr);
            println!("   • Debug Mode: {}", config.debug_mode);
            println!("   • Services: {}", config.services.len());
            for (key, service) in &config.services {
                println!(
                    "     - {key} ({}): /{}",
                    service.kind(),
                    service.names().join(", /")
                );
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

/// Initialize a new configuration file
async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    let default_config = r#"# maprelay configuration

# The address to listen on
listen_addr = "127.0.0.1:8080"

# Show failure details instead of a plain 500 (development only)
debug_mode = false

# Logging configuration (relative to this file)
# log_conf = "log.toml"

# Each service answers to the first path segment of its names.
[services.status]
type = "status"
names = ["status"]

[services.files]
type = "static"
names = ["static", "files"]
root = "./static"
"#;

    tokio::fs::write(path, default_config)
        .await
        .context("Failed to write config file")?;
    println!("✅ Created default configuration at: {config_path}");
    println!("   Run 'maprelay serve --config {config_path}' to start the server");
    Ok(())
}

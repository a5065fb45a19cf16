//! Portal CLI - reach remote services through a Portal Hub
//!
//! Allocates portals, calls the services behind them, and runs the small
//! services used to check that a portal actually works.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use portal_client::{
    canonicalize, dial, DirectHub, GreeterBinding, HttpHub, Invoker, PortalHub, PortalRequest,
    RawBinding,
};
use portal_proto::GreetingRequest;
use portal_server::{EchoServer, EchoServerConfig, GreeterServer, GreeterServerConfig, ListenAddr};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_HUB_URL: &str = "http://127.0.0.1:3000";

/// Portal - reach remote services through a Portal Hub
#[derive(Parser, Debug)]
#[command(name = "portal")]
#[command(about = "Portal - reach remote services through a Portal Hub")]
#[command(version, long_version = env!("PORTAL_LONG_VERSION"))]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Configuration file (YAML)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the echo server (host:port or unix:///path)
    EchoServer {
        #[arg(long, default_value = "0.0.0.0:12345", env = "PORTAL_ECHO_ADDR")]
        addr: String,
    },

    /// Interactive echo client; type `q` to quit
    EchoClient {
        #[arg(long, default_value = "127.0.0.1:54321")]
        addr: String,
    },

    /// Run the HTTP greeting service (host:port or unix:///path)
    GreeterServer {
        #[arg(long, default_value = "0.0.0.0:8000", env = "PORTAL_GREETER_ADDR")]
        addr: String,
    },

    /// Allocate a portal and call the service behind it
    #[command(long_about = r#"
Ask the Portal Hub for an endpoint to a service on a remote device, then
call that service once through the returned endpoint.

EXAMPLES:
  # Greeting service over TCP
  portal call --hub http://127.0.0.1:3000 \
    --device-id robot_1 --service-name rest_service \
    --portal-type inet --inet-port 8000 --name World

  # Echo service over a Unix socket
  portal call --device-id robot_1 --service-name echo \
    --portal-type unix --unix-file /tmp/echo.sock --raw "ping"

ENVIRONMENT VARIABLES:
  PORTAL_HUB      Portal Hub URL
  PORTAL_USER_ID  User id sent with requests
    "#)]
    Call {
        #[command(flatten)]
        portal: PortalArgs,

        /// Name sent to the greeting service
        #[arg(long, default_value = "Hello World")]
        name: String,

        /// Send raw bytes instead of a greeting and print the reply
        #[arg(long)]
        raw: Option<String>,
    },

    /// Ask the Portal Hub to tear down a portal
    Release {
        #[command(flatten)]
        portal: PortalArgs,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PortalType {
    Inet,
    Unix,
}

#[derive(Args, Debug)]
struct PortalArgs {
    /// Portal Hub URL (e.g. http://127.0.0.1:3000)
    #[arg(long, env = "PORTAL_HUB")]
    hub: Option<String>,

    /// Remote device (robot) id
    #[arg(long, alias = "robot-id")]
    device_id: String,

    /// Service name on the remote device
    #[arg(long)]
    service_name: String,

    #[arg(long, value_enum, ignore_case = true, default_value = "inet")]
    portal_type: PortalType,

    /// TCP port (only with --portal-type inet)
    #[arg(long)]
    inet_port: Option<u16>,

    /// Unix socket path (only with --portal-type unix)
    #[arg(long)]
    unix_file: Option<String>,

    /// User id sent to the hub
    #[arg(long, env = "PORTAL_USER_ID")]
    user_id: Option<String>,

    /// Name the endpoint locally instead of asking a hub
    #[arg(long)]
    direct: bool,

    /// Hub request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Connect timeout for the allocated endpoint in seconds
    #[arg(long)]
    connect_timeout: Option<u64>,
}

/// Configuration file format
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    hub: HubConfigFile,
}

#[derive(Debug, Default, Deserialize)]
struct HubConfigFile {
    url: Option<String>,
    default_user_id: Option<String>,
    timeout_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
}

/// Hub settings after merging CLI args over the config file
#[derive(Debug, Clone, PartialEq)]
struct HubSettings {
    url: String,
    default_user_id: Option<String>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
}

/// Setup logging with the specified log level
fn setup_logging(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level)
        .with_context(|| format!("Invalid log level: {}", log_level))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();

    Ok(())
}

/// Load configuration from YAML file
fn load_config_file(path: &PathBuf) -> Result<ConfigFile> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: ConfigFile = serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}

/// CLI args take precedence over the config file
fn hub_settings(args: &PortalArgs, config: &ConfigFile) -> HubSettings {
    HubSettings {
        url: args
            .hub
            .clone()
            .or_else(|| config.hub.url.clone())
            .unwrap_or_else(|| DEFAULT_HUB_URL.to_string()),
        default_user_id: config.hub.default_user_id.clone(),
        timeout: args
            .timeout
            .or(config.hub.timeout_secs)
            .map(Duration::from_secs),
        connect_timeout: args
            .connect_timeout
            .or(config.hub.connect_timeout_secs)
            .map(Duration::from_secs),
    }
}

fn portal_request(args: &PortalArgs) -> Result<PortalRequest> {
    let mut builder = PortalRequest::builder()
        .device_id(&args.device_id)
        .service_name(&args.service_name);

    builder = match args.portal_type {
        PortalType::Inet => builder.tcp(args.inet_port),
        PortalType::Unix => builder.unix(args.unix_file.clone()),
    };

    if let Some(user_id) = &args.user_id {
        builder = builder.user_id(user_id);
    }

    builder.build().map_err(anyhow::Error::msg)
}

fn http_hub(settings: &HubSettings) -> HttpHub {
    let mut hub = HttpHub::new(&settings.url);
    if let Some(timeout) = settings.timeout {
        hub = hub.with_timeout(timeout);
    }
    if let Some(user_id) = &settings.default_user_id {
        hub = hub.with_default_user_id(user_id);
    }
    hub
}

async fn run_call(
    args: PortalArgs,
    name: String,
    raw: Option<String>,
    config: &ConfigFile,
) -> Result<()> {
    let settings = hub_settings(&args, config);
    let request = portal_request(&args)?;

    let hub: Arc<dyn PortalHub> = if args.direct {
        Arc::new(DirectHub::new())
    } else {
        Arc::new(http_hub(&settings))
    };

    let handle = hub
        .allocate(&request)
        .await
        .context("Failed to create portal")?;
    println!("✅ Portal address: {}", handle);

    let address = handle.dialable()?;
    let mut invoker = Invoker::new();
    if let Some(timeout) = settings.connect_timeout {
        invoker = invoker.with_connect_timeout(timeout);
    }

    match raw {
        Some(payload) => {
            let reply = invoker
                .invoke(&RawBinding, &address, payload.into_bytes())
                .await
                .context("Failed to call service")?;
            println!("✅ Response: {}", String::from_utf8_lossy(&reply));
        }
        None => {
            let reply = invoker
                .invoke(&GreeterBinding::new(), &address, GreetingRequest::new(name))
                .await
                .context("Failed to call service")?;
            println!("✅ Response: {}", reply.message);
        }
    }

    Ok(())
}

async fn run_release(args: PortalArgs, config: &ConfigFile) -> Result<()> {
    if args.direct {
        bail!("--direct portals are not hub-managed; nothing to release");
    }

    let settings = hub_settings(&args, config);
    let request = portal_request(&args)?;
    http_hub(&settings)
        .release(&request)
        .await
        .context("Failed to destroy portal")?;

    println!("🧹 Released portal {}", request.remote_id());
    Ok(())
}

async fn run_echo_client(addr: &str) -> Result<()> {
    let address = canonicalize(addr)?;
    let mut connection = dial(&address, None).await?;
    println!("Connected to {}", address);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut buf = vec![0u8; 1024];

    loop {
        println!("Enter message (q to quit): ");
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.eq_ignore_ascii_case("q") {
            break;
        }

        connection.write_all(line.as_bytes()).await?;
        let n = connection.read(&mut buf).await?;
        if n == 0 {
            info!("Server closed the connection");
            break;
        }
        println!("Received echo: {}", String::from_utf8_lossy(&buf[..n]));
    }

    debug!("Echo client done");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level)?;

    let config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            load_config_file(path)?
        }
        None => ConfigFile::default(),
    };

    match cli.command {
        Commands::EchoServer { addr } => {
            let listen_addr: ListenAddr = addr.parse()?;
            EchoServer::start(EchoServerConfig { listen_addr }).await?;
        }
        Commands::EchoClient { addr } => run_echo_client(&addr).await?,
        Commands::GreeterServer { addr } => {
            let listen_addr: ListenAddr = addr.parse()?;
            GreeterServer::start(GreeterServerConfig { listen_addr }).await?;
        }
        Commands::Call { portal, name, raw } => run_call(portal, name, raw, &config).await?,
        Commands::Release { portal } => run_release(portal, &config).await?,
    }

    Ok(())
}

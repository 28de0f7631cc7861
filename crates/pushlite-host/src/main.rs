// # pushlite-host - Reference Host Harness
//
// ⚠️ ARCHITECTURAL CONSTRAINTS ⚠️
//
// - This is a THIN integration layer ONLY
// - DO NOT add sync, debounce, or delivery logic here
// - All client behavior MUST be in pushlite-core
// - Configuration is via environment variables ONLY
//
// The harness stands in for a host application. It is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Building the store, HTTP client, and coordinator
// 4. Translating stdin commands and OS signals into client calls
//
// ## Configuration
//
// - `PUSHLITE_APP_ID`: Application id (required)
// - `PUSHLITE_ACCESS_TOKEN`: Device API token (required)
// - `PUSHLITE_BASE_ENDPOINT`: Device API base URL (required)
// - `PUSHLITE_MID`: Account (member) id
// - `PUSHLITE_STATE_PATH`: Profile file (omit for an in-memory store)
// - `PUSHLITE_QUIET_PERIOD_MS`: Registration quiet period
// - `PUSHLITE_GRACE_PERIOD_SECS`: Close-event grace period
// - `PUSHLITE_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Commands (one per stdin line)
//
// ```text
// foreground | background | launched | terminate
// tag add <t> | tag remove <t> | tags
// attr <k> <v> | attr <k> | attrs
// token <hex> | push on|off | push-received <requestId> [objectId]
// id | pending | quit
// ```

use anyhow::{Context, Result};
use pushlite_core::{
    AppConfig, LifecycleCoordinator, LifecycleSignal, NoopBackgroundExecution, PushLite,
    PushLiteConfig, PushMetadata, StateStoreConfig, SyncEvent, create_state_store,
};
use pushlite_http::HttpSyncClient;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Upper bound on the wait for the grace token after a shutdown signal
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum HostExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<HostExitCode> for ExitCode {
    fn from(code: HostExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Harness configuration
struct Config {
    app_id: String,
    access_token: String,
    base_endpoint: String,
    mid: String,
    state_path: Option<String>,
    quiet_period_ms: Option<u64>,
    grace_period_secs: Option<u64>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            app_id: env::var("PUSHLITE_APP_ID").context("PUSHLITE_APP_ID is required")?,
            access_token: env::var("PUSHLITE_ACCESS_TOKEN")
                .context("PUSHLITE_ACCESS_TOKEN is required")?,
            base_endpoint: env::var("PUSHLITE_BASE_ENDPOINT")
                .context("PUSHLITE_BASE_ENDPOINT is required")?,
            mid: env::var("PUSHLITE_MID").unwrap_or_default(),
            state_path: env::var("PUSHLITE_STATE_PATH").ok(),
            quiet_period_ms: parse_var("PUSHLITE_QUIET_PERIOD_MS")?,
            grace_period_secs: parse_var("PUSHLITE_GRACE_PERIOD_SECS")?,
            log_level: env::var("PUSHLITE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if let Some(ref path) = self.state_path {
            if path.is_empty() {
                anyhow::bail!("PUSHLITE_STATE_PATH cannot be empty when set");
            }

            if let Some(parent) = std::path::Path::new(path).parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                anyhow::bail!(
                    "PUSHLITE_STATE_PATH parent directory does not exist: {}",
                    parent.display()
                );
            }
        }

        if let Some(quiet) = self.quiet_period_ms
            && !(1..=600_000).contains(&quiet)
        {
            anyhow::bail!(
                "PUSHLITE_QUIET_PERIOD_MS must be between 1 and 600000. Got: {}",
                quiet
            );
        }

        if let Some(grace) = self.grace_period_secs
            && !(1..=600).contains(&grace)
        {
            anyhow::bail!(
                "PUSHLITE_GRACE_PERIOD_SECS must be between 1 and 600. Got: {}",
                grace
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "PUSHLITE_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        // Remaining checks live with the client configuration
        self.client_config().validate()?;
        Ok(())
    }

    fn client_config(&self) -> PushLiteConfig {
        let app = AppConfig::new(&self.app_id, &self.access_token, &self.base_endpoint)
            .with_mid(&self.mid);
        let mut config = PushLiteConfig::new(app);

        if let Some(ref path) = self.state_path {
            config.state_store = StateStoreConfig::File { path: path.clone() };
        }
        if let Some(quiet) = self.quiet_period_ms {
            config.engine.quiet_period_ms = quiet;
        }
        if let Some(grace) = self.grace_period_secs {
            config.engine.grace_period_secs = grace;
        }
        config
    }
}

fn parse_var(name: &str) -> Result<Option<u64>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} must be a positive integer. Got: {}", name, raw)),
        Err(_) => Ok(None),
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return HostExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return HostExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return HostExitCode::ConfigError.into();
    }

    info!("Starting pushlite-host");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return HostExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_host(config).await {
            error!("Host error: {:#}", e);
            HostExitCode::RuntimeError
        } else {
            HostExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the harness until `quit`, end of input, or a shutdown signal
async fn run_host(config: Config) -> Result<()> {
    let client_config = config.client_config();

    let store = create_state_store(&client_config.state_store).await?;
    let client = HttpSyncClient::new(client_config.app.clone(), &client_config.device)?;
    let (coordinator, events) = LifecycleCoordinator::new(
        client_config,
        store,
        Arc::new(client),
        Arc::new(NoopBackgroundExecution::new()),
    )?;

    let (handle, task) = coordinator.spawn();
    tokio::spawn(log_events(events));

    handle.signal(LifecycleSignal::Launched).await?;
    info!("Ready; reading commands from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = wait_for_shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            received = &mut shutdown => {
                info!("Received shutdown signal: {}", received?);
                handle.signal(LifecycleSignal::Terminating).await?;
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("End of input");
                    break;
                };
                match execute(&handle, line.trim()).await {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Quit) => break,
                    Err(e) => warn!("{:#}", e),
                }
            }
        }
    }

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, handle.wait_for_grace_release())
        .await
        .is_err()
    {
        warn!("Grace token still held after {:?}", SHUTDOWN_TIMEOUT);
    }

    handle.shutdown().await?;
    task.await.context("coordinator task panicked")??;
    info!("Shut down cleanly");
    Ok(())
}

enum Flow {
    Continue,
    Quit,
}

/// Execute one stdin command
async fn execute(handle: &PushLite, line: &str) -> Result<Flow> {
    let words: Vec<&str> = line.split_whitespace().collect();

    match words.as_slice() {
        [] => {}
        ["quit"] => return Ok(Flow::Quit),
        [name @ ("foreground" | "background" | "launched" | "terminate")] => {
            handle.signal(name.parse::<LifecycleSignal>()?).await?;
        }
        ["tag", "add", tag] => handle.add_tag(*tag).await?,
        ["tag", "remove", tag] => handle.remove_tag(*tag).await?,
        ["tags"] => println!("{:?}", handle.tags().await?),
        ["attr", key, value] => {
            handle
                .set_attribute(*key, Some(value.to_string()))
                .await?
        }
        ["attr", key] => handle.set_attribute(*key, None).await?,
        ["attrs"] => println!("{:?}", handle.attributes().await?),
        ["token", hex] => handle.set_device_token(&parse_hex(hex)?).await?,
        ["push", "on"] => handle.set_enable_push(true).await?,
        ["push", "off"] => handle.set_enable_push(false).await?,
        ["push-received", request_id, rest @ ..] if rest.len() <= 1 => {
            let metadata = PushMetadata::new(
                Some(request_id.to_string()),
                rest.first().map(|s| s.to_string()),
            );
            handle.on_push_notification_received(metadata).await?;
        }
        ["id"] => println!("{}", handle.device_identifier().await?),
        ["pending"] => match handle.pending_close_event().await? {
            Some(event) => println!("{}", serde_json::to_string(&event)?),
            None => println!("none"),
        },
        _ => anyhow::bail!("Unknown command: {}", line),
    }

    Ok(Flow::Continue)
}

/// Decode a hex push token into raw bytes
fn parse_hex(hex: &str) -> Result<Vec<u8>> {
    if hex.is_empty() || hex.len() % 2 != 0 || !hex.is_ascii() {
        anyhow::bail!("token must be an even number of hex digits");
    }

    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .with_context(|| format!("invalid hex byte: {}", &hex[i..i + 2]))
        })
        .collect()
}

/// Log coordinator events until the channel closes
async fn log_events(mut events: mpsc::Receiver<SyncEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SyncEvent::CloseDeliveryFailed { .. } | SyncEvent::RegistrationFailed { .. } => {
                warn!("{:?}", event)
            }
            _ => info!("{:?}", event),
        }
    }
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for Ctrl-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

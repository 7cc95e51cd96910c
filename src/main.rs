use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use termpilot::autopilot::{
    AgentRunner, AgentStatus, AgentStep, ConfirmationHandler, ReportFn, SessionExecutor,
};
use termpilot::config::{config_file, load_config};
use termpilot::llm::OpenAiClient;
use termpilot::session::{AuthMethod, CommandChannel, SessionConfig, SessionRegistry, SessionStatus};
use termpilot::transport::{StaticPort, TransportManager, WsConnector};

/// Drive a remote shell toward a goal with a language model
#[derive(Parser, Debug)]
#[command(name = "termpilot")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Remote host to open the shell on
    #[arg(long)]
    host: String,

    /// Remote user name
    #[arg(short, long)]
    user: String,

    /// Password for the remote user
    #[arg(long, env = "TERMPILOT_SSH_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Private key file, used instead of a password
    #[arg(long, conflicts_with = "password")]
    key: Option<PathBuf>,

    /// Remote SSH port
    #[arg(short, long, default_value_t = 22)]
    port: u16,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "TERMPILOT_CONFIG")]
    config: Option<PathBuf>,

    /// Port the backend execution service listens on
    #[arg(long)]
    backend_port: Option<u16>,

    /// Override the maximum number of planning attempts
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Run risky commands without asking
    #[arg(long)]
    no_confirm: bool,

    /// What the agent should achieve
    #[arg(required = true, trailing_var_arg = true)]
    goal: Vec<String>,
}

/// Asks on the terminal before a risky command runs. One reader is kept for
/// the whole run so input buffered past an answer is not lost.
struct LineConfirmation<R> {
    input: Mutex<R>,
}

impl LineConfirmation<BufReader<Stdin>> {
    fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin + Send> LineConfirmation<R> {
    fn new(input: R) -> Self {
        Self {
            input: Mutex::new(input),
        }
    }

    async fn read_answer(&self) -> bool {
        let mut answer = String::new();
        match self.input.lock().await.read_line(&mut answer).await {
            Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
            Err(e) => {
                warn!("Failed to read confirmation: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> ConfirmationHandler for LineConfirmation<R> {
    async fn confirm(&self, command: &str, reason: &str) -> bool {
        print!("\n  Run `{}` ({})? [y/N] ", command, reason);
        let _ = std::io::stdout().flush();
        self.read_answer().await
    }
}

fn print_step(step: &AgentStep, printed: &AtomicUsize) {
    match step {
        AgentStep::Planning {
            attempt,
            max_attempts,
        } => println!("\n[{}/{}] planning...", attempt, max_attempts),
        AgentStep::Plan { thought, .. } => println!("  thought: {}", thought),
        AgentStep::ConfirmationRequired { command, reason } => {
            println!("  needs confirmation ({}): {}", reason, command)
        }
        AgentStep::Declined { command } => println!("  declined: {}", command),
        AgentStep::Executing { command } => println!("  $ {}", command),
        AgentStep::Observation { output, .. } => {
            for line in output.lines() {
                println!("    {}", line);
            }
        }
        AgentStep::Summary { text } => {
            let from = printed.swap(text.len(), Ordering::AcqRel);
            if from == 0 {
                println!();
            }
            let fresh = text.get(from..).unwrap_or(text);
            print!("{}", fresh);
            let _ = std::io::stdout().flush();
        }
        AgentStep::Finished {
            status, attempts, ..
        } => println!("\n\n[{:?} after {} attempts]", status, attempts),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("termpilot=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let goal = cli.goal.join(" ");

    let config_path = match cli.config {
        Some(path) => path,
        None => config_file()?,
    };
    let mut config = load_config(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(max_attempts) = cli.max_attempts {
        config.agent.max_attempts = max_attempts.max(1);
    }
    if cli.no_confirm {
        config.agent.safe_mode = false;
    }
    if config.llm.api_key.is_none() {
        warn!("No API key configured; set TERMPILOT_API_KEY if the model backend needs one");
    }

    let auth = match (cli.key, cli.password) {
        (Some(path), _) => AuthMethod::PrivateKey {
            key: std::fs::read_to_string(&path)
                .with_context(|| format!("reading key {}", path.display()))?,
        },
        (None, Some(password)) => AuthMethod::Password { password },
        (None, None) => bail!("either --password or --key is required"),
    };

    // Transport and sessions
    let connector = Arc::new(WsConnector::new(
        config.backend.path.clone(),
        config.backend.outbound_queue,
    ));
    let (transport, events) = TransportManager::new(&config.backend, connector);
    if let Some(port) = cli.backend_port {
        if let Some(discovery) = transport.resolve_endpoint(Arc::new(StaticPort(port))) {
            discovery.await?;
        }
    }
    let registry = SessionRegistry::new(transport.clone(), &config.buffer);
    let dispatcher = registry.spawn_dispatcher(events);

    let session_id = uuid::Uuid::new_v4().to_string();
    let (status_tx, mut status_rx) = mpsc::unbounded_channel();
    let _status = registry.on_session_status(&session_id, move |event| {
        let _ = status_tx.send(event.clone());
    });

    registry
        .connect(SessionConfig {
            session_id: session_id.clone(),
            host: cli.host.clone(),
            port: cli.port,
            username: cli.user,
            auth,
        })
        .await;

    let wait = Duration::from_secs(config.backend.connect_timeout_secs);
    let connected = tokio::time::timeout(wait, async {
        while let Some(event) = status_rx.recv().await {
            match event.status {
                SessionStatus::Connected => return Ok(()),
                SessionStatus::Error | SessionStatus::Disconnected => {
                    return Err(event.message.unwrap_or_else(|| event.status.to_string()))
                }
                SessionStatus::Connecting => {}
            }
        }
        Err("session closed".to_string())
    })
    .await;

    match connected {
        Ok(Ok(())) => info!("Session {} connected to {}", session_id, cli.host),
        Ok(Err(message)) => bail!("could not open a shell on {}: {}", cli.host, message),
        Err(_) => bail!("no shell on {} after {}s", cli.host, wait.as_secs()),
    }

    // Autopilot
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nStopping after the current step...");
                stop.store(true, Ordering::Release);
            }
        });
    }

    let model = Arc::new(OpenAiClient::new(&config.llm)?);
    let executor = Arc::new(SessionExecutor::new(
        CommandChannel::new(registry.clone()),
        session_id.clone(),
    ));
    let printed = AtomicUsize::new(0);
    let reporter = Arc::new(ReportFn(move |step: &AgentStep| print_step(step, &printed)));

    let outcome = AgentRunner::new(model, executor, reporter, config.agent.clone())
        .with_confirmation(Arc::new(LineConfirmation::stdin()))
        .with_stop_signal(stop)
        .run(&goal)
        .await;

    registry.disconnect_all();
    transport.teardown();
    dispatcher.abort();

    if outcome.status == AgentStatus::Failed {
        bail!("{}", outcome.summary);
    }
    Ok(())
}

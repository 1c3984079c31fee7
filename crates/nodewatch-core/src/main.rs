//! nodewatch CLI
//!
//! Command-line interface for the nodewatch operations dashboard.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use nodewatch::api::ApiClient;
use nodewatch::models::User;
use nodewatch::store::JsonFileStore;
use nodewatch::watch::{AlertFeed, AlertView};
use nodewatch::Config;

/// nodewatch - Operations dashboard for industrial sensor fleets
#[derive(Parser)]
#[command(name = "nodewatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "NODEWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (for commands that support it)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the live dashboard (the default)
    Dashboard {
        /// Poll interval override, e.g. "15s"
        #[arg(long, value_parser = humantime::parse_duration)]
        poll: Option<Duration>,
    },

    /// Query and acknowledge alerts
    Alerts {
        #[command(subcommand)]
        command: AlertsCommands,
    },

    /// Show the operator profile
    Profile,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum AlertsCommands {
    /// List alerts visible to the current operator
    List {
        /// Show acknowledged alerts instead of active ones
        #[arg(long)]
        resolved: bool,
    },

    /// Acknowledge (resolve) an alert with a note
    Ack {
        /// Alert id to acknowledge
        alert_id: i64,

        /// Resolution note; prompted for interactively when omitted
        #[arg(long)]
        note: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Completions need neither config nor a backend
    if let Some(Commands::Completions { shell }) = &cli.command {
        generate_completions(*shell);
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let command = cli.command.unwrap_or(Commands::Dashboard { poll: None });
    let dashboard = matches!(command, Commands::Dashboard { .. });

    let _log_guard = match init_logging(cli.verbose, &config, dashboard) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error initializing logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match command {
        Commands::Dashboard { poll } => run_dashboard(config, poll).await,
        Commands::Alerts { command } => run_alerts(config, command, cli.format).await,
        Commands::Profile => run_profile(config, cli.format).await,
        Commands::Completions { .. } => Ok(()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing
///
/// Dashboard mode writes to a rolling log file; stderr would corrupt the
/// alternate screen. CLI commands log to stderr like any other tool.
fn init_logging(
    verbose: bool,
    config: &Config,
    dashboard: bool,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let default_level: &str = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    if dashboard {
        let dir = config.log_dir()?;
        std::fs::create_dir_all(&dir)?;
        let appender = tracing_appender::rolling::daily(dir, "nodewatch.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .init();
        Ok(Some(guard))
    } else if config.logging.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
        Ok(None)
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        Ok(None)
    }
}

/// Resolve the configured session user against the backend
async fn load_viewer(config: &Config, client: &ApiClient) -> anyhow::Result<User> {
    let user_id = config.session.user_id.ok_or_else(|| {
        anyhow::anyhow!(
            "no session user configured; set session.user_id in the config file \
             or NODEWATCH_SESSION__USER_ID"
        )
    })?;

    client
        .user_detail(user_id)
        .await
        .with_context(|| format!("failed to load user {user_id} from the backend"))
}

async fn run_dashboard(mut config: Config, poll: Option<Duration>) -> anyhow::Result<()> {
    if let Some(interval) = poll {
        config.poll.interval = interval;
    }

    let client = Arc::new(ApiClient::new(&config.api)?);
    let viewer = load_viewer(&config, &client).await?;
    let store = Arc::new(JsonFileStore::open(config.state_dir()?)?);

    info!(user_id = viewer.id, "starting dashboard");

    let mut app = nodewatch::tui::App::new(&config, client, store, viewer);
    app.run().await?;
    Ok(())
}

async fn run_alerts(
    config: Config,
    command: AlertsCommands,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let client = Arc::new(ApiClient::new(&config.api)?);
    let viewer = load_viewer(&config, &client).await?;

    match command {
        AlertsCommands::List { resolved } => {
            let feed = AlertFeed::new(client, config.status);
            let views = feed.history(&viewer).await?;
            let views: Vec<AlertView> = views
                .into_iter()
                .filter(|view| view.is_resolved() == resolved)
                .collect();

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&views)?),
                OutputFormat::Text => print_alert_table(&views),
            }
        }
        AlertsCommands::Ack { alert_id, note } => {
            let note = match note {
                Some(note) => note,
                None => dialoguer::Input::<String>::new()
                    .with_prompt("Resolution note")
                    .interact_text()?,
            };

            client.acknowledge_alert(alert_id, &note).await?;
            println!("Alert {alert_id} acknowledged");
        }
    }
    Ok(())
}

async fn run_profile(config: Config, format: OutputFormat) -> anyhow::Result<()> {
    let client = Arc::new(ApiClient::new(&config.api)?);
    let viewer = load_viewer(&config, &client).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&viewer)?),
        OutputFormat::Text => {
            println!("Name:        {}", viewer.name.as_deref().unwrap_or("-"));
            println!("Role:        {}", viewer.role.as_deref().unwrap_or("-"));
            println!("Login:       {}", viewer.login.as_deref().unwrap_or("-"));
            println!("Designation: {}", viewer.designation.as_deref().unwrap_or("-"));
            println!("Employee:    #{}", viewer.id);
            println!("Clearance:   Level {}", viewer.rights.unwrap_or_default());
            if viewer.capability().full_visibility() {
                println!("Scope:       All machines");
            } else {
                match viewer.assigned_machine() {
                    Some(id) => println!("Scope:       Node {id}"),
                    None => println!("Scope:       Unassigned"),
                }
            }
        }
    }
    Ok(())
}

fn print_alert_table(views: &[AlertView]) {
    if views.is_empty() {
        println!("No alerts");
        return;
    }

    println!(
        "{:<6} {:<20} {:<10} {:<8} {:<25} {}",
        "ID", "MACHINE", "STATUS", "RATIO", "TRIGGERED", "NOTE"
    );
    for view in views {
        println!(
            "{:<6} {:<20} {:<10} {:<8} {:<25} {}",
            view.alert_id,
            view.machine_name,
            view.status_label(),
            view.ratio.map_or("-".to_string(), |r| format!("{r:.3}")),
            view.triggered_at
                .map_or("-".to_string(), |t| t.to_rfc3339()),
            view.comments.as_deref().unwrap_or("-"),
        );
    }
}

fn generate_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "nodewatch", &mut io::stdout());
}

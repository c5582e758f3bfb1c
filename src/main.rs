//! bugbridge - Bugzilla to Jira synchronization
//!
//! Main entry point for the bugbridge CLI.

use anyhow::Context;
use bugbridge::config::{config_warnings, validate_config, BridgeConfig, Settings};
use bugbridge::integrations::{BugzillaAdapter, JiraAdapter, RetryConfig, Trackers};
use bugbridge::logging::{self, LogFormat};
use bugbridge::pipeline::Phase;
use bugbridge::rules::{RegistryHandle, RuleRegistry};
use bugbridge::runner::{Bridge, Report};
use bugbridge::server::BridgeServer;
use bugbridge::tracker::WebhookRequest;
use bugbridge::StepRegistry;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

/// bugbridge - Sync Bugzilla bugs to Jira issues
#[derive(Parser, Debug)]
#[command(name = "bugbridge")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level or filter directive (overridden by RUST_LOG)
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[arg(long, global = true, value_enum, env = "LOG_FORMAT", default_value = "json")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the webhook server
    Serve {
        #[command(flatten)]
        settings: Settings,
    },

    /// Check a rule file without starting the server
    Validate {
        /// Rule file
        #[arg(long, env = "ACTION_CONFIG", default_value = "config/config.yaml")]
        config: PathBuf,
    },

    /// Process one saved webhook payload and print the report
    Replay {
        #[command(flatten)]
        settings: Settings,

        /// JSON file holding a Bugzilla webhook request
        payload: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(&cli.log_level, cli.log_format) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Serve { settings } => {
            let steps = StepRegistry::builtin();
            let retry = RetryConfig::with_max_retries(settings.max_retries);
            let bridge = build_bridge(&settings, &steps, retry)?;
            let addr = settings.bind_addr()?;
            let server = BridgeServer::new(
                bridge,
                steps,
                Some(settings.rules_path.clone()),
                settings.api_key.clone(),
            );
            server.run(addr).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate { config } => Ok(handle_validate(&config)),
        Commands::Replay { settings, payload } => {
            let raw = std::fs::read_to_string(&payload)
                .with_context(|| format!("reading {}", payload.display()))?;
            let request: WebhookRequest = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", payload.display()))?;

            let steps = StepRegistry::builtin();
            let bridge = build_bridge(&settings, &steps, RetryConfig::no_retry())?;
            let ticket_id = request.bug.id;
            let disposition = bridge.handle(request).await?;

            let report = Report::new(ticket_id, &disposition);
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(if disposition.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn build_bridge(
    settings: &Settings,
    steps: &StepRegistry,
    retry: RetryConfig,
) -> anyhow::Result<Bridge> {
    let registry = RuleRegistry::load(&settings.rules_path, steps)
        .with_context(|| format!("loading rules from {}", settings.rules_path.display()))?;
    info!(
        rules = registry.len(),
        path = %settings.rules_path.display(),
        "Loaded rules"
    );

    let upstream = BugzillaAdapter::new(
        &settings.bugzilla_base_url,
        settings.bugzilla_api_key.clone(),
        retry.clone(),
    )?;
    let downstream = JiraAdapter::new(
        &settings.jira_base_url,
        settings.jira_username.clone(),
        settings.jira_api_key.clone(),
        retry,
    )?;
    let trackers = Trackers::new(
        Arc::new(upstream),
        Arc::new(downstream),
        settings.jira_base_url.as_str(),
        settings.bugzilla_base_url.as_str(),
    );

    Ok(Bridge::new(Arc::new(RegistryHandle::new(registry)), trackers))
}

fn handle_validate(path: &Path) -> ExitCode {
    let config = match BridgeConfig::load(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    for warning in config_warnings(&config) {
        eprintln!("⚠ {}", warning);
    }

    let steps = StepRegistry::builtin();
    if let Err(errors) = validate_config(&config, &steps) {
        eprintln!("✗ {} has {} error(s):", path.display(), errors.len());
        for error in errors {
            eprintln!("  - {}", error);
        }
        return ExitCode::FAILURE;
    }

    let registry = match RuleRegistry::from_config(&config, &steps) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("✗ {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("✓ {} rule(s) in {}", registry.len(), path.display());
    for rule in registry.rules() {
        let state = if rule.enabled { "" } else { " (disabled)" };
        println!("  {} → {}{}", rule.tag, rule.project_key, state);
        for phase in Phase::ALL {
            println!("    {:<8} {}", phase.as_str(), rule.steps.names(phase).join(", "));
        }
    }
    ExitCode::SUCCESS
}

use anyhow::{Context, bail};
use boardcheck_engine::config::BoardcheckConfig;
use boardcheck_engine::{Checker, ConfigLoader, Credentials, MatchMode, RunReport, SearchCriteria, Verdict};
use boardcheck_h::HeadlessBackend;
use clap::Parser;
use clap::builder::BoolishValueParser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "boardcheck",
    version,
    about = "Check whether a ticket sits in a given column of a project board"
)]
struct Args {
    /// Ticket title to look for
    #[arg(env = "EMAIL_SUBJECT", default_value = "Testing")]
    title: String,

    /// Project whose board is searched
    #[arg(long, default_value = "Test Support")]
    project: String,

    /// Column the ticket must sit in
    #[arg(long, default_value = "Resolved")]
    section: String,

    /// Require the whole title to match instead of a substring
    #[arg(long)]
    exact: bool,

    /// Launch browser in visible mode (not headless)
    #[arg(long)]
    visible: bool,

    #[arg(long, env = "HEADLESS", value_parser = BoolishValueParser::new(), hide = true)]
    headless: Option<bool>,

    /// Config file (defaults to ./boardcheck.yaml, then ~/.boardcheck/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write screenshots here (enables evidence capture)
    #[arg(long)]
    evidence_dir: Option<PathBuf>,

    #[arg(long)]
    base_url: Option<String>,

    #[arg(long, env = "BOARDCHECK_EMAIL", hide_env_values = true)]
    email: Option<String>,

    #[arg(long, env = "BOARDCHECK_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Exit 2 instead of 1 when the run itself failed
    #[arg(long)]
    strict_exit: bool,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,
}

impl Args {
    fn criteria(&self) -> SearchCriteria {
        let mode = if self.exact {
            MatchMode::Exact
        } else {
            MatchMode::Partial
        };
        SearchCriteria::new(&self.project, &self.section, &self.title, mode)
    }

    fn apply_overrides(&self, config: &mut BoardcheckConfig) {
        if let Some(url) = &self.base_url {
            config.target.base_url = url.clone();
        }
        if let Some(headless) = self.headless {
            config.browser.headless = headless;
        }
        if self.visible {
            config.browser.headless = false;
        }
        if let Some(dir) = &self.evidence_dir {
            config.evidence.enabled = true;
            config.evidence.dir = dir.clone();
        }
    }

    /// Flags and `BOARDCHECK_*` first, then the legacy `EOXS_*` variables.
    fn credentials(&self, env: impl Fn(&str) -> Option<String>) -> anyhow::Result<Credentials> {
        let email = self.email.clone().or_else(|| env("EOXS_EMAIL"));
        let password = self.password.clone().or_else(|| env("EOXS_PASSWORD"));
        match (email, password) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Ok(Credentials::new(email, password))
            }
            _ => bail!("credentials missing: set BOARDCHECK_EMAIL and BOARDCHECK_PASSWORD"),
        }
    }
}

async fn prepare(args: &Args) -> anyhow::Result<Checker> {
    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from(path)
            .await
            .with_context(|| format!("loading {}", path.display()))?,
        None => ConfigLoader::load_default().await?,
    };
    args.apply_overrides(&mut config);
    config.validate().context("invalid configuration")?;

    let credentials = args.credentials(|key| std::env::var(key).ok())?;
    Ok(Checker::new(config, credentials, args.criteria()))
}

/// Completes on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, aborting run"),
        _ = terminate => info!("Received SIGTERM, aborting run"),
    }
}

fn emit(report: &RunReport, pretty: bool) -> anyhow::Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };
    println!("{}", json);
    match &report.matched_text {
        Some(text) => eprintln!("ANSWER: {} ({})", report.answer, text),
        None => eprintln!("ANSWER: {}", report.answer),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries only the JSON report.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let report = match prepare(&args).await {
        Ok(checker) => {
            let mut backend = HeadlessBackend::from_config(checker.config());
            checker
                .run_with_shutdown(&mut backend, shutdown_signal())
                .await
                .report()
        }
        Err(e) => {
            error!("{:#}", e);
            Verdict::failed(format!("setup failed: {:#}", e), Vec::new()).report()
        }
    };

    if let Err(e) = emit(&report, args.pretty) {
        error!("Failed to write report: {}", e);
    }
    ExitCode::from(report.exit_code(args.strict_exit) as u8)
}

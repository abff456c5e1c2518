use clap::Parser;
use evergreen_engine::config::Config;
use evergreen_engine::orchestrator::Orchestrator;
use evergreen_engine::report::{ArtifactDir, CompositeReporter, NullReporter, Reporter, TelegramReporter};
use evergreen_h::backend::HeadlessBackend;
use evergreen_h::cdp::LaunchOptions;
use evergreen_h::extensions;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "evergreen",
    version,
    about = "Unattended dashboard renewal keeper"
)]
struct Args {
    /// Launch the browser in visible mode (not headless)
    #[arg(long)]
    visible: bool,

    /// Override the attempt ceiling from the environment
    #[arg(long)]
    max_attempts: Option<u32>,
}

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout stays clean for scripting.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // A configuration error is fatal and non-retryable; exit before any
    // browser resources are touched.
    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("configuration error: {}", e);
            std::process::exit(2);
        }
    };
    if let Some(max_attempts) = args.max_attempts {
        config.max_attempts = max_attempts.clamp(1, 10);
    }
    tracing::info!(
        "account {} / target {} / up to {} attempt(s)",
        config.redacted_email(),
        config.renew_url,
        config.max_attempts
    );

    let reporter = build_reporter(&config);

    let options = LaunchOptions {
        visible: args.visible,
        extensions: config
            .extensions_dir
            .as_deref()
            .map(extensions::discover)
            .unwrap_or_default(),
    };
    let mut backend = HeadlessBackend::new(options);

    let report = Orchestrator::new(&mut backend, &config, reporter.as_ref())
        .run()
        .await;

    tracing::info!(
        "final outcome: {} ({} attempt(s))",
        report.outcome,
        report.attempts
    );
    std::process::exit(report.exit_code());
}

fn build_reporter(config: &Config) -> Box<dyn Reporter> {
    let mut sinks: Vec<Box<dyn Reporter>> = Vec::new();
    if let Some(telegram) = &config.telegram {
        sinks.push(Box::new(TelegramReporter::new(
            telegram.token.clone(),
            telegram.chat_id.clone(),
        )));
    }
    if let Some(dir) = &config.artifact_dir {
        sinks.push(Box::new(ArtifactDir::new(dir.clone())));
    }
    if sinks.is_empty() {
        tracing::info!("no reporter configured; progress goes to logs only");
        return Box::new(NullReporter);
    }
    Box::new(CompositeReporter::new(sinks))
}

//! hermesd — run one travel-planning flow from the command line.
//!
//! Without `--provider-url` the flow runs against the deterministic offline
//! provider, so the same query always yields the same plan. Point
//! `--provider-url` at a completion endpoint to go live.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::Level;

use hermes_core::{
    default_library, init_tracing, EngineConfig, FakeProvider, FlowOrchestrator,
    HttpModelProvider, HttpProviderConfig, ModelProvider, PlanRequest,
};

#[derive(Parser)]
#[command(name = "hermesd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Hermes travel-planning flow runner", long_about = None)]
struct Cli {
    /// Travel query to plan
    query: String,

    /// Pin an explicit provider (gemini | anthropic | openai)
    #[arg(short, long)]
    provider: Option<String>,

    /// Treat unrecovered invocation errors as fatal
    #[arg(long)]
    strict: bool,

    /// End-to-end flow timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Completion endpoint base URL; omit to use the offline provider
    #[arg(long, env = "HERMES_PROVIDER_URL")]
    provider_url: Option<String>,

    /// Emit newline-delimited JSON log lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs, Level::INFO);

    let mut config = EngineConfig::default().with_strict(cli.strict);
    if let Some(secs) = cli.timeout_secs {
        config = config.with_flow_timeout(Duration::from_secs(secs));
    }

    let provider: Arc<dyn ModelProvider> = match &cli.provider_url {
        Some(url) => Arc::new(HttpModelProvider::new(HttpProviderConfig::new(url))?),
        None => Arc::new(FakeProvider::new()),
    };

    let orchestrator = FlowOrchestrator::new(config, provider, Arc::new(default_library()));

    let mut request = PlanRequest::new(cli.query);
    if let Some(provider) = cli.provider {
        request = request.with_provider_hint(provider);
    }

    let response = orchestrator.plan_trip(request).await;
    println!("{}", serde_json::to_string_pretty(&response)?);

    if !response.success {
        std::process::exit(1);
    }
    Ok(())
}

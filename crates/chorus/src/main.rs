use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use chorus::{ClientConfig, OpenAiClient, ProposerSpec, Workflow, WorkflowRequest};

/// Ask several models the same question, then synthesize one answer.
#[derive(Parser, Debug)]
#[command(name = "chorus", version, about)]
struct Cli {
    /// Task prompt sent to every proposer and to the aggregator.
    task: String,

    /// Proposer model identifier (repeatable, order determines numbering).
    #[arg(long = "proposer", required = true)]
    proposers: Vec<String>,

    /// Aggregator model identifier.
    #[arg(long, default_value = "gpt-4o")]
    aggregator: String,

    /// Sampling temperature for proposer calls.
    #[arg(long, default_value_t = 0.7)]
    temperature: f64,

    /// Output token cap per call.
    #[arg(long, default_value_t = 512)]
    max_tokens: u32,

    /// Cap on concurrent proposer calls (unbounded when omitted).
    #[arg(long)]
    max_in_flight: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = ClientConfig::from_env()?;
    let client = Arc::new(OpenAiClient::new(config)?);

    let mut workflow = Workflow::new(client);
    if let Some(max_in_flight) = cli.max_in_flight {
        workflow = workflow.with_max_in_flight(max_in_flight);
    }

    let request = WorkflowRequest::new(&cli.task, &cli.aggregator).with_proposers(
        cli.proposers.iter().map(|model| {
            ProposerSpec::new(model)
                .with_temperature(cli.temperature)
                .with_max_tokens(cli.max_tokens)
        }),
    );

    info!(
        proposers = request.proposers.len(),
        aggregator = %request.aggregator_model,
        "dispatching workflow"
    );

    let outcome = workflow.run(&request).await?;

    for (index, result) in outcome.results.iter().enumerate() {
        match result.failure() {
            None => info!(
                index,
                model = %result.model,
                attempts = result.attempts,
                elapsed_ms = result.elapsed.as_millis() as u64,
                "proposer succeeded"
            ),
            Some((kind, message)) => tracing::warn!(
                index,
                model = %result.model,
                %kind,
                message,
                "proposer failed"
            ),
        }
    }

    println!("{}", outcome.final_answer);
    Ok(())
}

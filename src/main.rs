//! simpeval CLI - run benchmark tasks against an OpenAI-compatible model

use clap::Parser;
use simpeval::driver::{self, RunOptions};
use simpeval::error::{Result, SimpEvalError};
use simpeval::samplers::TOKEN_ENV_VAR;
use std::num::NonZeroUsize;
use tracing_subscriber::EnvFilter;

/// Run benchmark tasks against an OpenAI-compatible model endpoint
#[derive(Parser, Debug)]
#[command(name = "simpeval")]
#[command(version)]
#[command(about = "Benchmark LLMs through OpenAI-compatible APIs")]
struct Args {
    /// Sampler registry key (e.g. chat_completion)
    #[arg(long, required = true)]
    sampler: String,

    /// Model configuration: model_name=...,url=...[,system_message=...,temperature=N,max_tokens=N,max_retries=N]
    #[arg(long, default_value = "")]
    model_args: String,

    /// Comma-separated subset of tasks; all registered tasks when absent
    #[arg(long)]
    tasks: Option<String>,

    /// Subdirectory under the report directory for output artifacts
    #[arg(long)]
    output_path: Option<String>,

    /// Cap on examples per task, for smoke runs only
    #[arg(long)]
    limit: Option<NonZeroUsize>,

    /// Configuration overrides for the math equality checker (e.g. model_name=...)
    #[arg(long)]
    judge_model: Option<String>,

    /// Number of examples awaited together per group
    #[arg(long, default_value = "1")]
    batch_size: NonZeroUsize,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    if args.limit.is_some() {
        eprintln!(
            "WARNING: --limit SHOULD ONLY BE USED FOR TESTING. \
REAL METRICS SHOULD NOT BE COMPUTED USING LIMIT."
        );
    }

    let api_key = std::env::var(TOKEN_ENV_VAR)
        .map_err(|_| SimpEvalError::MissingToken(TOKEN_ENV_VAR.to_string()))?;

    let opts = RunOptions {
        sampler: args.sampler,
        model_args: args.model_args,
        tasks: args.tasks,
        output_path: args.output_path,
        limit: args.limit.map(NonZeroUsize::get),
        judge_model: args.judge_model,
        batch_size: args.batch_size.get(),
        api_key,
    };

    driver::run(&opts).await?;
    Ok(())
}

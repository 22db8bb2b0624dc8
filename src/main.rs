use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use serde_json::json;

use baler::cli::{Cli, Command};
use baler::ui::ChainProgress;
use baler::{
    BalerConfig, Chain, ChainBuilder, ChainStore, Completion, ExecutionEngine, Hook, JobPayload,
    MemoryStore, QueueRunner, RunnerOutcome,
};

/// Definição de cadeia carregada de um arquivo JSON pelo subcomando `run`.
#[derive(Debug, Deserialize)]
struct ChainDefinition {
    #[serde(default)]
    delay_seconds: Option<i64>,
    #[serde(default)]
    queue: Option<String>,
    #[serde(default)]
    connection: Option<String>,
    jobs: Vec<JobPayload>,
}

impl ChainDefinition {
    fn load(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(Path::new(path))
            .with_context(|| format!("reading chain definition {path}"))?;
        serde_json::from_str(&contents).with_context(|| format!("parsing chain definition {path}"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = BalerConfig::load()?;

    let process_automatically = !cli.manual && config.process_automatically;
    let queue = cli.queue.clone().or_else(|| config.default_queue.clone());

    let store = Arc::new(MemoryStore::new());
    let runner = Arc::new(QueueRunner::new());
    let engine = ExecutionEngine::new(Arc::clone(&store), Arc::clone(&runner))
        .with_process_automatically(process_automatically);

    let builder = match &cli.command {
        Command::Run { file } => {
            let definition = ChainDefinition::load(file)?;
            let mut builder = ChainBuilder::new();
            for payload in definition.jobs {
                builder = builder.add_job(payload);
            }
            builder
                .when(definition.delay_seconds.is_some() || config.default_delay_seconds > 0, |b| {
                    b.with_delay(
                        definition
                            .delay_seconds
                            .unwrap_or(config.default_delay_seconds as i64),
                    )
                })
                .when(definition.queue.is_some() || queue.is_some(), |b| {
                    let q = definition.queue.clone().or_else(|| queue.clone());
                    b.on_queue(q.unwrap_or_default())
                })
                .when(
                    definition.connection.is_some() || config.default_connection.is_some(),
                    |b| {
                        let c = definition
                            .connection
                            .clone()
                            .or_else(|| config.default_connection.clone());
                        b.on_connection(c.unwrap_or_default())
                    },
                )
        }
        Command::Demo { jobs, delay, .. } => {
            let mut builder = ChainBuilder::new();
            for index in 0..*jobs {
                builder = builder
                    .add_job(JobPayload::new(format!("demo-job-{index}")).with_data(json!({
                        "step": index,
                    })));
            }
            builder
                .when(*delay > 0, |b| b.with_delay(*delay))
                .when(queue.is_some(), |b| b.on_queue(queue.clone().unwrap_or_default()))
        }
    };

    let fail_at = match &cli.command {
        Command::Demo { fail_at, .. } => *fail_at,
        Command::Run { .. } => None,
    };

    let verbose = cli.verbose;
    let builder = builder
        .then(Hook::from_fn(move |chain| {
            if verbose {
                eprintln!("  hook: chain {} finished with {} result(s)", chain.id, chain.results.len());
            }
            Ok(())
        }))
        .catch(Hook::from_fn(move |chain| {
            if verbose {
                eprintln!("  hook: chain {} failed at bale {}", chain.id, chain.current_index);
            }
            Ok(())
        }));

    let chain = builder.dispatch(&engine).await?;
    let progress = ChainProgress::start(&chain.id, chain.bale_count);

    let chain = drive(&engine, &runner, &progress, &chain.id, fail_at, cli.manual).await?;

    progress.complete(&chain);
    if cli.verbose {
        progress.print_record(&chain);
    }
    Ok(())
}

/// Drena a fila do runner, simulando a execução de cada bale e
/// reportando as conclusões de volta ao engine.
async fn drive(
    engine: &ExecutionEngine<MemoryStore, QueueRunner>,
    runner: &QueueRunner,
    progress: &ChainProgress,
    chain_id: &str,
    fail_at: Option<usize>,
    manual: bool,
) -> Result<Chain> {
    while let Some(submission) = runner.pop() {
        progress.dispatching(submission.index, &submission.job_name, submission.delay_seconds);
        if submission.delay_seconds > 0 {
            tokio::time::sleep(Duration::from_secs(submission.delay_seconds)).await;
        }

        let (outcome, completion) = if fail_at == Some(submission.index) {
            (RunnerOutcome::FailedPermanent, Completion::permanent())
        } else {
            (
                RunnerOutcome::Succeeded,
                Completion::succeeded_with(json!({ "job": submission.job_name })),
            )
        };
        progress.bale_done(submission.index, &submission.job_name, outcome);

        engine
            .handle_completion(&submission.chain_id, submission.index, completion)
            .await?;

        // Em modo manual o próximo bale espera por um trigger explícito.
        if manual {
            engine.dispatch_next(chain_id).await?;
        }
    }

    Ok(engine.store().load_chain(chain_id).await?)
}

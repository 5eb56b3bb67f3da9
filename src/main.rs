use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use scribe_rs::adk::model::Model;
use scribe_rs::scribe::agent::{AgentPort, DirectoryContextProvider, LlmEvaluator};
use scribe_rs::scribe::config::ScribeConfig;
use scribe_rs::scribe::runner::{CliObserver, Engine};
use scribe_rs::scribe::workflow::loader::WorkflowLoader;
use scribe_rs::scribe::workflow::types::WorkflowDefinition;

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a workflow and print every node's output
    Run {
        /// Path to the workflow file (YAML, or JSON with a .json extension)
        #[arg(short, long)]
        file: PathBuf,

        /// Path to the config file (defaults to ./scribe.yaml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print generated text to stdout as it streams
        #[arg(long)]
        stream: bool,

        /// Enable context retrieval and output evaluation
        #[arg(long)]
        agents: bool,

        /// Ask on stdin when an output is flagged for human review
        #[arg(long)]
        interactive: bool,

        /// Write outputs as JSON to this file instead of printing them
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a workflow and print its execution order
    Check {
        /// Path to the workflow file
        #[arg(short, long)]
        file: PathBuf,
    },
}

/// Write each node's output in workflow order
fn print_outputs(
    out: &mut impl Write,
    workflow: &WorkflowDefinition,
    outputs: &HashMap<String, String>,
) -> io::Result<()> {
    for node in workflow.nodes.iter() {
        if let Some(text) = outputs.get(&node.id) {
            writeln!(out, "\n=== {} ===\n{}", node.name, text)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let loader = WorkflowLoader::new();

    match args.command {
        Commands::Run {
            file,
            config,
            stream,
            agents,
            interactive,
            output,
        } => {
            let config = ScribeConfig::load(config.as_deref())?;
            let workflow = loader.load_workflow(&file)?;

            log::info!("Using model {} at {}", config.user_llm.model, config.user_llm.base_url);
            let model: Arc<dyn Model> = Arc::new(config.user_llm.build_model()?);

            let mut engine = Engine::new(model, config.engine_config());
            if agents {
                let mut port = AgentPort::none();
                if let Some(dir) = &config.context.dir {
                    log::info!("Context retrieval from {}", dir.display());
                    port = port.with_context(Arc::new(DirectoryContextProvider::new(
                        dir.clone(),
                        config.context.max_chars,
                    )));
                }
                let judge: Arc<dyn Model> = Arc::new(config.agent_llm.build_model()?);
                port = port.with_evaluator(Arc::new(LlmEvaluator::new(judge)));
                engine = engine.with_agents(port);
            }

            let observer = CliObserver::new(stream, interactive);
            eprintln!("Running workflow: {}", workflow.name);
            let outputs = engine.run(&workflow, &observer).await?;

            match output {
                Some(path) => {
                    let json = serde_json::to_string_pretty(&outputs)?;
                    std::fs::write(&path, json)
                        .with_context(|| format!("writing outputs to {}", path.display()))?;
                    eprintln!("Wrote {} outputs to {}", outputs.len(), path.display());
                }
                // Streamed text is already on stdout
                None if stream => {}
                None => print_outputs(&mut io::stdout().lock(), &workflow, &outputs)?,
            }
        }
        Commands::Check { file } => {
            let workflow = loader.load_workflow(&file)?;
            let order = workflow.execution_order()?;
            println!("Workflow {} is valid ({} nodes)", workflow.name, order.len());
            for (i, id) in order.iter().enumerate() {
                let name = workflow
                    .nodes
                    .get(id)
                    .map(|n| n.name.as_str())
                    .unwrap_or_default();
                println!("{:>3}. {} ({})", i + 1, name, id);
            }
        }
    }

    Ok(())
}

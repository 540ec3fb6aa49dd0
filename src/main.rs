mod cli;

use clap::Parser;
use cli::{ClassifyArgs, Cli, Commands};
use dispatchbox::config::Config;
use dispatchbox::sources::SourceChain;
use serde_json::json;
use tracing_subscriber::EnvFilter;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            let config = Config::load_with(args.config)?;
            dispatchbox::api::run(config).await?
        }
        Commands::Classify(args) => classify(args)?,
    }

    Ok(())
}

fn classify(args: ClassifyArgs) -> Result<(), AnyError> {
    let config = Config::load_with(args.config)?;
    let chain = SourceChain::from_config(&config.sources)?;
    let namespace = &config.queues.routing_namespace;

    for pair in chain.process_queries(&args.queries, false) {
        let line = json!({
            "query": pair.query,
            "handler_type": pair.handler_type,
            "operation": pair.operation,
            "routing_key": pair.routing_key(namespace),
        });
        println!("{line}");
    }

    Ok(())
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dispatchbox")]
#[command(about = "Audio request dispatcher", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the dispatch worker and the operator HTTP endpoints
    Serve(ServeArgs),
    /// Classify queries with the configured source chain and print one JSON line per query
    Classify(ClassifyArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Configuration file, defaults to $DISPATCHBOX_CONFIG or config/dispatchbox.toml
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct ClassifyArgs {
    /// Configuration file, defaults to $DISPATCHBOX_CONFIG or config/dispatchbox.toml
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Queries to classify
    #[arg(required = true)]
    pub queries: Vec<String>,
}

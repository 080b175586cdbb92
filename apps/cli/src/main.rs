//! chaingraph CLI: build evidence-gated industry chain graphs.
//!
//! Plans the upstream/midstream/downstream tiers of a topic, resolves every
//! node against retrieved documents, and writes the verified graph as JSON.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}

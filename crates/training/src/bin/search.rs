use clap::Parser;
use training::{run_search, SearchArgs};

fn main() -> anyhow::Result<()> {
    training::logging::init();
    let args = SearchArgs::parse();
    run_search(args)?;
    Ok(())
}

use clap::Parser;
use training::{run_fine_tune, FineTuneArgs};

fn main() -> anyhow::Result<()> {
    training::logging::init();
    let args = FineTuneArgs::parse();
    run_fine_tune(args)?;
    Ok(())
}

use clap::Parser;
use keel_t8n::cli::{Options, init_tracing};

fn main() -> anyhow::Result<()> {
    let opts = Options::parse();
    init_tracing(&opts)?;
    keel_t8n::run(&opts)
}

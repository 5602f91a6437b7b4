use std::path::PathBuf;

use clap::{ArgAction, Parser as ClapParser};
use keel_common::types::Fork;
use tracing::Level;
use tracing_subscriber::{EnvFilter, filter::Directive};

pub const VERSION_STRING: &str = env!("CARGO_PKG_VERSION");

/// Name that makes an input be read from a single JSON object on stdin.
pub const STDIN: &str = "stdin";
pub const STDOUT: &str = "stdout";
pub const STDERR: &str = "stderr";

#[derive(ClapParser, Debug, Clone)]
#[command(
    name = "t8n",
    author,
    version = VERSION_STRING,
    about = "Applies a list of transactions on top of a pre-state",
    long_about = None
)]
pub struct Options {
    #[arg(long = "input.alloc", default_value = "alloc.json", value_name = "FILE")]
    pub input_alloc: String,
    #[arg(long = "input.env", default_value = "env.json", value_name = "FILE")]
    pub input_env: String,
    #[arg(
        long = "input.txs",
        default_value = "txs.json",
        value_name = "FILE",
        help = "JSON list of transactions, or a hex string holding their RLP list"
    )]
    pub input_txs: String,
    #[arg(long = "output.alloc", default_value = "alloc.json", value_name = "FILE")]
    pub output_alloc: String,
    #[arg(long = "output.result", default_value = "result.json", value_name = "FILE")]
    pub output_result: String,
    #[arg(
        long = "output.basedir",
        value_name = "DIRECTORY",
        help = "Directory where output files and traces are written"
    )]
    pub output_basedir: Option<PathBuf>,
    #[arg(long = "state.fork", default_value = "Cancun", value_name = "FORK")]
    pub fork: Fork,
    #[arg(long = "state.chainid", default_value_t = 1, value_name = "CHAIN_ID")]
    pub chain_id: u64,
    #[arg(
        long = "state.reward",
        value_name = "WEI",
        allow_negative_numbers = true,
        help = "Block reward, negative to disable. Defaults to the reward of the fork"
    )]
    pub reward: Option<i64>,
    #[arg(
        long = "trace",
        action = ArgAction::SetTrue,
        help = "Write an EIP-3155 trace to trace.jsonl in the output directory"
    )]
    pub trace: bool,
    #[arg(long = "log.level", default_value_t = Level::INFO, value_name = "LOG_LEVEL")]
    pub log_level: Level,
}

impl Options {
    /// Where an output file named `name` goes.
    pub fn output_path(&self, name: &str) -> PathBuf {
        match &self.output_basedir {
            Some(basedir) => basedir.join(name),
            None => PathBuf::from(name),
        }
    }
}

/// Logs go to stderr so stdout stays free for the outputs.
pub fn init_tracing(opts: &Options) -> anyhow::Result<()> {
    let log_filter = EnvFilter::builder()
        .with_default_directive(Directive::from(opts.log_level))
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to set up logging: {err}"))
}

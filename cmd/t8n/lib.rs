//! State transition tool: applies a list of transactions on top of a
//! pre-state alloc and reports the post state with the block roots.

pub mod cli;
pub mod input;
pub mod output;

use std::{
    collections::BTreeMap,
    fs::File,
    io::{self, BufReader, BufWriter, Write},
    path::Path,
};

use anyhow::Context;
use ethereum_types::Address;
use keel_blockchain::apply_body_skipping_invalid;
use keel_common::types::GenesisAccount;
use keel_crypto::NativeCrypto;
use keel_storage::{InMemoryBackend, WorldState};
use keel_vm::{JsonTracer, NoopTracer, Tracer};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use cli::{Options, STDERR, STDIN, STDOUT};
use input::{EnvInput, parse_transactions};
use output::ExecutionResultOutput;

pub const TRACE_FILE: &str = "trace.jsonl";

/// Inputs named `stdin` are fields of one JSON object read from stdin.
#[derive(Default)]
struct InputReader {
    stdin: Option<Map<String, Value>>,
}

impl InputReader {
    fn read(&mut self, path: &str, field: &str) -> anyhow::Result<Value> {
        if path != STDIN {
            let file = File::open(path).with_context(|| format!("failed to open {path}"))?;
            return serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("failed to parse {path}"));
        }
        if self.stdin.is_none() {
            let stdin: Map<String, Value> = serde_json::from_reader(io::stdin().lock())
                .context("failed to parse the input read from stdin")?;
            self.stdin = Some(stdin);
        }
        Ok(self
            .stdin
            .as_mut()
            .and_then(|stdin| stdin.remove(field))
            .unwrap_or(Value::Null))
    }
}

/// Outputs named `stdout` or `stderr` are gathered into one JSON object per stream.
#[derive(Default)]
struct OutputWriter {
    stdout: Map<String, Value>,
    stderr: Map<String, Value>,
}

impl OutputWriter {
    fn write(
        &mut self,
        opts: &Options,
        name: &str,
        field: &str,
        value: &impl Serialize,
    ) -> anyhow::Result<()> {
        match name {
            STDOUT => {
                self.stdout.insert(field.to_string(), serde_json::to_value(value)?);
            }
            STDERR => {
                self.stderr.insert(field.to_string(), serde_json::to_value(value)?);
            }
            _ => {
                let path = opts.output_path(name);
                write_json(&path, value)?;
                info!("Wrote {field} to {}", path.display());
            }
        }
        Ok(())
    }

    fn finish(self) -> anyhow::Result<()> {
        if !self.stdout.is_empty() {
            let mut stdout = io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, &self.stdout)?;
            writeln!(stdout)?;
        }
        if !self.stderr.is_empty() {
            let mut stderr = io::stderr().lock();
            serde_json::to_writer_pretty(&mut stderr, &self.stderr)?;
            writeln!(stderr)?;
        }
        Ok(())
    }
}

fn write_json(path: &Path, value: &impl Serialize) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

pub fn run(opts: &Options) -> anyhow::Result<()> {
    let mut reader = InputReader::default();
    let alloc: BTreeMap<Address, GenesisAccount> =
        serde_json::from_value(reader.read(&opts.input_alloc, "alloc")?)
            .context("invalid alloc")?;
    let env: EnvInput =
        serde_json::from_value(reader.read(&opts.input_env, "env")?).context("invalid env")?;
    let transactions = parse_transactions(reader.read(&opts.input_txs, "txs")?, opts.chain_id)?;

    if let Some(basedir) = &opts.output_basedir {
        std::fs::create_dir_all(basedir)
            .with_context(|| format!("failed to create {}", basedir.display()))?;
    }

    let block_env = env.block_env(opts.fork, opts.chain_id, opts.reward)?;
    let ommers = env.ommers();
    let mut state = WorldState::new(Box::new(InMemoryBackend::new()));
    state.load_alloc(&alloc)?;
    info!(
        fork = %opts.fork,
        accounts = alloc.len(),
        transactions = transactions.len(),
        "Applying transactions"
    );

    let mut json_tracer;
    let mut noop_tracer = NoopTracer;
    let tracer: &mut dyn Tracer = if opts.trace {
        let path = opts.output_path(TRACE_FILE);
        let file = File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        json_tracer = JsonTracer::new(BufWriter::new(file));
        &mut json_tracer
    } else {
        &mut noop_tracer
    };

    let (result, rejected) = apply_body_skipping_invalid(
        &mut state,
        &block_env,
        &transactions,
        &ommers,
        &NativeCrypto,
        tracer,
    )?;
    for rejected in &rejected {
        warn!(index = rejected.index, "Rejected transaction: {}", rejected.error);
    }

    let state_root = state.state_root()?;
    let post_alloc = state.dump()?;
    let result = ExecutionResultOutput::new(state_root, &block_env, result, &rejected);

    let mut writer = OutputWriter::default();
    writer.write(opts, &opts.output_alloc, "alloc", &post_alloc)?;
    writer.write(opts, &opts.output_result, "result", &result)?;
    writer.finish()
}

use std::{fs, path::Path};

use clap::Parser;
use keel_t8n::{TRACE_FILE, cli::Options, run};
use serde_json::{Value, json};

const SECRET_KEY: &str = "0x45a915e4d060149eb4365960e6a7a45f334393093061116b197e3240065ff2d8";
const SENDER: &str = "0xa94f5374fce5edbc8e2a8697c15331677e6ebf0b";
const RECIPIENT: &str = "0x0000000000000000000000000000000000000022";
const COINBASE: &str = "0x2adc25665018aa1fe0e6bc666dac8fc2697ff9ba";

fn write(dir: &Path, name: &str, value: &Value) -> String {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_vec(value).unwrap()).unwrap();
    path.display().to_string()
}

fn read(dir: &Path, name: &str) -> Value {
    serde_json::from_slice(&fs::read(dir.join(name)).unwrap()).unwrap()
}

fn transfer(nonce: u64) -> Value {
    json!({
        "nonce": format!("{nonce:#x}"),
        "gasPrice": "0x1",
        "gas": "0x5208",
        "to": RECIPIENT,
        "value": "0x1",
        "input": "0x",
        "secretKey": SECRET_KEY,
    })
}

fn istanbul_env() -> Value {
    json!({
        "currentCoinbase": COINBASE,
        "currentGasLimit": "0x989680",
        "currentNumber": "0x1",
        "currentTimestamp": "0x3e8",
        "currentDifficulty": "0x20000",
    })
}

fn funded_sender() -> serde_json::Map<String, Value> {
    let mut alloc = serde_json::Map::new();
    alloc.insert(SENDER.into(), json!({ "balance": "0x186a0", "nonce": "0x0" }));
    alloc
}

fn run_t8n(dir: &Path, txs: Value, extra_args: &[&str]) {
    run_fork(dir, "Istanbul", funded_sender(), istanbul_env(), txs, extra_args);
}

fn run_fork(
    dir: &Path,
    fork: &str,
    alloc: serde_json::Map<String, Value>,
    env: Value,
    txs: Value,
    extra_args: &[&str],
) {
    let alloc = write(dir, "alloc.json", &Value::Object(alloc));
    let env = write(dir, "env.json", &env);
    let txs = write(dir, "txs.json", &txs);
    let basedir = dir.join("out").display().to_string();

    let mut args = vec![
        "t8n",
        "--input.alloc",
        &alloc,
        "--input.env",
        &env,
        "--input.txs",
        &txs,
        "--output.basedir",
        &basedir,
        "--state.fork",
        fork,
        "--state.reward",
        "-1",
    ];
    args.extend_from_slice(extra_args);
    run(&Options::parse_from(args)).unwrap();
}

#[test]
fn applies_a_transfer() {
    let dir = tempfile::tempdir().unwrap();
    run_t8n(dir.path(), json!([transfer(0)]), &[]);
    let out = dir.path().join("out");

    let result = read(&out, "result.json");
    assert_eq!(result["gasUsed"], "0x5208");
    assert_eq!(result["receipts"].as_array().unwrap().len(), 1);
    assert_eq!(result["receipts"][0]["status"], "0x1");
    assert!(result["rejected"].as_array().unwrap().is_empty());

    let alloc = read(&out, "alloc.json");
    assert_eq!(alloc[SENDER]["nonce"], "0x1");
    assert_eq!(alloc[RECIPIENT]["balance"], "0x1");
    assert_eq!(alloc[COINBASE]["balance"], "0x5208");
}

#[test]
fn reports_rejected_transactions() {
    let dir = tempfile::tempdir().unwrap();
    run_t8n(dir.path(), json!([transfer(3), transfer(0)]), &[]);

    let result = read(&dir.path().join("out"), "result.json");
    assert_eq!(result["rejected"][0]["index"], 0);
    assert_eq!(result["receipts"].as_array().unwrap().len(), 1);
    assert_eq!(result["gasUsed"], "0x5208");
}

#[test]
fn writes_a_trace() {
    let dir = tempfile::tempdir().unwrap();
    run_t8n(dir.path(), json!([transfer(0)]), &["--trace"]);

    let trace = fs::read_to_string(dir.path().join("out").join(TRACE_FILE)).unwrap();
    let summary: Value = serde_json::from_str(trace.lines().last().unwrap()).unwrap();
    assert_eq!(summary["gasUsed"], "0x5208");
}

#[test]
fn prague_blocks_report_their_requests() {
    let dir = tempfile::tempdir().unwrap();
    let mut alloc = funded_sender();
    // both request queues are empty and return nothing
    for predeploy in [
        "0x00000961ef480eb55e80d19ad83579a64c007002",
        "0x0000bbddc7ce488642fb579f8b00f3a590007251",
    ] {
        alloc.insert(predeploy.into(), json!({ "balance": "0x0", "code": "0x00", "nonce": "0x1" }));
    }
    let env = json!({
        "currentCoinbase": COINBASE,
        "currentGasLimit": "0x989680",
        "currentNumber": "0x1",
        "currentTimestamp": "0x3e8",
        "currentRandom": "0x0000000000000000000000000000000000000000000000000000000000000000",
        "currentBaseFee": "0x1",
        "currentExcessBlobGas": "0x0",
        "parentHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
        "withdrawals": [],
    });
    run_fork(dir.path(), "Prague", alloc, env, json!([transfer(0)]), &[]);

    let result = read(&dir.path().join("out"), "result.json");
    assert_eq!(result["receipts"][0]["status"], "0x1");
    assert_eq!(
        result["requestsHash"],
        "0xe3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
    assert!(result["requests"].as_array().unwrap().is_empty());
}

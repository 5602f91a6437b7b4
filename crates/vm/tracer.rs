//! Execution tracing hooks.
//!
//! The interpreter reports every step, gas charge and precompile run to a
//! [`Tracer`]. Tracers only observe: they never change results or gas.

use std::io::Write;

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use serde::Serialize;

use crate::{errors::VMError, opcodes::Opcode};

/// Interpreter state right before an opcode runs.
#[derive(Debug, Clone, Copy)]
pub struct Step<'a> {
    pub pc: usize,
    pub opcode: u8,
    /// Gas left before the opcode is charged.
    pub gas: u64,
    /// Zero for the top level frame.
    pub depth: usize,
    pub stack: &'a [U256],
    pub memory_size: usize,
    pub refund: i64,
}

/// Receives execution events. Every method does nothing by default.
pub trait Tracer {
    fn transaction_start(&mut self, _index: usize, _hash: H256) {}

    fn transaction_end(&mut self, _gas_used: u64, _output: &Bytes, _error: Option<&VMError>) {}

    fn op_start(&mut self, _step: &Step<'_>) {}

    /// Gas charged by the last opcode and the refund counter after it.
    fn gas_and_refund(&mut self, _gas_cost: u64, _refund: i64) {}

    fn op_end(&mut self) {}

    fn op_exception(&mut self, _error: &VMError) {}

    fn precompile_start(&mut self, _address: Address, _gas: u64, _input: &Bytes) {}

    fn precompile_end(&mut self, _gas_used: u64, _output: &Bytes, _success: bool) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StepLine {
    pc: usize,
    op: u8,
    gas: String,
    gas_cost: String,
    mem_size: usize,
    stack: Vec<String>,
    depth: usize,
    refund: i64,
    op_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryLine {
    output: String,
    gas_used: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Writes one EIP-3155 JSON object per executed opcode, followed by a summary
/// line per transaction.
///
/// A step is only written once its gas cost is known, at the end of the opcode.
#[derive(Debug)]
pub struct JsonTracer<W: Write> {
    writer: W,
    pending: Option<StepLine>,
}

impl<W: Write> JsonTracer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            pending: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line(&mut self, line: &impl Serialize) {
        let result = serde_json::to_writer(&mut self.writer, line)
            .map_err(std::io::Error::from)
            .and_then(|()| self.writer.write_all(b"\n"));
        if let Err(error) = result {
            tracing::warn!("Failed to write trace line: {error}");
        }
    }

    fn flush_pending(&mut self) {
        if let Some(line) = self.pending.take() {
            self.write_line(&line);
        }
    }
}

impl<W: Write> Tracer for JsonTracer<W> {
    fn op_start(&mut self, step: &Step<'_>) {
        self.flush_pending();
        self.pending = Some(StepLine {
            pc: step.pc,
            op: step.opcode,
            gas: format!("{:#x}", step.gas),
            gas_cost: "0x0".to_string(),
            mem_size: step.memory_size,
            stack: step.stack.iter().map(|value| format!("{value:#x}")).collect(),
            depth: step.depth.saturating_add(1),
            refund: step.refund,
            op_name: Opcode::name(step.opcode),
            error: None,
        });
    }

    fn gas_and_refund(&mut self, gas_cost: u64, refund: i64) {
        if let Some(line) = self.pending.as_mut() {
            line.gas_cost = format!("{gas_cost:#x}");
            line.refund = refund;
        }
    }

    fn op_end(&mut self) {
        self.flush_pending();
    }

    fn op_exception(&mut self, error: &VMError) {
        if let Some(line) = self.pending.as_mut() {
            line.error = Some(error.to_string());
        }
        self.flush_pending();
    }

    fn transaction_end(&mut self, gas_used: u64, output: &Bytes, error: Option<&VMError>) {
        self.flush_pending();
        let summary = SummaryLine {
            output: hex::encode(output),
            gas_used: format!("{gas_used:#x}"),
            error: error.map(ToString::to_string),
        };
        self.write_line(&summary);
        if let Err(error) = self.writer.flush() {
            tracing::warn!("Failed to flush trace: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExceptionalHalt;

    #[test]
    fn json_lines() {
        let mut tracer = JsonTracer::new(Vec::new());
        let stack = [U256::from(2)];
        tracer.op_start(&Step {
            pc: 2,
            opcode: 0x01,
            gas: 97,
            depth: 0,
            stack: &stack,
            memory_size: 0,
            refund: 0,
        });
        tracer.gas_and_refund(3, 0);
        tracer.op_end();
        tracer.op_start(&Step {
            pc: 3,
            opcode: 0xfe,
            gas: 94,
            depth: 0,
            stack: &[],
            memory_size: 0,
            refund: 0,
        });
        tracer.op_exception(&ExceptionalHalt::InvalidOpcode.into());
        tracer.transaction_end(100, &Bytes::new(), None);

        let output = String::from_utf8(tracer.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["opName"], "ADD");
        assert_eq!(lines[0]["gasCost"], "0x3");
        assert_eq!(lines[0]["gas"], "0x61");
        assert_eq!(lines[0]["stack"][0], "0x2");
        assert_eq!(lines[0]["depth"], 1);
        assert_eq!(lines[1]["opName"], "INVALID");
        assert!(lines[1]["error"].is_string());
        assert_eq!(lines[2]["gasUsed"], "0x64");
    }
}

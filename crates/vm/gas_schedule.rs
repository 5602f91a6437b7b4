//! Fork dependent gas prices.
//!
//! Costs that never changed live as constants in [`crate::gas_cost`]. Everything
//! that was repriced by a hard fork is read from the [`GasSchedule`] selected for
//! the active fork.
//!
//! - **Tangerine Whistle (EIP-150)**: IO heavy operations repriced.
//! - **Spurious Dragon (EIP-160)**: EXP byte cost raised.
//! - **Istanbul (EIP-1884, EIP-2028)**: SLOAD, BALANCE, EXTCODEHASH repriced, cheaper calldata.
//! - **Berlin (EIP-2929)**: account and slot access priced by warm/cold state.
//! - **London (EIP-3529)**: smaller refunds, no SELFDESTRUCT refund.
//! - **Prague (EIP-7623, EIP-7702)**: calldata floor price, authorization cost.

use keel_common::types::Fork;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasSchedule {
    /// SLOAD before Berlin, and the cost of a dirty SSTORE under net metering.
    pub sload: u64,
    pub sstore_set: u64,
    pub sstore_reset: u64,
    pub sstore_clears_refund: u64,

    /// Base price of account reading operations before Berlin.
    pub balance: u64,
    pub extcodesize: u64,
    pub extcodecopy_base: u64,
    pub extcodehash: u64,
    pub call: u64,

    pub selfdestruct: u64,
    pub selfdestruct_new_account: u64,
    pub selfdestruct_refund: u64,
    pub call_new_account: u64,

    pub exp_byte: u64,

    pub tx_base: u64,
    pub tx_create: u64,
    pub tx_data_zero: u64,
    pub tx_data_nonzero: u64,
    /// Price of a calldata token under the floor rule, zero while there is no floor.
    pub tx_data_floor_token: u64,
    /// Intrinsic cost of each set code authorization.
    pub tx_authorization: u64,

    /// Divisor capping the refund to a share of the gas used.
    pub refund_quotient: u64,

    pub cold_sload: u64,
    pub cold_account_access: u64,
    pub warm_access: u64,
}

pub static FRONTIER: GasSchedule = GasSchedule {
    sload: 50,
    sstore_set: 20000,
    sstore_reset: 5000,
    sstore_clears_refund: 15000,
    balance: 20,
    extcodesize: 20,
    extcodecopy_base: 20,
    extcodehash: 0,
    call: 40,
    selfdestruct: 0,
    selfdestruct_new_account: 0,
    selfdestruct_refund: 24000,
    call_new_account: 25000,
    exp_byte: 10,
    tx_base: 21000,
    tx_create: 0,
    tx_data_zero: 4,
    tx_data_nonzero: 68,
    tx_data_floor_token: 0,
    tx_authorization: 0,
    refund_quotient: 2,
    cold_sload: 0,
    cold_account_access: 0,
    warm_access: 0,
};

pub static HOMESTEAD: GasSchedule = GasSchedule {
    tx_create: 32000,
    ..FRONTIER
};

pub static TANGERINE_WHISTLE: GasSchedule = GasSchedule {
    sload: 200,
    balance: 400,
    extcodesize: 700,
    extcodecopy_base: 700,
    call: 700,
    selfdestruct: 5000,
    selfdestruct_new_account: 25000,
    ..HOMESTEAD
};

/// Also in force for Byzantium, Constantinople and Petersburg.
pub static SPURIOUS_DRAGON: GasSchedule = GasSchedule {
    exp_byte: 50,
    extcodehash: 400,
    ..TANGERINE_WHISTLE
};

pub static ISTANBUL: GasSchedule = GasSchedule {
    sload: 800,
    balance: 700,
    extcodehash: 700,
    tx_data_nonzero: 16,
    ..SPURIOUS_DRAGON
};

pub static BERLIN: GasSchedule = GasSchedule {
    sload: 100,
    sstore_reset: 2900,
    balance: 0,
    extcodesize: 0,
    extcodecopy_base: 0,
    extcodehash: 0,
    call: 0,
    cold_sload: 2100,
    cold_account_access: 2600,
    warm_access: 100,
    ..ISTANBUL
};

/// Also in force for Paris, Shanghai and Cancun.
pub static LONDON: GasSchedule = GasSchedule {
    sstore_clears_refund: 4800,
    selfdestruct_refund: 0,
    refund_quotient: 5,
    ..BERLIN
};

/// Also in force for Osaka.
pub static PRAGUE: GasSchedule = GasSchedule {
    tx_data_floor_token: 10,
    tx_authorization: 25000,
    ..LONDON
};

impl GasSchedule {
    pub fn for_fork(fork: Fork) -> &'static GasSchedule {
        match fork {
            Fork::Frontier => &FRONTIER,
            Fork::Homestead => &HOMESTEAD,
            Fork::TangerineWhistle => &TANGERINE_WHISTLE,
            Fork::SpuriousDragon
            | Fork::Byzantium
            | Fork::Constantinople
            | Fork::Petersburg => &SPURIOUS_DRAGON,
            Fork::Istanbul => &ISTANBUL,
            Fork::Berlin => &BERLIN,
            Fork::London | Fork::Paris | Fork::Shanghai | Fork::Cancun => &LONDON,
            Fork::Prague | Fork::Osaka => &PRAGUE,
        }
    }

    /// Cost of touching an account, warm or cold from Berlin on, `base` before.
    pub fn account_access_cost(&self, base: u64, is_cold: bool, eip2929: bool) -> u64 {
        match (eip2929, is_cold) {
            (false, _) => base,
            (true, true) => self.cold_account_access,
            (true, false) => self.warm_access,
        }
    }

    pub fn sload_cost(&self, is_cold: bool, eip2929: bool) -> u64 {
        match (eip2929, is_cold) {
            (false, _) => self.sload,
            (true, true) => self.cold_sload,
            (true, false) => self.warm_access,
        }
    }
}

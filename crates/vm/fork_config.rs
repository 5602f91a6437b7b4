//! Everything that varies between forks, resolved once per fork.

use std::fmt;

use ethereum_types::Address;
use keel_common::types::Fork;

use crate::{
    constants::P256_VERIFY_ADDRESS,
    gas_schedule::GasSchedule,
    opcodes::{OpcodeTable, build_opcode_table},
};

/// Switches for the behavior changing EIPs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EipToggles {
    /// Homestead: failed code deposits are errors, DELEGATECALL.
    pub homestead: bool,
    /// All but one 64th of the gas is forwarded to sub calls.
    pub eip150: bool,
    /// Replay protected signatures.
    pub eip155: bool,
    /// Touched empty accounts are removed; CREATE bumps the new account's nonce.
    pub eip158: bool,
    pub eip170: bool,
    /// Net gas metering for SSTORE, Constantinople only.
    pub eip1283: bool,
    /// Net gas metering with the SSTORE stipend check.
    pub eip2200: bool,
    /// Cheaper alt_bn128 precompiles.
    pub eip1108: bool,
    /// MODEXP repricing.
    pub eip2565: bool,
    pub eip2929: bool,
    pub eip2930: bool,
    pub eip1559: bool,
    pub eip3198: bool,
    pub eip3529: bool,
    pub eip3541: bool,
    pub eip3651: bool,
    pub eip3855: bool,
    pub eip3860: bool,
    pub eip1153: bool,
    pub eip4844: bool,
    pub eip4788: bool,
    pub eip5656: bool,
    pub eip6780: bool,
    /// BLS12-381 precompiles.
    pub eip2537: bool,
    /// Block hashes kept in a system contract.
    pub eip2935: bool,
    /// Withdrawal and consolidation requests read from system contracts.
    pub eip7002: bool,
    pub eip7251: bool,
    /// Deposits parsed from receipts.
    pub eip6110: bool,
    /// Calldata floor price.
    pub eip7623: bool,
    pub eip7685: bool,
    /// Larger blob target and limit.
    pub eip7691: bool,
    /// Set code transactions.
    pub eip7702: bool,
    /// Upper bound on MODEXP input lengths.
    pub eip7823: bool,
    /// Transaction gas limit cap.
    pub eip7825: bool,
    /// MODEXP repricing.
    pub eip7883: bool,
    /// Blob limit per transaction.
    pub eip7594: bool,
    /// Blob base fee bounded by the execution base fee.
    pub eip7918: bool,
    /// CLZ opcode.
    pub eip7939: bool,
    /// secp256r1 signature precompile.
    pub eip7951: bool,
}

impl EipToggles {
    pub fn for_fork(fork: Fork) -> Self {
        Self {
            homestead: fork >= Fork::Homestead,
            eip150: fork >= Fork::TangerineWhistle,
            eip155: fork >= Fork::SpuriousDragon,
            eip158: fork >= Fork::SpuriousDragon,
            eip170: fork >= Fork::SpuriousDragon,
            eip1283: fork == Fork::Constantinople,
            eip2200: fork >= Fork::Istanbul,
            eip1108: fork >= Fork::Istanbul,
            eip2565: fork >= Fork::Berlin,
            eip2929: fork >= Fork::Berlin,
            eip2930: fork >= Fork::Berlin,
            eip1559: fork >= Fork::London,
            eip3198: fork >= Fork::London,
            eip3529: fork >= Fork::London,
            eip3541: fork >= Fork::London,
            eip3651: fork >= Fork::Shanghai,
            eip3855: fork >= Fork::Shanghai,
            eip3860: fork >= Fork::Shanghai,
            eip1153: fork >= Fork::Cancun,
            eip4844: fork >= Fork::Cancun,
            eip4788: fork >= Fork::Cancun,
            eip5656: fork >= Fork::Cancun,
            eip6780: fork >= Fork::Cancun,
            eip2537: fork >= Fork::Prague,
            eip2935: fork >= Fork::Prague,
            eip7002: fork >= Fork::Prague,
            eip7251: fork >= Fork::Prague,
            eip6110: fork >= Fork::Prague,
            eip7623: fork >= Fork::Prague,
            eip7685: fork >= Fork::Prague,
            eip7691: fork >= Fork::Prague,
            eip7702: fork >= Fork::Prague,
            eip7823: fork >= Fork::Osaka,
            eip7825: fork >= Fork::Osaka,
            eip7883: fork >= Fork::Osaka,
            eip7594: fork >= Fork::Osaka,
            eip7918: fork >= Fork::Osaka,
            eip7939: fork >= Fork::Osaka,
            eip7951: fork >= Fork::Osaka,
        }
    }

    /// SSTORE is priced against the value at the start of the transaction.
    pub fn net_gas_metering(&self) -> bool {
        self.eip1283 || self.eip2200
    }
}

/// Precompiled contracts live at the addresses `0x01..=count`, plus
/// P256VERIFY at `0x100` once it exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrecompileSet {
    pub count: u64,
    pub p256_verify: bool,
}

impl PrecompileSet {
    pub fn for_fork(fork: Fork) -> Self {
        let count = match fork {
            Fork::Frontier
            | Fork::Homestead
            | Fork::TangerineWhistle
            | Fork::SpuriousDragon => 4,
            Fork::Byzantium | Fork::Constantinople | Fork::Petersburg => 8,
            Fork::Istanbul | Fork::Berlin | Fork::London | Fork::Paris | Fork::Shanghai => 9,
            Fork::Cancun => 10,
            Fork::Prague | Fork::Osaka => 17,
        };
        Self {
            count,
            p256_verify: fork >= Fork::Osaka,
        }
    }

    pub fn contains(&self, address: &Address) -> bool {
        let bytes = address.as_bytes();
        bytes[..12].iter().all(|byte| *byte == 0) && {
            let index = address.to_low_u64_be();
            (index >= 1 && index <= self.count)
                || (self.p256_verify && index == P256_VERIFY_ADDRESS)
        }
    }

    pub fn addresses(&self) -> impl Iterator<Item = Address> + use<> {
        let p256_verify = self.p256_verify.then_some(P256_VERIFY_ADDRESS);
        (1..=self.count)
            .chain(p256_verify)
            .map(Address::from_low_u64_be)
    }
}

/// Fork parameters handed to the interpreter.
#[derive(Clone)]
pub struct ForkConfig {
    pub fork: Fork,
    pub gas: &'static GasSchedule,
    pub opcodes: OpcodeTable,
    pub precompiles: PrecompileSet,
    pub eips: EipToggles,
}

impl ForkConfig {
    pub fn new(fork: Fork) -> Self {
        Self {
            fork,
            gas: GasSchedule::for_fork(fork),
            opcodes: build_opcode_table(fork),
            precompiles: PrecompileSet::for_fork(fork),
            eips: EipToggles::for_fork(fork),
        }
    }
}

impl fmt::Debug for ForkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForkConfig")
            .field("fork", &self.fork)
            .field("gas", self.gas)
            .field("precompiles", &self.precompiles)
            .field("eips", &self.eips)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precompile_sets_grow() {
        let frontier = PrecompileSet::for_fork(Fork::Frontier);
        assert!(frontier.contains(&Address::from_low_u64_be(4)));
        assert!(!frontier.contains(&Address::from_low_u64_be(5)));
        assert!(!frontier.contains(&Address::zero()));
        let cancun = PrecompileSet::for_fork(Fork::Cancun);
        assert_eq!(cancun.addresses().count(), 10);
        assert!(cancun.contains(&Address::from_low_u64_be(0x0a)));
        let mut far = [0u8; 20];
        far[0] = 1;
        far[19] = 1;
        assert!(!cancun.contains(&Address::from(far)));

        let prague = PrecompileSet::for_fork(Fork::Prague);
        assert!(prague.contains(&Address::from_low_u64_be(0x11)));
        assert!(!prague.contains(&Address::from_low_u64_be(0x12)));
        assert!(!prague.contains(&Address::from_low_u64_be(0x100)));

        let osaka = PrecompileSet::for_fork(Fork::Osaka);
        assert!(osaka.contains(&Address::from_low_u64_be(0x100)));
        assert!(!osaka.contains(&Address::from_low_u64_be(0x12)));
        assert_eq!(osaka.addresses().count(), 18);
        assert_eq!(osaka.addresses().last(), Some(Address::from_low_u64_be(0x100)));
    }

    #[test]
    fn toggles_follow_forks() {
        let constantinople = EipToggles::for_fork(Fork::Constantinople);
        assert!(constantinople.net_gas_metering());
        assert!(!EipToggles::for_fork(Fork::Petersburg).net_gas_metering());
        assert!(EipToggles::for_fork(Fork::Berlin).net_gas_metering());
        assert!(!EipToggles::for_fork(Fork::Frontier).homestead);
        let cancun = EipToggles::for_fork(Fork::Cancun);
        assert!(cancun.eip6780 && cancun.eip3860 && cancun.eip150);
        assert!(!cancun.eip7702);

        let prague = EipToggles::for_fork(Fork::Prague);
        assert!(prague.eip7702 && prague.eip7623 && prague.eip2935 && prague.eip2537);
        assert!(!prague.eip7883 && !prague.eip7939);

        let osaka = EipToggles::for_fork(Fork::Osaka);
        assert!(osaka.eip7702 && osaka.eip7823 && osaka.eip7825 && osaka.eip7951);
    }
}

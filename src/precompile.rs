//! The precompile *dispatch* surface (§6.3): a per-hardfork address table
//! plus the pure-function interface precompile implementations satisfy.
//! Internals (ECRECOVER, SHA256, MODEXP, BLS12-381, KZG, ...) are
//! explicitly out of scope (§1) — this module ships the table and the
//! trait, not a single cryptographic implementation.

use bytes::Bytes;
use ethereum_types::Address;

use crate::environment::Hardfork;

/// Result of running a precompile: §6.3's `{output, gas_used, success}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecompileOutput {
    pub output: Bytes,
    pub gas_used: u64,
    pub success: bool,
}

/// A pure `(input, gas_limit) -> output` function, per §6.3. Implementations
/// are supplied by the embedder; this crate only maps addresses to them.
pub trait Precompile: Send + Sync {
    fn run(&self, input: &[u8], gas_limit: u64) -> PrecompileOutput;
}

/// Stand-in used where no concrete cryptographic implementation has been
/// registered (e.g. integration tests that never exercise precompiles).
/// Reports failure rather than panicking, so a host that forgets to wire
/// one up gets a legible VM-level revert instead of a crash.
pub struct UnimplementedPrecompile;

impl Precompile for UnimplementedPrecompile {
    fn run(&self, _input: &[u8], _gas_limit: u64) -> PrecompileOutput {
        PrecompileOutput {
            output: Bytes::new(),
            gas_used: 0,
            success: false,
        }
    }
}

/// The reserved precompile address range active at a given hardfork, per
/// the SPEC_FULL §6 ambient-stack addendum. Addresses are data, not logic:
/// 0x01-0x04 from Frontier, 0x05-0x08 from Byzantium, 0x09 from Istanbul,
/// 0x0a from Cancun (point evaluation / KZG), 0x0b-0x11 from Prague (the
/// seven BLS12-381 operations of EIP-2537).
pub fn is_precompile_address(address: Address, fork: Hardfork) -> bool {
    precompile_index(address, fork).is_some()
}

/// Maps a precompile address to a stable small index, or `None` if `address`
/// is not a precompile at `fork`. Used by a `PrecompileRegistry` to look up
/// the concrete implementation an embedder registered.
pub fn precompile_index(address: Address, fork: Hardfork) -> Option<u8> {
    let byte = {
        let bytes = address.as_bytes();
        if bytes[..19].iter().any(|&b| b != 0) {
            return None;
        }
        bytes[19]
    };
    match byte {
        0x01..=0x04 => Some(byte),
        0x05..=0x08 if fork >= Hardfork::Byzantium => Some(byte),
        0x09 if fork >= Hardfork::Istanbul => Some(byte),
        0x0a if fork >= Hardfork::Cancun => Some(byte),
        0x0b..=0x11 if fork >= Hardfork::Prague => Some(byte),
        _ => None,
    }
}

/// All precompile addresses live at a given fork, used to pre-warm them
/// per §4.2's pre-transaction warm-up list.
pub fn all_precompile_addresses(fork: Hardfork) -> Vec<Address> {
    let max_byte: u8 = if fork >= Hardfork::Prague {
        0x11
    } else if fork >= Hardfork::Cancun {
        0x0a
    } else if fork >= Hardfork::Istanbul {
        0x09
    } else if fork >= Hardfork::Byzantium {
        0x08
    } else {
        0x04
    };
    (1..=max_byte)
        .filter(|&b| is_precompile_address(address_from_byte(b), fork))
        .map(address_from_byte)
        .collect()
}

fn address_from_byte(byte: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[19] = byte;
    Address::from(bytes)
}

/// Maps precompile addresses to implementations. An embedder registers
/// concrete crypto backends; a default registry answers every precompile
/// with `UnimplementedPrecompile`.
pub struct PrecompileRegistry {
    implementations: std::collections::HashMap<u8, Box<dyn Precompile>>,
}

impl PrecompileRegistry {
    pub fn new() -> Self {
        Self {
            implementations: std::collections::HashMap::new(),
        }
    }

    pub fn register(&mut self, index: u8, implementation: Box<dyn Precompile>) {
        self.implementations.insert(index, implementation);
    }

    pub fn dispatch(&self, address: Address, fork: Hardfork, input: &[u8], gas_limit: u64) -> Option<PrecompileOutput> {
        let index = precompile_index(address, fork)?;
        let result = match self.implementations.get(&index) {
            Some(implementation) => implementation.run(input, gas_limit),
            None => UnimplementedPrecompile.run(input, gas_limit),
        };
        Some(result)
    }
}

impl Default for PrecompileRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecrecover_is_precompile_from_frontier() {
        let ecrecover = address_from_byte(0x01);
        assert!(is_precompile_address(ecrecover, Hardfork::Frontier));
    }

    #[test]
    fn modexp_requires_byzantium() {
        let modexp = address_from_byte(0x05);
        assert!(!is_precompile_address(modexp, Hardfork::Homestead));
        assert!(is_precompile_address(modexp, Hardfork::Byzantium));
    }

    #[test]
    fn bls_requires_prague() {
        let bls_g1_add = address_from_byte(0x0b);
        assert!(!is_precompile_address(bls_g1_add, Hardfork::Cancun));
        assert!(is_precompile_address(bls_g1_add, Hardfork::Prague));
    }

    #[test]
    fn non_precompile_address_is_none() {
        let addr = Address::repeat_byte(0xab);
        assert!(!is_precompile_address(addr, Hardfork::Prague));
    }

    #[test]
    fn default_registry_reports_failure_not_panic() {
        let registry = PrecompileRegistry::new();
        let out = registry
            .dispatch(address_from_byte(0x01), Hardfork::Prague, &[], 1000)
            .unwrap();
        assert!(!out.success);
    }
}

//! Block/transaction context and the `Hardfork` configuration axis.

use ethereum_types::{Address, U256};
use serde::{Deserialize, Serialize};

/// Every consensus hardfork the engine gates behavior on, Frontier through
/// Prague. Ordered chronologically so fork-gated code can write
/// `fork >= Hardfork::Berlin` instead of maintaining a parallel boolean per
/// feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Hardfork {
    Frontier,
    Homestead,
    Tangerine,
    SpuriousDragon,
    Byzantium,
    Constantinople,
    Petersburg,
    Istanbul,
    Berlin,
    London,
    Paris,
    Shanghai,
    Cancun,
    Prague,
}

impl Hardfork {
    pub const LATEST: Hardfork = Hardfork::Prague;

    pub fn is_at_least(self, other: Hardfork) -> bool {
        self >= other
    }
}

impl Default for Hardfork {
    fn default() -> Self {
        Hardfork::LATEST
    }
}

/// Chain-wide configuration the engine needs beyond the active hardfork.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub fork: Hardfork,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            fork: Hardfork::LATEST,
        }
    }
}

/// Per-block context visible to BLOCKHASH, COINBASE, TIMESTAMP, NUMBER,
/// DIFFICULTY/PREVRANDAO, GASLIMIT, BASEFEE, and BLOBBASEFEE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockContext {
    pub number: u64,
    pub timestamp: u64,
    pub coinbase: Address,
    pub gas_limit: u64,
    pub base_fee: U256,
    /// PoW difficulty pre-Paris, `prevrandao` from Paris onward (EIP-4399).
    pub difficulty_or_prevrandao: U256,
    /// EIP-4844 excess-blob-gas-derived fee, readable via BLOBBASEFEE (Cancun+).
    pub blob_base_fee: U256,
}

impl Default for BlockContext {
    fn default() -> Self {
        Self {
            number: 0,
            timestamp: 0,
            coinbase: Address::zero(),
            gas_limit: 30_000_000,
            base_fee: U256::zero(),
            difficulty_or_prevrandao: U256::zero(),
            blob_base_fee: U256::zero(),
        }
    }
}

/// One 32-byte versioned hash addressable via BLOBHASH (EIP-4844).
pub type BlobVersionedHash = ethereum_types::H256;

/// An EIP-2930 access-list entry: an address plus the storage slots to
/// pre-warm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessListEntry {
    pub address: Address,
    pub storage_keys: Vec<ethereum_types::H256>,
}

/// Top-level transaction/block context threaded through a whole execution:
/// the union of §6.1's `ExecutionRequest` fields that are not the call
/// parameters themselves.
#[derive(Debug, Clone)]
pub struct Environment {
    pub origin: Address,
    pub gas_price: U256,
    pub gas_limit: u64,
    pub block: BlockContext,
    pub config: ChainConfig,
    pub access_list: Vec<AccessListEntry>,
    pub blob_versioned_hashes: Vec<BlobVersionedHash>,
    /// EIP-7702 authorizer addresses, pre-warmed at transaction start.
    pub authorization_list_addresses: Vec<Address>,
}

impl Environment {
    pub fn fork(&self) -> Hardfork {
        self.config.fork
    }
}

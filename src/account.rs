//! Account-shaped state: balance, nonce, and code, per §3.2.

use bytes::Bytes;
use derive_more::{Deref, From};
use ethereum_types::{H256, U256};
use sha3::{Digest, Keccak256};
use std::sync::Arc;

/// Contract bytecode. Reference-counted so cloning a `CallFrame` (cheap, on
/// every nested call) never copies the underlying bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref, From)]
pub struct Code(pub Arc<Bytes>);

impl Code {
    pub fn new(bytes: Bytes) -> Self {
        Self(Arc::new(bytes))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn hash(&self) -> H256 {
        H256::from_slice(&Keccak256::digest(self.0.as_ref()))
    }
}

/// Metadata derived once from a code object and then cached by the
/// database layer (jumpdest analysis is the expensive part; see
/// `crate::utils::valid_jump_destinations`).
#[derive(Debug, Clone)]
pub struct CodeMetadata {
    pub len: usize,
    /// True if the account is a delegation designator per EIP-7702:
    /// exactly 23 bytes, `0xef 0x01 0x00 || address`.
    pub is_delegation: bool,
}

impl CodeMetadata {
    pub fn compute(code: &Code) -> Self {
        use crate::constants::{EIP7702_DELEGATED_CODE_LEN, EIP7702_DELEGATION_PREFIX};
        let bytes = code.0.as_ref();
        let is_delegation =
            bytes.len() == EIP7702_DELEGATED_CODE_LEN && bytes[..3] == EIP7702_DELEGATION_PREFIX;
        Self {
            len: bytes.len(),
            is_delegation,
        }
    }
}

/// Snapshot of an account's scalar fields, as returned by the `Database`
/// capability set (§6.2). Storage is tracked separately (keyed maps, not
/// part of this struct) since it is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountState {
    pub balance: U256,
    pub nonce: u64,
    pub code_hash: H256,
}

impl AccountState {
    /// An account is "empty" in the sense EIP-161 / the account-creation
    /// surcharge (§4.1 gas accounting) cares about: no balance, no nonce,
    /// no code.
    pub fn is_empty(&self) -> bool {
        self.balance.is_zero() && self.nonce == 0 && self.code_hash == *crate::utils::EMPTY_CODE_HASH
    }
}

impl Default for AccountState {
    fn default() -> Self {
        Self {
            balance: U256::zero(),
            nonce: 0,
            code_hash: *crate::utils::EMPTY_CODE_HASH,
        }
    }
}

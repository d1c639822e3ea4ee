//! Small conversions shared across modules: word/address/hash plumbing and
//! the jumpdest-validity bitset algorithm (§4.1).

use crate::errors::{ExceptionalHalt, InternalError, VMError};
use bitvec::{bitvec, vec::BitVec};
use ethereum_types::{Address, H256, U256};
use sha3::{Digest, Keccak256};
use std::sync::LazyLock;

/// keccak256("") — the code hash of an account with no code.
pub static EMPTY_CODE_HASH: LazyLock<H256> =
    LazyLock::new(|| H256::from_slice(&Keccak256::digest([])));

pub fn keccak256(data: &[u8]) -> H256 {
    H256::from_slice(&Keccak256::digest(data))
}

/// Converts a `U256` to a `usize`, failing (not panicking) if it does not
/// fit — the standard guard before using a stack value as an offset/size.
pub fn word_to_usize(value: U256) -> Result<usize, VMError> {
    if value.bits() > (usize::BITS as usize) {
        return Err(ExceptionalHalt::VeryLargeNumber.into());
    }
    usize::try_from(value).map_err(|_| InternalError::TypeConversion.into())
}

pub fn address_to_word(address: Address) -> U256 {
    U256::from_big_endian(address.as_bytes())
}

pub fn word_to_address(value: U256) -> Address {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    Address::from_slice(&bytes[12..])
}

/// A stack word interpreted as a storage/transient-storage slot key.
pub fn word_to_hash(value: U256) -> H256 {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    H256::from_slice(&bytes)
}

pub fn hash_to_word(value: H256) -> U256 {
    U256::from_big_endian(value.as_bytes())
}

/// CREATE address: `keccak256(rlp(sender, nonce))[12:]`.
///
/// RLP-encoding is out of this crate's scope (§1 Non-goals: "RLP / JSON
/// serialization"), but deriving a CREATE address requires *some*
/// canonical encoding of `(address, nonce)` — the minimal list-of-two RLP
/// encoding is reproduced inline rather than pulled in as a dependency,
/// since it is three lines and has no other caller.
pub fn create_address(sender: Address, nonce: u64) -> Address {
    let mut nonce_bytes = nonce.to_be_bytes().to_vec();
    while nonce_bytes.first() == Some(&0) && nonce_bytes.len() > 1 {
        nonce_bytes.remove(0);
    }
    if nonce == 0 {
        nonce_bytes = vec![];
    }
    let nonce_rlp = rlp_encode_bytes(&nonce_bytes);
    let address_rlp = rlp_encode_bytes(sender.as_bytes());
    let mut payload = address_rlp;
    payload.extend_from_slice(&nonce_rlp);
    let mut out = rlp_encode_list_header(payload.len());
    out.extend_from_slice(&payload);
    let hash = keccak256(&out);
    Address::from_slice(&hash.as_bytes()[12..])
}

/// CREATE2 address: `keccak256(0xff || sender || salt || keccak256(init_code))[12:]`.
pub fn create2_address(sender: Address, salt: U256, init_code: &[u8]) -> Address {
    let mut salt_bytes = [0u8; 32];
    salt.to_big_endian(&mut salt_bytes);
    let init_code_hash = keccak256(init_code);

    let mut buf = Vec::with_capacity(1 + 20 + 32 + 32);
    buf.push(0xff);
    buf.extend_from_slice(sender.as_bytes());
    buf.extend_from_slice(&salt_bytes);
    buf.extend_from_slice(init_code_hash.as_bytes());

    let hash = keccak256(&buf);
    Address::from_slice(&hash.as_bytes()[12..])
}

fn rlp_encode_bytes(data: &[u8]) -> Vec<u8> {
    if data.len() == 1 && data[0] < 0x80 {
        return data.to_vec();
    }
    let mut out = rlp_len_header(0x80, data.len());
    out.extend_from_slice(data);
    out
}

fn rlp_encode_list_header(payload_len: usize) -> Vec<u8> {
    rlp_len_header(0xc0, payload_len)
}

fn rlp_len_header(offset: u8, len: usize) -> Vec<u8> {
    if len < 56 {
        let len_u8 = u8::try_from(len).unwrap_or(55);
        vec![offset + len_u8]
    } else {
        let len_bytes = len.to_be_bytes();
        let trimmed: Vec<u8> = len_bytes
            .iter()
            .copied()
            .skip_while(|&b| b == 0)
            .collect();
        let trimmed_len_u8 = u8::try_from(trimmed.len()).unwrap_or(8);
        let mut out = vec![offset + 55 + trimmed_len_u8];
        out.extend_from_slice(&trimmed);
        out
    }
}

/// Builds the JUMPDEST validity bitset for a code object, per §4.1's jump
/// destination analysis algorithm: a linear scan that skips over PUSH
/// immediate data so that bytes inside a PUSHn's payload are never mistaken
/// for a JUMPDEST opcode.
pub fn valid_jump_destinations(code: &[u8]) -> BitVec {
    let mut valid = bitvec![0; code.len()];
    let mut pc = 0usize;
    while pc < code.len() {
        let opcode = code[pc];
        if opcode == 0x5b {
            valid.set(pc, true);
            pc += 1;
        } else if (0x60..=0x7f).contains(&opcode) {
            let push_bytes = usize::from(opcode - 0x5f);
            // Saturate at code length to tolerate a truncated PUSH at the
            // very end of the code object.
            pc = pc.saturating_add(1).saturating_add(push_bytes);
        } else {
            pc += 1;
        }
    }
    valid
}

pub fn is_valid_jump_destination(valid: &BitVec, pc: usize) -> bool {
    valid.get(pc).map(|bit| *bit).unwrap_or(false)
}

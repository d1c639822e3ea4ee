//! Block Information (11): BLOCKHASH, COINBASE, TIMESTAMP, NUMBER,
//! DIFFICULTY/PREVRANDAO, GASLIMIT, CHAINID, SELFBALANCE, BASEFEE,
//! BLOBHASH, BLOBBASEFEE.
//!
//! No teacher file splits this group out on its own (its "Block
//! Information" handlers live folded into a larger environment module this
//! pack didn't retrieve); every handler here follows the same flat-cost,
//! read-a-field-push-a-word shape the retrieved `environment.rs` handlers
//! already establish.

use ethereum_types::U256;

use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    utils::address_to_word,
    vm::VM,
};

impl VM {
    pub fn op_blockhash(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::BLOCKHASH)?;
        let block_number = self.current_frame_mut()?.stack.pop1()?;
        let current = self.environment.block.number;

        // Only the 256 most recent blocks are addressable; anything else
        // (including the current or a future block) resolves to zero.
        let hash = if block_number > U256::from(u64::MAX) {
            ethereum_types::H256::zero()
        } else {
            let requested = block_number.as_u64();
            if requested >= current || current.saturating_sub(requested) > 256 {
                ethereum_types::H256::zero()
            } else {
                self.db.get_block_hash(requested)
            }
        };
        self.current_frame_mut()?
            .stack
            .push(crate::utils::hash_to_word(hash))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_coinbase(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::COINBASE)?;
        let coinbase = self.environment.block.coinbase;
        self.current_frame_mut()?
            .stack
            .push(address_to_word(coinbase))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_timestamp(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::TIMESTAMP)?;
        let timestamp = self.environment.block.timestamp;
        self.current_frame_mut()?
            .stack
            .push(U256::from(timestamp))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_number(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::NUMBER)?;
        let number = self.environment.block.number;
        self.current_frame_mut()?.stack.push(U256::from(number))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    /// DIFFICULTY pre-Paris, PREVRANDAO from Paris onward (EIP-4399) — same
    /// opcode byte, same stack slot, the field is already fork-resolved by
    /// whoever built `BlockContext`.
    pub fn op_difficulty(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::DIFFICULTY)?;
        let value = self.environment.block.difficulty_or_prevrandao;
        self.current_frame_mut()?.stack.push(value)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_gaslimit(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::GASLIMIT)?;
        let gas_limit = self.environment.block.gas_limit;
        self.current_frame_mut()?
            .stack
            .push(U256::from(gas_limit))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_chainid(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::CHAINID)?;
        let chain_id = self.environment.config.chain_id;
        self.current_frame_mut()?.stack.push(U256::from(chain_id))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_selfbalance(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::SELFBALANCE)?;
        let address = self.current_frame()?.to;
        let balance = self.get_balance(address)?;
        self.current_frame_mut()?.stack.push(balance)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_basefee(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::BASEFEE)?;
        let base_fee = self.environment.block.base_fee;
        self.current_frame_mut()?.stack.push(base_fee)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_blobhash(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::BLOBHASH)?;
        let index = self.current_frame_mut()?.stack.pop1()?;
        let hash = match crate::utils::word_to_usize(index) {
            Ok(i) => self
                .environment
                .blob_versioned_hashes
                .get(i)
                .map(|h| crate::utils::hash_to_word(*h))
                .unwrap_or(U256::zero()),
            Err(_) => U256::zero(),
        };
        self.current_frame_mut()?.stack.push(hash)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_blobbasefee(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::BLOBBASEFEE)?;
        let blob_base_fee = self.environment.block.blob_base_fee;
        self.current_frame_mut()?.stack.push(blob_base_fee)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }
}

//! Logging Operations (5): LOG0-LOG4.

use ethereum_types::H256;

use crate::{
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    gas_cost,
    state::LogEntry,
    utils::word_to_hash,
    vm::VM,
};

impl VM {
    pub fn op_log<const N: usize>(&mut self) -> Result<OpcodeResult, VMError> {
        if self.current_frame()?.is_static {
            return Err(ExceptionalHalt::OpcodeNotAllowedInStaticContext.into());
        }

        let frame = self.current_frame_mut()?;
        let [offset, size] = *frame.stack.pop::<2>()?;
        let mut topics: Vec<H256> = Vec::with_capacity(N);
        for _ in 0..N {
            topics.push(word_to_hash(frame.stack.pop1()?));
        }

        let (size, offset) = super::size_offset_to_usize(size, offset)?;
        self.charge_memory_expansion(offset, size)?;
        self.charge_gas(gas_cost::LOG_STATIC)?;
        self.charge_gas(gas_cost::log_dynamic_cost(N, size)?)?;

        let data = self.current_frame_mut()?.memory.load_range(offset, size)?;
        let address = self.current_frame()?.to;
        self.state.append_log(LogEntry {
            address,
            topics,
            data,
        });

        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }
}

//! Typed bindings for the bingo contract pair.
//!
//! Every call the client makes goes through a [`FunctionSignature`] held in a
//! per-contract [`ContractAbi`] registry. Calldata is never assembled by hand.

pub use alloy_dyn_abi::DynSolValue;
pub use alloy_primitives::{
    Address,
    B256,
    Bytes,
    Selector,
    U256,
};

pub use binding::{
    EventSignature,
    FunctionSignature,
    decode,
    decode_input,
    decode_revert_reason,
    encode,
    encode_output,
    encode_revert,
};
pub use error::{
    AbiError,
    Result,
};
pub use registry::ContractAbi;

pub mod bingo_game;
pub mod binding;
pub mod cartela;
pub mod events;
pub mod value;

mod error;
mod registry;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ContractKind {
    Cartela,
    BingoGame,
}

impl ContractKind {
    pub fn abi(self) -> &'static ContractAbi {
        match self {
            ContractKind::Cartela => cartela::abi(),
            ContractKind::BingoGame => bingo_game::abi(),
        }
    }
}

impl std::fmt::Display for ContractKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.abi().name())
    }
}

/// Encoded call ready to be handed to the chain client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub contract: ContractKind,
    pub function: &'static str,
    pub data: Bytes,
    pub payable: bool,
}

impl Call {
    pub(crate) fn build(
        contract: ContractKind,
        function: &'static str,
        args: &[DynSolValue],
    ) -> Result<Self> {
        let signature = contract.abi().function(function)?;
        let data = encode(signature, args)?;
        Ok(Self {
            contract,
            function,
            data,
            payable: signature.is_payable(),
        })
    }

    pub fn signature(&self) -> Result<&'static FunctionSignature> {
        self.contract.abi().function(self.function)
    }

    pub fn decode_output(&self, data: &[u8]) -> Result<Vec<DynSolValue>> {
        decode(self.signature()?, data)
    }
}

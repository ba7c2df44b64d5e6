//! Conversions between [`DynSolValue`] and plain Rust values.

use crate::{
    AbiError,
    Result,
};
use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{
    Address,
    U256,
};

pub fn uint256(value: U256) -> DynSolValue {
    DynSolValue::Uint(value, 256)
}

/// Ids travel as `uint256` on-chain but fit in a `u64` client side.
pub fn id(value: u64) -> DynSolValue {
    uint256(U256::from(value))
}

pub fn uint8(value: u8) -> DynSolValue {
    DynSolValue::Uint(U256::from(value), 8)
}

pub fn boolean(value: bool) -> DynSolValue {
    DynSolValue::Bool(value)
}

pub fn address(value: Address) -> DynSolValue {
    DynSolValue::Address(value)
}

pub fn uint8_array(values: &[u8]) -> DynSolValue {
    DynSolValue::Array(values.iter().copied().map(uint8).collect())
}

pub fn id_array(values: &[u64]) -> DynSolValue {
    DynSolValue::Array(values.iter().copied().map(id).collect())
}

pub fn address_array(values: &[Address]) -> DynSolValue {
    DynSolValue::Array(values.iter().copied().map(address).collect())
}

pub fn as_u256(value: &DynSolValue, field: &str) -> Result<U256> {
    value
        .as_uint()
        .map(|(v, _)| v)
        .ok_or_else(|| mismatch(field, "uint", value))
}

pub fn as_u64(value: &DynSolValue, field: &str) -> Result<u64> {
    let raw = as_u256(value, field)?;
    u64::try_from(raw)
        .map_err(|_| AbiError::Decoding(format!("{field}: {raw} does not fit in u64")))
}

pub fn as_u8(value: &DynSolValue, field: &str) -> Result<u8> {
    let raw = as_u256(value, field)?;
    u8::try_from(raw)
        .map_err(|_| AbiError::Decoding(format!("{field}: {raw} does not fit in u8")))
}

pub fn as_bool(value: &DynSolValue, field: &str) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| mismatch(field, "bool", value))
}

pub fn as_address(value: &DynSolValue, field: &str) -> Result<Address> {
    value
        .as_address()
        .ok_or_else(|| mismatch(field, "address", value))
}

pub fn as_array<'a>(value: &'a DynSolValue, field: &str) -> Result<&'a [DynSolValue]> {
    value
        .as_array()
        .ok_or_else(|| mismatch(field, "array", value))
}

pub fn as_u8_vec(value: &DynSolValue, field: &str) -> Result<Vec<u8>> {
    as_array(value, field)?
        .iter()
        .map(|item| as_u8(item, field))
        .collect()
}

pub fn as_u64_vec(value: &DynSolValue, field: &str) -> Result<Vec<u64>> {
    as_array(value, field)?
        .iter()
        .map(|item| as_u64(item, field))
        .collect()
}

pub fn as_address_vec(value: &DynSolValue, field: &str) -> Result<Vec<Address>> {
    as_array(value, field)?
        .iter()
        .map(|item| as_address(item, field))
        .collect()
}

/// Positional access into a decoded tuple with a descriptive error.
pub fn field<'a>(values: &'a [DynSolValue], index: usize, name: &str) -> Result<&'a DynSolValue> {
    values.get(index).ok_or_else(|| {
        AbiError::Decoding(format!(
            "missing field `{name}` at position {index} (got {} values)",
            values.len()
        ))
    })
}

fn mismatch(field: &str, expected: &str, value: &DynSolValue) -> AbiError {
    AbiError::Decoding(format!("{field}: expected {expected}, got {value:?}"))
}

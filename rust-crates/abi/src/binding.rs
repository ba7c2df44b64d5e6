use crate::{
    AbiError,
    Result,
};
use alloy_dyn_abi::{
    DynSolType,
    DynSolValue,
    Specifier,
};
use alloy_json_abi::{
    Event,
    Function,
};
use alloy_primitives::{
    B256,
    Bytes,
    Selector,
    U256,
};

/// `Error(string)`
const ERROR_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];
/// `Panic(uint256)`
const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

/// A contract function with its resolved parameter types and selector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionSignature {
    name: String,
    canonical: String,
    selector: Selector,
    inputs: Vec<DynSolType>,
    outputs: Vec<DynSolType>,
    payable: bool,
}

impl FunctionSignature {
    /// Parses a human readable signature such as
    /// `drawNumber(uint256 roundId) returns (uint256)`.
    pub fn parse(signature: &str) -> Result<Self> {
        let function = Function::parse(signature).map_err(|e| {
            AbiError::Registry(format!("invalid function signature `{signature}`: {e}"))
        })?;
        let inputs = resolve_all(&function.inputs, signature)?;
        let outputs = resolve_all(&function.outputs, signature)?;
        Ok(Self {
            name: function.name.clone(),
            canonical: function.signature(),
            selector: function.selector(),
            inputs,
            outputs,
            payable: false,
        })
    }

    pub fn payable(mut self) -> Self {
        self.payable = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `name(type,type)` form that the selector is hashed from.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Canonical form including return types, used for fingerprinting.
    pub fn canonical_with_outputs(&self) -> String {
        let outputs = self
            .outputs
            .iter()
            .map(|ty| ty.sol_type_name().into_owned())
            .collect::<Vec<_>>()
            .join(",");
        format!("{}:({})", self.canonical, outputs)
    }

    pub fn selector(&self) -> Selector {
        self.selector
    }

    pub fn inputs(&self) -> &[DynSolType] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[DynSolType] {
        &self.outputs
    }

    pub fn is_payable(&self) -> bool {
        self.payable
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventSignature {
    name: String,
    canonical: String,
    topic: B256,
    indexed: Vec<DynSolType>,
    body: Vec<DynSolType>,
}

/// A log split back into its indexed and data values.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedLog {
    pub indexed: Vec<DynSolValue>,
    pub body: Vec<DynSolValue>,
}

impl EventSignature {
    pub fn parse(signature: &str) -> Result<Self> {
        let event = Event::parse(signature).map_err(|e| {
            AbiError::Registry(format!("invalid event signature `{signature}`: {e}"))
        })?;
        let mut indexed = Vec::new();
        let mut body = Vec::new();
        for param in &event.inputs {
            let ty = param.resolve().map_err(|e| {
                AbiError::Registry(format!("unresolvable type in `{signature}`: {e}"))
            })?;
            if param.indexed {
                indexed.push(ty);
            } else {
                body.push(ty);
            }
        }
        Ok(Self {
            name: event.name.clone(),
            canonical: event.signature(),
            topic: event.selector(),
            indexed,
            body,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    pub fn topic(&self) -> B256 {
        self.topic
    }

    pub fn decode_log(&self, topics: &[B256], data: &[u8]) -> Result<DecodedLog> {
        let Some((first, rest)) = topics.split_first() else {
            return Err(AbiError::Decoding(format!(
                "{}: log carries no topics",
                self.canonical
            )));
        };
        if *first != self.topic {
            return Err(AbiError::Decoding(format!(
                "{}: topic0 {first} does not match {}",
                self.canonical, self.topic
            )));
        }
        if rest.len() != self.indexed.len() {
            return Err(AbiError::Decoding(format!(
                "{}: expected {} indexed topics, found {}",
                self.canonical,
                self.indexed.len(),
                rest.len()
            )));
        }
        let indexed = self
            .indexed
            .iter()
            .zip(rest)
            .map(|(ty, topic)| {
                ty.abi_decode(topic.as_slice()).map_err(|e| {
                    AbiError::Decoding(format!("{}: bad indexed topic: {e}", self.canonical))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let body = decode_params(&self.body, data)
            .map_err(|e| AbiError::Decoding(format!("{}: {e}", self.canonical)))?;
        Ok(DecodedLog { indexed, body })
    }

    pub fn encode_log(
        &self,
        indexed: &[DynSolValue],
        body: &[DynSolValue],
    ) -> Result<(Vec<B256>, Bytes)> {
        check_values(&self.canonical, &self.indexed, indexed)?;
        check_values(&self.canonical, &self.body, body)?;
        let mut topics = Vec::with_capacity(indexed.len() + 1);
        topics.push(self.topic);
        for value in indexed {
            let word = value.abi_encode();
            if word.len() != 32 {
                return Err(AbiError::Encoding(format!(
                    "{}: indexed values must be single words",
                    self.canonical
                )));
            }
            topics.push(B256::from_slice(&word));
        }
        let data = DynSolValue::Tuple(body.to_vec()).abi_encode_params();
        Ok((topics, data.into()))
    }
}

/// Encodes `args` as calldata for `signature`: selector followed by the
/// ABI encoded arguments. Identical inputs always produce identical bytes.
pub fn encode(signature: &FunctionSignature, args: &[DynSolValue]) -> Result<Bytes> {
    check_values(&signature.canonical, &signature.inputs, args)?;
    let params = DynSolValue::Tuple(args.to_vec()).abi_encode_params();
    let mut data = Vec::with_capacity(4 + params.len());
    data.extend_from_slice(signature.selector.as_slice());
    data.extend_from_slice(&params);
    Ok(data.into())
}

/// Decodes the return data of a call to `signature`.
pub fn decode(signature: &FunctionSignature, data: &[u8]) -> Result<Vec<DynSolValue>> {
    decode_params(&signature.outputs, data).map_err(|e| {
        AbiError::Decoding(format!(
            "{} returned {} bytes: {e}",
            signature.canonical,
            data.len()
        ))
    })
}

/// Inverse of [`encode`]. The selector must belong to `signature`.
pub fn decode_input(
    signature: &FunctionSignature,
    calldata: &[u8],
) -> Result<Vec<DynSolValue>> {
    let Some((selector, params)) = calldata.split_at_checked(4) else {
        return Err(AbiError::Decoding(format!(
            "{}: calldata shorter than a selector",
            signature.canonical
        )));
    };
    if selector != signature.selector.as_slice() {
        return Err(AbiError::Decoding(format!(
            "{}: selector 0x{} does not match {}",
            signature.canonical,
            hex::encode(selector),
            signature.selector
        )));
    }
    decode_params(&signature.inputs, params)
        .map_err(|e| AbiError::Decoding(format!("{}: {e}", signature.canonical)))
}

/// Inverse of [`decode`]; produces the bytes a contract would return.
pub fn encode_output(
    signature: &FunctionSignature,
    values: &[DynSolValue],
) -> Result<Bytes> {
    check_values(&signature.canonical, &signature.outputs, values)?;
    Ok(DynSolValue::Tuple(values.to_vec())
        .abi_encode_params()
        .into())
}

/// Extracts a readable reason from `Error(string)` or `Panic(uint256)`
/// revert data.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    let (selector, body) = data.split_at_checked(4)?;
    if selector == ERROR_SELECTOR {
        let decoded = decode_params(&[DynSolType::String], body).ok()?;
        return match decoded.into_iter().next()? {
            DynSolValue::String(reason) => Some(reason),
            _ => None,
        };
    }
    if selector == PANIC_SELECTOR {
        let decoded = decode_params(&[DynSolType::Uint(256)], body).ok()?;
        let code = u64::try_from(decoded.first()?.as_uint()?.0).ok()?;
        return Some(format!("panic code {code:#x}"));
    }
    None
}

pub fn encode_revert(reason: &str) -> Bytes {
    let mut data = ERROR_SELECTOR.to_vec();
    data.extend(
        DynSolValue::Tuple(vec![DynSolValue::String(reason.to_string())])
            .abi_encode_params(),
    );
    data.into()
}

pub fn encode_panic(code: u64) -> Bytes {
    let mut data = PANIC_SELECTOR.to_vec();
    data.extend(
        DynSolValue::Tuple(vec![DynSolValue::Uint(U256::from(code), 256)])
            .abi_encode_params(),
    );
    data.into()
}

fn resolve_all<P: Specifier<DynSolType>>(
    params: &[P],
    signature: &str,
) -> Result<Vec<DynSolType>> {
    params
        .iter()
        .map(|param| {
            param.resolve().map_err(|e| {
                AbiError::Registry(format!("unresolvable type in `{signature}`: {e}"))
            })
        })
        .collect()
}

fn check_values(
    canonical: &str,
    types: &[DynSolType],
    values: &[DynSolValue],
) -> Result<()> {
    if types.len() != values.len() {
        return Err(AbiError::Encoding(format!(
            "{canonical} expects {} values, got {}",
            types.len(),
            values.len()
        )));
    }
    for (index, (ty, value)) in types.iter().zip(values).enumerate() {
        if !ty.matches(value) {
            return Err(AbiError::Encoding(format!(
                "{canonical}: value {index} is not a `{}`",
                ty.sol_type_name()
            )));
        }
    }
    Ok(())
}

fn decode_params(
    types: &[DynSolType],
    data: &[u8],
) -> std::result::Result<Vec<DynSolValue>, String> {
    if types.is_empty() {
        return Ok(Vec::new());
    }
    let value = DynSolType::Tuple(types.to_vec())
        .abi_decode_params(data)
        .map_err(|e| e.to_string())?;
    // strict: trailing or non-canonical bytes point at a selector/ABI mismatch
    if value.abi_encode_params() != data {
        return Err("data is not a canonical encoding of the declared types".to_string());
    }
    match value {
        DynSolValue::Tuple(values) => Ok(values),
        other => Ok(vec![other]),
    }
}

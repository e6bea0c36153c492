//! Calldata and revert-data decoding against resolved ABI members
//!
//! The registry resolves raw bytes to a [`FunctionAbi`]/[`ErrorAbi`]; this
//! module turns the remaining bytes into printable values via alloy-dyn-abi.

use alloy_dyn_abi::{DynSolType, DynSolValue};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::{ErrorAbi, FunctionAbi, Parameter};

/// A decoded argument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedArg {
    /// Parameter name (or "arg{n}" if unnamed)
    pub name: String,
    /// Solidity type, e.g. "address", "uint256", "(uint256,address)"
    pub kind: String,
    /// Decoded value as a formatted string
    pub value: String,
}

/// Result of decoding selector-prefixed data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedCall {
    /// Member name
    pub name: String,
    /// Full canonical signature, e.g. "transfer(address,uint256)"
    pub signature: String,
    /// Decoded arguments
    pub arguments: Vec<DecodedArg>,
}

/// Trait for decoding implementations.
///
/// Abstracts over the decoding backend so the registry's callers are not
/// tied to alloy-dyn-abi.
pub trait AbiDecoder: Send + Sync {
    /// Decode call data (including the 4-byte selector) against a function.
    fn decode_call(&self, function: &FunctionAbi, data: &[u8]) -> Result<DecodedCall>;

    /// Decode revert data (including the 4-byte selector) against a custom
    /// error.
    fn decode_revert(&self, error: &ErrorAbi, data: &[u8]) -> Result<DecodedCall>;
}

/// Decoder backed by alloy-dyn-abi.
#[derive(Debug, Default)]
pub struct DynAbiDecoder;

impl DynAbiDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl AbiDecoder for DynAbiDecoder {
    fn decode_call(&self, function: &FunctionAbi, data: &[u8]) -> Result<DecodedCall> {
        decode_member(&function.name, function.signature(), function.selector(), &function.inputs, data)
    }

    fn decode_revert(&self, error: &ErrorAbi, data: &[u8]) -> Result<DecodedCall> {
        decode_member(&error.name, error.signature(), error.selector(), &error.inputs, data)
    }
}

fn decode_member(
    name: &str,
    signature: String,
    selector: [u8; 4],
    inputs: &[Parameter],
    data: &[u8],
) -> Result<DecodedCall> {
    if data.len() < 4 {
        bail!("data too short (need at least 4 bytes for selector)");
    }

    let found: [u8; 4] = data[..4].try_into().unwrap();
    if found != selector {
        bail!(
            "selector mismatch: got 0x{}, expected 0x{}",
            hex::encode(found),
            hex::encode(selector)
        );
    }

    let args_data = &data[4..];

    let types: Vec<DynSolType> = inputs
        .iter()
        .map(|param| {
            param.ty.parse::<DynSolType>().with_context(|| {
                format!(
                    "Failed to parse type '{}' for param '{}'",
                    param.ty,
                    param.name.as_deref().unwrap_or("")
                )
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let decoded_values = if types.is_empty() {
        Vec::new()
    } else {
        let tuple_type = DynSolType::Tuple(types);
        let decoded = tuple_type
            .abi_decode(args_data)
            .context("Failed to decode data")?;

        match decoded {
            DynSolValue::Tuple(values) => values,
            other => vec![other],
        }
    };

    let arguments: Vec<DecodedArg> = inputs
        .iter()
        .zip(decoded_values.iter())
        .enumerate()
        .map(|(idx, (param, value))| {
            let name = match param.name.as_deref() {
                Some(name) if !name.trim().is_empty() => name.to_string(),
                _ => format!("arg{}", idx),
            };

            DecodedArg {
                name,
                kind: param.ty.clone(),
                value: format_dyn_sol_value(value),
            }
        })
        .collect();

    Ok(DecodedCall {
        name: name.to_string(),
        signature,
        arguments,
    })
}

/// Format a DynSolValue for display
pub fn format_dyn_sol_value(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Bool(b) => b.to_string(),
        DynSolValue::Int(i, _) => i.to_string(),
        DynSolValue::Uint(u, _) => {
            let s = u.to_string();
            // For very large numbers, show hex instead
            if s.len() > 20 {
                format!("0x{:x}", u)
            } else {
                s
            }
        }
        DynSolValue::FixedBytes(word, size) => {
            let bytes = &word.as_slice()[..(*size).min(32)];
            format!("0x{}", hex::encode(bytes))
        }
        DynSolValue::Address(addr) => format!("{:?}", addr),
        DynSolValue::Function(func) => format!("0x{}", hex::encode(func.as_slice())),
        DynSolValue::Bytes(bytes) => {
            if bytes.len() <= 32 {
                format!("0x{}", hex::encode(bytes))
            } else {
                format!("0x{}… ({} bytes)", hex::encode(&bytes[..32]), bytes.len())
            }
        }
        DynSolValue::String(s) => {
            if s.len() <= 64 {
                format!("\"{}\"", s)
            } else {
                format!("\"{}…\" ({} chars)", &s[..64], s.len())
            }
        }
        DynSolValue::Array(arr) | DynSolValue::FixedArray(arr) => {
            let max_items = 10;
            let items: Vec<String> = arr
                .iter()
                .take(max_items)
                .map(format_dyn_sol_value)
                .collect();
            if arr.len() > max_items {
                format!("[{}, …] ({} items)", items.join(", "), arr.len())
            } else {
                format!("[{}]", items.join(", "))
            }
        }
        DynSolValue::Tuple(fields) => {
            let items: Vec<String> = fields.iter().map(format_dyn_sol_value).collect();
            format!("({})", items.join(", "))
        }
    }
}

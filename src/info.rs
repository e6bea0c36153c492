//! ABI sources bound to an optional contract identity
//!
//! An [`AbiInfo`] is one "ABI source": a raw JSON ABI document, or a
//! compiler-metadata object carrying one under `output.abi`. It may be bound
//! to a `(chain_id, address)` deployment identity, and it materializes into
//! a [`ContractAbi`] lazily, on first registration or on an explicit
//! [`AbiInfo::initialise`] call.

use std::sync::{Arc, RwLock};

use alloy_json_abi::JsonAbi;
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::AbiError;
use crate::model::ContractAbi;

/// Chain identifier. `U256` rather than `u64`: chain ids are not bounded to
/// 64 bits.
pub type ChainId = U256;

/// Solidity compiler metadata, reduced to the part the registry consumes.
///
/// Unknown top-level fields (`compiler`, `settings`, `sources`, ...) are
/// accepted and ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationMetadata {
    pub output: MetadataOutput,
}

/// The `output` section of compiler metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataOutput {
    /// The ABI document, kept as raw JSON until materialization.
    #[serde(default)]
    pub abi: serde_json::Value,
}

/// One ABI source with optional deployment identity.
///
/// Shared read-only after construction; the lazily derived pieces
/// (`raw_abi` when sourced from metadata, and the parsed contract) live in
/// interior cells so a shared reference can still materialize them.
#[derive(Debug)]
pub struct AbiInfo {
    raw_abi: RwLock<Option<String>>,
    metadata: Option<CompilationMetadata>,
    contract: RwLock<Option<Arc<ContractAbi>>>,
    pub contract_name: Option<String>,
    pub contract_type: Option<String>,
    /// Deployment address, lowercased hex.
    pub address: Option<String>,
    pub chain_id: Option<ChainId>,
}

impl AbiInfo {
    /// Build from a raw ABI JSON string with no deployment identity.
    ///
    /// Lazy: the document is not parsed until first registration or an
    /// explicit [`AbiInfo::initialise`].
    pub fn from_abi(abi: &str) -> Result<Self, AbiError> {
        if abi.trim().is_empty() {
            return Err(AbiError::InvalidArgument("abi string is empty"));
        }
        Ok(Self {
            raw_abi: RwLock::new(Some(abi.to_string())),
            metadata: None,
            contract: RwLock::new(None),
            contract_name: None,
            contract_type: None,
            address: None,
            chain_id: None,
        })
    }

    /// Build from a raw ABI JSON string bound to a deployment identity.
    ///
    /// Eager: the document is parsed before returning, so a malformed ABI
    /// fails here rather than at first lookup.
    pub fn from_abi_with_identity(
        abi: &str,
        address: Option<&str>,
        contract_name: Option<&str>,
        contract_type: Option<&str>,
        chain_id: Option<ChainId>,
    ) -> Result<Self, AbiError> {
        let mut info = Self::from_abi(abi)?;
        info.address = address.map(|a| a.to_lowercase());
        info.contract_name = contract_name.map(str::to_string);
        info.contract_type = contract_type.map(str::to_string);
        info.chain_id = chain_id;
        info.initialise(false)?;
        Ok(info)
    }

    /// Build from compiler metadata bound to a deployment identity.
    ///
    /// The raw ABI is derived from `metadata.output.abi` and cached; the
    /// derived document is parsed eagerly.
    pub fn from_compilation_metadata(
        metadata: CompilationMetadata,
        address: Option<&str>,
        contract_name: Option<&str>,
        contract_type: Option<&str>,
        chain_id: Option<ChainId>,
    ) -> Result<Self, AbiError> {
        let info = Self {
            raw_abi: RwLock::new(None),
            metadata: Some(metadata),
            contract: RwLock::new(None),
            contract_name: contract_name.map(str::to_string),
            contract_type: contract_type.map(str::to_string),
            address: address.map(|a| a.to_lowercase()),
            chain_id,
        };
        info.initialise(false)?;
        Ok(info)
    }

    /// Materialize the [`ContractAbi`].
    ///
    /// Idempotent: a no-op when already materialized, unless `force` is set,
    /// in which case the source is re-parsed. When the raw ABI is absent it
    /// is derived from `metadata.output.abi` and cached back. When neither
    /// source exists this is a silent no-op, not an error.
    pub fn initialise(&self, force: bool) -> Result<(), AbiError> {
        if !force && self.is_initialised() {
            return Ok(());
        }

        let Some(raw) = self.ensure_raw_abi()? else {
            return Ok(());
        };

        let parsed: JsonAbi = serde_json::from_str(&raw)?;
        let contract = Arc::new(ContractAbi::from(&parsed));

        let mut cell = self.contract.write().unwrap();
        if cell.is_none() || force {
            *cell = Some(contract);
        }
        Ok(())
    }

    /// The materialized contract ABI, if any.
    pub fn contract_abi(&self) -> Option<Arc<ContractAbi>> {
        self.contract.read().unwrap().clone()
    }

    /// The raw ABI JSON document, if present or already derived.
    pub fn raw_abi(&self) -> Option<String> {
        self.raw_abi.read().unwrap().clone()
    }

    pub fn is_initialised(&self) -> bool {
        self.contract.read().unwrap().is_some()
    }

    /// Returns the raw ABI, deriving and caching it from metadata when
    /// absent. `Ok(None)` when no source exists at all.
    fn ensure_raw_abi(&self) -> Result<Option<String>, AbiError> {
        if let Some(raw) = self.raw_abi.read().unwrap().as_ref() {
            if !raw.trim().is_empty() {
                return Ok(Some(raw.clone()));
            }
        }

        let Some(metadata) = &self.metadata else {
            return Ok(None);
        };
        if metadata.output.abi.is_null() {
            return Ok(None);
        }

        let derived = serde_json::to_string(&metadata.output.abi)?;
        *self.raw_abi.write().unwrap() = Some(derived.clone());
        Ok(Some(derived))
    }
}

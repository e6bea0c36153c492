//! The ABI registry: dual-indexed, deduplicating, append-only
//!
//! One shared [`AbiRepository`] serves many concurrent decoders. Writes
//! (registration) are rare and serialized; reads run in parallel against
//! sharded maps and observe either the pre- or post-state of a registration,
//! never a partially inserted member list.

use std::sync::{Arc, Mutex, RwLock};

use dashmap::DashMap;

use crate::error::AbiError;
use crate::info::{AbiInfo, ChainId, CompilationMetadata};
use crate::model::{ErrorAbi, EventAbi, FunctionAbi};
use crate::signature;

/// Contract-scoped index key: chain id (when known) plus lowercased address.
type ContractKey = (Option<ChainId>, String);

/// Registry of ABI sources with per-contract and global signature indices.
///
/// Append-only for the lifetime of the process: nothing is ever removed.
#[derive(Debug, Default)]
pub struct AbiRepository {
    /// Every registered source, in registration order.
    infos: RwLock<Vec<Arc<AbiInfo>>>,
    /// `(chain_id, address) -> AbiInfo`. Re-registering the same identity
    /// overwrites the previous entry (last write wins); the signature
    /// indices below still retain members indexed from the earlier source.
    contracts: DashMap<ContractKey, Arc<AbiInfo>>,
    /// Signature-key indices, one per member kind. Collision lists stay
    /// tiny: more than one entry means either the same fragment loaded from
    /// structurally different declarations, or a chance selector collision.
    functions: DashMap<String, Vec<Arc<FunctionAbi>>>,
    events: DashMap<String, Vec<Arc<EventAbi>>>,
    errors: DashMap<String, Vec<Arc<ErrorAbi>>>,
    /// Serializes registrations so each call's index mutations become
    /// visible as a unit relative to other writers.
    registration: Mutex<()>,
}

impl AbiRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an ABI source.
    ///
    /// Materializes the source if needed, registers its identity in the
    /// contract index, and inserts every function/event/error into the
    /// global signature indices (deduplicating structurally identical
    /// members). A source that fails to parse is retained in the backing
    /// collection with the error propagated; its members are not indexed.
    pub fn add_abi_info(&self, info: AbiInfo) -> Result<Arc<AbiInfo>, AbiError> {
        let _guard = self.registration.lock().unwrap();

        let info = Arc::new(info);
        self.infos.write().unwrap().push(info.clone());

        if let Some(address) = &info.address {
            self.contracts
                .insert((info.chain_id, address.clone()), info.clone());
        }

        info.initialise(false)?;

        if let Some(contract) = info.contract_abi() {
            for function in &contract.functions {
                insert_deduped(&self.functions, function.signature_key(), function, |a, b| {
                    a.has_same_signature(b)
                });
            }
            for event in &contract.events {
                insert_deduped(&self.events, event.signature_key(), event, |a, b| {
                    a.has_same_signature(b)
                });
            }
            for error in &contract.errors {
                insert_deduped(&self.errors, error.signature_key(), error, |a, b| {
                    a.has_same_signature(b)
                });
            }
            tracing::debug!(
                functions = contract.functions.len(),
                events = contract.events.len(),
                errors = contract.errors.len(),
                address = info.address.as_deref().unwrap_or("-"),
                "registered ABI source"
            );
        }

        Ok(info)
    }

    /// Register a raw ABI JSON document with no deployment identity.
    pub fn add_abi(&self, abi: &str) -> Result<Arc<AbiInfo>, AbiError> {
        self.add_abi_info(AbiInfo::from_abi(abi)?)
    }

    /// Register a raw ABI JSON document bound to a deployment identity.
    pub fn add_abi_with_identity(
        &self,
        abi: &str,
        address: Option<&str>,
        contract_name: Option<&str>,
        contract_type: Option<&str>,
        chain_id: Option<ChainId>,
    ) -> Result<Arc<AbiInfo>, AbiError> {
        self.add_abi_info(AbiInfo::from_abi_with_identity(
            abi,
            address,
            contract_name,
            contract_type,
            chain_id,
        )?)
    }

    /// Register compiler metadata bound to a deployment identity.
    pub fn add_compilation_metadata(
        &self,
        metadata: CompilationMetadata,
        address: Option<&str>,
        contract_name: Option<&str>,
        contract_type: Option<&str>,
        chain_id: Option<ChainId>,
    ) -> Result<Arc<AbiInfo>, AbiError> {
        self.add_abi_info(AbiInfo::from_compilation_metadata(
            metadata,
            address,
            contract_name,
            contract_type,
            chain_id,
        )?)
    }

    // === Contract-scoped queries ===

    /// The ABI source registered for `(chain_id, address)`, if any.
    /// Address matching is case-insensitive.
    pub fn get_abi_info(&self, chain_id: ChainId, address: &str) -> Option<Arc<AbiInfo>> {
        self.contracts
            .get(&(Some(chain_id), address.to_lowercase()))
            .map(|entry| entry.value().clone())
    }

    /// First function on the contract at `(chain_id, address)` matching the
    /// selector hex (with or without `0x`, any case).
    pub fn find_function(
        &self,
        chain_id: ChainId,
        address: &str,
        signature: &str,
    ) -> Option<Arc<FunctionAbi>> {
        self.get_abi_info(chain_id, address)?
            .contract_abi()?
            .find_function(signature)
    }

    /// First event on the contract at `(chain_id, address)` matching the
    /// topic hex.
    pub fn find_event(
        &self,
        chain_id: ChainId,
        address: &str,
        signature: &str,
    ) -> Option<Arc<EventAbi>> {
        self.get_abi_info(chain_id, address)?
            .contract_abi()?
            .find_event(signature)
    }

    /// First error on the contract at `(chain_id, address)` matching the
    /// selector hex.
    pub fn find_error(
        &self,
        chain_id: ChainId,
        address: &str,
        signature: &str,
    ) -> Option<Arc<ErrorAbi>> {
        self.get_abi_info(chain_id, address)?
            .contract_abi()?
            .find_error(signature)
    }

    /// Resolve a function from raw call data (hex, `0x` optional) on a known
    /// contract. `None` when the data is too short to carry a selector.
    pub fn find_function_by_input_data(
        &self,
        chain_id: ChainId,
        address: &str,
        input_data: &str,
    ) -> Option<Arc<FunctionAbi>> {
        let selector = signature::selector_from_hex(input_data)?;
        self.find_function(chain_id, address, &hex::encode(selector))
    }

    // === Global (signature-only) queries ===

    /// Every registered function under the given selector hex. More than
    /// one element means structurally distinct members sharing the hash.
    pub fn functions_for_signature(&self, signature: &str) -> Vec<Arc<FunctionAbi>> {
        self.functions
            .get(&signature::normalize_key(signature))
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Every registered event under the given topic hex.
    pub fn events_for_signature(&self, signature: &str) -> Vec<Arc<EventAbi>> {
        self.events
            .get(&signature::normalize_key(signature))
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Every registered error under the given selector hex.
    pub fn errors_for_signature(&self, signature: &str) -> Vec<Arc<ErrorAbi>> {
        self.errors
            .get(&signature::normalize_key(signature))
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Resolve candidate functions from raw call data when the contract is
    /// unknown. Empty when the data is too short to carry a selector.
    pub fn functions_for_input_data(&self, input_data: &str) -> Vec<Arc<FunctionAbi>> {
        match signature::selector_from_hex(input_data) {
            Some(selector) => self.functions_for_signature(&hex::encode(selector)),
            None => Vec::new(),
        }
    }

    /// Resolve candidate errors from raw revert data when the contract is
    /// unknown.
    pub fn errors_for_input_data(&self, revert_data: &str) -> Vec<Arc<ErrorAbi>> {
        match signature::selector_from_hex(revert_data) {
            Some(selector) => self.errors_for_signature(&hex::encode(selector)),
            None => Vec::new(),
        }
    }

    /// All registered sources, in registration order.
    pub fn abi_infos(&self) -> Vec<Arc<AbiInfo>> {
        self.infos.read().unwrap().clone()
    }

    /// Number of registered sources.
    pub fn len(&self) -> usize {
        self.infos.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.read().unwrap().is_empty()
    }
}

/// Insert into a signature index unless a structurally equal member is
/// already present under the key. The key is the raw signature hash, so a
/// list can legitimately hold more than one structurally distinct member.
fn insert_deduped<T>(
    index: &DashMap<String, Vec<Arc<T>>>,
    key: String,
    member: &Arc<T>,
    same: impl Fn(&T, &T) -> bool,
) {
    let mut entry = index.entry(key).or_default();
    if !entry.iter().any(|existing| same(existing, member)) {
        entry.push(member.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    const ERC20_FRAGMENT: &str = r#"[
        {
            "type": "function",
            "name": "transfer",
            "inputs": [
                {"name": "to", "type": "address"},
                {"name": "amount", "type": "uint256"}
            ],
            "outputs": [{"name": "", "type": "bool"}],
            "stateMutability": "nonpayable"
        },
        {
            "type": "event",
            "name": "Transfer",
            "inputs": [
                {"name": "from", "type": "address", "indexed": true},
                {"name": "to", "type": "address", "indexed": true},
                {"name": "amount", "type": "uint256", "indexed": false}
            ],
            "anonymous": false
        },
        {
            "type": "error",
            "name": "InsufficientBalance",
            "inputs": [{"name": "available", "type": "uint256"}]
        }
    ]"#;

    const ADDR_A: &str = "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
    const ADDR_B: &str = "0xBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";
    const TRANSFER_TOPIC: &str =
        "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

    fn chain(id: u64) -> ChainId {
        U256::from(id)
    }

    #[test]
    fn test_scenario_a_resolve_transfer_from_input_data() {
        let repo = AbiRepository::new();
        repo.add_abi_with_identity(ERC20_FRAGMENT, Some(ADDR_A), Some("Token"), None, Some(chain(1)))
            .unwrap();

        let calldata = format!("0xa9059cbb{}", "00".repeat(64));
        let function = repo
            .find_function_by_input_data(chain(1), &ADDR_A.to_lowercase(), &calldata)
            .unwrap();
        assert_eq!(function.name, "transfer");
        assert_eq!(function.selector_hex(), "0xa9059cbb");
    }

    #[test]
    fn test_scenario_b_identity_less_registration_is_global_only() {
        let repo = AbiRepository::new();
        repo.add_abi(ERC20_FRAGMENT).unwrap();

        let candidates = repo.functions_for_signature("0xa9059cbb");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "transfer");

        assert!(repo.get_abi_info(chain(1), ADDR_A).is_none());
        assert!(repo.find_function(chain(1), ADDR_A, "0xa9059cbb").is_none());
    }

    #[test]
    fn test_scenario_c_colliding_selectors_both_retained() {
        // Same name and inputs (identical selector), different declared
        // return types: structurally distinct, so both must survive under
        // the one signature key.
        let with_bool = r#"[
            {
                "type": "function",
                "name": "transfer",
                "inputs": [
                    {"name": "to", "type": "address"},
                    {"name": "amount", "type": "uint256"}
                ],
                "outputs": [{"name": "", "type": "bool"}],
                "stateMutability": "nonpayable"
            }
        ]"#;
        let with_uint = r#"[
            {
                "type": "function",
                "name": "transfer",
                "inputs": [
                    {"name": "to", "type": "address"},
                    {"name": "amount", "type": "uint256"}
                ],
                "outputs": [{"name": "", "type": "uint256"}],
                "stateMutability": "nonpayable"
            }
        ]"#;

        let repo = AbiRepository::new();
        repo.add_abi(with_bool).unwrap();
        repo.add_abi(with_uint).unwrap();
        assert_eq!(repo.functions_for_signature("0xa9059cbb").len(), 2);

        // Re-registering either one must not grow the list.
        repo.add_abi(with_bool).unwrap();
        repo.add_abi(with_uint).unwrap();
        assert_eq!(repo.functions_for_signature("0xa9059cbb").len(), 2);
    }

    #[test]
    fn test_dedup_across_identities_keeps_contract_records_separate() {
        let repo = AbiRepository::new();
        repo.add_abi_with_identity(ERC20_FRAGMENT, Some(ADDR_A), None, None, Some(chain(1)))
            .unwrap();
        repo.add_abi_with_identity(ERC20_FRAGMENT, Some(ADDR_B), None, None, Some(chain(1)))
            .unwrap();

        // Global indices collapse the structurally identical members...
        assert_eq!(repo.functions_for_signature("a9059cbb").len(), 1);
        assert_eq!(repo.events_for_signature(TRANSFER_TOPIC).len(), 1);
        assert_eq!(
            repo.errors_for_signature(&hex::encode(crate::signature::selector(
                "InsufficientBalance",
                ["uint256"],
            )))
            .len(),
            1
        );

        // ...while both contract identities remain independently resolvable.
        assert_eq!(repo.len(), 2);
        assert!(repo.get_abi_info(chain(1), ADDR_A).is_some());
        assert!(repo.get_abi_info(chain(1), ADDR_B).is_some());
    }

    #[test]
    fn test_address_lookup_is_case_insensitive() {
        let repo = AbiRepository::new();
        repo.add_abi_with_identity(ERC20_FRAGMENT, Some(ADDR_A), None, None, Some(chain(1)))
            .unwrap();

        let upper = repo.get_abi_info(chain(1), ADDR_A).unwrap();
        let lower = repo.get_abi_info(chain(1), &ADDR_A.to_lowercase()).unwrap();
        assert!(Arc::ptr_eq(&upper, &lower));
    }

    #[test]
    fn test_input_data_too_short_is_a_miss() {
        let repo = AbiRepository::new();
        repo.add_abi_with_identity(ERC20_FRAGMENT, Some(ADDR_A), None, None, Some(chain(1)))
            .unwrap();

        assert!(repo.find_function_by_input_data(chain(1), ADDR_A, "0x").is_none());
        assert!(repo.find_function_by_input_data(chain(1), ADDR_A, "0x123456").is_none());
        assert!(repo.functions_for_input_data("0x").is_empty());
        assert!(repo.functions_for_input_data("0x1234").is_empty());
    }

    #[test]
    fn test_contract_scoped_event_and_error_lookup() {
        let repo = AbiRepository::new();
        repo.add_abi_with_identity(ERC20_FRAGMENT, Some(ADDR_A), None, None, Some(chain(1)))
            .unwrap();

        let event = repo.find_event(chain(1), ADDR_A, TRANSFER_TOPIC).unwrap();
        assert_eq!(event.name, "Transfer");
        assert_eq!(event.indexed_count(), 2);

        let error_selector =
            hex::encode(crate::signature::selector("InsufficientBalance", ["uint256"]));
        let error = repo.find_error(chain(1), ADDR_A, &error_selector).unwrap();
        assert_eq!(error.name, "InsufficientBalance");

        assert!(repo.find_event(chain(2), ADDR_A, TRANSFER_TOPIC).is_none());
        assert!(repo.find_error(chain(1), ADDR_B, &error_selector).is_none());
    }

    #[test]
    fn test_identity_reregistration_is_last_write_wins() {
        let other = r#"[
            {
                "type": "function",
                "name": "decimals",
                "inputs": [],
                "outputs": [{"name": "", "type": "uint8"}],
                "stateMutability": "view"
            }
        ]"#;

        let repo = AbiRepository::new();
        repo.add_abi_with_identity(ERC20_FRAGMENT, Some(ADDR_A), None, None, Some(chain(1)))
            .unwrap();
        repo.add_abi_with_identity(other, Some(ADDR_A), None, None, Some(chain(1)))
            .unwrap();

        // The contract index now resolves to the second source...
        let info = repo.get_abi_info(chain(1), ADDR_A).unwrap();
        assert!(info.contract_abi().unwrap().find_function("0xa9059cbb").is_none());

        // ...but both records remain in the backing collection, and the
        // earlier members stay reachable globally.
        assert_eq!(repo.len(), 2);
        assert_eq!(repo.functions_for_signature("0xa9059cbb").len(), 1);
    }

    #[test]
    fn test_malformed_source_is_retained_but_unindexed() {
        let repo = AbiRepository::new();
        let err = repo.add_abi("{not json").unwrap_err();
        assert!(matches!(err, AbiError::MalformedAbi { .. }));

        assert_eq!(repo.len(), 1);
        assert!(repo.functions_for_signature("0xa9059cbb").is_empty());
    }

    #[test]
    fn test_chain_id_beyond_64_bits() {
        let big_chain = U256::from(u64::MAX) + U256::from(1u64);

        let repo = AbiRepository::new();
        repo.add_abi_with_identity(ERC20_FRAGMENT, Some(ADDR_A), None, None, Some(big_chain))
            .unwrap();

        assert!(repo.get_abi_info(big_chain, ADDR_A).is_some());
        assert!(repo.get_abi_info(chain(1), ADDR_A).is_none());
    }

    #[test]
    fn test_concurrent_reads_during_registration() {
        use std::thread;

        let repo = Arc::new(AbiRepository::new());
        repo.add_abi_with_identity(ERC20_FRAGMENT, Some(ADDR_A), None, None, Some(chain(1)))
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let repo = repo.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..200 {
                    let found = repo.functions_for_input_data(&format!(
                        "0xa9059cbb{}",
                        "00".repeat(64)
                    ));
                    assert!(!found.is_empty());
                }
            }));
        }

        let writer = {
            let repo = repo.clone();
            thread::spawn(move || {
                for i in 0..20 {
                    let addr = format!("0x{:040x}", i + 0x1000);
                    repo.add_abi_with_identity(
                        ERC20_FRAGMENT,
                        Some(&addr),
                        None,
                        None,
                        Some(chain(1)),
                    )
                    .unwrap();
                }
            })
        };

        for handle in handles {
            handle.join().unwrap();
        }
        writer.join().unwrap();

        // Identical fragments from every registration collapsed to one
        // entry per signature.
        assert_eq!(repo.functions_for_signature("0xa9059cbb").len(), 1);
        assert_eq!(repo.len(), 21);
    }
}

//! Typed ABI data model: parameters, functions, events, errors, contracts
//!
//! Members are built from a parsed `alloy_json_abi::JsonAbi` and own their
//! ordered parameter lists. Selector and topic hashes are derived lazily and
//! memoized in write-once cells, so repeated index insertions and lookups
//! never rehash.

use std::sync::{Arc, OnceLock};

use alloy_json_abi::{
    Constructor, Error as JsonError, Event, EventParam, Function, InternalType, JsonAbi, Param,
    StateMutability,
};
use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

use crate::signature;

/// One typed, ordered field of a function/event/error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name. Unnamed parameters (common for outputs) carry `None`.
    pub name: Option<String>,
    /// Selector-canonical ABI type, e.g. `"uint256"`, `"(uint256,address)"`.
    pub ty: String,
    /// 1-based position within its parameter list.
    pub order: usize,
    /// Declared source-level type, e.g. `"struct Exchange.Order"`.
    pub internal_type: Option<String>,
    /// Whether the parameter is indexed. Only meaningful for events.
    pub indexed: bool,
    /// Struct name when the parameter is a tuple backed by a named struct.
    pub struct_type_name: Option<String>,
}

impl Parameter {
    fn from_param(param: &Param, order: usize) -> Self {
        Self {
            name: non_empty(&param.name),
            ty: param.selector_type().into_owned(),
            order,
            internal_type: param.internal_type.as_ref().map(internal_type_string),
            indexed: false,
            struct_type_name: param.internal_type.as_ref().and_then(struct_name),
        }
    }

    fn from_event_param(param: &EventParam, order: usize) -> Self {
        Self {
            name: non_empty(&param.name),
            ty: param.selector_type().into_owned(),
            order,
            internal_type: param.internal_type.as_ref().map(internal_type_string),
            indexed: param.indexed,
            struct_type_name: param.internal_type.as_ref().and_then(struct_name),
        }
    }

    /// Structural signature-equality: position, canonical type, indexedness.
    /// Names deliberately do not participate.
    fn signature_eq(&self, other: &Self) -> bool {
        self.order == other.order && self.ty == other.ty && self.indexed == other.indexed
    }
}

fn non_empty(name: &str) -> Option<String> {
    if name.trim().is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

fn internal_type_string(internal: &InternalType) -> String {
    match internal {
        InternalType::AddressPayable(ty) => ty.clone(),
        InternalType::Contract(ty) => format!("contract {ty}"),
        InternalType::Enum { contract, ty } => qualified("enum", contract.as_deref(), ty),
        InternalType::Struct { contract, ty } => qualified("struct", contract.as_deref(), ty),
        InternalType::Other { contract, ty } => match contract {
            Some(contract) => format!("{contract}.{ty}"),
            None => ty.clone(),
        },
    }
}

fn qualified(kind: &str, contract: Option<&str>, ty: &str) -> String {
    match contract {
        Some(contract) => format!("{kind} {contract}.{ty}"),
        None => format!("{kind} {ty}"),
    }
}

fn struct_name(internal: &InternalType) -> Option<String> {
    match internal {
        InternalType::Struct { ty, .. } => Some(ty.clone()),
        _ => None,
    }
}

fn params_signature_eq(a: &[Parameter], b: &[Parameter]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.signature_eq(y))
}

fn input_types(params: &[Parameter]) -> impl Iterator<Item = &str> {
    params.iter().map(|p| p.ty.as_str())
}

/// One callable contract member.
#[derive(Debug, Clone)]
pub struct FunctionAbi {
    pub name: String,
    /// True for `view`/`pure` functions.
    pub constant: bool,
    pub inputs: Vec<Parameter>,
    pub outputs: Vec<Parameter>,
    selector: OnceLock<[u8; 4]>,
}

impl FunctionAbi {
    pub fn new(name: String, constant: bool, inputs: Vec<Parameter>, outputs: Vec<Parameter>) -> Self {
        Self { name, constant, inputs, outputs, selector: OnceLock::new() }
    }

    /// Canonical signature string, e.g. `transfer(address,uint256)`.
    pub fn signature(&self) -> String {
        signature::canonical_signature(&self.name, input_types(&self.inputs))
    }

    /// 4-byte selector: first 4 bytes of keccak256 of the canonical
    /// signature over the inputs. Computed once, then memoized.
    pub fn selector(&self) -> [u8; 4] {
        *self
            .selector
            .get_or_init(|| signature::selector(&self.name, input_types(&self.inputs)))
    }

    /// Selector rendered as `0x` + 8 hex digits.
    pub fn selector_hex(&self) -> String {
        format!("0x{}", hex::encode(self.selector()))
    }

    /// Normalized index key (lowercase hex, no prefix).
    pub fn signature_key(&self) -> String {
        hex::encode(self.selector())
    }

    /// Whether `candidate` (hex, optional `0x`, any case) names this
    /// function's selector.
    pub fn is_signature(&self, candidate: &str) -> bool {
        signature::normalize_key(candidate) == self.signature_key()
    }

    /// Structural signature-equality.
    ///
    /// Outputs participate on purpose: two same-named overloads differing
    /// only in declared return type must not be merged by the repository.
    pub fn has_same_signature(&self, other: &Self) -> bool {
        self.selector() == other.selector()
            && self.name == other.name
            && params_signature_eq(&self.inputs, &other.inputs)
            && params_signature_eq(&self.outputs, &other.outputs)
    }
}

impl From<&Function> for FunctionAbi {
    fn from(function: &Function) -> Self {
        let constant = matches!(
            function.state_mutability,
            StateMutability::Pure | StateMutability::View
        );
        Self::new(
            function.name.clone(),
            constant,
            numbered(&function.inputs),
            numbered(&function.outputs),
        )
    }
}

/// One loggable contract member.
#[derive(Debug, Clone)]
pub struct EventAbi {
    pub name: String,
    pub is_anonymous: bool,
    pub inputs: Vec<Parameter>,
    topic: OnceLock<B256>,
    indexed_count: OnceLock<usize>,
}

impl EventAbi {
    pub fn new(name: String, is_anonymous: bool, inputs: Vec<Parameter>) -> Self {
        Self { name, is_anonymous, inputs, topic: OnceLock::new(), indexed_count: OnceLock::new() }
    }

    pub fn signature(&self) -> String {
        signature::canonical_signature(&self.name, input_types(&self.inputs))
    }

    /// Full 32-byte topic hash (`topics[0]` of a matching log). Memoized.
    pub fn topic_hash(&self) -> B256 {
        *self
            .topic
            .get_or_init(|| signature::topic_hash(&self.name, input_types(&self.inputs)))
    }

    /// Topic rendered as `0x` + 64 hex digits.
    pub fn topic_hex(&self) -> String {
        format!("0x{}", hex::encode(self.topic_hash()))
    }

    pub fn signature_key(&self) -> String {
        hex::encode(self.topic_hash())
    }

    /// Number of indexed inputs. Memoized.
    pub fn indexed_count(&self) -> usize {
        *self
            .indexed_count
            .get_or_init(|| self.inputs.iter().filter(|p| p.indexed).count())
    }

    pub fn is_signature(&self, candidate: &str) -> bool {
        signature::normalize_key(candidate) == self.signature_key()
    }

    /// Structural signature-equality over the inputs. Events have no output
    /// shape, so unlike functions there is nothing else to compare.
    pub fn has_same_signature(&self, other: &Self) -> bool {
        self.topic_hash() == other.topic_hash()
            && self.name == other.name
            && params_signature_eq(&self.inputs, &other.inputs)
    }
}

impl From<&Event> for EventAbi {
    fn from(event: &Event) -> Self {
        let inputs = event
            .inputs
            .iter()
            .enumerate()
            .map(|(idx, param)| Parameter::from_event_param(param, idx + 1))
            .collect();
        Self::new(event.name.clone(), event.anonymous, inputs)
    }
}

/// One revertible contract member (Solidity custom error).
///
/// Custom errors follow the function-selector convention: 4 bytes of
/// keccak256 over the canonical signature of the inputs.
#[derive(Debug, Clone)]
pub struct ErrorAbi {
    pub name: String,
    pub inputs: Vec<Parameter>,
    selector: OnceLock<[u8; 4]>,
}

impl ErrorAbi {
    pub fn new(name: String, inputs: Vec<Parameter>) -> Self {
        Self { name, inputs, selector: OnceLock::new() }
    }

    pub fn signature(&self) -> String {
        signature::canonical_signature(&self.name, input_types(&self.inputs))
    }

    pub fn selector(&self) -> [u8; 4] {
        *self
            .selector
            .get_or_init(|| signature::selector(&self.name, input_types(&self.inputs)))
    }

    pub fn selector_hex(&self) -> String {
        format!("0x{}", hex::encode(self.selector()))
    }

    pub fn signature_key(&self) -> String {
        hex::encode(self.selector())
    }

    pub fn is_signature(&self, candidate: &str) -> bool {
        signature::normalize_key(candidate) == self.signature_key()
    }

    /// Structural signature-equality over the inputs only.
    pub fn has_same_signature(&self, other: &Self) -> bool {
        self.selector() == other.selector()
            && self.name == other.name
            && params_signature_eq(&self.inputs, &other.inputs)
    }
}

impl From<&JsonError> for ErrorAbi {
    fn from(error: &JsonError) -> Self {
        Self::new(error.name.clone(), numbered(&error.inputs))
    }
}

/// The deployment constructor, when declared.
#[derive(Debug, Clone)]
pub struct ConstructorAbi {
    pub inputs: Vec<Parameter>,
}

impl From<&Constructor> for ConstructorAbi {
    fn from(constructor: &Constructor) -> Self {
        Self { inputs: numbered(&constructor.inputs) }
    }
}

fn numbered(params: &[Param]) -> Vec<Parameter> {
    params
        .iter()
        .enumerate()
        .map(|(idx, param)| Parameter::from_param(param, idx + 1))
        .collect()
}

/// The full member set of one contract.
///
/// Members are `Arc`-shared so the repository indices and callers can hold
/// them without cloning parameter lists. Member names need not be unique
/// (overloading is legal) and chance selector collisions are tolerated.
#[derive(Debug, Clone, Default)]
pub struct ContractAbi {
    pub functions: Vec<Arc<FunctionAbi>>,
    pub events: Vec<Arc<EventAbi>>,
    pub errors: Vec<Arc<ErrorAbi>>,
    pub constructor: Option<ConstructorAbi>,
}

impl ContractAbi {
    /// First function matching the given selector hex, if any.
    pub fn find_function(&self, signature: &str) -> Option<Arc<FunctionAbi>> {
        let key = signature::normalize_key(signature);
        self.functions.iter().find(|f| f.signature_key() == key).cloned()
    }

    /// First event matching the given topic hex, if any.
    pub fn find_event(&self, signature: &str) -> Option<Arc<EventAbi>> {
        let key = signature::normalize_key(signature);
        self.events.iter().find(|e| e.signature_key() == key).cloned()
    }

    /// First error matching the given selector hex, if any.
    pub fn find_error(&self, signature: &str) -> Option<Arc<ErrorAbi>> {
        let key = signature::normalize_key(signature);
        self.errors.iter().find(|e| e.signature_key() == key).cloned()
    }

    pub fn member_count(&self) -> usize {
        self.functions.len() + self.events.len() + self.errors.len()
    }
}

impl From<&JsonAbi> for ContractAbi {
    fn from(abi: &JsonAbi) -> Self {
        Self {
            functions: abi.functions().map(|f| Arc::new(FunctionAbi::from(f))).collect(),
            events: abi.events().map(|e| Arc::new(EventAbi::from(e))).collect(),
            errors: abi.errors().map(|e| Arc::new(ErrorAbi::from(e))).collect(),
            constructor: abi.constructor.as_ref().map(ConstructorAbi::from),
        }
    }
}

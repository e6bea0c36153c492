//! abidex: contract-ABI registry and signature resolution
//!
//! Takes raw on-chain data (transaction input bytes, an event log topic, or
//! a revert payload) and recovers the function/event/error definition that
//! produced it: per-contract when the `(chain_id, address)` identity is
//! known, globally when only raw data is available.
//!
//! ```
//! use abidex::AbiRepository;
//! use alloy_primitives::U256;
//!
//! let repo = AbiRepository::new();
//! repo.add_abi_with_identity(
//!     r#"[{"type":"function","name":"transfer",
//!          "inputs":[{"name":"to","type":"address"},{"name":"amount","type":"uint256"}],
//!          "outputs":[{"name":"","type":"bool"}],"stateMutability":"nonpayable"}]"#,
//!     Some("0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"),
//!     Some("Token"),
//!     None,
//!     Some(U256::from(1u64)),
//! )?;
//!
//! let calldata = format!("0xa9059cbb{}", "00".repeat(64));
//! let function = repo
//!     .find_function_by_input_data(
//!         U256::from(1u64),
//!         "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
//!         &calldata,
//!     )
//!     .expect("known selector");
//! assert_eq!(function.name, "transfer");
//! # Ok::<(), abidex::AbiError>(())
//! ```

pub mod config;
pub mod decoder;
pub mod error;
pub mod info;
pub mod model;
pub mod repository;
pub mod resolver;
pub mod scanner;
pub mod signature;
pub mod store;

pub use decoder::{AbiDecoder, DecodedArg, DecodedCall, DynAbiDecoder};
pub use error::AbiError;
pub use info::{AbiInfo, ChainId, CompilationMetadata};
pub use model::{ConstructorAbi, ContractAbi, ErrorAbi, EventAbi, FunctionAbi, Parameter};
pub use repository::AbiRepository;
pub use resolver::AbiResolver;
pub use scanner::{AbiScanner, ScanReport};
pub use store::AbiStore;

//! End-to-end flow over the public API
//!
//! Builds a repository the way an application would: hydrate from a
//! persistent store, sweep an artifact tree, register a remote-shaped ABI,
//! then resolve functions and events from raw data.

use std::fs;
use std::path::PathBuf;

use alloy_primitives::U256;

use abidex::{AbiDecoder, AbiRepository, AbiScanner, AbiStore, DynAbiDecoder};

const ERC20_ABI: &str = r#"[
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
        "type": "function",
        "name": "balanceOf",
        "inputs": [{"name": "account", "type": "address"}],
        "outputs": [{"name": "", "type": "uint256"}],
        "stateMutability": "view"
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
    }
]"#;

const WETH_ABI: &str = r#"[
    {
        "type": "function",
        "name": "deposit",
        "inputs": [],
        "outputs": [],
        "stateMutability": "payable"
    }
]"#;

const TOKEN_ADDRESS: &str = "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
const WETH_ADDRESS: &str = "0xC02AAA39B223FE8D0A0E5C4F27EAD9083C756CC2";

fn temp_path(tag: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("abidex_it_{}_{}", tag, std::process::id()));
    path
}

#[test]
fn test_full_registry_flow() {
    // A persistent store holding one previously-resolved contract.
    let db_path = temp_path("flow.db");
    let store = AbiStore::open(&db_path).unwrap();
    store
        .save_abi(U256::from(1u64), WETH_ADDRESS, WETH_ABI, Some("WETH9"))
        .unwrap();

    // An artifact tree as a build tool would leave it.
    let project = temp_path("project");
    let out = project.join("out").join("Token.sol");
    fs::create_dir_all(&out).unwrap();
    fs::write(
        out.join("Token.json"),
        format!(r#"{{"abi": {ERC20_ABI}}}"#),
    )
    .unwrap();

    let repository = AbiRepository::new();
    assert_eq!(store.load_into(&repository).unwrap(), 1);
    let report = AbiScanner::scan(&project, &repository);
    assert_eq!(report.loaded_contracts, 1);

    // A remote-shaped registration binds the scanned ABI to a deployment.
    repository
        .add_abi_with_identity(ERC20_ABI, Some(TOKEN_ADDRESS), Some("Token"), None, Some(U256::from(1u64)))
        .unwrap();

    // Contract-scoped resolution from raw calldata, case-insensitive
    // address, mixed-case data prefix.
    let calldata = format!(
        "0xa9059cbb000000000000000000000000{}{:064x}",
        "1111111111111111111111111111111111111111", 1000
    );
    let function = repository
        .find_function_by_input_data(U256::from(1u64), &TOKEN_ADDRESS.to_lowercase(), &calldata)
        .expect("transfer should resolve");
    assert_eq!(function.name, "transfer");

    // Hand the resolved member to the decoder collaborator.
    let bytes = hex::decode(calldata.trim_start_matches("0x")).unwrap();
    let decoded = DynAbiDecoder::new().decode_call(&function, &bytes).unwrap();
    assert_eq!(decoded.arguments[1].value, "1000");

    // The hydrated contract resolves too.
    let deposit_selector = hex::encode(abidex::signature::selector("deposit", []));
    assert!(repository
        .find_function(U256::from(1u64), WETH_ADDRESS, &deposit_selector)
        .is_some());

    // Global resolution: the scanned (identity-less) Token artifact and the
    // identity-bound registration collapsed into one entry per signature.
    assert_eq!(repository.functions_for_signature("0xa9059cbb").len(), 1);
    let topics = repository.events_for_signature(
        "0xDDF252AD1BE2C89B69C2B068FC378DAA952BA7F163C4A11628F55A4DF523B3EF",
    );
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0].indexed_count(), 2);

    // Unknown data stays a soft miss.
    assert!(repository.functions_for_input_data("0xdeadbeef").is_empty());
    assert!(repository.functions_for_input_data("0x12").is_empty());
    assert!(repository
        .get_abi_info(U256::from(5u64), TOKEN_ADDRESS)
        .is_none());

    fs::remove_file(&db_path).ok();
    fs::remove_dir_all(&project).ok();
}

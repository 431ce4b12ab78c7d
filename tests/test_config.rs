//! Loading bridge configuration from TOML files.

extern crate lua_bridge;

use std::io::Write;
use std::rc::Rc;

use lua_bridge::{Bridge, BridgeConfig, BridgeError, LuaEmulator};
use tempfile::NamedTempFile;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_full_config() {
    let file = config_file(
        r#"
store_name = "__my_store"
unique_store_name = false

[executor]
program = "/usr/local/bin/hs"
args = ["-q", "-c"]
"#,
    );
    let config = BridgeConfig::load(file.path()).unwrap();
    assert_eq!(config.store_name, "__my_store");
    assert_eq!(config.executor.program, "/usr/local/bin/hs");
    assert_eq!(config.executor.args, vec!["-q", "-c"]);
}

#[test]
fn test_partial_config_uses_defaults() {
    let file = config_file("[executor]\nprogram = \"hs\"\n");
    let config = BridgeConfig::load(file.path()).unwrap();
    assert_eq!(config.store_name, "__rust_bridge_storage");
    assert_eq!(config.executor.args, vec!["-c"]);
    assert!(!config.unique_store_name);
}

#[test]
fn test_bridge_uses_configured_store_name() {
    let config = BridgeConfig::parse("store_name = \"__my_store\"").unwrap();
    let emulator = Rc::new(LuaEmulator::new());
    let bridge = Bridge::with_config(Rc::clone(&emulator), &config).unwrap();
    let accessor = bridge
        .scope(|scope| Ok(scope.execute("1")?.accessor()))
        .unwrap();
    assert_eq!(accessor, "__my_store[1]");
    assert_eq!(emulator.history()[0], "__my_store = {}");
}

#[test]
fn test_unique_store_name() {
    let config = BridgeConfig::parse("unique_store_name = true").unwrap();
    let emulator = Rc::new(LuaEmulator::new());
    let first = Bridge::with_config(Rc::clone(&emulator), &config).unwrap();
    let second = Bridge::with_config(Rc::clone(&emulator), &config).unwrap();
    assert_ne!(first.store_name(), second.store_name());
    assert!(first.store_name().starts_with("__rust_bridge_storage_"));
    assert_eq!(emulator.history()[0], format!("{} = {{}}", first.store_name()));
}

#[test]
fn test_invalid_config_files() {
    let file = config_file("store_name = 12");
    assert!(matches!(
        BridgeConfig::load(file.path()),
        Err(BridgeError::Config(_))
    ));

    let file = config_file("store_name = \"has-dash\"");
    assert!(matches!(
        BridgeConfig::load(file.path()),
        Err(BridgeError::Config(_))
    ));

    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        BridgeConfig::load(dir.path().join("missing.toml")),
        Err(BridgeError::Io(_))
    ));
}

#[test]
fn test_unreachable_program_fails_on_initialize() {
    let config = BridgeConfig::parse("[executor]\nprogram = \"/nonexistent/lua-bridge/hs\"").unwrap();
    match Bridge::from_config(&config) {
        Err(BridgeError::RemoteExecution { fragment, .. }) => {
            assert_eq!(fragment, "__rust_bridge_storage = {}")
        }
        Err(other) => panic!("unexpected {:?}", other),
        Ok(_) => panic!("bridge should not initialize"),
    }
}

#![allow(dead_code)]

use apppolicy_core::pack::SigningKey;
use apppolicy_core::PackBuilder;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;

pub const PUBLISHER_SEED: [u8; 32] = [0x42; 32];
pub const STRANGER_SEED: [u8; 32] = [0x07; 32];

/// The binary under test, isolated from the caller's trust configuration.
pub fn apppolicy() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_apppolicy"));
    cmd.env_remove("APPPOLICY_PUBKEY_HEX").env("RUST_LOG", "warn");
    cmd
}

pub fn write(root: &Path, rel: &str, contents: &str) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}

pub fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

pub fn public_key_hex(seed: [u8; 32]) -> String {
    hex::encode(SigningKey::from_bytes(&seed).verifying_key().as_bytes())
}

pub const RULES_YAML: &str = r#"
version: community-2025.10
rules:
  - id: android.target_sdk.minimum
    platform: android
    severity: blocking
    when:
      all:
        - android.targetsdk.lt_policy_min: 34
    then:
      policy_min: 34
      remediation:
        - Raise targetSdk to 34
    because:
      url: https://developer.android.com/google/play/requirements/target-sdk
  - id: android.permissions.sms
    platform: android
    severity: advisory
    when:
      android.permission.declared: android.permission.READ_SMS
"#;

pub fn pack_rules() -> Vec<Value> {
    vec![serde_json::json!({
        "id": "android.target_sdk.minimum",
        "platform": "android",
        "severity": "blocking",
        "when": {"android.targetsdk.lt_policy_min": 34},
        "then": {"policy_min": 34}
    })]
}

pub fn write_signed_pack(dir: &Path, seed: [u8; 32]) -> PathBuf {
    let bytes = PackBuilder::new(pack_rules())
        .version("pro-2025.10")
        .build(&SigningKey::from_bytes(&seed))
        .unwrap();
    let path = dir.join("pro.tar.gz");
    std::fs::write(&path, bytes).unwrap();
    path
}

pub fn write_android_facts(dir: &Path, targetsdk: i64) -> PathBuf {
    write(
        dir,
        "android.json",
        &serde_json::json!({
            "platform": "android",
            "permissions": ["android.permission.INTERNET"],
            "targetsdk": targetsdk,
            "signals": {"symbols": [], "sdk_names": []}
        })
        .to_string(),
    )
}

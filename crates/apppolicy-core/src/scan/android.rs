//! Android project scanner.

use super::{extension, file_name, project_files, read_text};
use crate::error::PolicyResult;
use crate::facts::FactDocument;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;
use std::collections::BTreeSet;
use std::path::Path;

/// Source-level API symbols reported in `signals.symbols`.
pub const ANDROID_SYMBOLS: &[&str] = &[
    "AdvertisingIdClient",
    "AppSetIdClient",
    "BiometricPrompt",
    "BluetoothAdapter",
    "CameraManager",
    "ClipboardManager",
    "ContactsContract",
    "FusedLocationProviderClient",
    "LocationManager",
    "MediaRecorder",
    "PackageManager",
    "TelephonyManager",
    "WifiManager",
];

const SOURCE_EXTENSIONS: &[&str] = &["kt", "java"];

lazy_static! {
    /// `<uses-permission android:name="...">`, including the `-sdk-23` variant.
    static ref USES_PERMISSION: Regex = Regex::new(
        r#"(?s)<uses-permission(?:-sdk-23)?\b[^>]*?android:name\s*=\s*"([^"]+)""#
    )
    .unwrap();
    /// `targetSdk 34`, `targetSdkVersion = 34`, `targetSdk(34)`.
    static ref GRADLE_TARGET_SDK: Regex =
        Regex::new(r"\btargetSdk(?:Version)?\s*(?:=\s*|\(\s*|\s+)(\d+)").unwrap();
    static ref MANIFEST_TARGET_SDK: Regex =
        Regex::new(r#"android:targetSdkVersion\s*=\s*"(\d+)""#).unwrap();
    /// `implementation "group:artifact:version"` and the Kotlin DSL form.
    static ref GRADLE_DEPENDENCY: Regex = Regex::new(
        r#"\b(?:implementation|api|compileOnly|runtimeOnly|kapt|ksp)\s*\(?\s*["']([\w.\-]+):([\w.\-]+)(?::[^"']*)?["']"#
    )
    .unwrap();
    static ref SYMBOL: Regex = Regex::new(&format!(
        r"\b(?:{})\b",
        ANDROID_SYMBOLS
            .iter()
            .map(|s| regex::escape(s))
            .collect::<Vec<_>>()
            .join("|")
    ))
    .unwrap();
}

#[derive(Debug, Default)]
struct AndroidFacts {
    permissions: BTreeSet<String>,
    targetsdk: Option<i64>,
    symbols: BTreeSet<String>,
    sdk_names: BTreeSet<String>,
}

impl AndroidFacts {
    fn observe_target_sdk(&mut self, sdk: i64) {
        self.targetsdk = Some(self.targetsdk.map_or(sdk, |seen| seen.max(sdk)));
    }

    fn into_value(self) -> serde_json::Value {
        let mut doc = json!({
            "platform": "android",
            "permissions": self.permissions,
            "signals": {
                "symbols": self.symbols,
                "sdk_names": self.sdk_names,
            },
        });
        if let Some(sdk) = self.targetsdk {
            doc["targetsdk"] = sdk.into();
        }
        doc
    }
}

fn is_gradle_build_file(name: &str) -> bool {
    name == "build.gradle" || name == "build.gradle.kts"
}

/// Scan an Android project directory.
pub fn scan_android(root: &Path) -> PolicyResult<FactDocument> {
    let mut facts = AndroidFacts::default();

    for path in project_files(root)? {
        let name = file_name(&path);

        if name == "AndroidManifest.xml" {
            let Some(text) = read_text(&path) else {
                continue;
            };
            facts.permissions.extend(
                USES_PERMISSION
                    .captures_iter(&text)
                    .filter_map(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string()),
            );
            for sdk in captured_integers(&MANIFEST_TARGET_SDK, &text) {
                facts.observe_target_sdk(sdk);
            }
        } else if is_gradle_build_file(name) {
            let Some(text) = read_text(&path) else {
                continue;
            };
            for sdk in captured_integers(&GRADLE_TARGET_SDK, &text) {
                facts.observe_target_sdk(sdk);
            }
            facts
                .sdk_names
                .extend(GRADLE_DEPENDENCY.captures_iter(&text).filter_map(|caps| {
                    Some(format!("{}:{}", caps.get(1)?.as_str(), caps.get(2)?.as_str()))
                }));
        } else if SOURCE_EXTENSIONS.contains(&extension(&path)) {
            if let Some(text) = read_text(&path) {
                facts
                    .symbols
                    .extend(SYMBOL.find_iter(&text).map(|m| m.as_str().to_string()));
            }
        }
    }

    tracing::info!(
        project = %root.display(),
        permissions = facts.permissions.len(),
        targetsdk = ?facts.targetsdk,
        sdks = facts.sdk_names.len(),
        "scanned Android project"
    );
    FactDocument::from_value(facts.into_value(), &root.display().to_string())
}

fn captured_integers<'a>(re: &'a Regex, text: &'a str) -> impl Iterator<Item = i64> + 'a {
    re.captures_iter(text)
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradle_target_sdk_forms() {
        let groovy = "android {\n  defaultConfig {\n    targetSdkVersion 33\n  }\n}";
        let kts = "android { defaultConfig { targetSdk = 34 } }";
        let call = "targetSdk(31)";
        assert_eq!(captured_integers(&GRADLE_TARGET_SDK, groovy).collect::<Vec<_>>(), [33]);
        assert_eq!(captured_integers(&GRADLE_TARGET_SDK, kts).collect::<Vec<_>>(), [34]);
        assert_eq!(captured_integers(&GRADLE_TARGET_SDK, call).collect::<Vec<_>>(), [31]);
        assert_eq!(
            captured_integers(&GRADLE_TARGET_SDK, "targetSdk = libs.versions.target")
                .count(),
            0
        );
    }

    #[test]
    fn gradle_dependencies() {
        let text = r#"
dependencies {
    implementation "com.google.firebase:firebase-analytics:21.5.0"
    implementation("com.squareup.retrofit2:retrofit:2.9.0")
    testImplementation "junit:junit:4.13.2"
    kapt 'com.google.dagger:hilt-compiler:2.48'
}"#;
        let names: Vec<_> = GRADLE_DEPENDENCY
            .captures_iter(text)
            .map(|c| format!("{}:{}", &c[1], &c[2]))
            .collect();
        assert_eq!(
            names,
            [
                "com.google.firebase:firebase-analytics",
                "com.squareup.retrofit2:retrofit",
                "com.google.dagger:hilt-compiler"
            ]
        );
    }

    #[test]
    fn manifest_permissions_span_lines() {
        let manifest = r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android">
    <uses-permission
        android:name="android.permission.CAMERA" />
    <uses-permission-sdk-23 android:name="android.permission.READ_CONTACTS"/>
    <uses-feature android:name="android.hardware.camera" />
</manifest>"#;
        let found: Vec<_> = USES_PERMISSION
            .captures_iter(manifest)
            .map(|c| c[1].to_string())
            .collect();
        assert_eq!(
            found,
            ["android.permission.CAMERA", "android.permission.READ_CONTACTS"]
        );
    }

    #[test]
    fn target_sdk_keeps_maximum() {
        let mut facts = AndroidFacts::default();
        facts.observe_target_sdk(30);
        facts.observe_target_sdk(34);
        facts.observe_target_sdk(33);
        assert_eq!(facts.targetsdk, Some(34));
    }
}

//! iOS project scanner.

use super::{extension, file_name, plist, project_files, read_text};
use crate::error::PolicyResult;
use crate::facts::FactDocument;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Source-level API symbols reported in `signals.symbols`: required-reason APIs and
/// APIs guarded by a usage description or entitlement.
pub const IOS_SYMBOLS: &[&str] = &[
    // Required-reason APIs
    "UserDefaults",
    "NSUserDefaults",
    "systemUptime",
    "mach_absolute_time",
    "creationDate",
    "modificationDate",
    "NSFileCreationDate",
    "NSFileModificationDate",
    "getattrlist",
    "volumeAvailableCapacityKey",
    "volumeAvailableCapacityForImportantUsageKey",
    "NSFileSystemFreeSize",
    "statfs",
    "activeInputModes",
    // Sensitive data and hardware
    "UIPasteboard",
    "AVCaptureDevice",
    "AVAudioSession",
    "CLLocationManager",
    "PHPhotoLibrary",
    "PHPickerViewController",
    "CNContactStore",
    "EKEventStore",
    "CMMotionManager",
    "HKHealthStore",
    "CBCentralManager",
    "LAContext",
    "SFSpeechRecognizer",
    "NFCNDEFReaderSession",
    "ASIdentifierManager",
    "ATTrackingManager",
    "UNUserNotificationCenter",
    // Authentication
    "ASAuthorizationAppleIDProvider",
    "SignInWithAppleButton",
    "ASWebAuthenticationSession",
];

/// Symbols that indicate Sign in with Apple.
const SIGN_IN_WITH_APPLE_SYMBOLS: &[&str] = &["ASAuthorizationAppleIDProvider", "SignInWithAppleButton"];
const SIGN_IN_WITH_APPLE_ENTITLEMENT: &str = "com.apple.developer.applesignin";

const SOURCE_EXTENSIONS: &[&str] = &["swift", "m", "mm", "h"];
const PRIVACY_CATEGORY_PREFIX: &str = "NSPrivacyAccessedAPICategory";

lazy_static! {
    static ref SYMBOL: Regex = Regex::new(&format!(
        r"\b(?:{})\b",
        IOS_SYMBOLS
            .iter()
            .map(|s| regex::escape(s))
            .collect::<Vec<_>>()
            .join("|")
    ))
    .unwrap();
    /// `pod 'Name'` or `pod "Name/Subspec"`.
    static ref POD: Regex = Regex::new(r#"(?m)^\s*pod\s+['"]([^'"/]+)"#).unwrap();
}

#[derive(Debug, Default)]
struct PrivacyManifest {
    reasons: BTreeMap<String, BTreeSet<String>>,
    tracking: Option<bool>,
}

#[derive(Debug, Default)]
struct IosFacts {
    plist_keys: BTreeSet<String>,
    entitlements: BTreeSet<String>,
    privacy: Option<PrivacyManifest>,
    symbols: BTreeSet<String>,
    sdk_names: BTreeSet<String>,
}

impl IosFacts {
    fn auth_present(&self) -> bool {
        self.entitlements.contains(SIGN_IN_WITH_APPLE_ENTITLEMENT)
            || SIGN_IN_WITH_APPLE_SYMBOLS
                .iter()
                .any(|s| self.symbols.contains(*s))
    }

    fn into_value(self) -> Value {
        let auth_present = self.auth_present();
        let entitlements: Map<String, Value> = self
            .entitlements
            .into_iter()
            .map(|k| (k, Value::Bool(true)))
            .collect();

        let mut doc = json!({
            "platform": "ios",
            "plist_keys": self.plist_keys,
            "entitlements": entitlements,
            "signals": {
                "symbols": self.symbols,
                "sdk_names": self.sdk_names,
                "auth_present": auth_present,
            },
        });

        if let Some(privacy) = self.privacy {
            let mut manifest = json!({ "reasons": privacy.reasons });
            if let Some(tracking) = privacy.tracking {
                manifest["tracking"] = Value::Bool(tracking);
            }
            doc["privacy_manifest"] = manifest;
        }
        doc
    }
}

/// Scan an iOS project directory.
pub fn scan_ios(root: &Path) -> PolicyResult<FactDocument> {
    let mut facts = IosFacts::default();

    for path in project_files(root)? {
        let name = file_name(&path);
        let ext = extension(&path);

        if name == "Info.plist" {
            if let Some(dict) = read_plist_dict(&path) {
                facts.plist_keys.extend(dict.keys().cloned());
            }
        } else if ext == "entitlements" {
            if let Some(dict) = read_plist_dict(&path) {
                facts.entitlements.extend(dict.keys().cloned());
            }
        } else if name == "PrivacyInfo.xcprivacy" {
            if let Some(dict) = read_plist_dict(&path) {
                merge_privacy_manifest(facts.privacy.get_or_insert_with(Default::default), &dict);
            }
        } else if SOURCE_EXTENSIONS.contains(&ext) {
            if let Some(text) = read_text(&path) {
                facts.symbols.extend(
                    SYMBOL
                        .find_iter(&text)
                        .map(|m| m.as_str().to_string()),
                );
            }
        } else if name == "Podfile" {
            if let Some(text) = read_text(&path) {
                facts.sdk_names.extend(pods(&text));
            }
        } else if name == "Package.resolved" {
            if let Some(text) = read_text(&path) {
                facts.sdk_names.extend(swift_packages(&text));
            }
        }
    }

    tracing::info!(
        project = %root.display(),
        plist_keys = facts.plist_keys.len(),
        symbols = facts.symbols.len(),
        sdks = facts.sdk_names.len(),
        privacy_manifest = facts.privacy.is_some(),
        "scanned iOS project"
    );
    FactDocument::from_value(facts.into_value(), &root.display().to_string())
}

fn read_plist_dict(path: &Path) -> Option<Map<String, Value>> {
    let text = read_text(path)?;
    let dict = plist::parse_dict(&text);
    if dict.is_none() {
        tracing::warn!(path = %path.display(), "skipping unreadable property list");
    }
    dict
}

fn merge_privacy_manifest(manifest: &mut PrivacyManifest, dict: &Map<String, Value>) {
    if let Some(tracking) = dict.get("NSPrivacyTracking").and_then(Value::as_bool) {
        manifest.tracking = Some(manifest.tracking.unwrap_or(false) || tracking);
    }

    let Some(types) = dict.get("NSPrivacyAccessedAPITypes").and_then(Value::as_array) else {
        return;
    };
    for entry in types {
        let Some(category) = entry.get("NSPrivacyAccessedAPIType").and_then(Value::as_str) else {
            continue;
        };
        let codes = manifest.reasons.entry(privacy_category(category)).or_default();
        if let Some(reasons) = entry
            .get("NSPrivacyAccessedAPITypeReasons")
            .and_then(Value::as_array)
        {
            codes.extend(reasons.iter().filter_map(Value::as_str).map(str::to_string));
        }
    }
}

/// `NSPrivacyAccessedAPICategoryUserDefaults` → `user_defaults`.
pub fn privacy_category(api_type: &str) -> String {
    snake_case(api_type.strip_prefix(PRIVACY_CATEGORY_PREFIX).unwrap_or(api_type))
}

fn snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower) {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }
    out
}

fn pods(podfile: &str) -> impl Iterator<Item = String> + '_ {
    POD.captures_iter(podfile)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Package identities from a SwiftPM `Package.resolved` (format v1, v2 or v3).
fn swift_packages(resolved: &str) -> Vec<String> {
    let Ok(value) = serde_json::from_str::<Value>(resolved) else {
        tracing::warn!("skipping malformed Package.resolved");
        return Vec::new();
    };
    let pins = value
        .get("pins")
        .or_else(|| value.get("object").and_then(|o| o.get("pins")))
        .and_then(Value::as_array);
    pins.into_iter()
        .flatten()
        .filter_map(|pin| {
            pin.get("identity")
                .or_else(|| pin.get("package"))
                .and_then(Value::as_str)
        })
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privacy_categories_are_snake_case() {
        assert_eq!(
            privacy_category("NSPrivacyAccessedAPICategoryUserDefaults"),
            "user_defaults"
        );
        assert_eq!(
            privacy_category("NSPrivacyAccessedAPICategorySystemBootTime"),
            "system_boot_time"
        );
        assert_eq!(snake_case("DiskSpace"), "disk_space");
        assert_eq!(snake_case("URLSession"), "url_session");
    }

    #[test]
    fn podfile_names_drop_subspecs() {
        let podfile = "platform :ios, '15.0'\ntarget 'App' do\n  pod 'Firebase/Analytics'\n  pod \"GoogleSignIn\", '~> 7.0'\n  # pod 'Commented'\nend\n";
        let names: Vec<_> = pods(podfile).collect();
        assert_eq!(names, ["Firebase", "GoogleSignIn"]);
    }

    #[test]
    fn package_resolved_versions() {
        let v2 = r#"{"pins":[{"identity":"alamofire","location":"x"}],"version":2}"#;
        assert_eq!(swift_packages(v2), ["alamofire"]);
        let v1 = r#"{"object":{"pins":[{"package":"Kingfisher"}]},"version":1}"#;
        assert_eq!(swift_packages(v1), ["Kingfisher"]);
        assert!(swift_packages("not json").is_empty());
    }

    #[test]
    fn symbols_match_whole_words() {
        let found: Vec<_> = SYMBOL
            .find_iter("let p = UIPasteboard.general; MyUIPasteboardWrapper(); UserDefaultsX")
            .map(|m| m.as_str())
            .collect();
        assert_eq!(found, ["UIPasteboard"]);
    }
}

//! US privacy string handling
//!
//! The privacy string is four characters: a version digit followed by
//! three Y/N/- signals (notice given, opt-out of sale, LSPA). Only
//! version 1 strings are accepted; anything else is rejected without
//! touching the stored value.

use std::sync::OnceLock;

use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};

use beacon_store::{KeyValueStoreExt, SharedStore, StoreOptions};

/// Store key for the raw privacy string.
pub const USPRIVACY_KEY: &str = "usprivacy";
/// Store key for the JSON privacy record.
pub const USP_DATA_KEY: &str = "uspData";

/// The JSON record persisted alongside the raw string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UspData {
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usp_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uspapi_loaded: Option<bool>,
}

fn valid_usp(candidate: &str) -> bool {
    static USP_RE: OnceLock<Regex> = OnceLock::new();
    let re = USP_RE.get_or_init(|| Regex::new(r"^1[nNyY-]{3}$").unwrap());
    re.is_match(candidate)
}

struct UspState {
    version: u32,
    base_string: Option<String>,
}

/// Validated, store-backed holder of the current privacy string.
pub struct UsPrivacyString {
    store: SharedStore,
    options: StoreOptions,
    state: RwLock<UspState>,
}

impl UsPrivacyString {
    /// An empty holder; no string until the first accepted `set`.
    pub fn new(store: SharedStore, options: StoreOptions) -> Self {
        Self {
            store,
            options,
            state: RwLock::new(UspState {
                version: 1,
                base_string: None,
            }),
        }
    }

    /// The current string, if one has been accepted.
    pub fn get(&self) -> Option<String> {
        self.state.read().base_string.clone()
    }

    /// The version digit of the current string.
    pub fn version(&self) -> u32 {
        self.state.read().version
    }

    /// Accept and persist a candidate string. Returns whether the
    /// candidate was valid; an invalid candidate leaves state and store
    /// untouched.
    pub fn set(&self, candidate: &str) -> bool {
        if !valid_usp(candidate) {
            return false;
        }

        let version = candidate[..1].parse().unwrap_or(1);
        {
            let mut state = self.state.write();
            state.base_string = Some(candidate.to_string());
            state.version = version;
        }

        self.store.set(USPRIVACY_KEY, candidate, &self.options);
        self.store.set_json(
            USP_DATA_KEY,
            &UspData {
                version,
                usp_string: Some(candidate.to_string()),
                uspapi_loaded: None,
            },
        );
        true
    }

    /// The current state as a [`UspData`] record.
    pub fn data(&self) -> UspData {
        let state = self.state.read();
        UspData {
            version: state.version,
            usp_string: state.base_string.clone(),
            uspapi_loaded: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use beacon_store::{KeyValueStore, MemoryStore};

    use super::*;

    fn holder() -> (UsPrivacyString, MemoryStore) {
        let store = MemoryStore::new();
        let usp = UsPrivacyString::new(Arc::new(store.clone()), StoreOptions::default());
        (usp, store)
    }

    #[test]
    fn test_valid_string_accepted_and_persisted() {
        let (usp, store) = holder();
        assert!(usp.set("1YNN"));
        assert_eq!(usp.get(), Some("1YNN".to_string()));
        assert_eq!(store.get(USPRIVACY_KEY), Some("1YNN".to_string()));

        let data: UspData = store.get_json(USP_DATA_KEY).unwrap();
        assert_eq!(data.version, 1);
        assert_eq!(data.usp_string, Some("1YNN".to_string()));
    }

    #[test]
    fn test_lowercase_and_dash_signals_accepted() {
        let (usp, _) = holder();
        assert!(usp.set("1---"));
        assert!(usp.set("1yny"));
    }

    #[test]
    fn test_wrong_version_rejected() {
        let (usp, store) = holder();
        assert!(!usp.set("2YNN"));
        assert_eq!(usp.get(), None);
        assert_eq!(store.get(USPRIVACY_KEY), None);
    }

    #[test]
    fn test_malformed_strings_rejected() {
        let (usp, _) = holder();
        assert!(!usp.set(""));
        assert!(!usp.set("1YN"));
        assert!(!usp.set("1YNNN"));
        assert!(!usp.set("1YXN"));
    }

    #[test]
    fn test_rejected_candidate_leaves_previous_value() {
        let (usp, _) = holder();
        usp.set("1YNN");
        assert!(!usp.set("bogus"));
        assert_eq!(usp.get(), Some("1YNN".to_string()));
    }
}

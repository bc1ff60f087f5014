//! Third-party identifier lookup
//!
//! Each getter knows where its vendor parks the identifier and the
//! precedence between the candidate locations. All reads go through the
//! key-value store; a missing or unreadable value is simply absent.

use serde_json::Value;

use beacon_store::KeyValueStore;

/// Vendor cookie holding the Adobe ECID directly.
const ECID_PRIMARY_KEY: &str = "s_ecid";
/// Legacy Adobe visitor cookie, second in precedence.
const ECID_FALLBACK_KEY: &str = "s_vi";
/// Adobe AMCV cookie, parsed as a last resort.
const AMCV_KEY: &str = "AMCV_000000000000000000000000@ExampleOrg";

/// Krux identifier key, same name in local storage and cookies.
const KRUX_KEY: &str = "kxkuid";

/// Conviva config keys, tried in order.
const CONVIVA_KEYS: [&str; 2] = ["Conviva/sdkConfig", "Conviva.sdkConfig"];

/// LiveRamp ATS token cookie.
pub const LIVERAMP_KEY: &str = "tok_lr";
/// TradeDesk identifier cookie.
pub const TRADEDESK_KEY: &str = "tok_ttuid";

/// The Adobe ECID: `s_ecid` first, then `s_vi`, then the `MCMID` entry
/// of the AMCV cookie.
pub fn get_ecid(store: &dyn KeyValueStore) -> Option<String> {
    store
        .get(ECID_PRIMARY_KEY)
        .filter(|v| !v.is_empty())
        .or_else(|| store.get(ECID_FALLBACK_KEY).filter(|v| !v.is_empty()))
        .or_else(|| amcv_field(store, "MCMID"))
}

/// The Krux identifier.
pub fn get_krux_id(store: &dyn KeyValueStore) -> Option<String> {
    store.get(KRUX_KEY).filter(|v| !v.is_empty())
}

/// The Conviva client id, parsed out of whichever config key is
/// present.
pub fn get_conviva_id(store: &dyn KeyValueStore) -> Option<String> {
    for key in CONVIVA_KEYS {
        if let Some(raw) = store.get(key) {
            if let Ok(Value::Object(config)) = serde_json::from_str::<Value>(&raw) {
                if let Some(Value::String(client_id)) = config.get("clId") {
                    return Some(client_id.clone());
                }
            }
        }
    }
    None
}

/// One field of the AMCV cookie, which stores ids as
/// `key1|value1|key2|value2`.
fn amcv_field(store: &dyn KeyValueStore, field: &str) -> Option<String> {
    let raw = store.get(AMCV_KEY)?;
    let parts: Vec<&str> = raw.split('|').collect();
    let index = parts.iter().position(|part| *part == field)?;
    parts.get(index + 1).map(|value| value.to_string())
}

#[cfg(test)]
mod tests {
    use beacon_store::{MemoryStore, StoreOptions};

    use super::*;

    #[test]
    fn test_ecid_precedence() {
        let store = MemoryStore::new();
        let options = StoreOptions::default();

        store.set(AMCV_KEY, "MCMID|amcv-id|other|x", &options);
        assert_eq!(get_ecid(&store), Some("amcv-id".to_string()));

        store.set(ECID_FALLBACK_KEY, "legacy-id", &options);
        assert_eq!(get_ecid(&store), Some("legacy-id".to_string()));

        store.set(ECID_PRIMARY_KEY, "primary-id", &options);
        assert_eq!(get_ecid(&store), Some("primary-id".to_string()));
    }

    #[test]
    fn test_amcv_without_field_reads_absent() {
        let store = MemoryStore::new();
        store.set(AMCV_KEY, "OTHER|x", &StoreOptions::default());
        assert_eq!(get_ecid(&store), None);
    }

    #[test]
    fn test_conviva_id_parses_config_json() {
        let store = MemoryStore::new();
        store.set(
            "Conviva.sdkConfig",
            r#"{"clId":"conviva-1"}"#,
            &StoreOptions::default(),
        );
        assert_eq!(get_conviva_id(&store), Some("conviva-1".to_string()));
    }

    #[test]
    fn test_conviva_id_first_key_wins() {
        let store = MemoryStore::new();
        let options = StoreOptions::default();
        store.set("Conviva/sdkConfig", r#"{"clId":"slash"}"#, &options);
        store.set("Conviva.sdkConfig", r#"{"clId":"dot"}"#, &options);
        assert_eq!(get_conviva_id(&store), Some("slash".to_string()));
    }

    #[test]
    fn test_conviva_malformed_config_reads_absent() {
        let store = MemoryStore::new();
        store.set("Conviva/sdkConfig", "not json", &StoreOptions::default());
        assert_eq!(get_conviva_id(&store), None);
    }

    #[test]
    fn test_krux_id() {
        let store = MemoryStore::new();
        assert_eq!(get_krux_id(&store), None);
        store.set(KRUX_KEY, "krux-1", &StoreOptions::default());
        assert_eq!(get_krux_id(&store), Some("krux-1".to_string()));
    }
}

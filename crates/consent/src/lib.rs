//! Consent state
//!
//! Tracks the visitor's privacy signals: the US privacy string under
//! CCPA-style rules, and TCF purpose grants elsewhere. The jurisdiction
//! rule derives from the resolved country code and drives both which
//! signal applies and whether the SDK loads at all.

mod framework;
mod usp;

pub use framework::{check_outside_us, ConsentFramework, OutsideUsCheck};
pub use usp::{UsPrivacyString, UspData, USPRIVACY_KEY, USP_DATA_KEY};

use beacon_store::{SharedStore, StoreOptions};
use tracing::debug;

/// Country codes governed by CCPA-style rules. The empty string covers
/// an unresolved location, which is treated as US.
pub const CCPA_LOCATIONS: [&str; 5] = ["US", "PR", "VI", "UM", ""];

/// Whether a country code falls under CCPA-style rules.
pub fn is_ccpa_location(country_code: &str) -> bool {
    CCPA_LOCATIONS.contains(&country_code)
}

/// The jurisdiction rule applied to this visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsentRule {
    /// CCPA-style territory
    Us,
    /// GDPR territory
    Gdpr,
    /// Not yet determined
    #[default]
    Other,
}

impl ConsentRule {
    /// Derive the rule from a resolved country code.
    #[must_use]
    pub fn for_country(country_code: &str) -> Self {
        if is_ccpa_location(country_code) {
            Self::Us
        } else {
            Self::Gdpr
        }
    }

    /// Wire name of the rule.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Us => "US",
            Self::Gdpr => "GDPR",
            Self::Other => "Other",
        }
    }
}

/// Store-backed consent state for one visitor.
pub struct ConsentManager {
    enabled: bool,
    country_code: String,
    usp: UsPrivacyString,
}

impl ConsentManager {
    /// Initialize consent state: adopt a stored privacy string when one
    /// is valid, otherwise seed the jurisdiction default ("1YNN" in CCPA
    /// territory, "1---" elsewhere). Disabled managers hold no string.
    pub fn init(
        enabled: bool,
        country_code: &str,
        store: SharedStore,
        options: StoreOptions,
    ) -> Self {
        let stored = store.get(USPRIVACY_KEY);
        let usp = UsPrivacyString::new(store, options);

        if enabled {
            match stored {
                Some(existing) if usp.set(&existing) => {
                    debug!(usp = %existing, "adopted stored privacy string");
                }
                _ => {
                    if is_ccpa_location(country_code) {
                        usp.set("1YNN");
                    } else {
                        usp.set("1---");
                    }
                }
            }
        }

        Self {
            enabled,
            country_code: country_code.to_string(),
            usp,
        }
    }

    /// Whether privacy handling is enabled.
    pub fn is_privacy_enabled(&self) -> bool {
        self.enabled
    }

    /// The current privacy string, if set.
    pub fn usp_string(&self) -> Option<String> {
        self.usp.get()
    }

    /// The current privacy record.
    pub fn usp_data(&self) -> UspData {
        self.usp.data()
    }

    /// Accept a caller-supplied privacy string. Returns whether it was
    /// valid.
    pub fn set_usp_string(&self, candidate: &str) -> bool {
        self.usp.set(candidate)
    }

    /// Record that the visitor permits data sharing. Only applies in
    /// CCPA territory; returns the resulting string.
    pub fn ccpa_share_data(&self) -> Option<String> {
        if is_ccpa_location(&self.country_code) {
            self.usp.set("1YNN");
        }
        self.usp.get()
    }

    /// Record that the visitor opted out of data sharing. Only applies
    /// in CCPA territory; returns the resulting string.
    pub fn ccpa_do_not_share(&self) -> Option<String> {
        if is_ccpa_location(&self.country_code) {
            self.usp.set("1YYN");
        }
        self.usp.get()
    }
}

//! TCF purpose checks for non-US jurisdictions
//!
//! Outside CCPA territory the SDK only loads when the consent framework
//! grants every purpose it relies on. The framework itself is a host
//! capability; absent a framework the check fails closed.

use std::collections::HashMap;

/// Combined purpose grants reported by a consent framework.
///
/// Keyed by IAB purpose id; a purpose is granted when either consent or
/// legitimate interest is established for it.
pub trait ConsentFramework: Send + Sync {
    /// Current grants, or `None` when the framework has no answer.
    fn combined_purpose_grants(&self) -> Option<HashMap<String, bool>>;
}

/// Outcome of [`check_outside_us`].
#[derive(Debug, Clone, PartialEq)]
pub struct OutsideUsCheck {
    /// Whether every required purpose is granted.
    pub should_load: bool,
    /// Per-category grant flags, in check order.
    pub categories: Vec<(String, bool)>,
}

impl OutsideUsCheck {
    fn denied() -> Self {
        Self {
            should_load: false,
            categories: Vec::new(),
        }
    }
}

/// The purposes required by default, as (purpose id, category name).
fn default_categories() -> Vec<(String, String)> {
    [
        ("1", "data-store"),
        ("3", "ads-person-prof"),
        ("5", "content-person-prof"),
        ("6", "consent-person"),
        ("8", "measure-content"),
        ("9", "measure-market"),
        ("10", "product-develop"),
    ]
    .into_iter()
    .map(|(id, name)| (id.to_string(), name.to_string()))
    .collect()
}

/// Check whether the SDK may load under a non-US consent rule.
///
/// `overrides` renames or extends the required purposes by id. With no
/// framework, or a framework without an answer, the check denies. When
/// the framework answers, the always-allowed special purposes and
/// features are appended to the category report.
pub fn check_outside_us(
    framework: Option<&dyn ConsentFramework>,
    overrides: &HashMap<String, String>,
) -> OutsideUsCheck {
    let Some(grants) = framework.and_then(ConsentFramework::combined_purpose_grants) else {
        return OutsideUsCheck::denied();
    };

    let mut required = default_categories();
    for (id, name) in overrides {
        match required.iter_mut().find(|(rid, _)| rid == id) {
            Some(entry) => entry.1 = name.clone(),
            None => required.push((id.clone(), name.clone())),
        }
    }

    let mut should_load = true;
    let mut categories = Vec::with_capacity(required.len() + 5);
    for (id, name) in required {
        let granted = grants.get(&id).copied().unwrap_or(false);
        if !granted {
            should_load = false;
        }
        categories.push((name, granted));
    }

    for always in [
        "special-purpose-1",
        "special-purpose-2",
        "feature-1",
        "feature-2",
        "feature-3",
    ] {
        categories.push((always.to_string(), true));
    }

    OutsideUsCheck {
        should_load,
        categories,
    }
}

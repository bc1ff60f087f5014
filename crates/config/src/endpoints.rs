//! Per-environment endpoint table
//!
//! Every network dependency of the SDK (geolocation, feature flags, event
//! collection, identity reconciliation, log shipping) resolves its URL
//! here. Deployments override the table; the defaults are empty so a
//! misconfigured service degrades instead of phoning an unintended host.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::environment::Environment;
use crate::error::{ConfigError, Result};

/// URL table keyed by environment for one service.
pub type ServiceUrls = HashMap<Environment, String>;

/// Endpoint table for all consumed services.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Geolocation lookup (GET, environment-independent)
    pub locate: Option<String>,
    /// Feature flag service (GET `{results: [...]}`)
    pub feature_flags: ServiceUrls,
    /// Event collection endpoint (POST, drained by the retry queue)
    pub identity: ServiceUrls,
    /// Identity reconciliation service (POST)
    pub id_resolve: ServiceUrls,
    /// Log shipping endpoint (POST, optional)
    pub logs: ServiceUrls,
}

impl Endpoints {
    /// Geolocation URL.
    pub fn locate(&self) -> Result<&str> {
        self.locate
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ConfigError::missing_endpoint("locate", "any"))
    }

    /// Feature flag URL for an environment.
    pub fn feature_flags(&self, env: Environment) -> Result<&str> {
        lookup(&self.feature_flags, env, "feature_flags")
    }

    /// Event collection URL for an environment.
    pub fn identity(&self, env: Environment) -> Result<&str> {
        lookup(&self.identity, env, "identity")
    }

    /// Identity reconciliation URL for an environment.
    pub fn id_resolve(&self, env: Environment) -> Result<&str> {
        lookup(&self.id_resolve, env, "id_resolve")
    }

    /// Log shipping URL for an environment.
    pub fn logs(&self, env: Environment) -> Result<&str> {
        lookup(&self.logs, env, "logs")
    }
}

fn lookup<'a>(urls: &'a ServiceUrls, env: Environment, service: &'static str) -> Result<&'a str> {
    urls.get(&env)
        .map(String::as_str)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ConfigError::missing_endpoint(service, env.as_str()))
}

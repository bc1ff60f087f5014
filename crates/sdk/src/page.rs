//! Page environment
//!
//! The host hands the SDK a snapshot of the page it runs in: where it
//! is, what it runs on, and what the embedding allows. The SDK never
//! reaches into the host itself; everything page-shaped flows through
//! this value.

use beacon_core::context::{Device, NavigationProperties};

/// A snapshot of the hosting page and device.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageEnvironment {
    /// Full page URL
    pub url: String,
    /// Referring URL
    pub referrer: String,
    /// Document title
    pub title: String,
    /// Browser user agent
    pub user_agent: String,
    /// Host platform (navigator.platform equivalent)
    pub platform: String,
    /// BCP-47 language tag, e.g. `en-US`
    pub language: String,
    /// IANA timezone name
    pub timezone: Option<String>,
    /// Physical screen resolution, e.g. `2560x1440`
    pub screen_resolution: Option<String>,
    /// Visible viewport size, e.g. `1280x720`
    pub viewport_size: Option<String>,
    /// Full document width in pixels
    pub document_width: Option<u32>,
    /// Full document height in pixels
    pub document_height: Option<u32>,
    /// Whether first-party cookies work
    pub cookies_enabled: bool,
    /// Whether the visitor signals Do Not Track
    pub do_not_track: bool,
    /// Whether the page runs inside a frame
    pub in_iframe: bool,
}

impl PageEnvironment {
    /// The `utm_term` query value, if the URL carries one.
    pub fn utm_term(&self) -> Option<String> {
        let query = self.url.split_once('?')?.1;
        let query = query.split('#').next().unwrap_or(query);
        for pair in query.split('&') {
            let (key, value) = pair.split_once('=')?;
            if key == "utm_term" {
                return Some(value.to_string());
            }
        }
        None
    }

    /// Navigation properties derived from the URL.
    pub fn navigation_properties(&self) -> NavigationProperties {
        NavigationProperties {
            url: self.url.clone(),
            root_domain: find_top_domain(&self.url),
            referrer: self.referrer.clone(),
            path: url_path(&self.url),
            search: url_search(&self.url),
            title: self.title.clone(),
        }
    }

    /// Device properties derived from the environment.
    pub fn device(&self) -> Device {
        Device {
            device_type: self.platform.clone(),
            name: None,
            model: None,
            os_name: None,
            os_version: None,
            user_agent: self.user_agent.clone(),
            total_width: self.document_width,
            total_height: self.document_height,
            screen_resolution: self.screen_resolution.clone(),
            viewport_size: self.viewport_size.clone(),
        }
    }

    /// The primary language subtag, e.g. `en` from `en-US`.
    pub fn language_code(&self) -> String {
        self.language
            .split('-')
            .next()
            .unwrap_or_default()
            .to_string()
    }
}

/// The registrable domain of a URL, approximated as its last two host
/// labels.
pub fn find_top_domain(url: &str) -> String {
    let host = url_host(url);
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        host
    } else {
        labels[labels.len() - 2..].join(".")
    }
}

fn strip_scheme(url: &str) -> &str {
    url.split_once("://").map_or(url, |(_, rest)| rest)
}

fn url_host(url: &str) -> String {
    let rest = strip_scheme(url);
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let host = &rest[..end];
    // drop userinfo and port
    let host = host.rsplit_once('@').map_or(host, |(_, h)| h);
    host.split(':').next().unwrap_or_default().to_string()
}

fn url_path(url: &str) -> String {
    let rest = strip_scheme(url);
    let Some(start) = rest.find('/') else {
        return "/".to_string();
    };
    let path = &rest[start..];
    let end = path.find(['?', '#']).unwrap_or(path.len());
    path[..end].to_string()
}

fn url_search(url: &str) -> String {
    match url.split_once('?') {
        Some((_, query)) => {
            let query = query.split('#').next().unwrap_or(query);
            format!("?{query}")
        }
        None => String::new(),
    }
}

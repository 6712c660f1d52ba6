//! Tab enumeration via the browser's DevTools endpoint.
//!
//! The orchestrator treats the browser as a collaborator: `GET <endpoint>/json`
//! returns the open targets, and the `"page"` targets are the window's tabs,
//! in enumeration order.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

/// An open browser tab.
#[derive(Debug, Clone)]
pub struct Tab {
    /// Tab URL, preserved character-for-character.
    pub url: String,
}

/// Source of the current window's tabs.
#[async_trait]
pub trait TabSource: Send + Sync {
    /// Enumerates the tabs of the current window, in window order.
    async fn current_window(&self) -> Result<Vec<Tab>>;
}

/// Joins tab URLs with newlines. An empty tab set yields an empty string.
pub fn join_urls(tabs: &[Tab]) -> String {
    tabs.iter()
        .map(|tab| tab.url.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

// Wire shape of a single entry in the DevTools /json target list. Unknown
// fields (title, id, websocket URLs) are ignored.
#[derive(Debug, Deserialize)]
struct Target {
    #[serde(rename = "type")]
    kind: String,
    url: String,
}

/// Enumerates tabs from a browser's DevTools HTTP endpoint.
pub struct DevtoolsTabs {
    client: reqwest::Client,
    endpoint: String,
}

impl DevtoolsTabs {
    /// Creates a source for the given endpoint, e.g. "http://127.0.0.1:9222".
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("tabclip/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(3))
            .build()
            .context("failed to build devtools client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl TabSource for DevtoolsTabs {
    async fn current_window(&self) -> Result<Vec<Tab>> {
        let url = format!("{}/json", self.endpoint.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("failed to reach devtools endpoint {}", url))?;
        if !response.status().is_success() {
            bail!("devtools endpoint returned {}", response.status());
        }
        let targets: Vec<Target> = response
            .json()
            .await
            .context("failed to parse devtools target list")?;
        Ok(targets
            .into_iter()
            .filter(|target| target.kind == "page")
            .map(|target| Tab { url: target.url })
            .collect())
    }
}

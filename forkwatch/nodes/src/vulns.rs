// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

//! Vulnerability catalogue: a periodically refreshed list of known client
//! vulnerabilities, each carrying a regular expression that is matched
//! against a node's raw version string.

use std::time::{Duration, Instant};

use anyhow::Context;
use regex::Regex;
use serde::{Deserialize, Serialize};

const FEED_URL: &str = "https://geth.ethereum.org/docs/vulnerabilities/vulnerabilities.json";
const REFRESH_INTERVAL: Duration = Duration::from_secs(10 * 60);
const FETCH_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vulnerability {
    pub name: String,
    pub uid: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub introduced: String,
    #[serde(default)]
    pub fixed: String,
    #[serde(default)]
    pub published: String,
    #[serde(default)]
    pub severity: String,
    pub check: String,
    #[serde(rename = "CVE", default)]
    pub cve: String,
}

/// The catalogue cache. An explicit value owned by the monitor, not a
/// global; `disable_fetch` exists so tests never hit the network.
pub struct VulnCatalogue {
    url: String,
    client: reqwest::Client,
    checks: Vec<(Regex, Vulnerability)>,
    last_refresh: Option<Instant>,
    disable_fetch: bool,
}

impl VulnCatalogue {
    pub fn new() -> Self {
        Self::with_url(FEED_URL)
    }

    pub fn with_url(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: reqwest::Client::new(),
            checks: Vec::new(),
            last_refresh: None,
            disable_fetch: false,
        }
    }

    pub fn disabled() -> Self {
        Self {
            disable_fetch: true,
            ..Self::new()
        }
    }

    /// All matches of the catalogue against a version string. Refreshes
    /// the cache first when it is stale; a failed refresh keeps serving
    /// the previous entries.
    pub async fn check(&mut self, version: &str) -> Vec<Vulnerability> {
        self.refresh_if_stale().await;
        self.checks
            .iter()
            .filter(|(re, _)| re.is_match(version))
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &Vulnerability> {
        self.checks.iter().map(|(_, v)| v)
    }

    async fn refresh_if_stale(&mut self) {
        if self.disable_fetch {
            return;
        }
        if let Some(at) = self.last_refresh {
            if at.elapsed() < REFRESH_INTERVAL {
                return;
            }
        }
        match self.fetch().await {
            Ok(checks) => {
                self.checks = checks;
                self.last_refresh = Some(Instant::now());
            }
            Err(e) => {
                tracing::info!(error = e.to_string(), "error refreshing vulnerability feed");
            }
        }
    }

    /// Download and compile the feed. Any entry with an invalid regex
    /// rejects the whole refresh.
    async fn fetch(&self) -> anyhow::Result<Vec<(Regex, Vulnerability)>> {
        let vulns: Vec<Vulnerability> = self
            .client
            .get(&self.url)
            .timeout(FETCH_TIMEOUT)
            .header(reqwest::header::USER_AGENT, "forkwatch")
            .send()
            .await
            .context("vulnerability feed request failed")?
            .json()
            .await
            .context("vulnerability feed is not valid JSON")?;

        let mut checks = Vec::with_capacity(vulns.len());
        for vuln in vulns {
            let re = Regex::new(&vuln.check)
                .with_context(|| format!("invalid check regex in {}", vuln.uid))?;
            checks.push((re, vuln));
        }
        Ok(checks)
    }
}

impl Default for VulnCatalogue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vuln(uid: &str, check: &str) -> Vulnerability {
        Vulnerability {
            name: uid.to_string(),
            uid: uid.to_string(),
            summary: String::new(),
            description: String::new(),
            links: Vec::new(),
            introduced: String::new(),
            fixed: String::new(),
            published: String::new(),
            severity: "High".to_string(),
            check: check.to_string(),
            cve: String::new(),
        }
    }

    fn catalogue_with(entries: Vec<Vulnerability>) -> VulnCatalogue {
        let mut cat = VulnCatalogue::disabled();
        cat.checks = entries
            .into_iter()
            .map(|v| (Regex::new(&v.check).unwrap(), v))
            .collect();
        cat
    }

    #[tokio::test]
    async fn matches_version_strings() {
        let mut cat = catalogue_with(vec![
            vuln("GETH-2021-01", r"Geth\/v1\.10\.(0|1|2)-.*"),
            vuln("GETH-2020-07", r"Geth\/v1\.9\..*"),
        ]);

        let hits = cat
            .check("Geth/v1.10.1-stable/linux-amd64/go1.16")
            .await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].uid, "GETH-2021-01");

        let hits = cat.check("besu/v21.1.2/linux-x86_64/oracle").await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn disabled_catalogue_stays_empty() {
        let mut cat = VulnCatalogue::disabled();
        assert!(cat.check("Geth/v1.10.1").await.is_empty());
        assert!(cat.last_refresh.is_none());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_stale_entries() {
        // Point the catalogue at a URL that cannot resolve; the fetch
        // fails but previously loaded entries keep serving.
        let mut cat = catalogue_with(vec![vuln("GETH-2021-01", r"Geth\/v1\.10\..*")]);
        cat.disable_fetch = false;
        cat.url = "http://invalid.localdomain/vulnerabilities.json".to_string();

        let hits = cat.check("Geth/v1.10.8-stable").await;
        assert_eq!(hits.len(), 1);
    }
}

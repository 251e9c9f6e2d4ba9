use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One area of a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaTarget {
    /// Area label, also used as the fallback `comuna`
    pub nombre: String,
    /// Search results URL filtered to the area
    pub url: String,
}

impl AreaTarget {
    /// Output file name: lower-cased label, spaces to underscores
    pub fn file_name(&self) -> String {
        format!("{}.csv", self.nombre.trim().to_lowercase().replace(' ', "_"))
    }
}

/// State of one URL discovery run.
#[derive(Debug)]
pub struct DiscoveryState {
    /// Accepted candidates, in discovery order
    urls: Vec<String>,
    accepted: HashSet<String>,
    /// Every listing URL observed this run, accepted or not
    observed: HashSet<String>,
    pub offset: u32,
    pub page: u32,
}

impl DiscoveryState {
    pub fn new() -> Self {
        Self {
            urls: Vec::new(),
            accepted: HashSet::new(),
            observed: HashSet::new(),
            offset: 1,
            page: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Record a harvested URL; returns true the first time it is seen this run.
    pub fn observe(&mut self, url: &str) -> bool {
        self.observed.insert(url.to_string())
    }

    /// Add a candidate unless already accepted.
    pub fn accept(&mut self, url: String) -> bool {
        if self.accepted.insert(url.clone()) {
            self.urls.push(url);
            true
        } else {
            false
        }
    }

    pub fn advance(&mut self, page_size: u32) {
        self.offset += page_size;
        self.page += 1;
    }

    pub fn into_urls(self) -> Vec<String> {
        self.urls
    }
}

impl Default for DiscoveryState {
    fn default() -> Self {
        Self::new()
    }
}

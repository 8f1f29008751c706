//! Resolution results

use std::net::SocketAddr;

/// One resolved endpoint with the names it was resolved from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverEntry {
    endpoint: SocketAddr,
    host_name: String,
    service_name: String,
}

impl ResolverEntry {
    pub fn new(endpoint: SocketAddr, host_name: impl Into<String>, service_name: impl Into<String>) -> Self {
        Self {
            endpoint,
            host_name: host_name.into(),
            service_name: service_name.into(),
        }
    }

    #[inline]
    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    #[inline]
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    #[inline]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

/// Ordered list of entries produced by one resolution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolverResults {
    entries: Vec<ResolverEntry>,
}

impl ResolverResults {
    /// Entries for `endpoints`, all tagged with the same names
    pub fn from_endpoints(endpoints: Vec<SocketAddr>, host_name: &str, service_name: &str) -> Self {
        Self {
            entries: endpoints
                .into_iter()
                .map(|ep| ResolverEntry::new(ep, host_name, service_name))
                .collect(),
        }
    }

    /// A single entry, as produced by reverse resolution
    pub fn single(entry: ResolverEntry) -> Self {
        Self { entries: vec![entry] }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first(&self) -> Option<&ResolverEntry> {
        self.entries.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResolverEntry> {
        self.entries.iter()
    }

    /// Just the endpoints, in order
    pub fn endpoints(&self) -> Vec<SocketAddr> {
        self.entries.iter().map(ResolverEntry::endpoint).collect()
    }
}

impl IntoIterator for ResolverResults {
    type Item = ResolverEntry;
    type IntoIter = std::vec::IntoIter<ResolverEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResolverResults {
    type Item = &'a ResolverEntry;
    type IntoIter = std::slice::Iter<'a, ResolverEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_endpoints() {
        let eps: Vec<SocketAddr> = vec!["10.0.0.1:80".parse().unwrap(), "[::1]:80".parse().unwrap()];
        let results = ResolverResults::from_endpoints(eps.clone(), "example", "http");
        assert_eq!(results.len(), 2);
        assert_eq!(results.endpoints(), eps);
        for entry in &results {
            assert_eq!(entry.host_name(), "example");
            assert_eq!(entry.service_name(), "http");
        }
    }

    #[test]
    fn test_single() {
        let ep: SocketAddr = "127.0.0.1:22".parse().unwrap();
        let results = ResolverResults::single(ResolverEntry::new(ep, "localhost", "ssh"));
        assert_eq!(results.first().map(|e| e.host_name()), Some("localhost"));
        assert!(!results.is_empty());
        assert!(ResolverResults::default().is_empty());
    }
}

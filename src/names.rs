/// Human-friendly device names
use std::collections::HashMap;

/// Maps device addresses to human-friendly names.
///
/// Built once at startup from configuration and shared read-only afterwards.
/// Lookups are case-insensitive on the address.
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    names: HashMap<String, String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, A, N>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, N)>,
        A: AsRef<str>,
        N: Into<String>,
    {
        let mut registry = Self::new();
        for (addr, name) in pairs {
            registry.register(addr.as_ref(), name);
        }
        registry
    }

    pub fn register(&mut self, addr: &str, name: impl Into<String>) {
        self.names.insert(normalize(addr), name.into());
    }

    pub fn lookup(&self, addr: &str) -> Option<&str> {
        self.names
            .get(&normalize(addr))
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    /// Name for `addr`, or `addr` itself when none is registered.
    pub fn human_name<'a>(&'a self, addr: &'a str) -> &'a str {
        self.lookup(addr).unwrap_or(addr)
    }

    pub fn contains(&self, addr: &str) -> bool {
        self.names.contains_key(&normalize(addr))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.values().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn normalize(addr: &str) -> String {
    addr.trim().to_uppercase()
}

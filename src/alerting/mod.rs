//! Alert classification and channel routing.

pub mod classifier;
pub mod router;

use std::collections::HashMap;

/// Known exchange deposit addresses, injected from configuration.
///
/// The table is maintained outside this system; the classifier only reads
/// it. A transfer counts as an exchange deposit when its destination is in
/// this table and it carries a destination tag.
#[derive(Debug, Clone, Default)]
pub struct ExchangeDirectory {
    addresses: HashMap<String, String>,
}

impl ExchangeDirectory {
    /// Builds a directory from an address -> exchange-label map.
    pub fn new(addresses: HashMap<String, String>) -> Self {
        Self { addresses }
    }

    /// The exchange label for an address, if known.
    pub fn lookup(&self, address: &str) -> Option<&str> {
        self.addresses.get(address).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let directory = ExchangeDirectory::new(HashMap::from([(
            "rExchange1".to_string(),
            "Kraken".to_string(),
        )]));
        assert_eq!(directory.lookup("rExchange1"), Some("Kraken"));
        assert_eq!(directory.lookup("rUnknown"), None);
    }
}

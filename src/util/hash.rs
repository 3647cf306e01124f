//! Hashing utilities for unit fingerprints.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// A hasher for building fingerprints from multiple components.
#[derive(Default, Clone)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    /// Create a new fingerprint builder.
    pub fn new() -> Self {
        Fingerprint {
            hasher: Sha256::new(),
        }
    }

    /// Add a string component to the fingerprint.
    pub fn update_str(&mut self, s: &str) -> &mut Self {
        self.hasher.update(s.as_bytes());
        self.hasher.update(b"\0");
        self
    }

    /// Add an optional string component.
    pub fn update_opt(&mut self, opt: Option<&str>) -> &mut Self {
        match opt {
            Some(s) => {
                self.hasher.update(b"\x01");
                self.update_str(s);
            }
            None => {
                self.hasher.update(b"\x00");
            }
        }
        self
    }

    /// Add the JSON encoding of a value.
    ///
    /// Struct fields serialize in declaration order, so equal values always
    /// hash equally.
    pub fn update_json<T: Serialize + ?Sized>(&mut self, value: &T) -> &mut Self {
        match serde_json::to_string(value) {
            Ok(json) => self.update_str(&json),
            Err(e) => {
                tracing::debug!("fingerprint skipped unserializable value: {}", e);
                self.update_opt(None)
            }
        }
    }

    /// Finalize and return the fingerprint as a hex string.
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_fingerprint() {
        assert_eq!(
            Fingerprint::new().finish(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_fingerprint() {
        let fp1 = {
            let mut fp = Fingerprint::new();
            fp.update_str("react").update_str("18.2.0");
            fp.finish()
        };

        let fp2 = {
            let mut fp = Fingerprint::new();
            fp.update_str("react").update_str("18.2.0");
            fp.finish()
        };

        let fp3 = {
            let mut fp = Fingerprint::new();
            fp.update_str("react").update_str("17.0.2");
            fp.finish()
        };

        assert_eq!(fp1, fp2);
        assert_ne!(fp1, fp3);
    }

    #[test]
    fn test_optional_components_are_distinguished() {
        let mut a = Fingerprint::new();
        a.update_opt(None).update_str("x");
        let mut b = Fingerprint::new();
        b.update_opt(Some("x"));
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn test_update_json() {
        let mut a = Fingerprint::new();
        a.update_json(&serde_json::json!({"shareKey": "react"}));
        let mut b = Fingerprint::new();
        b.update_str(r#"{"shareKey":"react"}"#);
        assert_eq!(a.finish(), b.finish());
    }
}

//! Runtime loader function selection.
//!
//! Generated consume stubs call one of twelve runtime functions. The name
//! encodes which checks apply:
//!
//! | requiredVersion | strict | singleton | name |
//! |---|---|---|---|
//! | absent  | - | no  | `load` |
//! | absent  | - | yes | `loadSingleton` |
//! | present | no  | no  | `loadVersionCheck` |
//! | present | yes | no  | `loadStrictVersionCheck` |
//! | present | no  | yes | `loadSingletonVersionCheck` |
//! | present | yes | yes | `loadStrictSingletonVersionCheck` |
//!
//! Each name gets a `Fallback` suffix when a local fallback is bundled.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::resolver::errors::ShareError;

/// One of the runtime loader functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoaderFunction {
    versioned: bool,
    strict: bool,
    singleton: bool,
    fallback: bool,
}

impl LoaderFunction {
    /// Every loader function, in table order.
    pub const ALL: [LoaderFunction; 12] = {
        const fn f(versioned: bool, strict: bool, singleton: bool, fallback: bool) -> LoaderFunction {
            LoaderFunction {
                versioned,
                strict,
                singleton,
                fallback,
            }
        }
        [
            f(false, false, false, false),
            f(false, false, true, false),
            f(true, false, false, false),
            f(true, true, false, false),
            f(true, false, true, false),
            f(true, true, true, false),
            f(false, false, false, true),
            f(false, false, true, true),
            f(true, false, false, true),
            f(true, true, false, true),
            f(true, false, true, true),
            f(true, true, true, true),
        ]
    };

    /// Pick the loader for a consume declaration.
    ///
    /// `strict` is ignored without a required version.
    pub fn select(has_range: bool, strict: bool, singleton: bool, has_fallback: bool) -> Self {
        LoaderFunction {
            versioned: has_range,
            strict: has_range && strict,
            singleton,
            fallback: has_fallback,
        }
    }

    pub fn is_versioned(&self) -> bool {
        self.versioned
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback
    }

    /// The runtime function name.
    pub fn as_str(&self) -> &'static str {
        match (self.versioned, self.strict, self.singleton, self.fallback) {
            (false, _, false, false) => "load",
            (false, _, true, false) => "loadSingleton",
            (true, false, false, false) => "loadVersionCheck",
            (true, true, false, false) => "loadStrictVersionCheck",
            (true, false, true, false) => "loadSingletonVersionCheck",
            (true, true, true, false) => "loadStrictSingletonVersionCheck",
            (false, _, false, true) => "loadFallback",
            (false, _, true, true) => "loadSingletonFallback",
            (true, false, false, true) => "loadVersionCheckFallback",
            (true, true, false, true) => "loadStrictVersionCheckFallback",
            (true, false, true, true) => "loadSingletonVersionCheckFallback",
            (true, true, true, true) => "loadStrictSingletonVersionCheckFallback",
        }
    }
}

impl fmt::Display for LoaderFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoaderFunction {
    type Err = ShareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| ShareError::UnknownLoader(s.to_string()))
    }
}

impl Serialize for LoaderFunction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LoaderFunction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_table() {
        let cases = [
            ((false, false, false), "load"),
            ((false, true, false), "load"),
            ((false, false, true), "loadSingleton"),
            ((false, true, true), "loadSingleton"),
            ((true, false, false), "loadVersionCheck"),
            ((true, true, false), "loadStrictVersionCheck"),
            ((true, false, true), "loadSingletonVersionCheck"),
            ((true, true, true), "loadStrictSingletonVersionCheck"),
        ];

        for ((range, strict, singleton), name) in cases {
            let without = LoaderFunction::select(range, strict, singleton, false);
            assert_eq!(without.as_str(), name);

            let with = LoaderFunction::select(range, strict, singleton, true);
            assert_eq!(with.as_str(), format!("{}Fallback", name));
        }
    }

    #[test]
    fn test_names_parse_back() {
        for function in LoaderFunction::ALL {
            assert_eq!(function.as_str().parse::<LoaderFunction>().unwrap(), function);
        }
        assert!(matches!(
            "loadEverything".parse::<LoaderFunction>(),
            Err(ShareError::UnknownLoader(_))
        ));
    }
}

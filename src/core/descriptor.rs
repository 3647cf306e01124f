//! Canonical share declarations.
//!
//! A `ShareDescriptor` is what every accepted configuration shape
//! normalizes to. Consume and provide declarations share one struct; the
//! `kind` field tells them apart.

use std::fmt;

use semver::Version;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::resolver::version::{parse_range, parse_version, ParseError, VersionRange};

/// Share scope used when none is configured.
pub const DEFAULT_SHARE_SCOPE: &str = "default";

/// Whether a descriptor consumes or provides a shared module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareKind {
    Consume,
    Provide,
}

impl fmt::Display for ShareKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShareKind::Consume => write!(f, "consume"),
            ShareKind::Provide => write!(f, "provide"),
        }
    }
}

/// One share scope name or an ordered list of them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShareScope {
    Single(String),
    Multiple(Vec<String>),
}

impl Default for ShareScope {
    fn default() -> Self {
        ShareScope::Single(DEFAULT_SHARE_SCOPE.to_string())
    }
}

impl ShareScope {
    pub fn new(name: impl Into<String>) -> Self {
        ShareScope::Single(name.into())
    }

    /// Scope names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        match self {
            ShareScope::Single(name) => vec![name.as_str()],
            ShareScope::Multiple(names) => names.iter().map(String::as_str).collect(),
        }
    }

    /// The first scope name, used where a single runtime scope is needed.
    pub fn primary(&self) -> &str {
        match self {
            ShareScope::Single(name) => name,
            ShareScope::Multiple(names) => names
                .first()
                .map(String::as_str)
                .unwrap_or(DEFAULT_SHARE_SCOPE),
        }
    }

    /// Deterministic joined form used in identifiers.
    pub fn joined(&self) -> String {
        self.names().join("|")
    }
}

impl fmt::Display for ShareScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}

/// A value that can appear in a `string | false` setting.
pub trait SettingValue: Sized + fmt::Display {
    fn parse_setting(s: &str) -> Result<Self, ParseError>;
}

impl SettingValue for VersionRange {
    fn parse_setting(s: &str) -> Result<Self, ParseError> {
        parse_range(s)
    }
}

impl SettingValue for Version {
    fn parse_setting(s: &str) -> Result<Self, ParseError> {
        parse_version(s)
    }
}

/// A `string | false | absent` option.
///
/// Serializes as the value's string, `false`, or is skipped when unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Setting<T> {
    Unset,
    Disabled,
    Value(T),
}

/// `requiredVersion` of a declaration.
pub type RequiredVersion = Setting<VersionRange>;

/// `version` of a provided module.
pub type ProvidedVersion = Setting<Version>;

impl<T> Default for Setting<T> {
    fn default() -> Self {
        Setting::Unset
    }
}

impl<T> Setting<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, Setting::Unset)
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, Setting::Disabled)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Setting::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl<T: SettingValue> Setting<T> {
    /// Parse a setting from its string form.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        T::parse_setting(s).map(Setting::Value)
    }
}

impl<T: SettingValue> Serialize for Setting<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Setting::Unset => serializer.serialize_none(),
            Setting::Disabled => serializer.serialize_bool(false),
            Setting::Value(v) => serializer.collect_str(v),
        }
    }
}

impl<'de, T: SettingValue> Deserialize<'de> for Setting<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Text(String),
        }

        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(Setting::Unset),
            Some(Raw::Flag(false)) => Ok(Setting::Disabled),
            Some(Raw::Flag(true)) => Err(serde::de::Error::custom(
                "expected a version string or `false`, found `true`",
            )),
            Some(Raw::Text(s)) => Setting::parse(&s).map_err(serde::de::Error::custom),
        }
    }
}

/// Include/exclude filter on a share declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ShareFilter {
    /// Version range tested against the resolved module version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Exact request, request prefix, or `/regex/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
}

/// A normalized provide or consume declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareDescriptor {
    pub kind: ShareKind,

    pub share_key: String,

    #[serde(default)]
    pub share_scope: ShareScope,

    #[serde(default, skip_serializing_if = "Setting::is_unset")]
    pub version: ProvidedVersion,

    #[serde(default, skip_serializing_if = "Setting::is_unset")]
    pub required_version: RequiredVersion,

    #[serde(default)]
    pub strict_version: bool,

    #[serde(default)]
    pub singleton: bool,

    #[serde(default)]
    pub eager: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_layer: Option<String>,

    /// Local module used when no shared version fits.
    #[serde(default, rename = "import", skip_serializing_if = "Option::is_none")]
    pub fallback_request: Option<String>,

    /// Fallback request after resolution against the filesystem.
    #[serde(default, rename = "importResolved", skip_serializing_if = "Option::is_none")]
    pub fallback_resolved: Option<String>,

    /// Request matched against imports (consume) or the module to register (provide).
    pub request: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<ShareFilter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<ShareFilter>,
}

impl ShareDescriptor {
    fn new(kind: ShareKind, share_key: &str, request: &str) -> Self {
        ShareDescriptor {
            kind,
            share_key: share_key.to_string(),
            share_scope: ShareScope::default(),
            version: Setting::Unset,
            required_version: Setting::Unset,
            strict_version: false,
            singleton: false,
            eager: false,
            layer: None,
            issuer_layer: None,
            fallback_request: None,
            fallback_resolved: None,
            request: request.to_string(),
            package_name: None,
            include: None,
            exclude: None,
        }
    }

    /// A consume declaration for `share_key` with every option at its default.
    pub fn consume(share_key: &str) -> Self {
        Self::new(ShareKind::Consume, share_key, share_key)
    }

    /// A provide declaration registering `request` under `share_key`.
    pub fn provide(request: &str, share_key: &str) -> Self {
        Self::new(ShareKind::Provide, share_key, request)
    }

    pub fn is_consume(&self) -> bool {
        self.kind == ShareKind::Consume
    }

    /// The required range, when version checking is on.
    pub fn required_range(&self) -> Option<&VersionRange> {
        self.required_version.value()
    }

    /// `strictVersion` as it applies at runtime; it has no effect without a range.
    pub fn effective_strict(&self) -> bool {
        self.strict_version && self.required_range().is_some()
    }

    /// The fallback request to bundle, preferring the resolved form.
    pub fn fallback(&self) -> Option<&str> {
        self.fallback_resolved
            .as_deref()
            .or(self.fallback_request.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_scope_default_and_join() {
        assert_eq!(ShareScope::default().joined(), "default");

        let scope = ShareScope::Multiple(vec!["default".into(), "legacy".into()]);
        assert_eq!(scope.joined(), "default|legacy");
        assert_eq!(scope.primary(), "default");
    }

    #[test]
    fn test_descriptor_json_shape() {
        let mut d = ShareDescriptor::consume("react");
        d.required_version = RequiredVersion::parse("^18.0.0").unwrap();
        d.fallback_request = Some("react".into());
        d.singleton = true;

        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["kind"], "consume");
        assert_eq!(json["shareScope"], "default");
        assert_eq!(json["requiredVersion"], "^18.0.0");
        assert_eq!(json["import"], "react");
        assert!(json.get("version").is_none());
    }

    #[test]
    fn test_disabled_versions_round_trip() {
        let mut d = ShareDescriptor::provide("./src/lib.js", "lib");
        d.version = ProvidedVersion::Disabled;
        d.required_version = RequiredVersion::Disabled;

        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("\"version\":false"));
        assert!(json.contains("\"requiredVersion\":false"));

        let back: ShareDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn test_true_is_rejected_as_version() {
        let json = r#"{"kind":"consume","shareKey":"a","request":"a","requiredVersion":true}"#;
        assert!(serde_json::from_str::<ShareDescriptor>(json).is_err());
    }

    #[test]
    fn test_strict_needs_range() {
        let mut d = ShareDescriptor::consume("react");
        d.strict_version = true;
        assert!(!d.effective_strict());

        d.required_version = RequiredVersion::parse("^18").unwrap();
        assert!(d.effective_strict());
    }
}

//! Share declaration normalization.
//!
//! `provides`, `consumes` and `shared` accept three shapes:
//!
//! - a single request string,
//! - a list of request strings,
//! - a map from share key to a request/version string or an options record.
//!
//! Every shape is turned into one `ShareDescriptor` per entry.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::core::descriptor::{
    ProvidedVersion, RequiredVersion, Setting, SettingValue, ShareDescriptor, ShareFilter,
    ShareScope,
};
use crate::core::manifest::{infer_required_version, package_name_of};
use crate::resolver::version::{looks_like_version_requirement, ParseError};

/// Malformed share declaration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("`{section}` must be a string, a list of strings and maps, or a map, found {found}")]
    #[diagnostic(
        code(fedshare::config::shape),
        help("use `\"react\"`, `[\"react\", \"react-dom\"]`, or `{{ \"react\": {{ \"singleton\": true }} }}`")
    )]
    InvalidShape { section: String, found: String },

    #[error("entry `{key}` in `{section}` must be a string or an options object, found {found}")]
    #[diagnostic(code(fedshare::config::entry))]
    InvalidEntry {
        section: String,
        key: String,
        found: String,
    },

    #[error("invalid options for `{key}` in `{section}`: {message}")]
    #[diagnostic(
        code(fedshare::config::options),
        help("recognized options are listed in the federation config documentation")
    )]
    InvalidOptions {
        section: String,
        key: String,
        message: String,
    },

    #[error("invalid `{option}` for `{key}`")]
    #[diagnostic(code(fedshare::config::version))]
    InvalidVersion {
        key: String,
        option: &'static str,
        #[source]
        source: ParseError,
    },

    #[error("`{option}` for `{key}` must be a string or `false`, found `true`")]
    #[diagnostic(code(fedshare::config::flag))]
    TrueNotAllowed { key: String, option: &'static str },
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean `{}`", b),
        Value::Number(n) => format!("number `{}`", n),
        Value::String(_) => "a string".to_string(),
        Value::Array(_) => "a list".to_string(),
        Value::Object(_) => "an object".to_string(),
    }
}

/// `string | false` in an options record.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum StringOrFalse {
    Flag(bool),
    Text(String),
}

impl StringOrFalse {
    fn is_false(&self) -> bool {
        matches!(self, StringOrFalse::Flag(false))
    }

    fn text(&self) -> Option<&str> {
        match self {
            StringOrFalse::Text(s) => Some(s),
            StringOrFalse::Flag(_) => None,
        }
    }
}

fn setting<T: SettingValue>(
    key: &str,
    option: &'static str,
    raw: Option<&StringOrFalse>,
) -> Result<Setting<T>, ConfigError> {
    match raw {
        None => Ok(Setting::Unset),
        Some(StringOrFalse::Flag(false)) => Ok(Setting::Disabled),
        Some(StringOrFalse::Flag(true)) => Err(ConfigError::TrueNotAllowed {
            key: key.to_string(),
            option,
        }),
        Some(StringOrFalse::Text(s)) => Setting::parse(s).map_err(|source| {
            ConfigError::InvalidVersion {
                key: key.to_string(),
                option,
                source,
            }
        }),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConsumeOptions {
    import: Option<StringOrFalse>,
    import_resolved: Option<String>,
    share_key: Option<String>,
    share_scope: Option<ShareScope>,
    required_version: Option<StringOrFalse>,
    strict_version: Option<bool>,
    singleton: Option<bool>,
    eager: Option<bool>,
    layer: Option<String>,
    issuer_layer: Option<String>,
    package_name: Option<String>,
    request: Option<String>,
    include: Option<ShareFilter>,
    exclude: Option<ShareFilter>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ProvideOptions {
    share_key: Option<String>,
    share_scope: Option<ShareScope>,
    version: Option<StringOrFalse>,
    required_version: Option<StringOrFalse>,
    strict_version: Option<bool>,
    singleton: Option<bool>,
    eager: Option<bool>,
    layer: Option<String>,
    request: Option<String>,
    include: Option<ShareFilter>,
    exclude: Option<ShareFilter>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SharedOptions {
    import: Option<StringOrFalse>,
    share_key: Option<String>,
    share_scope: Option<ShareScope>,
    version: Option<StringOrFalse>,
    required_version: Option<StringOrFalse>,
    strict_version: Option<bool>,
    singleton: Option<bool>,
    eager: Option<bool>,
    layer: Option<String>,
    issuer_layer: Option<String>,
    package_name: Option<String>,
    request: Option<String>,
    include: Option<ShareFilter>,
    exclude: Option<ShareFilter>,
}

/// One entry of a declaration section, before normalization.
#[derive(Debug)]
enum Entry<'a> {
    /// From a string or list shape: the request itself.
    Request(&'a str),
    /// A map entry with a string value.
    Keyed(&'a str, &'a str),
    /// A map entry with an options record.
    Options(&'a str, &'a Map<String, Value>),
}

fn entries<'a>(section: &str, value: &'a Value) -> Result<Vec<Entry<'a>>, ConfigError> {
    match value {
        Value::String(request) => Ok(vec![Entry::Request(request)]),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(request) => out.push(Entry::Request(request)),
                    Value::Object(map) => out.extend(map_entries(section, map)?),
                    other => {
                        return Err(ConfigError::InvalidShape {
                            section: section.to_string(),
                            found: format!("a list containing {}", describe(other)),
                        })
                    }
                }
            }
            Ok(out)
        }
        Value::Object(map) => map_entries(section, map),
        other => Err(ConfigError::InvalidShape {
            section: section.to_string(),
            found: describe(other),
        }),
    }
}

fn map_entries<'a>(
    section: &str,
    map: &'a Map<String, Value>,
) -> Result<Vec<Entry<'a>>, ConfigError> {
    map.iter()
        .map(|(key, item)| match item {
            Value::String(s) => Ok(Entry::Keyed(key, s)),
            Value::Object(options) => Ok(Entry::Options(key, options)),
            other => Err(ConfigError::InvalidEntry {
                section: section.to_string(),
                key: key.clone(),
                found: describe(other),
            }),
        })
        .collect()
}

fn parse_options<T: DeserializeOwned>(
    section: &str,
    key: &str,
    options: &Map<String, Value>,
) -> Result<T, ConfigError> {
    serde_json::from_value(Value::Object(options.clone())).map_err(|e| {
        ConfigError::InvalidOptions {
            section: section.to_string(),
            key: key.to_string(),
            message: e.to_string(),
        }
    })
}

/// Share key for a request given in string/list form.
fn key_from_request(request: &str) -> &str {
    package_name_of(request).unwrap_or(request)
}

/// Turns share declarations into descriptors.
#[derive(Debug, Clone)]
pub struct ShareConfigNormalizer {
    share_scope: ShareScope,
    context: PathBuf,
}

impl ShareConfigNormalizer {
    /// Create a normalizer resolving package manifests from `context`.
    pub fn new(context: impl Into<PathBuf>) -> Self {
        ShareConfigNormalizer {
            share_scope: ShareScope::default(),
            context: context.into(),
        }
    }

    /// Set the plugin-level share scope that entries inherit.
    pub fn with_share_scope(mut self, share_scope: ShareScope) -> Self {
        self.share_scope = share_scope;
        self
    }

    pub fn context(&self) -> &Path {
        &self.context
    }

    pub fn share_scope(&self) -> &ShareScope {
        &self.share_scope
    }

    /// Normalize a `consumes` section.
    pub fn normalize_consumes(&self, value: &Value) -> Result<Vec<ShareDescriptor>, ConfigError> {
        const SECTION: &str = "consumes";

        entries(SECTION, value)?
            .into_iter()
            .map(|entry| {
                let (key, options) = match entry {
                    Entry::Request(request) => (
                        key_from_request(request),
                        ConsumeOptions {
                            import: Some(StringOrFalse::Text(request.to_string())),
                            request: Some(request.to_string()),
                            strict_version: Some(false),
                            ..Default::default()
                        },
                    ),
                    Entry::Keyed(key, value) => (key, consume_options_from_string(key, value)),
                    Entry::Options(key, options) => (key, parse_options(SECTION, key, options)?),
                };
                self.consume(key, options)
            })
            .collect()
    }

    /// Normalize a `provides` section.
    pub fn normalize_provides(&self, value: &Value) -> Result<Vec<ShareDescriptor>, ConfigError> {
        const SECTION: &str = "provides";

        entries(SECTION, value)?
            .into_iter()
            .map(|entry| {
                let (key, options) = match entry {
                    Entry::Request(request) => (
                        request,
                        ProvideOptions {
                            share_key: Some(key_from_request(request).to_string()),
                            ..Default::default()
                        },
                    ),
                    Entry::Keyed(request, share_key) => (
                        request,
                        ProvideOptions {
                            share_key: Some(share_key.to_string()),
                            ..Default::default()
                        },
                    ),
                    Entry::Options(key, options) => (key, parse_options(SECTION, key, options)?),
                };
                self.provide(key, options)
            })
            .collect()
    }

    /// Normalize a `shared` section into consume and provide descriptors.
    ///
    /// Consumes come first, in declaration order, followed by provides.
    pub fn normalize_shared(&self, value: &Value) -> Result<Vec<ShareDescriptor>, ConfigError> {
        const SECTION: &str = "shared";

        let shared: Vec<(&str, SharedOptions)> = entries(SECTION, value)?
            .into_iter()
            .map(|entry| {
                Ok(match entry {
                    Entry::Request(request) => (
                        key_from_request(request),
                        SharedOptions {
                            import: Some(StringOrFalse::Text(request.to_string())),
                            ..Default::default()
                        },
                    ),
                    Entry::Keyed(key, value) if value != key && looks_like_version_requirement(value) => (
                        key,
                        SharedOptions {
                            required_version: Some(StringOrFalse::Text(value.to_string())),
                            ..Default::default()
                        },
                    ),
                    Entry::Keyed(key, value) => (
                        key,
                        SharedOptions {
                            import: Some(StringOrFalse::Text(value.to_string())),
                            ..Default::default()
                        },
                    ),
                    Entry::Options(key, options) => (key, parse_options(SECTION, key, options)?),
                })
            })
            .collect::<Result<_, ConfigError>>()?;

        let mut descriptors = Vec::with_capacity(shared.len() * 2);

        for (key, options) in &shared {
            descriptors.push(self.consume(key, consume_options_from_shared(options))?);
        }

        for (key, options) in &shared {
            if options.import.as_ref().is_some_and(StringOrFalse::is_false) {
                continue;
            }
            let request = options
                .import
                .as_ref()
                .and_then(StringOrFalse::text)
                .unwrap_or(key);
            let provide = ProvideOptions {
                share_key: Some(options.share_key.clone().unwrap_or_else(|| key.to_string())),
                share_scope: options.share_scope.clone(),
                version: options.version.clone(),
                required_version: options.required_version.clone(),
                strict_version: options.strict_version,
                singleton: options.singleton,
                eager: options.eager,
                layer: options.layer.clone(),
                request: Some(request.to_string()),
                include: options.include.clone(),
                exclude: options.exclude.clone(),
            };
            descriptors.push(self.provide(request, provide)?);
        }

        Ok(descriptors)
    }

    fn consume(&self, key: &str, options: ConsumeOptions) -> Result<ShareDescriptor, ConfigError> {
        let import_disabled = options.import.as_ref().is_some_and(StringOrFalse::is_false);
        let singleton = options.singleton.unwrap_or(false);

        let mut d = ShareDescriptor::consume(options.share_key.as_deref().unwrap_or(key));
        d.share_scope = options
            .share_scope
            .unwrap_or_else(|| self.share_scope.clone());
        d.request = options.request.unwrap_or_else(|| key.to_string());
        d.fallback_request = if import_disabled {
            None
        } else {
            Some(
                options
                    .import
                    .as_ref()
                    .and_then(StringOrFalse::text)
                    .unwrap_or(key)
                    .to_string(),
            )
        };
        d.fallback_resolved = options.import_resolved;
        d.singleton = singleton;
        d.strict_version = options
            .strict_version
            .unwrap_or(!import_disabled && !singleton);
        d.eager = options.eager.unwrap_or(false);
        d.layer = options.layer;
        d.issuer_layer = options.issuer_layer;
        d.include = options.include;
        d.exclude = options.exclude;

        d.required_version = setting(key, "requiredVersion", options.required_version.as_ref())?;
        if d.required_version.is_unset() {
            let package_name = options.package_name.clone().or_else(|| {
                let request = d.fallback_request.as_deref().unwrap_or(&d.request);
                package_name_of(request).map(str::to_string)
            });
            d.required_version = match &package_name {
                Some(name) => infer_required_version(&self.context, name),
                None => {
                    debug!("`{}` has no package name, version check disabled", key);
                    RequiredVersion::Disabled
                }
            };
        }
        d.package_name = options.package_name;

        debug!(
            "consume `{}` in scope `{}` (requiredVersion: {:?})",
            d.share_key,
            d.share_scope,
            d.required_range().map(ToString::to_string)
        );
        Ok(d)
    }

    fn provide(&self, key: &str, options: ProvideOptions) -> Result<ShareDescriptor, ConfigError> {
        let request = options.request.as_deref().unwrap_or(key);
        let mut d = ShareDescriptor::provide(request, options.share_key.as_deref().unwrap_or(key));
        d.share_scope = options
            .share_scope
            .unwrap_or_else(|| self.share_scope.clone());
        d.version = setting::<semver::Version>(key, "version", options.version.as_ref())?;
        d.required_version = setting(key, "requiredVersion", options.required_version.as_ref())?;
        d.strict_version = options.strict_version.unwrap_or(false);
        d.singleton = options.singleton.unwrap_or(false);
        d.eager = options.eager.unwrap_or(false);
        d.layer = options.layer;
        d.include = options.include;
        d.exclude = options.exclude;

        debug!(
            "provide `{}` as `{}` in scope `{}`",
            d.request, d.share_key, d.share_scope
        );
        Ok(d)
    }
}

fn consume_options_from_string(key: &str, value: &str) -> ConsumeOptions {
    if value != key && looks_like_version_requirement(value) {
        ConsumeOptions {
            import: Some(StringOrFalse::Text(key.to_string())),
            required_version: Some(StringOrFalse::Text(value.to_string())),
            strict_version: Some(true),
            ..Default::default()
        }
    } else {
        ConsumeOptions {
            import: Some(StringOrFalse::Text(value.to_string())),
            strict_version: Some(false),
            ..Default::default()
        }
    }
}

fn consume_options_from_shared(options: &SharedOptions) -> ConsumeOptions {
    ConsumeOptions {
        import: options.import.clone(),
        import_resolved: None,
        share_key: options.share_key.clone(),
        share_scope: options.share_scope.clone(),
        required_version: options.required_version.clone(),
        strict_version: options.strict_version,
        singleton: options.singleton,
        eager: options.eager,
        layer: options.layer.clone(),
        issuer_layer: options.issuer_layer.clone(),
        package_name: options.package_name.clone(),
        request: options.request.clone(),
        include: options.include.clone(),
        exclude: options.exclude.clone(),
    }
}

/// Version to register for a provide descriptor, once the module's own
/// manifest version is known.
pub fn effective_provided_version(
    descriptor: &ShareDescriptor,
    inferred: Option<semver::Version>,
) -> ProvidedVersion {
    match (&descriptor.version, inferred) {
        (Setting::Unset, Some(version)) => Setting::Value(version),
        (Setting::Unset, None) => Setting::Unset,
        (explicit, _) => explicit.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::descriptor::ShareKind;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn project(deps: &str) -> TempDir {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("package.json"),
            format!(r#"{{"name": "host", "dependencies": {}}}"#, deps),
        )
        .unwrap();
        tmp
    }

    #[test]
    fn test_consume_string_shape() {
        let tmp = project(r#"{"react": "^18.2.0"}"#);
        let normalizer = ShareConfigNormalizer::new(tmp.path());

        let descriptors = normalizer.normalize_consumes(&json!("react")).unwrap();
        assert_eq!(descriptors.len(), 1);

        let d = &descriptors[0];
        assert_eq!(d.kind, ShareKind::Consume);
        assert_eq!(d.share_key, "react");
        assert_eq!(d.share_scope.joined(), "default");
        assert_eq!(d.fallback_request.as_deref(), Some("react"));
        assert_eq!(d.required_range().unwrap().to_string(), "^18.2.0");
        assert!(!d.strict_version);
    }

    #[test]
    fn test_consume_list_uses_package_segment() {
        let tmp = project("{}");
        let normalizer = ShareConfigNormalizer::new(tmp.path());

        let descriptors = normalizer
            .normalize_consumes(&json!(["react/jsx-runtime", "@mui/material"]))
            .unwrap();
        let keys: Vec<_> = descriptors.iter().map(|d| d.share_key.as_str()).collect();
        assert_eq!(keys, ["react", "@mui/material"]);
        assert_eq!(descriptors[0].request, "react/jsx-runtime");
        assert!(descriptors[0].required_version.is_disabled());
    }

    #[test]
    fn test_consume_map_version_string_is_strict() {
        let tmp = project("{}");
        let normalizer = ShareConfigNormalizer::new(tmp.path());

        let descriptors = normalizer
            .normalize_consumes(&json!({"react": "^17.0.0", "lodash": "lodash-es"}))
            .unwrap();

        assert_eq!(descriptors[0].required_range().unwrap().to_string(), "^17.0.0");
        assert!(descriptors[0].strict_version);
        assert_eq!(descriptors[1].share_key, "lodash");
        assert!(!descriptors[1].strict_version);
    }

    #[test]
    fn test_consume_map_plain_string_is_import() {
        let tmp = project("{}");
        let normalizer = ShareConfigNormalizer::new(tmp.path());

        let descriptors = normalizer
            .normalize_consumes(&json!({"lodash": "lodash-es", "react": "react"}))
            .unwrap();

        assert_eq!(descriptors[0].share_key, "lodash");
        assert_eq!(descriptors[0].request, "lodash");
        assert_eq!(descriptors[0].fallback_request.as_deref(), Some("lodash-es"));
        assert!(descriptors[0].required_version.is_disabled());
        assert_eq!(descriptors[1].fallback_request.as_deref(), Some("react"));
        assert!(descriptors[1].required_range().is_none());
    }

    #[test]
    fn test_list_accepts_map_items() {
        let tmp = project(r#"{"react": "^18.2.0"}"#);
        let normalizer = ShareConfigNormalizer::new(tmp.path());

        let descriptors = normalizer
            .normalize_consumes(&json!([
                "lodash",
                { "react": { "singleton": true }, "dayjs": "^1.11.0" }
            ]))
            .unwrap();
        let keys: Vec<_> = descriptors.iter().map(|d| d.share_key.as_str()).collect();
        assert_eq!(keys, ["lodash", "react", "dayjs"]);
        assert!(descriptors[1].singleton);
        assert_eq!(descriptors[1].required_range().unwrap().to_string(), "^18.2.0");
        assert_eq!(descriptors[2].required_range().unwrap().to_string(), "^1.11.0");

        let provides = normalizer
            .normalize_provides(&json!(["react", { "./src/button.js": "button" }]))
            .unwrap();
        assert_eq!(provides[1].request, "./src/button.js");
        assert_eq!(provides[1].share_key, "button");

        let shared = normalizer
            .normalize_shared(&json!([{ "react": { "singleton": true } }]))
            .unwrap();
        assert_eq!(shared.len(), 2);
        assert!(shared.iter().all(|d| d.singleton));

        assert!(matches!(
            normalizer.normalize_consumes(&json!(["react", 42])),
            Err(ConfigError::InvalidShape { .. })
        ));
        assert!(matches!(
            normalizer.normalize_consumes(&json!([{ "react": true }])),
            Err(ConfigError::InvalidEntry { .. })
        ));
    }

    #[test]
    fn test_consume_options_defaults() {
        let tmp = project(r#"{"react": "^18.0.0"}"#);
        let normalizer =
            ShareConfigNormalizer::new(tmp.path()).with_share_scope(ShareScope::new("app"));

        let descriptors = normalizer
            .normalize_consumes(&json!({
                "react": { "singleton": true },
                "lodash": { "import": false, "shareScope": ["default", "legacy"] },
                "dayjs": { "requiredVersion": "1.x", "eager": true, "layer": "ssr" }
            }))
            .unwrap();

        let react = &descriptors[0];
        assert!(react.singleton);
        assert!(!react.strict_version);
        assert_eq!(react.share_scope.joined(), "app");
        assert_eq!(react.required_range().unwrap().to_string(), "^18.0.0");

        let lodash = &descriptors[1];
        assert!(lodash.fallback_request.is_none());
        assert!(!lodash.strict_version);
        assert_eq!(lodash.share_scope.joined(), "default|legacy");

        let dayjs = &descriptors[2];
        assert!(dayjs.strict_version);
        assert!(dayjs.eager);
        assert_eq!(dayjs.layer.as_deref(), Some("ssr"));
        assert_eq!(dayjs.required_range().unwrap().to_string(), "1.x");
    }

    #[test]
    fn test_provide_shapes() {
        let tmp = project("{}");
        let normalizer = ShareConfigNormalizer::new(tmp.path());

        let descriptors = normalizer
            .normalize_provides(&json!({
                "./src/button.js": "button",
                "react": { "version": "18.2.0", "eager": true },
                "lodash": { "version": false, "shareKey": "lodash-shared" }
            }))
            .unwrap();

        assert_eq!(descriptors[0].request, "./src/button.js");
        assert_eq!(descriptors[0].share_key, "button");
        assert!(descriptors[0].version.is_unset());

        assert_eq!(descriptors[1].version.value().unwrap().to_string(), "18.2.0");
        assert!(descriptors[1].eager);

        assert!(descriptors[2].version.is_disabled());
        assert_eq!(descriptors[2].share_key, "lodash-shared");
        assert_eq!(descriptors[2].request, "lodash");
    }

    #[test]
    fn test_shared_produces_consume_and_provide() {
        let tmp = project(r#"{"react": "^18.2.0"}"#);
        let normalizer = ShareConfigNormalizer::new(tmp.path());

        let descriptors = normalizer
            .normalize_shared(&json!({
                "react": { "singleton": true },
                "next/dynamic": { "import": false, "singleton": true }
            }))
            .unwrap();

        let kinds: Vec<_> = descriptors
            .iter()
            .map(|d| (d.kind, d.share_key.as_str()))
            .collect();
        assert_eq!(
            kinds,
            [
                (ShareKind::Consume, "react"),
                (ShareKind::Consume, "next/dynamic"),
                (ShareKind::Provide, "react"),
            ]
        );
    }

    #[test]
    fn test_invalid_shapes() {
        let tmp = project("{}");
        let normalizer = ShareConfigNormalizer::new(tmp.path());

        assert!(matches!(
            normalizer.normalize_consumes(&json!(42)),
            Err(ConfigError::InvalidShape { .. })
        ));
        assert!(matches!(
            normalizer.normalize_consumes(&json!({"react": true})),
            Err(ConfigError::InvalidEntry { .. })
        ));
        assert!(matches!(
            normalizer.normalize_provides(&json!({"react": {"unknownOption": 1}})),
            Err(ConfigError::InvalidOptions { .. })
        ));
        assert!(matches!(
            normalizer.normalize_consumes(&json!({"react": {"requiredVersion": "not-a-range"}})),
            Err(ConfigError::InvalidVersion { .. })
        ));
        assert!(matches!(
            normalizer.normalize_consumes(&json!({"react": {"requiredVersion": true}})),
            Err(ConfigError::TrueNotAllowed { .. })
        ));
    }

    #[test]
    fn test_effective_provided_version() {
        let d = ShareDescriptor::provide("react", "react");
        let inferred = Some(semver::Version::new(18, 2, 0));
        assert_eq!(
            effective_provided_version(&d, inferred.clone()).value(),
            inferred.as_ref()
        );

        let mut disabled = d.clone();
        disabled.version = ProvidedVersion::Disabled;
        assert!(effective_provided_version(&disabled, inferred).is_disabled());
    }
}

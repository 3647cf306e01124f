//! Include/exclude filters on share declarations.
//!
//! Filters are checked once a request has been resolved, since they need
//! the final request path and the resolved package version. A request
//! pattern is tried against both the request as written and the resolved
//! path.

use regex::Regex;
use semver::Version;
use thiserror::Error;
use tracing::debug;

use crate::core::descriptor::{ShareDescriptor, ShareFilter};
use crate::resolver::version::{parse_range, ParseError};

/// How a malformed version filter is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// A bad range simply does not match.
    Consume,
    /// A bad range is an error.
    Provide,
}

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid request pattern `{pattern}` for `{key}`")]
    Pattern {
        key: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid version filter for `{key}`")]
    Version {
        key: String,
        #[source]
        source: ParseError,
    },
}

/// Result of checking a descriptor's filters against one resolved module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    Accept,
    Skip(String),
}

impl FilterOutcome {
    pub fn is_accept(&self) -> bool {
        matches!(self, FilterOutcome::Accept)
    }
}

/// Test a request against an exact request, a prefix, or a `/regex/` pattern.
pub fn request_matches(key: &str, pattern: &str, request: &str) -> Result<bool, FilterError> {
    if let Some(body) = pattern
        .strip_prefix('/')
        .and_then(|rest| rest.strip_suffix('/'))
        .filter(|body| !body.is_empty())
    {
        let re = Regex::new(body).map_err(|source| FilterError::Pattern {
            key: key.to_string(),
            pattern: pattern.to_string(),
            source,
        })?;
        return Ok(re.is_match(request));
    }

    Ok(request == pattern || request.starts_with(pattern))
}

/// Test a version against a range filter.
///
/// Returns `None` when the version is unknown, which leaves the filter inert.
fn version_matches(
    key: &str,
    range: &str,
    version: Option<&Version>,
    mode: FilterMode,
) -> Result<Option<bool>, FilterError> {
    let Some(version) = version else {
        return Ok(None);
    };

    match parse_range(range) {
        Ok(range) => Ok(Some(range.matches(version))),
        Err(source) => match mode {
            FilterMode::Consume => {
                debug!("{}, treating filter on `{}` as non-matching", source, key);
                Ok(Some(false))
            }
            FilterMode::Provide => Err(FilterError::Version {
                key: key.to_string(),
                source,
            }),
        },
    }
}

/// The request as written and, once resolved, the path it resolved to.
#[derive(Debug, Clone, Copy)]
pub struct RequestPaths<'a> {
    pub request: &'a str,
    pub resolved: Option<&'a str>,
}

impl<'a> RequestPaths<'a> {
    pub fn new(request: &'a str, resolved: Option<&'a str>) -> Self {
        RequestPaths { request, resolved }
    }

    /// The first of the request or resolved path that `pattern` matches.
    fn matching(&self, key: &str, pattern: &str) -> Result<Option<&'a str>, FilterError> {
        for candidate in std::iter::once(self.request).chain(self.resolved) {
            if request_matches(key, pattern, candidate)? {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }
}

fn check_include(
    key: &str,
    filter: &ShareFilter,
    paths: RequestPaths<'_>,
    version: Option<&Version>,
    mode: FilterMode,
) -> Result<Option<String>, FilterError> {
    if let Some(pattern) = &filter.request {
        if paths.matching(key, pattern)?.is_none() {
            return Ok(Some(format!(
                "request `{}` is not included by `{}`",
                paths.request, pattern
            )));
        }
    }

    if let Some(range) = &filter.version {
        if version_matches(key, range, version, mode)? == Some(false) {
            return Ok(Some(format!("version is not included by `{}`", range)));
        }
    }

    Ok(None)
}

fn check_exclude(
    key: &str,
    filter: &ShareFilter,
    paths: RequestPaths<'_>,
    version: Option<&Version>,
    mode: FilterMode,
) -> Result<Option<String>, FilterError> {
    if let Some(pattern) = &filter.request {
        if let Some(matched) = paths.matching(key, pattern)? {
            return Ok(Some(format!(
                "request `{}` is excluded by `{}`",
                matched, pattern
            )));
        }
    }

    if let Some(range) = &filter.version {
        if version_matches(key, range, version, mode)? == Some(true) {
            return Ok(Some(format!("version is excluded by `{}`", range)));
        }
    }

    Ok(None)
}

/// Evaluate a descriptor's include and exclude filters.
pub fn evaluate(
    descriptor: &ShareDescriptor,
    paths: RequestPaths<'_>,
    version: Option<&Version>,
    mode: FilterMode,
) -> Result<FilterOutcome, FilterError> {
    let key = descriptor.share_key.as_str();

    if let Some(include) = &descriptor.include {
        if let Some(reason) = check_include(key, include, paths, version, mode)? {
            return Ok(FilterOutcome::Skip(reason));
        }
    }

    if let Some(exclude) = &descriptor.exclude {
        if let Some(reason) = check_exclude(key, exclude, paths, version, mode)? {
            return Ok(FilterOutcome::Skip(reason));
        }
    }

    Ok(FilterOutcome::Accept)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_filters(include: Option<ShareFilter>, exclude: Option<ShareFilter>) -> ShareDescriptor {
        let mut d = ShareDescriptor::consume("react/");
        d.include = include;
        d.exclude = exclude;
        d
    }

    fn version_filter(v: &str) -> Option<ShareFilter> {
        Some(ShareFilter {
            version: Some(v.to_string()),
            request: None,
        })
    }

    #[test]
    fn test_request_patterns() {
        assert!(request_matches("k", "react", "react").unwrap());
        assert!(request_matches("k", "react/", "react/jsx-runtime").unwrap());
        assert!(!request_matches("k", "react-dom", "react").unwrap());
        assert!(request_matches("k", "/jsx-(dev-)?runtime$/", "react/jsx-dev-runtime").unwrap());
        assert!(request_matches("k", "/[/", "x").is_err());
    }

    #[test]
    fn test_include_version() {
        let d = with_filters(version_filter("^18.0.0"), None);
        let v18 = Version::new(18, 2, 0);
        let v17 = Version::new(17, 0, 2);

        assert!(evaluate(&d, RequestPaths::new("react", None), Some(&v18), FilterMode::Consume).unwrap().is_accept());
        assert!(!evaluate(&d, RequestPaths::new("react", None), Some(&v17), FilterMode::Consume).unwrap().is_accept());
    }

    #[test]
    fn test_unknown_version_leaves_filters_inert() {
        let d = with_filters(version_filter("^18.0.0"), version_filter("*"));
        assert!(evaluate(&d, RequestPaths::new("react", None), None, FilterMode::Provide).unwrap().is_accept());
    }

    #[test]
    fn test_exclude_request() {
        let d = with_filters(
            None,
            Some(ShareFilter {
                version: None,
                request: Some("react/server".to_string()),
            }),
        );
        let v = Version::new(18, 2, 0);

        let outcome = evaluate(&d, RequestPaths::new("react/server.js", None), Some(&v), FilterMode::Consume).unwrap();
        assert!(matches!(outcome, FilterOutcome::Skip(reason) if reason.contains("excluded")));
        assert!(evaluate(&d, RequestPaths::new("react/client", None), Some(&v), FilterMode::Consume).unwrap().is_accept());
    }

    #[test]
    fn test_bad_version_filter_by_mode() {
        let d = with_filters(version_filter("not a range"), None);
        let v = Version::new(1, 0, 0);

        let consume = evaluate(&d, RequestPaths::new("react", None), Some(&v), FilterMode::Consume).unwrap();
        assert!(!consume.is_accept());

        let provide = evaluate(&d, RequestPaths::new("react", None), Some(&v), FilterMode::Provide);
        assert!(matches!(provide, Err(FilterError::Version { .. })));
    }

    #[test]
    fn test_request_filter_sees_resolved_path() {
        let pattern = |p: &str| {
            Some(ShareFilter {
                version: None,
                request: Some(p.to_string()),
            })
        };
        let resolved = Some("/app/node_modules/lodash/lodash.js");
        let v = Version::new(4, 17, 21);

        let d = with_filters(pattern("/node_modules/lodash/"), None);
        let paths = RequestPaths::new("lodash", resolved);
        assert!(evaluate(&d, paths, Some(&v), FilterMode::Consume).unwrap().is_accept());
        let unresolved = RequestPaths::new("lodash", None);
        assert!(!evaluate(&d, unresolved, Some(&v), FilterMode::Consume).unwrap().is_accept());

        let d = with_filters(None, pattern("/app/node_modules/"));
        let outcome = evaluate(&d, paths, Some(&v), FilterMode::Provide).unwrap();
        assert!(matches!(outcome, FilterOutcome::Skip(reason) if reason.contains("lodash.js")));

        let d = with_filters(pattern("lodash"), None);
        assert!(evaluate(&d, paths, Some(&v), FilterMode::Consume).unwrap().is_accept());
    }
}

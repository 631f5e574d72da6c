//! Path classification into rate-limit policy classes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Rate-limit tier selected for a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyClass {
    /// Everything not explicitly listed as sensitive.
    General,
    /// Authentication, registration, credential reset and similar endpoints.
    Sensitive,
}

impl PolicyClass {
    /// Returns the lowercase class name used in headers and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyClass::General => "general",
            PolicyClass::Sensitive => "sensitive",
        }
    }
}

impl fmt::Display for PolicyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default fragments that mark a path as sensitive.
pub const DEFAULT_SENSITIVE_PATTERNS: &[&str] = &[
    "/auth/login",
    "/auth/register",
    "/auth/forgot-password",
    "/auth/reset-password",
    "/auth/change-password",
    "/account/delete",
];

/// Maps request paths to a [`PolicyClass`].
///
/// A path is sensitive when it contains any configured fragment. Patterns
/// are checked in order and the first hit wins.
///
/// # Example
///
/// ```
/// use portcullis_core::{PolicyClass, RateLimitClassifier};
///
/// let classifier = RateLimitClassifier::default();
/// assert_eq!(classifier.classify("/api/v1/auth/login"), PolicyClass::Sensitive);
/// assert_eq!(classifier.classify("/api/v1/items"), PolicyClass::General);
/// ```
#[derive(Debug, Clone)]
pub struct RateLimitClassifier {
    sensitive_patterns: Vec<String>,
}

impl RateLimitClassifier {
    /// Creates a classifier from a list of sensitive path fragments.
    ///
    /// Empty fragments are dropped since they would match every path.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sensitive_patterns: patterns
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    /// Returns the class for the given request path.
    pub fn classify(&self, path: &str) -> PolicyClass {
        if self
            .sensitive_patterns
            .iter()
            .any(|pattern| path.contains(pattern.as_str()))
        {
            PolicyClass::Sensitive
        } else {
            PolicyClass::General
        }
    }

    /// Returns the configured sensitive fragments.
    pub fn patterns(&self) -> &[String] {
        &self.sensitive_patterns
    }
}

impl Default for RateLimitClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_SENSITIVE_PATTERNS.iter().copied())
    }
}

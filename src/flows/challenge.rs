//! Challenge Page Parsing
//!
//! Reads the hosted sign-in page: the embedded `SETTINGS` blob carrying the
//! transaction id and CSRF token, and "soft" error pages the provider returns
//! with HTTP 200.

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

const SETTINGS_MARKER: &str = "var SETTINGS = ";
const SETTINGS_PATTERN: &str = r"var\s+SETTINGS\s*=\s*(\{[^;]+\})\s*;";

/// Transaction values embedded in the challenge page.
#[derive(Clone, Deserialize)]
pub struct ChallengeSettings {
    #[serde(rename = "transId")]
    pub trans_id: String,
    pub csrf: String,
}

impl std::fmt::Debug for ChallengeSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChallengeSettings")
            .field("trans_id", &self.trans_id)
            .field("csrf", &"[REDACTED]")
            .finish()
    }
}

/// Recover the settings blob, trying a direct slice before the regex.
pub fn extract_settings(content: &str) -> Option<ChallengeSettings> {
    if let Some(start) = content.find(SETTINGS_MARKER) {
        let json_start = start + SETTINGS_MARKER.len();
        if let Some(len) = content[json_start..].find(';') {
            match serde_json::from_str(content[json_start..json_start + len].trim()) {
                Ok(settings) => {
                    debug!("Settings extracted via string slicing");
                    return Some(settings);
                }
                Err(e) => warn!(error = %e, "Sliced settings were not usable, trying regex"),
            }
        }
    }

    let captured = Regex::new(SETTINGS_PATTERN)
        .ok()?
        .captures(content)
        .and_then(|caps| caps.get(1));
    if let Some(json) = captured {
        match serde_json::from_str(json.as_str().trim()) {
            Ok(settings) => {
                debug!("Settings extracted via regex");
                return Some(settings);
            }
            Err(e) => warn!(error = %e, "Failed to parse settings JSON from regex match"),
        }
    }

    warn!("Could not extract settings from authorization content");
    None
}

/// Error signature found in a 200 response body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SoftError {
    pub code: String,
    pub detail: String,
}

impl SoftError {
    fn new(code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            detail: detail.into(),
        }
    }
}

#[derive(Clone, Debug)]
enum Matcher {
    /// `var GLOBALEX = {...}` with a JSON `Detail`.
    GlobalException(Regex),
    /// Settings flagged `"api": "GlobalException"`, titled by `"error-title"`.
    ExceptionPage { marker: Regex, title: Regex },
    /// Provider error code followed by its message.
    ErrorCode(Regex),
    /// Fixed phrases mapped to a fixed code.
    Phrase {
        needles: Vec<String>,
        ignore_case: bool,
        code: String,
        detail: String,
    },
}

/// One entry of the soft-error table.
#[derive(Clone, Debug)]
pub struct SoftErrorRule {
    matcher: Matcher,
}

impl SoftErrorRule {
    /// Match when any of `needles` occurs in the body.
    pub fn phrase(
        code: impl Into<String>,
        detail: impl Into<String>,
        needles: &[&str],
    ) -> Self {
        Self {
            matcher: Matcher::Phrase {
                needles: needles.iter().map(|n| n.to_string()).collect(),
                ignore_case: false,
                code: code.into(),
                detail: detail.into(),
            },
        }
    }

    /// Case-insensitive variant of [`SoftErrorRule::phrase`].
    pub fn phrase_ignore_case(
        code: impl Into<String>,
        detail: impl Into<String>,
        needles: &[&str],
    ) -> Self {
        Self {
            matcher: Matcher::Phrase {
                needles: needles.iter().map(|n| n.to_lowercase()).collect(),
                ignore_case: true,
                code: code.into(),
                detail: detail.into(),
            },
        }
    }

    fn global_exception() -> Option<Self> {
        let re = Regex::new(r"var GLOBALEX\s*=\s*\{([^}]+)\}").ok()?;
        Some(Self {
            matcher: Matcher::GlobalException(re),
        })
    }

    fn exception_page() -> Option<Self> {
        Some(Self {
            matcher: Matcher::ExceptionPage {
                marker: Regex::new(r#""api"\s*:\s*"GlobalException""#).ok()?,
                title: Regex::new(r#""error-title"\s*:\s*"([^"]+)""#).ok()?,
            },
        })
    }

    fn error_code() -> Option<Self> {
        let re = Regex::new(r#"(AADB2C\d+)[:\s]+([^<"\n]+)"#).ok()?;
        Some(Self {
            matcher: Matcher::ErrorCode(re),
        })
    }

    pub fn apply(&self, content: &str) -> Option<SoftError> {
        match &self.matcher {
            Matcher::GlobalException(re) => {
                let body = re.captures(content)?.get(1)?.as_str();
                let parsed: serde_json::Value =
                    serde_json::from_str(&format!("{{{}}}", body)).ok()?;
                let detail = parsed
                    .get("Detail")
                    .and_then(|d| d.as_str())
                    .unwrap_or("Unknown error");
                if let Some(correlation_id) = parsed.get("CorrelationId").and_then(|c| c.as_str()) {
                    debug!(correlation_id, "B2C exception page detected");
                }
                Some(SoftError::new("B2C_EXCEPTION", detail))
            }
            Matcher::ExceptionPage { marker, title } => {
                if !marker.is_match(content) {
                    return None;
                }
                let title = title
                    .captures(content)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().replace("&#39;", "'").replace("&quot;", "\""))
                    .unwrap_or_else(|| "Authentication error".to_string());
                Some(SoftError::new("GLOBAL_EXCEPTION", title))
            }
            Matcher::ErrorCode(re) => {
                let caps = re.captures(content)?;
                Some(SoftError::new(&caps[1], caps[2].trim()))
            }
            Matcher::Phrase {
                needles,
                ignore_case,
                code,
                detail,
            } => {
                let haystack = if *ignore_case {
                    std::borrow::Cow::Owned(content.to_lowercase())
                } else {
                    std::borrow::Cow::Borrowed(content)
                };
                needles
                    .iter()
                    .any(|n| haystack.contains(n.as_str()))
                    .then(|| SoftError::new(code.clone(), detail.clone()))
            }
        }
    }
}

/// Ordered soft-error table; the first matching rule wins.
#[derive(Clone, Debug)]
pub struct SoftErrorDetector {
    rules: Vec<SoftErrorRule>,
}

impl Default for SoftErrorDetector {
    fn default() -> Self {
        let mut rules: Vec<SoftErrorRule> = [
            SoftErrorRule::global_exception(),
            SoftErrorRule::exception_page(),
            SoftErrorRule::error_code(),
        ]
        .into_iter()
        .flatten()
        .collect();

        rules.push(SoftErrorRule::phrase(
            "INVALID_PASSWORD",
            "Your password is incorrect",
            &["Your password is incorrect"],
        ));
        rules.push(SoftErrorRule::phrase(
            "ACCOUNT_NOT_FOUND",
            "Account not found with that email address",
            &["We can't find an account", "account with that email"],
        ));
        rules.push(SoftErrorRule::phrase_ignore_case(
            "ACCOUNT_LOCKED",
            "Account is locked",
            &["account is locked"],
        ));

        Self { rules }
    }
}

impl SoftErrorDetector {
    /// Detector with no rules.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule after the existing ones.
    pub fn with_rule(mut self, rule: SoftErrorRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn detect(&self, content: &str) -> Option<SoftError> {
        self.rules.iter().find_map(|rule| rule.apply(content))
    }
}

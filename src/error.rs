// Uplift
// Copyright (C) 2025 - Uplift contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// long with this program.  If not, see <http://www.gnu.org/licenses/>.

use std::fmt;
use std::error::Error as StdError;
use std::io;

/// Main error type for uplift operations
#[derive(Debug)]
pub enum UpliftError {
    /// Bad topology definition, rejected before any platform mutation
    Validation(String),

    /// Configuration / CLI errors
    Config(String),

    /// Template rendering errors in topology fields
    Template(String),

    /// Transient platform API failure, retried with backoff before surfacing
    PlatformUnavailable(String),

    /// Another resource owns the requested identity with an incompatible spec
    ResourceConflict(String),

    /// Platform refused creation due to resource limits
    QuotaExceeded(String),

    /// A resource never reported a usable address within its deadline
    ReadinessTimeout { resource: String, waited_secs: u64 },

    /// A discovered address references a spec id that is not in the topology
    UnresolvedRole(String),

    /// Operator-initiated abort observed at a work boundary
    Cancelled,

    /// Another run holds the lease for this topology
    LockHeld(String),

    /// Secret material could not be obtained
    Secret(String),

    /// Configure hand-off command failed
    Apply(String),

    /// IO errors
    Io(io::Error),

    /// YAML parsing errors
    Yaml(serde_yaml::Error),

    /// JSON parsing errors (agent payloads, cached state)
    Json(serde_json::Error),

    /// Other errors
    Other(String),
}

impl UpliftError {
    /// Transient errors may be retried; everything else requires operator action.
    pub fn is_transient(&self) -> bool {
        matches!(self, UpliftError::PlatformUnavailable(_))
    }

    /// Short machine-readable kind, used in run reports.
    pub fn kind(&self) -> &'static str {
        match self {
            UpliftError::Validation(_) => "validation",
            UpliftError::Config(_) => "config",
            UpliftError::Template(_) => "template",
            UpliftError::PlatformUnavailable(_) => "platform-unavailable",
            UpliftError::ResourceConflict(_) => "resource-conflict",
            UpliftError::QuotaExceeded(_) => "quota-exceeded",
            UpliftError::ReadinessTimeout { .. } => "readiness-timeout",
            UpliftError::UnresolvedRole(_) => "unresolved-role",
            UpliftError::Cancelled => "cancelled",
            UpliftError::LockHeld(_) => "lock-held",
            UpliftError::Secret(_) => "secret",
            UpliftError::Apply(_) => "apply",
            UpliftError::Io(_) => "io",
            UpliftError::Yaml(_) => "yaml",
            UpliftError::Json(_) => "json",
            UpliftError::Other(_) => "other",
        }
    }
}

impl fmt::Display for UpliftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpliftError::Validation(msg) => write!(f, "Topology validation error: {}", msg),
            UpliftError::Config(msg) => write!(f, "Configuration error: {}", msg),
            UpliftError::Template(msg) => write!(f, "Template error: {}", msg),
            UpliftError::PlatformUnavailable(msg) => write!(f, "Platform unavailable: {}", msg),
            UpliftError::ResourceConflict(msg) => write!(f, "Resource conflict: {}", msg),
            UpliftError::QuotaExceeded(msg) => write!(f, "Quota exceeded: {}", msg),
            UpliftError::ReadinessTimeout { resource, waited_secs } => {
                write!(f, "Timeout waiting for readiness of '{}' after {}s", resource, waited_secs)
            }
            UpliftError::UnresolvedRole(msg) => write!(f, "Unresolved role: {}", msg),
            UpliftError::Cancelled => write!(f, "Run cancelled by operator"),
            UpliftError::LockHeld(msg) => write!(f, "Run lock held: {}", msg),
            UpliftError::Secret(msg) => write!(f, "Secret error: {}", msg),
            UpliftError::Apply(msg) => write!(f, "Apply error: {}", msg),
            UpliftError::Io(err) => write!(f, "IO error: {}", err),
            UpliftError::Yaml(err) => write!(f, "YAML error: {}", err),
            UpliftError::Json(err) => write!(f, "JSON error: {}", err),
            UpliftError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl StdError for UpliftError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            UpliftError::Io(err) => Some(err),
            UpliftError::Yaml(err) => Some(err),
            UpliftError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for UpliftError {
    fn from(err: io::Error) -> Self {
        UpliftError::Io(err)
    }
}

impl From<serde_yaml::Error> for UpliftError {
    fn from(err: serde_yaml::Error) -> Self {
        UpliftError::Yaml(err)
    }
}

impl From<serde_json::Error> for UpliftError {
    fn from(err: serde_json::Error) -> Self {
        UpliftError::Json(err)
    }
}

impl From<String> for UpliftError {
    fn from(err: String) -> Self {
        UpliftError::Other(err)
    }
}

impl From<&str> for UpliftError {
    fn from(err: &str) -> Self {
        UpliftError::Other(err.to_string())
    }
}

/// Result type alias for uplift operations
pub type Result<T> = std::result::Result<T, UpliftError>;

/// Helper trait to attach context to stringly errors from lower layers
pub trait ErrorContext<T> {
    fn context(self, context: &str) -> Result<T>;
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::result::Result<T, String> {
    fn context(self, context: &str) -> Result<T> {
        self.map_err(|e| UpliftError::Other(format!("{}: {}", context, e)))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| UpliftError::Other(format!("{}: {}", f(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(UpliftError::PlatformUnavailable("503".into()).is_transient());
        assert!(!UpliftError::QuotaExceeded("cpu".into()).is_transient());
        assert!(!UpliftError::ResourceConflict("vmid 101".into()).is_transient());
        assert!(!UpliftError::Cancelled.is_transient());
    }

    #[test]
    fn test_readiness_timeout_display_names_resource() {
        let e = UpliftError::ReadinessTimeout { resource: "k3s-server-1".into(), waited_secs: 300 };
        let msg = e.to_string();
        assert!(msg.contains("k3s-server-1"));
        assert!(msg.contains("300"));
    }

    #[test]
    fn test_error_context() {
        let r: std::result::Result<(), String> = Err("boom".to_string());
        let e = r.context("loading topology").unwrap_err();
        assert!(e.to_string().contains("loading topology: boom"));
    }

    #[test]
    fn test_kind_strings() {
        assert_eq!(UpliftError::Validation("x".into()).kind(), "validation");
        assert_eq!(
            UpliftError::ReadinessTimeout { resource: "a".into(), waited_secs: 1 }.kind(),
            "readiness-timeout"
        );
    }
}

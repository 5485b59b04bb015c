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

//! Secret material for platform authentication.
//!
//! Tokens are resolved once at run start, held in memory only, and never
//! written to logs or reports. An encrypted-at-rest store can be plugged in
//! behind [`SecretSource`] without touching the rest of the orchestrator.

use crate::error::{Result, UpliftError};
use crate::util::io::{expand_path, read_file};
use serde::Deserialize;
use std::env;
use std::fmt;

/// Where a secret value comes from. Declared in the topology's platform
/// section, resolved by [`resolve_secret`].
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SecretSource {
    /// Read from an environment variable at run start.
    Env { var: String },
    /// Read from a file on disk (tilde-expanded), trimmed.
    File { path: String },
    /// Inline value. Discouraged outside of tests and simulate mode.
    Value { value: String },
}

/// A resolved secret. Debug/Display are redacted so the value cannot leak
/// through reports or error messages.
#[derive(Clone, PartialEq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: String) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(****)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "****")
    }
}

pub fn resolve_secret(source: &SecretSource) -> Result<Secret> {
    match source {
        SecretSource::Env { var } => match env::var(var) {
            Ok(value) if !value.is_empty() => Ok(Secret::new(value)),
            _ => Err(UpliftError::Secret(format!("environment variable '{}' is not set", var))),
        },
        SecretSource::File { path } => {
            let expanded = expand_path(path)
                .map_err(|e| UpliftError::Secret(e.to_string()))?;
            let contents = read_file(&expanded)
                .map_err(|e| UpliftError::Secret(e.to_string()))?;
            let trimmed = contents.trim();
            if trimmed.is_empty() {
                return Err(UpliftError::Secret(format!("secret file '{}' is empty", path)));
            }
            Ok(Secret::new(trimmed.to_string()))
        }
        SecretSource::Value { value } => Ok(Secret::new(value.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_secret_debug_is_redacted() {
        let s = Secret::new("super-token".to_string());
        assert_eq!(format!("{:?}", s), "Secret(****)");
        assert_eq!(format!("{}", s), "****");
        assert_eq!(s.expose(), "super-token");
    }

    #[test]
    fn test_resolve_from_env() {
        env::set_var("UPLIFT_TEST_TOKEN", "abc123");
        let s = resolve_secret(&SecretSource::Env { var: "UPLIFT_TEST_TOKEN".to_string() }).unwrap();
        assert_eq!(s.expose(), "abc123");
        env::remove_var("UPLIFT_TEST_TOKEN");
    }

    #[test]
    fn test_resolve_from_missing_env() {
        let r = resolve_secret(&SecretSource::Env { var: "UPLIFT_DOES_NOT_EXIST".to_string() });
        assert!(r.is_err());
    }

    #[test]
    fn test_resolve_from_file_trims() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("token");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "  my-token  ").unwrap();

        let s = resolve_secret(&SecretSource::File { path: path.to_str().unwrap().to_string() }).unwrap();
        assert_eq!(s.expose(), "my-token");
    }

    #[test]
    fn test_resolve_from_empty_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("token");
        File::create(&path).unwrap();

        let r = resolve_secret(&SecretSource::File { path: path.to_str().unwrap().to_string() });
        assert!(r.is_err());
    }

    #[test]
    fn test_source_deserialization() {
        let src: SecretSource = serde_yaml::from_str("env:\n  var: PVE_TOKEN").unwrap();
        assert_eq!(src, SecretSource::Env { var: "PVE_TOKEN".to_string() });
    }
}

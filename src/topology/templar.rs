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

//! `{{ var }}` rendering for topology string fields.
//!
//! Strict by default: referencing an undefined variable is an error rather
//! than an empty string, so typos fail at load time and not as a half-built
//! resource on the platform.

use crate::error::{Result, UpliftError};
use handlebars::Handlebars;

pub struct Templar {
    registry: Handlebars<'static>,
}

impl Templar {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        Self { registry }
    }

    pub fn render(&self, template: &str, vars: &serde_yaml::Mapping) -> Result<String> {
        self.registry
            .render_template(template, vars)
            .map_err(|e| UpliftError::Template(format!("'{}': {}", template, e)))
    }

    /// Render only when the value actually contains an expression.
    pub fn render_string(&self, value: &str, vars: &serde_yaml::Mapping) -> Result<String> {
        if value.contains("{{") {
            self.render(value, vars)
        } else {
            Ok(value.to_string())
        }
    }

    pub fn render_option(&self, value: &Option<String>, vars: &serde_yaml::Mapping) -> Result<Option<String>> {
        match value {
            Some(v) => Ok(Some(self.render_string(v, vars)?)),
            None => Ok(None),
        }
    }
}

impl Default for Templar {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(yaml: &str) -> serde_yaml::Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_render_substitutes() {
        let templar = Templar::new();
        let v = vars("bridge: vmbr0");
        let out = templar.render_string("name=eth0,bridge={{ bridge }}", &v).unwrap();
        assert_eq!(out, "name=eth0,bridge=vmbr0");
    }

    #[test]
    fn test_plain_strings_pass_through() {
        let templar = Templar::new();
        let v = vars("bridge: vmbr0");
        let out = templar.render_string("local-lvm", &v).unwrap();
        assert_eq!(out, "local-lvm");
    }

    #[test]
    fn test_undefined_variable_is_an_error() {
        let templar = Templar::new();
        let v = vars("bridge: vmbr0");
        let result = templar.render_string("{{ storage }}", &v);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("storage"));
    }

    #[test]
    fn test_render_option() {
        let templar = Templar::new();
        let v = vars("node: pve1");
        assert_eq!(
            templar.render_option(&Some("{{ node }}".to_string()), &v).unwrap(),
            Some("pve1".to_string())
        );
        assert_eq!(templar.render_option(&None, &v).unwrap(), None);
    }
}

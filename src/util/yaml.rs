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

use crate::util::terminal::banner;
use std::fs::read_to_string;
use std::path::Path;

const YAML_ERROR_SHOW_LINES: usize = 10;
const YAML_ERROR_WIDTH: usize = 180; // things will wrap in terminal anyway

/// Print a topology parse error with the surrounding file lines marked.
pub fn show_yaml_error_in_context(yaml_error: &serde_yaml::Error, path: &Path) {
    println!();

    let mut error_str = format!("{}", yaml_error);
    error_str.truncate(YAML_ERROR_WIDTH);
    if error_str.len() > YAML_ERROR_WIDTH - 3 {
        error_str.push_str("...");
    }

    let location = match yaml_error.location() {
        Some(loc) => loc,
        None => {
            banner(&format!("Error reading YAML file: {}: {}", path.display(), error_str));
            return;
        }
    };

    let error_line = location.line();
    let error_column = location.column();

    let lines: Vec<String> = match read_to_string(path) {
        Ok(text) => text.lines().map(String::from).collect(),
        Err(_) => Vec::new(),
    };

    banner(&format!("Error reading YAML file: {}, {}", path.display(), error_str));

    let show_start = error_line.saturating_sub(YAML_ERROR_SHOW_LINES);
    let show_stop = (error_line + YAML_ERROR_SHOW_LINES).min(lines.len());

    println!();
    for (idx, line) in lines.iter().enumerate() {
        let count = idx + 1;
        if count >= show_start && count <= show_stop {
            if count == error_line {
                println!("     {count:5}:{error_column:5} | >>> | {}", line);
            } else {
                println!("     {count:5}       |     | {}", line);
            }
        }
    }
    println!();
}

/// Merge mapping `b` into `a`: sequences append, mappings recurse, scalars
/// in `b` win. Used to layer per-resource vars over topology defaults.
pub fn blend_variables(a: &mut serde_yaml::Value, b: serde_yaml::Value) {
    match (a, b) {
        (&mut serde_yaml::Value::Mapping(_), serde_yaml::Value::Null) => {}
        (a @ &mut serde_yaml::Value::Mapping(_), serde_yaml::Value::Mapping(b)) => {
            let a = a.as_mapping_mut().unwrap();
            for (k, v) in b {
                if v.is_sequence() && a.contains_key(&k) && a[&k].is_sequence() {
                    let mut merged = a.get(&k).unwrap().as_sequence().unwrap().to_owned();
                    merged.append(&mut v.as_sequence().unwrap().to_owned());
                    a[&k] = serde_yaml::Value::from(merged);
                } else if !a.contains_key(&k) {
                    a.insert(k.to_owned(), v.to_owned());
                } else {
                    blend_variables(&mut a[&k], v);
                }
            }
        }
        (a, b) => *a = b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_blend_overrides_scalar() {
        let mut a = serde_yaml::from_str("memory: 1024").unwrap();
        let b = serde_yaml::from_str("memory: 2048").unwrap();
        blend_variables(&mut a, b);
        assert_eq!(a["memory"], 2048);
    }

    #[test]
    fn test_blend_keeps_unrelated_keys() {
        let mut a = serde_yaml::from_str("cores: 2").unwrap();
        let b = serde_yaml::from_str("memory: 2048").unwrap();
        blend_variables(&mut a, b);
        assert_eq!(a["cores"], 2);
        assert_eq!(a["memory"], 2048);
    }

    #[test]
    fn test_blend_appends_sequences() {
        let mut a = serde_yaml::from_str("nameservers: [\"1.1.1.1\"]").unwrap();
        let b = serde_yaml::from_str("nameservers: [\"8.8.8.8\"]").unwrap();
        blend_variables(&mut a, b);
        assert_eq!(a["nameservers"].as_sequence().unwrap().len(), 2);
    }

    #[test]
    fn test_blend_recurses_into_mappings() {
        let mut a = serde_yaml::from_str("network:\n  mode: dhcp").unwrap();
        let b = serde_yaml::from_str("network:\n  family: ipv4").unwrap();
        blend_variables(&mut a, b);
        assert_eq!(a["network"]["mode"], "dhcp");
        assert_eq!(a["network"]["family"], "ipv4");
    }

    #[test]
    fn test_blend_null_is_noop() {
        let mut a = serde_yaml::from_str("key: value").unwrap();
        blend_variables(&mut a, serde_yaml::Value::Null);
        assert_eq!(a["key"], "value");
    }

    #[test]
    fn test_show_yaml_error_does_not_panic() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("t.yml");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "resources: [unclosed").unwrap();

        let content = std::fs::read_to_string(&file_path).unwrap();
        let error = serde_yaml::from_str::<serde_yaml::Value>(&content).unwrap_err();
        show_yaml_error_in_context(&error, &file_path);
    }
}

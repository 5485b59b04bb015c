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

use crate::error::{Result, UpliftError};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;

// open a file per the normal rust way, but keep the path in the error message
pub fn open_file(path: &Path) -> Result<fs::File> {
    fs::File::open(path)
        .map_err(|_| UpliftError::Config(format!("unable to open file: {}", path.display())))
}

pub fn read_file(path: &Path) -> Result<String> {
    let mut file = open_file(path)?;
    let mut buffer = String::new();
    file.read_to_string(&mut buffer)
        .map_err(|e| UpliftError::Config(format!("unable to read file: {}, {}", path.display(), e)))?;
    Ok(buffer)
}

/// Expand a leading tilde in operator-supplied paths.
pub fn expand_path(path: &str) -> Result<PathBuf> {
    expanduser::expanduser(path)
        .map_err(|_| UpliftError::Config(format!("unable to expand path: {}", path)))
}

pub fn path_as_string(path: &Path) -> String {
    path.to_str().unwrap_or_default().to_string()
}

pub fn quit(s: &str) {
    // quit with a message - don't use this except in main.rs!
    println!("{}", s);
    process::exit(0x01)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_open_file_missing() {
        let result = open_file(Path::new("/non/existent/topology.yml"));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("unable to open file"));
    }

    #[test]
    fn test_read_file_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("t.yml");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "name: homelab").unwrap();

        let content = read_file(&file_path).unwrap();
        assert!(content.contains("name: homelab"));
    }

    #[test]
    fn test_expand_path_plain() {
        let p = expand_path("/tmp/state").unwrap();
        assert_eq!(p, PathBuf::from("/tmp/state"));
    }

    #[test]
    fn test_path_as_string() {
        assert_eq!(path_as_string(Path::new("/a/b.yml")), "/a/b.yml");
    }
}

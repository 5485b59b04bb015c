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

//! Run-level lease preventing two orchestrations of the same topology from
//! double-provisioning the same ids.

use crate::error::{Result, UpliftError};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    released: bool,
}

impl RunLock {
    /// Take the lease for a topology fingerprint, reclaiming it when the
    /// holding process is gone.
    pub fn acquire(state_dir: &Path, fingerprint: &str) -> Result<Self> {
        fs::create_dir_all(state_dir)?;
        let path = state_dir.join(format!("{}.lock", &fingerprint[..16.min(fingerprint.len())]));

        if path.exists() {
            let contents = fs::read_to_string(&path).unwrap_or_default();
            let holder_pid = contents.lines().next().and_then(|l| l.trim().parse::<u32>().ok());
            match holder_pid {
                Some(pid) if process_alive(pid) => {
                    return Err(UpliftError::LockHeld(format!(
                        "topology is locked by pid {} ({})", pid, path.display()
                    )));
                }
                _ => {
                    // stale lease from a dead run
                    fs::remove_file(&path)?;
                }
            }
        }

        fs::write(&path, format!("{}\n{}\n", std::process::id(), fingerprint))?;
        Ok(Self { path, released: false })
    }

    pub fn release(mut self) -> Result<()> {
        self.released = true;
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = fs::remove_file(&self.path);
        }
    }
}

fn process_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{}", pid)).exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FP: &str = "abcdef0123456789abcdef0123456789";

    #[test]
    fn test_acquire_and_release() {
        let dir = TempDir::new().unwrap();
        let lock = RunLock::acquire(dir.path(), FP).unwrap();
        assert!(dir.path().join("abcdef0123456789.lock").exists());
        lock.release().unwrap();
        assert!(!dir.path().join("abcdef0123456789.lock").exists());
    }

    #[test]
    fn test_second_acquire_fails_while_held() {
        let dir = TempDir::new().unwrap();
        let _lock = RunLock::acquire(dir.path(), FP).unwrap();
        let err = RunLock::acquire(dir.path(), FP).unwrap_err();
        assert_eq!(err.kind(), "lock-held");
    }

    #[test]
    fn test_stale_lease_is_reclaimed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("abcdef0123456789.lock");
        // no live process will have this pid
        fs::write(&path, "4294967294\nstale\n").unwrap();
        let lock = RunLock::acquire(dir.path(), FP).unwrap();
        lock.release().unwrap();
    }

    #[test]
    fn test_drop_releases() {
        let dir = TempDir::new().unwrap();
        {
            let _lock = RunLock::acquire(dir.path(), FP).unwrap();
        }
        assert!(!dir.path().join("abcdef0123456789.lock").exists());
        // and a fresh acquire succeeds
        let lock = RunLock::acquire(dir.path(), FP).unwrap();
        lock.release().unwrap();
    }

    #[test]
    fn test_different_topologies_do_not_collide() {
        let dir = TempDir::new().unwrap();
        let a = RunLock::acquire(dir.path(), FP).unwrap();
        let b = RunLock::acquire(dir.path(), "ffffffffffffffffffffffffffffffff").unwrap();
        a.release().unwrap();
        b.release().unwrap();
    }
}

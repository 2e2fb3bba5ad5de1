/*
   Unix SMB/CIFS implementation.

   External IdM adapter trash handling

   Copyright (C) David Mulder 2024

   This program is free software; you can redistribute it and/or modify
   it under the terms of the GNU General Public License as published by
   the Free Software Foundation; either version 3 of the License, or
   (at your option) any later version.

   This program is distributed in the hope that it will be useful,
   but WITHOUT ANY WARRANTY; without even the implied warranty of
   MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
   GNU General Public License for more details.

   You should have received a copy of the GNU General Public License
   along with this program.  If not, see <http://www.gnu.org/licenses/>.
*/

use crate::error::{AdapterError, Result};
use chelps::path_to_cstring;
use dbg::{DBG_NOTICE, DBG_WARNING};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

fn slot_taken(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::EEXIST) | Some(libc::ENOTEMPTY)
    )
}

/// Rename `from` to `to`, failing with EEXIST if `to` is already there.
fn rename_noreplace(from: &Path, to: &Path) -> io::Result<()> {
    let cfrom = path_to_cstring(from)?;
    let cto = path_to_cstring(to)?;
    let res = unsafe {
        libc::renameat2(
            libc::AT_FDCWD,
            cfrom.as_ptr(),
            libc::AT_FDCWD,
            cto.as_ptr(),
            libc::RENAME_NOREPLACE,
        )
    };
    if res == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() != Some(libc::EINVAL) {
        return Err(err);
    }

    // Filesystem without RENAME_NOREPLACE
    if to.symlink_metadata().is_ok() {
        return Err(io::Error::from_raw_os_error(libc::EEXIST));
    }
    std::fs::rename(from, to)
}

fn touch(path: &Path) -> io::Result<()> {
    File::open(path)?.set_modified(SystemTime::now())
}

/// Move `path` to the first free `<trashdir>/<stem>.<n>` slot.
///
/// Returns the slot used, or None when there was nothing to move. A slot
/// that already exists is never overwritten.
pub(crate) fn move_to_trash(
    path: &Path,
    trashdir: &Path,
    stem: &str,
) -> Result<Option<PathBuf>> {
    match path.symlink_metadata() {
        Ok(_) => (),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            DBG_NOTICE!("{} is already gone", path.display());
            return Ok(None);
        }
        Err(e) => {
            return Err(AdapterError::io(
                format!("failed to stat {}", path.display()),
                e,
            ))
        }
    }

    let mut n: u64 = 0;
    let slot = loop {
        let slot = trashdir.join(format!("{}.{}", stem, n));
        match rename_noreplace(path, &slot) {
            Ok(()) => break slot,
            Err(e) if slot_taken(&e) => n += 1,
            Err(e) => {
                return Err(AdapterError::io(
                    format!(
                        "failed to move {} to {}",
                        path.display(),
                        slot.display()
                    ),
                    e,
                ))
            }
        }
    };

    if let Err(e) = touch(&slot) {
        DBG_WARNING!(
            "Failed to update modification time of {}: {}",
            slot.display(),
            e
        );
    }
    Ok(Some(slot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_missing_source_is_noop() {
        let dir = tempdir().unwrap();
        let trash = dir.path().join("trash");
        std::fs::create_dir(&trash).unwrap();

        let res = move_to_trash(&dir.path().join("1000"), &trash, "1000")
            .expect("Trashing a missing home failed");
        assert_eq!(res, None);
        assert_eq!(std::fs::read_dir(&trash).unwrap().count(), 0);
    }

    #[test]
    fn test_takes_first_free_slot() {
        let dir = tempdir().unwrap();
        let trash = dir.path().join("trash");
        std::fs::create_dir(&trash).unwrap();

        let home = dir.path().join("1000");
        std::fs::create_dir(&home).unwrap();
        std::fs::write(home.join("first"), b"1").unwrap();
        let slot = move_to_trash(&home, &trash, "1000").unwrap();
        assert_eq!(slot, Some(trash.join("1000.0")));
        assert!(!home.exists());

        std::fs::create_dir(&home).unwrap();
        std::fs::write(home.join("second"), b"2").unwrap();
        let slot = move_to_trash(&home, &trash, "1000").unwrap();
        assert_eq!(slot, Some(trash.join("1000.1")));
        assert!(!home.exists());

        // The earlier copy is left alone
        assert!(trash.join("1000.0/first").exists());
        assert!(!trash.join("1000.0/second").exists());
        assert!(trash.join("1000.1/second").exists());
    }

    #[test]
    fn test_skips_taken_file_slot() {
        let dir = tempdir().unwrap();
        let trash = dir.path().join("trash");
        std::fs::create_dir(&trash).unwrap();
        std::fs::write(trash.join("1000.0"), b"not a home").unwrap();

        let home = dir.path().join("1000");
        std::fs::create_dir(&home).unwrap();
        let slot = move_to_trash(&home, &trash, "1000").unwrap();
        assert_eq!(slot, Some(trash.join("1000.1")));
        assert_eq!(std::fs::read(trash.join("1000.0")).unwrap(), b"not a home");
    }

    #[test]
    fn test_refreshes_mtime() {
        let dir = tempdir().unwrap();
        let trash = dir.path().join("trash");
        std::fs::create_dir(&trash).unwrap();

        let home = dir.path().join("1000");
        std::fs::create_dir(&home).unwrap();
        let old = SystemTime::now() - Duration::from_secs(86400);
        File::open(&home).unwrap().set_modified(old).unwrap();

        let slot = move_to_trash(&home, &trash, "1000").unwrap().unwrap();
        let mtime = slot.metadata().unwrap().modified().unwrap();
        assert!(mtime > old + Duration::from_secs(3600));
    }

    #[test]
    fn test_missing_trashdir_fails() {
        let dir = tempdir().unwrap();
        let home = dir.path().join("1000");
        std::fs::create_dir(&home).unwrap();

        let res = move_to_trash(&home, &dir.path().join("missing"), "1000");
        assert!(matches!(res, Err(AdapterError::Io { .. })));
        assert!(home.exists());
    }
}

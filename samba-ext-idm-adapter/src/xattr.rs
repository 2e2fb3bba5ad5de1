/*
   Unix SMB/CIFS implementation.

   External IdM adapter extended attribute helpers

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

use crate::constants::NAME_XATTR;
use chelps::path_to_cstring;
use std::io;
use std::path::Path;

fn is_missing(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::ENODATA)
}

/// Whether the filesystem holding `path` refused the attribute outright.
pub(crate) fn is_unsupported(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EOPNOTSUPP)
}

/// The login name recorded on `path`, None if it was never set.
pub(crate) fn get_name(path: &Path) -> io::Result<Option<Vec<u8>>> {
    let cpath = path_to_cstring(path)?;
    loop {
        let size = unsafe {
            libc::getxattr(
                cpath.as_ptr(),
                NAME_XATTR.as_ptr(),
                std::ptr::null_mut(),
                0,
            )
        };
        if size < 0 {
            let err = io::Error::last_os_error();
            return match is_missing(&err) {
                true => Ok(None),
                false => Err(err),
            };
        }

        let mut buf = vec![0u8; size as usize];
        let res = unsafe {
            libc::getxattr(
                cpath.as_ptr(),
                NAME_XATTR.as_ptr(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
            )
        };
        if res < 0 {
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                // Value grew between the two calls
                Some(libc::ERANGE) => continue,
                Some(libc::ENODATA) => return Ok(None),
                _ => return Err(err),
            }
        }
        buf.truncate(res as usize);
        return Ok(Some(buf));
    }
}

pub(crate) fn set_name(path: &Path, name: &str) -> io::Result<()> {
    let cpath = path_to_cstring(path)?;
    let res = unsafe {
        libc::setxattr(
            cpath.as_ptr(),
            NAME_XATTR.as_ptr(),
            name.as_ptr() as *const libc::c_void,
            name.len(),
            0,
        )
    };
    match res {
        0 => Ok(()),
        _ => Err(io::Error::last_os_error()),
    }
}

/// Drop the recorded name. Removing an absent attribute is not an error.
pub(crate) fn remove_name(path: &Path) -> io::Result<()> {
    let cpath = path_to_cstring(path)?;
    let res =
        unsafe { libc::removexattr(cpath.as_ptr(), NAME_XATTR.as_ptr()) };
    if res == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    match is_missing(&err) {
        true => Ok(()),
        false => Err(err),
    }
}

/// Whether a name is recorded on `path` at all.
pub(crate) fn has_name(path: &Path) -> io::Result<bool> {
    let cpath = path_to_cstring(path)?;
    let size = unsafe {
        libc::getxattr(
            cpath.as_ptr(),
            NAME_XATTR.as_ptr(),
            std::ptr::null_mut(),
            0,
        )
    };
    if size >= 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    match is_missing(&err) {
        true => Ok(false),
        false => Err(err),
    }
}

#[cfg(test)]
pub(crate) fn supported(dir: &Path) -> bool {
    let probe = dir.join(".xattr-probe");
    if std::fs::write(&probe, b"").is_err() {
        return false;
    }
    let res = set_name(&probe, "probe").is_ok();
    let _ = std::fs::remove_file(&probe);
    res
}

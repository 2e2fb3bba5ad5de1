/*
   Unix SMB/CIFS implementation.

   C conversion helper functions and macros

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

use std::ffi::{CStr, CString};
use std::io;
use std::os::raw::c_char;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// Copy a NUL terminated C string into an owned `String`.
///
/// Returns `None` for a NULL pointer or for data that is not valid UTF-8.
pub unsafe fn wrap_c_char(input: *const c_char) -> Option<String> {
    if input.is_null() {
        return None;
    }

    let c_str = unsafe { CStr::from_ptr(input) };
    match c_str.to_str() {
        Ok(output) => Some(output.to_string()),
        Err(_) => None,
    }
}

/// Copy a length delimited C buffer (such as an `ldb_val`) into a `Vec`.
pub unsafe fn wrap_c_bytes(data: *const u8, length: usize) -> Option<Vec<u8>> {
    if data.is_null() {
        return None;
    }
    Some(unsafe { std::slice::from_raw_parts(data, length) }.to_vec())
}

/// Convert a filesystem path into a C string for the libc *at() and
/// *xattr() families.
pub fn path_to_cstring(path: &Path) -> io::Result<CString> {
    CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("path contains a NUL byte: {}", path.display()),
        )
    })
}

#[macro_export]
macro_rules! function {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            std::any::type_name::<T>()
        }
        let name = type_name_of(f);

        let base_name = match name.rfind("::") {
            Some(pos) => &name[..pos],
            None => name,
        };
        let parts: Vec<&str> = base_name
            .split("::")
            .filter(|&p| p != "{{closure}}")
            .collect();
        parts.join("::")
    }};
}

/*
   Unix SMB/CIFS implementation.

   Talloc memory context functions

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

use std::ffi::{c_void, CStr};

pub mod ffi {
    #![allow(non_upper_case_globals)]
    #![allow(non_camel_case_types)]
    #![allow(non_snake_case)]
    #![allow(dead_code)]
    #![allow(clippy::upper_case_acronyms)]
    include!(concat!(env!("OUT_DIR"), "/bindings.rs"));
}

#[doc(hidden)]
pub use chelps;

/// Free a talloc pointer (and everything allocated beneath it) and reset
/// the variable to NULL, like the C `TALLOC_FREE()` macro.
#[macro_export]
macro_rules! TALLOC_FREE {
    ($ctx:expr) => {{
        if !$ctx.is_null() {
            let location = format!(
                "{}:{} ({})",
                file!(),
                line!(),
                $crate::chelps::function!()
            );
            let location_cstr = std::ffi::CString::new(location)
                .unwrap_or_default();
            unsafe {
                $crate::ffi::_talloc_free(
                    $ctx as *mut std::ffi::c_void,
                    location_cstr.as_ptr(),
                );
            }
            $ctx = std::ptr::null_mut();
        }
    }};
}

/// An owning top level talloc context.
///
/// Everything a C library allocates beneath this context is released
/// exactly once, when the guard is dropped.
pub struct TallocCtx {
    ctx: *mut c_void,
}

impl TallocCtx {
    /// The name is kept by talloc for the lifetime of the context, hence
    /// the `'static` bound.
    pub fn new(name: &'static CStr) -> Option<Self> {
        let ctx = unsafe {
            ffi::talloc_named_const(std::ptr::null(), 0, name.as_ptr())
        };
        if ctx.is_null() {
            return None;
        }
        Some(TallocCtx { ctx })
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.ctx
    }

    /// Number of live allocations under (and including) this context.
    pub fn total_blocks(&self) -> usize {
        unsafe { ffi::talloc_total_blocks(self.ctx) }
    }
}

impl Drop for TallocCtx {
    fn drop(&mut self) {
        TALLOC_FREE!(self.ctx);
    }
}

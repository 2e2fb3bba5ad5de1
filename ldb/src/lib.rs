/*
   Unix SMB/CIFS implementation.

   LDAP-like database library FFI

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

use chelps::{wrap_c_bytes, wrap_c_char};
use dbg::{DBG_DEBUG, DBG_ERR};
use std::collections::HashMap;
use std::ffi::CString;
use std::fmt;
use std::os::raw::{c_char, c_int};
use std::ptr;
use std::slice;
use std::sync::OnceLock;
use talloc::TallocCtx;

mod ffi {
    #![allow(non_upper_case_globals)]
    #![allow(non_camel_case_types)]
    #![allow(non_snake_case)]
    #![allow(dead_code)]
    #![allow(clippy::upper_case_acronyms)]
    include!(concat!(env!("OUT_DIR"), "/bindings.rs"));
}

pub const LDB_SUCCESS: LdbError = LdbError(ffi::LDB_SUCCESS);
pub const LDB_ERR_OPERATIONS_ERROR: LdbError =
    LdbError(ffi::LDB_ERR_OPERATIONS_ERROR);
pub const LDB_ERR_PROTOCOL_ERROR: LdbError =
    LdbError(ffi::LDB_ERR_PROTOCOL_ERROR);
pub const LDB_ERR_NO_SUCH_ATTRIBUTE: LdbError =
    LdbError(ffi::LDB_ERR_NO_SUCH_ATTRIBUTE);
pub const LDB_ERR_CONSTRAINT_VIOLATION: LdbError =
    LdbError(ffi::LDB_ERR_CONSTRAINT_VIOLATION);
pub const LDB_ERR_NO_SUCH_OBJECT: LdbError =
    LdbError(ffi::LDB_ERR_NO_SUCH_OBJECT);
pub const LDB_ERR_INVALID_DN_SYNTAX: LdbError =
    LdbError(ffi::LDB_ERR_INVALID_DN_SYNTAX);
pub const LDB_ERR_INSUFFICIENT_ACCESS_RIGHTS: LdbError =
    LdbError(ffi::LDB_ERR_INSUFFICIENT_ACCESS_RIGHTS);
pub const LDB_ERR_UNAVAILABLE: LdbError = LdbError(ffi::LDB_ERR_UNAVAILABLE);
pub const LDB_ERR_UNWILLING_TO_PERFORM: LdbError =
    LdbError(ffi::LDB_ERR_UNWILLING_TO_PERFORM);
pub const LDB_ERR_ENTRY_ALREADY_EXISTS: LdbError =
    LdbError(ffi::LDB_ERR_ENTRY_ALREADY_EXISTS);
pub const LDB_ERR_OTHER: LdbError = LdbError(ffi::LDB_ERR_OTHER);

#[derive(PartialEq, Eq, Clone, Copy)]
pub struct LdbError(pub u32);

impl LdbError {
    fn description(&self) -> &str {
        match self.0 {
            ffi::LDB_SUCCESS => "LDB_SUCCESS",
            ffi::LDB_ERR_OPERATIONS_ERROR => "LDB_ERR_OPERATIONS_ERROR",
            ffi::LDB_ERR_PROTOCOL_ERROR => "LDB_ERR_PROTOCOL_ERROR",
            ffi::LDB_ERR_NO_SUCH_ATTRIBUTE => "LDB_ERR_NO_SUCH_ATTRIBUTE",
            ffi::LDB_ERR_CONSTRAINT_VIOLATION => {
                "LDB_ERR_CONSTRAINT_VIOLATION"
            }
            ffi::LDB_ERR_NO_SUCH_OBJECT => "LDB_ERR_NO_SUCH_OBJECT",
            ffi::LDB_ERR_INVALID_DN_SYNTAX => "LDB_ERR_INVALID_DN_SYNTAX",
            ffi::LDB_ERR_INSUFFICIENT_ACCESS_RIGHTS => {
                "LDB_ERR_INSUFFICIENT_ACCESS_RIGHTS"
            }
            ffi::LDB_ERR_UNAVAILABLE => "LDB_ERR_UNAVAILABLE",
            ffi::LDB_ERR_UNWILLING_TO_PERFORM => {
                "LDB_ERR_UNWILLING_TO_PERFORM"
            }
            ffi::LDB_ERR_ENTRY_ALREADY_EXISTS => {
                "LDB_ERR_ENTRY_ALREADY_EXISTS"
            }
            ffi::LDB_ERR_OTHER => "LDB_ERR_OTHER",
            _ => "Unknown LDB error code",
        }
    }

    fn check(ret: c_int) -> Result<(), LdbError> {
        match LdbError(ret as u32) {
            LDB_SUCCESS => Ok(()),
            e => Err(e),
        }
    }
}

impl fmt::Display for LdbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LdbError({}): {}", self.0, self.description())
    }
}

impl fmt::Debug for LdbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LdbError({})", self.0)
    }
}

impl std::error::Error for LdbError {}

static GLOBAL_INIT: OnceLock<c_int> = OnceLock::new();

fn global_init() -> Result<(), LdbError> {
    let ret = *GLOBAL_INIT.get_or_init(|| unsafe { ffi::ldb_global_init() });
    LdbError::check(ret).map_err(|e| {
        DBG_ERR!("LDB global initialization failed: {}", e);
        e
    })
}

fn cstring(input: &str, err: LdbError) -> Result<CString, LdbError> {
    CString::new(input).map_err(|_| {
        DBG_ERR!("Embedded NUL byte in '{}'", input.escape_debug());
        err
    })
}

/// One search result entry, copied out of the talloc owned result.
///
/// Attribute names are matched case-insensitively, as in LDAP.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LdbMessage {
    dn: Option<String>,
    elements: HashMap<String, Vec<Vec<u8>>>,
}

impl LdbMessage {
    unsafe fn from_raw(msg: &ffi::ldb_message) -> Self {
        let dn = if msg.dn.is_null() {
            None
        } else {
            unsafe { wrap_c_char(ffi::ldb_dn_get_linearized(msg.dn)) }
        };

        let raw_elements: &[ffi::ldb_message_element] =
            if msg.elements.is_null() {
                &[]
            } else {
                unsafe {
                    slice::from_raw_parts(
                        msg.elements,
                        msg.num_elements as usize,
                    )
                }
            };

        let mut elements = HashMap::new();
        for el in raw_elements {
            let name = match unsafe { wrap_c_char(el.name) } {
                Some(name) => name,
                None => continue,
            };
            let raw_values: &[ffi::ldb_val] = if el.values.is_null() {
                &[]
            } else {
                unsafe {
                    slice::from_raw_parts(el.values, el.num_values as usize)
                }
            };
            let values: Vec<Vec<u8>> = raw_values
                .iter()
                .filter_map(|v| unsafe { wrap_c_bytes(v.data, v.length) })
                .collect();
            elements.insert(name.to_lowercase(), values);
        }

        LdbMessage { dn, elements }
    }

    pub fn dn(&self) -> Option<&str> {
        self.dn.as_deref()
    }

    pub fn values(&self, attr: &str) -> &[Vec<u8>] {
        match self.elements.get(&attr.to_lowercase()) {
            Some(values) => values.as_slice(),
            None => &[],
        }
    }

    /// First value of a (single valued) attribute.
    pub fn get(&self, attr: &str) -> Option<&[u8]> {
        self.values(attr).first().map(|v| v.as_slice())
    }

    pub fn get_str(&self, attr: &str) -> Option<&str> {
        self.get(attr).and_then(|v| std::str::from_utf8(v).ok())
    }
}

/// A connected ldb database.
///
/// The `ldb_context` and every allocation made through it hang off a
/// single talloc context, which is released when the handle is dropped.
pub struct Ldb {
    ldb: *mut ffi::ldb_context,
    mem_ctx: TallocCtx,
}

impl Ldb {
    pub fn connect(url: &str) -> Result<Self, LdbError> {
        global_init()?;

        let mem_ctx = TallocCtx::new(c"ldb").ok_or(LDB_ERR_OPERATIONS_ERROR)?;
        let ldb = unsafe { ffi::ldb_init(mem_ctx.as_ptr(), ptr::null_mut()) };
        if ldb.is_null() {
            DBG_ERR!("Failed to initialize the ldb context");
            return Err(LDB_ERR_OPERATIONS_ERROR);
        }
        let ldb = Ldb { ldb, mem_ctx };

        ldb.modules_hook(
            ffi::ldb_module_hooks_LDB_MODULE_HOOK_CMDLINE_PRECONNECT,
        )
        .map_err(|e| {
            DBG_ERR!("Failed to run module preconnect hooks: {}", e);
            e
        })?;

        let url_cstr = cstring(url, LDB_ERR_OTHER)?;
        LdbError::check(unsafe {
            ffi::ldb_connect(ldb.ldb, url_cstr.as_ptr(), 0, ptr::null_mut())
        })
        .map_err(|e| {
            DBG_ERR!(
                "Failed to open {}: {}: {}",
                url,
                e,
                ldb.errstring().unwrap_or_default()
            );
            e
        })?;

        ldb.modules_hook(
            ffi::ldb_module_hooks_LDB_MODULE_HOOK_CMDLINE_POSTCONNECT,
        )
        .map_err(|e| {
            DBG_ERR!("Failed to run module postconnect hooks: {}", e);
            e
        })?;

        DBG_DEBUG!("Connected to {}", url);
        Ok(ldb)
    }

    fn modules_hook(
        &self,
        hook: ffi::ldb_module_hooks,
    ) -> Result<(), LdbError> {
        LdbError::check(unsafe { ffi::ldb_modules_hook(self.ldb, hook) })
    }

    /// The error string of the last failed operation, if ldb recorded one.
    pub fn errstring(&self) -> Option<String> {
        unsafe { wrap_c_char(ffi::ldb_errstring(self.ldb)) }
    }

    fn dn_new(
        &self,
        mem_ctx: &TallocCtx,
        dn: &str,
    ) -> Result<*mut ffi::ldb_dn, LdbError> {
        let dn_cstr = cstring(dn, LDB_ERR_INVALID_DN_SYNTAX)?;
        let ldb_dn = unsafe {
            ffi::ldb_dn_new(mem_ctx.as_ptr(), self.ldb, dn_cstr.as_ptr())
        };
        if ldb_dn.is_null() || !unsafe { ffi::ldb_dn_validate(ldb_dn) } {
            DBG_ERR!("Invalid DN '{}'", dn);
            return Err(LDB_ERR_INVALID_DN_SYNTAX);
        }
        Ok(ldb_dn)
    }

    /// Subtree search below `base`, returning only `attrs`.
    pub fn search(
        &self,
        base: &str,
        attrs: &[&str],
        expression: &str,
    ) -> Result<Vec<LdbMessage>, LdbError> {
        let tmp_ctx =
            TallocCtx::new(c"ldb_search").ok_or(LDB_ERR_OPERATIONS_ERROR)?;
        let basedn = self.dn_new(&tmp_ctx, base)?;

        let attr_cstrs = attrs
            .iter()
            .map(|attr| cstring(attr, LDB_ERR_OTHER))
            .collect::<Result<Vec<CString>, LdbError>>()?;
        let mut attr_ptrs: Vec<*const c_char> =
            attr_cstrs.iter().map(|attr| attr.as_ptr()).collect();
        attr_ptrs.push(ptr::null());
        let expression_cstr = cstring(expression, LDB_ERR_OTHER)?;

        DBG_DEBUG!("Searching {} for {}", base, expression);
        let mut res: *mut ffi::ldb_result = ptr::null_mut();
        LdbError::check(unsafe {
            ffi::ldb_search(
                self.ldb,
                tmp_ctx.as_ptr(),
                &mut res,
                basedn,
                ffi::ldb_scope_LDB_SCOPE_SUBTREE,
                attr_ptrs.as_ptr(),
                c"%s".as_ptr(),
                expression_cstr.as_ptr(),
            )
        })
        .map_err(|e| {
            DBG_ERR!(
                "Search for {} under {} failed: {}: {}",
                expression,
                base,
                e,
                self.errstring().unwrap_or_default()
            );
            e
        })?;

        if res.is_null() {
            return Ok(vec![]);
        }
        let res = unsafe { &*res };
        let msgs: &[*mut ffi::ldb_message] = if res.msgs.is_null() {
            &[]
        } else {
            unsafe { slice::from_raw_parts(res.msgs, res.count as usize) }
        };

        Ok(msgs
            .iter()
            .filter(|msg| !msg.is_null())
            .map(|msg| unsafe { LdbMessage::from_raw(&**msg) })
            .collect())
    }

    /// Replace every value of `attr` on the entry `dn` with `value`.
    pub fn modify_replace(
        &self,
        dn: &str,
        attr: &str,
        value: &[u8],
    ) -> Result<(), LdbError> {
        let tmp_ctx =
            TallocCtx::new(c"ldb_modify").ok_or(LDB_ERR_OPERATIONS_ERROR)?;
        let msg = unsafe { ffi::ldb_msg_new(tmp_ctx.as_ptr()) };
        if msg.is_null() {
            return Err(LDB_ERR_OPERATIONS_ERROR);
        }
        let ldb_dn = self.dn_new(&tmp_ctx, dn)?;
        unsafe { (*msg).dn = ldb_dn };

        let attr_cstr = cstring(attr, LDB_ERR_OTHER)?;
        LdbError::check(unsafe {
            ffi::ldb_msg_add_empty(
                msg,
                attr_cstr.as_ptr(),
                ffi::LDB_FLAG_MOD_REPLACE as c_int,
                ptr::null_mut(),
            )
        })?;
        // The message only borrows the value; it must outlive ldb_modify().
        let val = ffi::ldb_val {
            data: value.as_ptr() as *mut u8,
            length: value.len(),
        };
        LdbError::check(unsafe {
            ffi::ldb_msg_add_value(msg, attr_cstr.as_ptr(), &val, ptr::null_mut())
        })?;

        LdbError::check(unsafe { ffi::ldb_modify(self.ldb, msg) }).map_err(
            |e| {
                DBG_ERR!(
                    "Failed to modify {} on {}: {}: {}",
                    attr,
                    dn,
                    e,
                    self.errstring().unwrap_or_default()
                );
                e
            },
        )
    }

    #[cfg(test)]
    fn add(&self, dn: &str, attrs: &[(&str, &[u8])]) -> Result<(), LdbError> {
        let tmp_ctx =
            TallocCtx::new(c"ldb_add").ok_or(LDB_ERR_OPERATIONS_ERROR)?;
        let msg = unsafe { ffi::ldb_msg_new(tmp_ctx.as_ptr()) };
        if msg.is_null() {
            return Err(LDB_ERR_OPERATIONS_ERROR);
        }
        let ldb_dn = self.dn_new(&tmp_ctx, dn)?;
        unsafe { (*msg).dn = ldb_dn };

        let names = attrs
            .iter()
            .map(|(name, _)| cstring(name, LDB_ERR_OTHER))
            .collect::<Result<Vec<CString>, LdbError>>()?;
        let vals: Vec<ffi::ldb_val> = attrs
            .iter()
            .map(|(_, value)| ffi::ldb_val {
                data: value.as_ptr() as *mut u8,
                length: value.len(),
            })
            .collect();
        for (name, val) in names.iter().zip(vals.iter()) {
            LdbError::check(unsafe {
                ffi::ldb_msg_add_value(msg, name.as_ptr(), val, ptr::null_mut())
            })?;
        }
        LdbError::check(unsafe { ffi::ldb_add(self.ldb, msg) })
    }
}

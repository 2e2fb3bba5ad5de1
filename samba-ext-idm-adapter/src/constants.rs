/*
   Unix SMB/CIFS implementation.

   External IdM adapter constants

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

use std::ffi::CStr;

pub(crate) const PROG_NAME: &str = "samba-ext-idm-adapter";

// Environment handed over by the IdM pipeline
pub(crate) const ENV_LDB_URL: &str = "LDB_URL";
pub(crate) const ENV_UID: &str = "__UID__";
pub(crate) const ENV_NAME: &str = "__NAME__";
pub(crate) const ENV_PASSWORD: &str = "unicodePwd";
pub(crate) const ENV_LOGIN: &str = "sAMAccountName";

// sam.ldb attributes
pub(crate) const ATTR_CN: &str = "cn";
pub(crate) const ATTR_PASSWORD: &str = "unicodePwd";
pub(crate) const ATTR_LOGIN: &str = "sAMAccountName";

/// Records the login name a home directory is currently linked under.
pub(crate) const NAME_XATTR: &CStr = c"user.samba-ext-idm-adapter.name";

pub(crate) const LIST_SEPARATOR: &str = "--";
pub(crate) const HOME_MODE: u32 = 0o700;

/*
   Unix SMB/CIFS implementation.

   External IdM adapter directory service access

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

use crate::constants::*;
use crate::error::{AdapterError, Result};
use clap::builder::PossibleValue;
use clap::ValueEnum;
#[cfg(feature = "ldb")]
use dbg::{DBG_DEBUG, DBG_WARNING};
#[cfg(feature = "ldb")]
use ldb::{Ldb, LdbError, LdbMessage};

/// What the directory backend is able to do.
///
/// `Legacy` mirrors older deployments: login names are not read from the
/// directory and password writes are refused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum DirectoryMode {
    #[default]
    Full,
    Legacy,
}

impl ValueEnum for DirectoryMode {
    fn value_variants<'a>() -> &'a [Self] {
        &[DirectoryMode::Full, DirectoryMode::Legacy]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        Some(match self {
            DirectoryMode::Full => PossibleValue::new("full"),
            DirectoryMode::Legacy => PossibleValue::new("legacy"),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct AccountRecord {
    pub(crate) id: u32,
    pub(crate) name: Option<String>,
    pub(crate) password: Option<Vec<u8>>,
}

pub(crate) trait Directory {
    /// Accounts with a uidNumber under `basedn`; `id` 0 means all of them.
    fn search(&self, basedn: &str, id: u32) -> Result<Vec<AccountRecord>>;

    /// Replace the password hash of `CN=<id>,<basedn>`.
    fn set_password(&self, basedn: &str, id: u32, password: &[u8])
        -> Result<()>;
}

pub(crate) fn search_filter(id: u32) -> String {
    match id {
        0 => "(&(objectClass=user)(uidNumber=*))".to_string(),
        id => format!("(&(objectClass=user)(uidNumber=*)(cn={}))", id),
    }
}

pub(crate) fn account_dn(basedn: &str, id: u32) -> String {
    format!("CN={},{}", id, basedn)
}

pub(crate) fn search_attrs(mode: DirectoryMode) -> &'static [&'static str] {
    match mode {
        DirectoryMode::Full => &[ATTR_CN, ATTR_LOGIN, ATTR_PASSWORD],
        DirectoryMode::Legacy => &[ATTR_CN, ATTR_PASSWORD],
    }
}

fn legacy_password_error(basedn: &str, id: u32) -> AdapterError {
    AdapterError::directory(
        format!("failed to update {}", account_dn(basedn, id)),
        "password writes are not supported in legacy ldb mode",
    )
}

#[cfg(feature = "ldb")]
pub(crate) struct LdbDirectory {
    ldb: Ldb,
    mode: DirectoryMode,
}

#[cfg(feature = "ldb")]
impl LdbDirectory {
    pub(crate) fn connect(url: &str, mode: DirectoryMode) -> Result<Self> {
        let ldb = Ldb::connect(url).map_err(|e| {
            AdapterError::directory(format!("failed to open {}", url), e.to_string())
        })?;
        Ok(LdbDirectory { ldb, mode })
    }

    fn error(&self, context: String, e: LdbError) -> AdapterError {
        match self.ldb.errstring() {
            Some(msg) if !msg.is_empty() => {
                AdapterError::directory(context, format!("{}: {}", e, msg))
            }
            _ => AdapterError::directory(context, e.to_string()),
        }
    }

    fn record(&self, msg: &LdbMessage) -> Option<AccountRecord> {
        let id = match msg.get_str(ATTR_CN).map(|cn| cn.parse::<u32>()) {
            Some(Ok(id)) if id > 0 => id,
            _ => {
                DBG_WARNING!(
                    "Skipping {} without a numeric cn",
                    msg.dn().unwrap_or("entry")
                );
                return None;
            }
        };
        let name = match self.mode {
            DirectoryMode::Full => msg.get_str(ATTR_LOGIN).map(String::from),
            DirectoryMode::Legacy => None,
        };
        Some(AccountRecord {
            id,
            name,
            password: msg.get(ATTR_PASSWORD).map(|pwd| pwd.to_vec()),
        })
    }
}

#[cfg(feature = "ldb")]
impl Directory for LdbDirectory {
    fn search(&self, basedn: &str, id: u32) -> Result<Vec<AccountRecord>> {
        let msgs = self
            .ldb
            .search(basedn, search_attrs(self.mode), &search_filter(id))
            .map_err(|e| {
                self.error(format!("failed to search under {}", basedn), e)
            })?;
        DBG_DEBUG!("Found {} entries under {}", msgs.len(), basedn);
        Ok(msgs.iter().filter_map(|msg| self.record(msg)).collect())
    }

    fn set_password(
        &self,
        basedn: &str,
        id: u32,
        password: &[u8],
    ) -> Result<()> {
        if self.mode == DirectoryMode::Legacy {
            return Err(legacy_password_error(basedn, id));
        }
        let dn = account_dn(basedn, id);
        self.ldb
            .modify_replace(&dn, ATTR_PASSWORD, password)
            .map_err(|e| self.error(format!("failed to update {}", dn), e))
    }
}

/// Open the directory at `url`.
pub(crate) fn connect(
    url: &str,
    mode: DirectoryMode,
) -> Result<Box<dyn Directory>> {
    #[cfg(feature = "ldb")]
    {
        Ok(Box::new(LdbDirectory::connect(url, mode)?))
    }
    #[cfg(not(feature = "ldb"))]
    {
        let _ = mode;
        Err(AdapterError::config(format!(
            "cannot open {}: built without ldb support",
            url
        )))
    }
}

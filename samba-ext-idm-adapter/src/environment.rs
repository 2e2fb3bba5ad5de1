/*
   Unix SMB/CIFS implementation.

   External IdM adapter environment

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
use crate::home::valid_login_name;
use std::ffi::OsString;

/// Account attributes passed in by the IdM pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Environment {
    /// Numeric account id (cn and uid), 0 when not given.
    pub(crate) id: u32,
    /// Hex encoded password hash.
    pub(crate) password: Option<String>,
    pub(crate) login: Option<String>,
}

fn parse_id(key: &str, val: &str) -> Result<u32> {
    match val.parse::<u32>() {
        Ok(id) if id.to_string() == val => Ok(id),
        _ => Err(AdapterError::config(format!(
            "{}={:?} is not a valid account id",
            key, val
        ))),
    }
}

impl Environment {
    pub(crate) fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let fetch = |key: &str| -> Result<Option<String>> {
            let val = match lookup(key) {
                Some(val) => val,
                None => return Ok(None),
            };
            let val = val.into_string().map_err(|_| {
                AdapterError::config(format!("{} is not valid UTF-8", key))
            })?;
            if val.is_empty() {
                return Err(AdapterError::config(format!(
                    "{} is set but empty",
                    key
                )));
            }
            Ok(Some(val))
        };

        let id = match (fetch(ENV_UID)?, fetch(ENV_NAME)?) {
            (Some(val), _) => parse_id(ENV_UID, &val)?,
            (None, Some(val)) => parse_id(ENV_NAME, &val)?,
            (None, None) => 0,
        };

        let password = fetch(ENV_PASSWORD)?;

        let login = fetch(ENV_LOGIN)?;
        if let Some(login) = &login {
            if !valid_login_name(login) {
                return Err(AdapterError::config(format!(
                    "{}={:?} is not a usable login name",
                    ENV_LOGIN, login
                )));
            }
        }

        Ok(Environment {
            id,
            password,
            login,
        })
    }

    /// The account id, for actions that cannot run without one.
    pub(crate) fn require_id(&self) -> Result<u32> {
        match self.id {
            0 => Err(AdapterError::config(format!(
                "a positive account id is required in {} or {}",
                ENV_UID, ENV_NAME
            ))),
            id => Ok(id),
        }
    }
}

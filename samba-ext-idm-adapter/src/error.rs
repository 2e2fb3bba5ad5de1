/*
   Unix SMB/CIFS implementation.

   External IdM adapter errors

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

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum AdapterError {
    #[error(transparent)]
    Usage(#[from] clap::Error),

    #[error("{0}")]
    Config(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("{context}: {message}")]
    Directory { context: String, message: String },

    #[error("invalid password hash: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("failed to launch setup hook {path}: {source}")]
    Hook {
        path: String,
        #[source]
        source: io::Error,
    },
}

pub(crate) type Result<T> = std::result::Result<T, AdapterError>;

impl AdapterError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        AdapterError::Config(msg.into())
    }

    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        AdapterError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn directory(
        context: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        AdapterError::Directory {
            context: context.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_carries_system_text() {
        let err = AdapterError::io(
            "failed to create /srv/home/1000",
            io::Error::from_raw_os_error(libc::EACCES),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("failed to create /srv/home/1000: "), "{}", msg);
        assert!(msg.contains("ermission denied"), "{}", msg);
    }

    #[test]
    fn test_hex_error_from() {
        let err: AdapterError = hex::decode("abc").unwrap_err().into();
        assert!(matches!(err, AdapterError::Hex(hex::FromHexError::OddLength)));
        assert_eq!(err.to_string(), "invalid password hash: Odd number of digits");
    }
}

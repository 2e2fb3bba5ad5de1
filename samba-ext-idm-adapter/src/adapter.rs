/*
   Unix SMB/CIFS implementation.

   External IdM adapter account actions

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

use crate::directory::{self, Directory, DirectoryMode};
use crate::environment::Environment;
use crate::error::Result;
use crate::options::Options;
use dbg::DBG_DEBUG;

mod adapter_delete;
mod adapter_list;
mod adapter_update;

/// Opens a directory session for a database URL.
pub(crate) type Connector<'a> =
    Box<dyn FnMut(&str, DirectoryMode) -> Result<Box<dyn Directory>> + 'a>;

/// Runs one action for the account described by `env`.
pub(crate) struct Adapter<'a> {
    opts: &'a Options,
    env: &'a Environment,
    connector: Connector<'a>,
}

impl<'a> Adapter<'a> {
    pub(crate) fn new(opts: &'a Options, env: &'a Environment) -> Self {
        Self::with_connector(opts, env, Box::new(directory::connect))
    }

    pub(crate) fn with_connector(
        opts: &'a Options,
        env: &'a Environment,
        connector: Connector<'a>,
    ) -> Self {
        Adapter {
            opts,
            env,
            connector,
        }
    }

    fn connect(&mut self, url: &str) -> Result<Box<dyn Directory>> {
        DBG_DEBUG!("Connecting to {}", url);
        (self.connector)(url, self.opts.ldb_mode)
    }
}

/*
   Unix SMB/CIFS implementation.

   External IdM adapter delete action

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

use crate::adapter::Adapter;
use crate::error::Result;
use crate::home::Synchronizer;
use dbg::DBG_NOTICE;

impl Adapter<'_> {
    /// Retire the name link, then move the home into the trash.
    pub(crate) fn delete(&mut self) -> Result<()> {
        let (opts, env) = (self.opts, self.env);
        let id = env.require_id()?;
        let homedir = opts.homedir()?;
        let linkdir = opts.linkdir()?;
        let trashdir = opts.trashdir()?;

        let sync = Synchronizer::new(homedir, linkdir, id);
        sync.update_name_link(None, true)?;
        if let Some(slot) = sync.trash_home(trashdir)? {
            DBG_NOTICE!("Moved home of {} to {}", id, slot.display());
        }
        Ok(())
    }
}

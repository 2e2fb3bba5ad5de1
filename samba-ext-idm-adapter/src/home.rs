/*
   Unix SMB/CIFS implementation.

   External IdM adapter home directory synchronization

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

use crate::constants::HOME_MODE;
use crate::error::{AdapterError, Result};
use crate::trash::move_to_trash;
use crate::xattr;
use dbg::{DBG_DEBUG, DBG_NOTICE, DBG_WARNING};
use std::fs::{self, DirBuilder, Permissions};
use std::io;
use std::os::unix::fs::{symlink, DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::process::Command;

/// A login name usable as a single entry in the link directory.
pub(crate) fn valid_login_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\0')
}

/// The login name `home` is currently linked under.
///
/// Unreadable or unusable attribute values are reported and treated as
/// absent, so they can never name a path outside the link directory.
pub(crate) fn linked_name(home: &Path) -> Result<Option<String>> {
    let raw = match xattr::get_name(home) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Ok(None),
        Err(e) if xattr::is_unsupported(&e) => return Ok(None),
        Err(e) => {
            return Err(AdapterError::io(
                format!("failed to read login name of {}", home.display()),
                e,
            ))
        }
    };
    match String::from_utf8(raw) {
        Ok(name) if valid_login_name(&name) => Ok(Some(name)),
        Ok(name) => {
            DBG_WARNING!(
                "Ignoring unusable login name {:?} on {}",
                name,
                home.display()
            );
            Ok(None)
        }
        Err(_) => {
            DBG_WARNING!("Ignoring non UTF-8 login name on {}", home.display());
            Ok(None)
        }
    }
}

/// Keeps one account's home directory and name link in shape.
pub(crate) struct Synchronizer<'a> {
    homedir: &'a Path,
    linkdir: &'a Path,
    id: u32,
}

impl<'a> Synchronizer<'a> {
    pub(crate) fn new(homedir: &'a Path, linkdir: &'a Path, id: u32) -> Self {
        Synchronizer {
            homedir,
            linkdir,
            id,
        }
    }

    pub(crate) fn home_path(&self) -> PathBuf {
        self.homedir.join(self.id.to_string())
    }

    fn link_path(&self, name: &str) -> PathBuf {
        self.linkdir.join(name)
    }

    /// Create the home directory if needed. Returns true if it was created.
    ///
    /// The setup hook only runs for a freshly created home, and is not
    /// waited for.
    pub(crate) fn ensure_home(
        &self,
        group: Option<u32>,
        setup: Option<&Path>,
    ) -> Result<bool> {
        let home = self.home_path();
        let created = match DirBuilder::new().mode(HOME_MODE).create(&home) {
            Ok(()) => {
                // Undo any umask narrowing
                fs::set_permissions(&home, Permissions::from_mode(HOME_MODE))
                    .map_err(|e| {
                        AdapterError::io(
                            format!("failed to chmod {}", home.display()),
                            e,
                        )
                    })?;
                DBG_NOTICE!("Created {}", home.display());
                true
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if !home.is_dir() {
                    return Err(AdapterError::io(
                        format!("failed to create {}", home.display()),
                        io::Error::from_raw_os_error(libc::ENOTDIR),
                    ));
                }
                false
            }
            Err(e) => {
                return Err(AdapterError::io(
                    format!("failed to create {}", home.display()),
                    e,
                ))
            }
        };

        if let Err(e) = std::os::unix::fs::chown(&home, Some(self.id), group) {
            DBG_WARNING!("Failed to chown {}: {}", home.display(), e);
        }

        if let (true, Some(setup)) = (created, setup) {
            DBG_DEBUG!("Running {} {} {}", setup.display(), self.id, home.display());
            Command::new(setup)
                .arg(self.id.to_string())
                .arg(&home)
                .spawn()
                .map_err(|e| AdapterError::Hook {
                    path: setup.display().to_string(),
                    source: e,
                })?;
        }
        Ok(created)
    }

    /// Remove the link `name` if it still belongs to this home.
    fn remove_link(&self, name: &str, home: &Path) -> Result<()> {
        let link = self.link_path(name);
        let meta = match link.symlink_metadata() {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(AdapterError::io(
                    format!("failed to stat {}", link.display()),
                    e,
                ))
            }
        };
        if !meta.file_type().is_symlink() {
            DBG_WARNING!("Not removing {}, it is not a symlink", link.display());
            return Ok(());
        }
        let ours = match (fs::canonicalize(&link), fs::canonicalize(home)) {
            (Ok(target), Ok(home)) => target == home,
            // Dangling
            (Err(e), _) if e.kind() == io::ErrorKind::NotFound => true,
            _ => false,
        };
        if !ours {
            DBG_WARNING!(
                "Not removing {}, it does not point to {}",
                link.display(),
                home.display()
            );
            return Ok(());
        }
        match fs::remove_file(&link) {
            Ok(()) => {
                DBG_NOTICE!("Removed {}", link.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AdapterError::io(
                format!("failed to remove {}", link.display()),
                e,
            )),
        }
    }

    fn add_link(&self, name: &str, home: &Path) -> Result<()> {
        let target = fs::canonicalize(home).map_err(|e| {
            AdapterError::io(format!("failed to resolve {}", home.display()), e)
        })?;
        let link = self.link_path(name);
        match symlink(&target, &link) {
            Ok(()) => DBG_NOTICE!(
                "Linked {} to {}",
                link.display(),
                target.display()
            ),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if fs::read_link(&link).ok().as_deref() != Some(target.as_path())
                {
                    DBG_WARNING!(
                        "{} already exists and does not point to {}",
                        link.display(),
                        target.display()
                    );
                }
            }
            Err(e) => {
                return Err(AdapterError::io(
                    format!("failed to link {}", link.display()),
                    e,
                ))
            }
        }
        Ok(())
    }

    /// Bring the name link in line with `login`.
    ///
    /// With `delete` set the current link is retired and nothing new is
    /// created. The old link is always removed before a new one is added.
    pub(crate) fn update_name_link(
        &self,
        login: Option<&str>,
        delete: bool,
    ) -> Result<()> {
        let home = self.home_path();
        match home.symlink_metadata() {
            Ok(_) => (),
            Err(e) if e.kind() == io::ErrorKind::NotFound && delete => {
                return Ok(())
            }
            Err(e) => {
                return Err(AdapterError::io(
                    format!("failed to stat {}", home.display()),
                    e,
                ))
            }
        }
        if let Some(login) = login {
            if !valid_login_name(login) {
                return Err(AdapterError::config(format!(
                    "{:?} is not a usable login name",
                    login
                )));
            }
        }

        let current = linked_name(&home)?;
        let retire = delete
            || matches!(login, Some(login) if current.as_deref() != Some(login));
        if retire {
            if let Some(old) = &current {
                self.remove_link(old, &home)?;
            }
            let recorded = match xattr::has_name(&home) {
                Ok(recorded) => recorded,
                Err(e) if xattr::is_unsupported(&e) => false,
                Err(e) => {
                    return Err(AdapterError::io(
                        format!("failed to read login name of {}", home.display()),
                        e,
                    ))
                }
            };
            if recorded {
                xattr::remove_name(&home).map_err(|e| {
                    AdapterError::io(
                        format!(
                            "failed to clear login name of {}",
                            home.display()
                        ),
                        e,
                    )
                })?;
            }
        }

        let login = match (delete, login) {
            (false, Some(login)) => login,
            _ => return Ok(()),
        };
        self.add_link(login, &home)?;
        xattr::set_name(&home, login).map_err(|e| {
            AdapterError::io(
                format!("failed to record login name of {}", home.display()),
                e,
            )
        })
    }

    pub(crate) fn trash_home(&self, trashdir: &Path) -> Result<Option<PathBuf>> {
        move_to_trash(&self.home_path(), trashdir, &self.id.to_string())
    }
}

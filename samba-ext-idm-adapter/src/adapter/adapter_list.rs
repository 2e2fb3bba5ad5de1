/*
   Unix SMB/CIFS implementation.

   External IdM adapter list action

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
use crate::constants::*;
use crate::error::{AdapterError, Result};
use crate::home::linked_name;
use dbg::DBG_DEBUG;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;

/// One account block of the listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ListEntry {
    pub(crate) id: u32,
    pub(crate) password: Option<Vec<u8>>,
    pub(crate) login: Option<String>,
}

impl fmt::Display for ListEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", LIST_SEPARATOR)?;
        writeln!(f, "{}={}", ENV_UID, self.id)?;
        writeln!(f, "{}={}", ENV_NAME, self.id)?;
        if let Some(password) = &self.password {
            writeln!(f, "{}={}", ENV_PASSWORD, hex::encode(password))?;
        }
        if let Some(login) = &self.login {
            writeln!(f, "{}={}", ENV_LOGIN, login)?;
        }
        writeln!(f)
    }
}

/// Numeric home directory names, in canonical form only.
fn home_id(name: &str) -> Option<u32> {
    match name.parse::<u32>() {
        Ok(id) if id > 0 && id.to_string() == name => Some(id),
        _ => None,
    }
}

fn home_login(homedir: &Path, id: u32) -> Result<Option<String>> {
    let home = homedir.join(id.to_string());
    match home.is_dir() {
        true => linked_name(&home),
        false => Ok(None),
    }
}

impl Adapter<'_> {
    /// Print every known account, or just `env.id` when one is given.
    pub(crate) fn list(&mut self, out: &mut dyn Write) -> Result<()> {
        let (opts, env) = (self.opts, self.env);
        let homedir = opts.homedir()?;
        let entries = match opts.directory_source()? {
            Some((url, basedn)) => self.list_directory(url, basedn, homedir)?,
            None => list_homes(homedir, env.id)?,
        };

        for entry in &entries {
            write!(out, "{}", entry)
                .map_err(|e| AdapterError::io("failed to write listing", e))?;
        }
        out.flush()
            .map_err(|e| AdapterError::io("failed to write listing", e))
    }

    fn list_directory(
        &mut self,
        url: &str,
        basedn: &str,
        homedir: &Path,
    ) -> Result<Vec<ListEntry>> {
        let directory = self.connect(url)?;
        let mut entries = directory
            .search(basedn, self.env.id)?
            .into_iter()
            .map(|rec| -> Result<ListEntry> {
                let login = match home_login(homedir, rec.id)? {
                    Some(login) => Some(login),
                    None => rec.name,
                };
                Ok(ListEntry {
                    id: rec.id,
                    password: rec.password,
                    login,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        entries.sort_by_key(|entry| entry.id);
        Ok(entries)
    }
}

fn list_homes(homedir: &Path, filter: u32) -> Result<Vec<ListEntry>> {
    let read_err = |e: std::io::Error| {
        AdapterError::io(format!("failed to read {}", homedir.display()), e)
    };
    let mut entries = vec![];
    for dirent in fs::read_dir(homedir).map_err(read_err)? {
        let dirent = dirent.map_err(read_err)?;
        let name = dirent.file_name();
        let name = match name.to_str() {
            Some(name) if !name.starts_with('.') => name,
            _ => continue,
        };
        if !dirent.file_type().map_err(read_err)?.is_dir() {
            continue;
        }
        let id = match home_id(name) {
            Some(id) => id,
            None => {
                DBG_DEBUG!("Skipping non-account entry {}", name);
                continue;
            }
        };
        if filter != 0 && filter != id {
            continue;
        }
        entries.push(ListEntry {
            id,
            password: None,
            login: linked_name(&dirent.path())?,
        });
    }
    entries.sort_by_key(|entry| entry.id);
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::testing::*;
    use crate::xattr;

    fn list(
        fx: &Fixture,
        opts: &crate::options::Options,
        id: u32,
    ) -> Result<String> {
        let env = env(id, None, None);
        let mut out = vec![];
        fx.adapter(opts, &env).list(&mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_entry_format() {
        let entry = ListEntry {
            id: 1000,
            password: Some(vec![0x88, 0x46, 0xf7, 0xea]),
            login: Some("alice".into()),
        };
        assert_eq!(
            entry.to_string(),
            "--\n__UID__=1000\n__NAME__=1000\nunicodePwd=8846f7ea\nsAMAccountName=alice\n\n"
        );

        let entry = ListEntry {
            id: 1001,
            ..Default::default()
        };
        assert_eq!(entry.to_string(), "--\n__UID__=1001\n__NAME__=1001\n\n");
    }

    #[test]
    fn test_home_id() {
        assert_eq!(home_id("1000"), Some(1000));
        for name in ["0", "01000", "+1000", "alice", "1000.0", ""] {
            assert_eq!(home_id(name), None, "{:?}", name);
        }
    }

    #[test]
    fn test_list_homes() {
        let fx = Fixture::new();
        for name in ["1002", "1000", ".1001", "lost+found"] {
            fs::create_dir(fx.home.join(name)).unwrap();
        }
        fs::write(fx.home.join("1003"), b"").unwrap();

        let opts = fx.options();
        assert_eq!(
            list(&fx, &opts, 0).unwrap(),
            "--\n__UID__=1000\n__NAME__=1000\n\n--\n__UID__=1002\n__NAME__=1002\n\n"
        );
        assert_eq!(
            list(&fx, &opts, 1002).unwrap(),
            "--\n__UID__=1002\n__NAME__=1002\n\n"
        );
        assert_eq!(list(&fx, &opts, 1003).unwrap(), "");
        assert!(fx.state.borrow().connects.is_empty());
    }

    #[test]
    fn test_list_homes_with_names() {
        let fx = Fixture::new();
        if !fx.xattrs_supported() {
            return;
        }
        fs::create_dir(fx.home.join("1000")).unwrap();
        xattr::set_name(&fx.home.join("1000"), "alice").unwrap();

        let opts = fx.options();
        assert_eq!(
            list(&fx, &opts, 0).unwrap(),
            "--\n__UID__=1000\n__NAME__=1000\nsAMAccountName=alice\n\n"
        );
    }

    #[test]
    fn test_list_directory() {
        let fx = Fixture::new();
        fx.add_record(1001, Some("bob"), None);
        fx.add_record(1000, None, Some(&[0xab, 0xcd]));

        let opts = fx.with_directory();
        assert_eq!(
            list(&fx, &opts, 0).unwrap(),
            "--\n__UID__=1000\n__NAME__=1000\nunicodePwd=abcd\n\n\
             --\n__UID__=1001\n__NAME__=1001\nsAMAccountName=bob\n\n"
        );
        assert_eq!(
            list(&fx, &opts, 1001).unwrap(),
            "--\n__UID__=1001\n__NAME__=1001\nsAMAccountName=bob\n\n"
        );
        assert_eq!(fx.state.borrow().connects.len(), 2);
    }

    #[test]
    fn test_list_directory_prefers_home_name() {
        let fx = Fixture::new();
        if !fx.xattrs_supported() {
            return;
        }
        fx.add_record(1000, Some("alice"), None);
        fs::create_dir(fx.home.join("1000")).unwrap();
        xattr::set_name(&fx.home.join("1000"), "alice.smith").unwrap();

        let opts = fx.with_directory();
        assert_eq!(
            list(&fx, &opts, 0).unwrap(),
            "--\n__UID__=1000\n__NAME__=1000\nsAMAccountName=alice.smith\n\n"
        );
    }

    #[test]
    fn test_list_legacy_directory() {
        let fx = Fixture::new();
        fx.add_record(1000, Some("alice"), None);

        let mut opts = fx.with_directory();
        opts.ldb_mode = crate::directory::DirectoryMode::Legacy;
        assert_eq!(
            list(&fx, &opts, 0).unwrap(),
            "--\n__UID__=1000\n__NAME__=1000\n\n"
        );
    }

    #[test]
    fn test_list_source_selection() {
        let fx = Fixture::new();

        let mut opts = fx.with_directory();
        opts.basedn = None;
        assert!(matches!(list(&fx, &opts, 0), Err(AdapterError::Config(_))));

        let mut opts = fx.with_directory();
        opts.ldb_url = None;
        assert!(matches!(list(&fx, &opts, 0), Err(AdapterError::Config(_))));

        let mut opts = fx.with_directory();
        opts.homedir = None;
        assert!(matches!(list(&fx, &opts, 0), Err(AdapterError::Config(_))));

        assert!(fx.state.borrow().connects.is_empty());
    }
}

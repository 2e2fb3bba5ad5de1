/*
   Unix SMB/CIFS implementation.

   External IdM adapter update action

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
use dbg::{DBG_INFO, DBG_NOTICE};

impl Adapter<'_> {
    /// Apply the pending password and login name changes for one account.
    pub(crate) fn update(&mut self) -> Result<()> {
        let (opts, env) = (self.opts, self.env);
        let id = env.require_id()?;
        let homedir = opts.homedir()?;
        let linkdir = opts.linkdir()?;

        // Everything is validated before the first write
        let password = match &env.password {
            Some(password) => {
                let url = opts.ldb_url()?;
                let basedn = opts.basedn()?;
                Some((url, basedn, hex::decode(password)?))
            }
            None => None,
        };

        if let Some((url, basedn, hash)) = password {
            let directory = self.connect(url)?;
            directory.set_password(basedn, id, &hash)?;
            DBG_NOTICE!("Updated password hash of {}", id);
        }

        match &env.login {
            Some(login) => {
                let sync = Synchronizer::new(homedir, linkdir, id);
                sync.ensure_home(opts.group, opts.setup.as_deref())?;
                sync.update_name_link(Some(login), false)?;
            }
            None => DBG_INFO!("No login name given for {}", id),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::adapter::testing::*;
    use crate::error::AdapterError;
    use crate::home::linked_name;
    use std::fs;
    use std::os::unix::fs::{MetadataExt, PermissionsExt};
    use std::time::{Duration, Instant};

    const HASH_HEX: &str = "8846f7eaee8fb117ad06bdd830b7586c";
    const HASH: [u8; 16] = [
        0x88, 0x46, 0xf7, 0xea, 0xee, 0x8f, 0xb1, 0x17, 0xad, 0x06, 0xbd, 0xd8,
        0x30, 0xb7, 0x58, 0x6c,
    ];

    #[test]
    fn test_password_written() {
        let fx = Fixture::new();
        let opts = fx.with_directory();
        let env = env(1000, Some(HASH_HEX), None);
        fx.adapter(&opts, &env).update().expect("Update failed");

        let state = fx.state.borrow();
        assert_eq!(state.connects, vec![TEST_URL.to_string()]);
        assert_eq!(
            state.writes,
            vec![(TEST_BASEDN.to_string(), 1000, HASH.to_vec())]
        );
        // No login, no home
        assert!(!fx.home.join("1000").exists());
    }

    #[test]
    fn test_written_hash_lists_back_unchanged() {
        for hash in ["00", "00ff00", "0000000000000000", HASH_HEX, "deadbeef"] {
            let fx = Fixture::new();
            let opts = fx.with_directory();
            let env = env(1000, Some(hash), None);
            fx.adapter(&opts, &env).update().expect("Update failed");

            let written = fx.state.borrow().writes[0].2.clone();
            fx.add_record(1000, None, Some(&written));
            let mut out = vec![];
            fx.adapter(&opts, &env).list(&mut out).expect("List failed");
            let out = String::from_utf8(out).unwrap();
            assert!(
                out.lines().any(|line| line == format!("unicodePwd={}", hash)),
                "{:?} listed as {:?}",
                hash,
                out
            );
        }
    }

    #[test]
    fn test_uppercase_hex_accepted() {
        let fx = Fixture::new();
        let opts = fx.with_directory();
        let upper = HASH_HEX.to_uppercase();
        let env = env(1000, Some(&upper), None);
        fx.adapter(&opts, &env).update().unwrap();
        assert_eq!(fx.state.borrow().writes[0].2, HASH.to_vec());
    }

    #[test]
    fn test_bad_hex_never_connects() {
        for bad in ["abc", "zz46f7ea", "88 46"] {
            let fx = Fixture::new();
            let opts = fx.with_directory();
            let env = env(1000, Some(bad), Some("alice"));
            let res = fx.adapter(&opts, &env).update();
            assert!(matches!(res, Err(AdapterError::Hex(_))), "{:?}", bad);

            let state = fx.state.borrow();
            assert!(state.connects.is_empty());
            assert!(state.writes.is_empty());
            assert!(!fx.home.join("1000").exists());
        }
    }

    #[test]
    fn test_password_requires_directory() {
        let fx = Fixture::new();
        let env = env(1000, Some(HASH_HEX), Some("alice"));

        let mut opts = fx.with_directory();
        opts.basedn = None;
        let res = fx.adapter(&opts, &env).update();
        assert!(matches!(res, Err(AdapterError::Config(_))));

        let mut opts = fx.with_directory();
        opts.ldb_url = None;
        let res = fx.adapter(&opts, &env).update();
        assert!(matches!(res, Err(AdapterError::Config(_))));

        assert!(fx.state.borrow().connects.is_empty());
        assert!(!fx.home.join("1000").exists());
    }

    #[test]
    fn test_required_options() {
        let fx = Fixture::new();
        let env = env(1000, None, Some("alice"));

        let mut opts = fx.options();
        opts.homedir = None;
        assert!(matches!(
            fx.adapter(&opts, &env).update(),
            Err(AdapterError::Config(_))
        ));

        let mut opts = fx.options();
        opts.linkdir = None;
        assert!(matches!(
            fx.adapter(&opts, &env).update(),
            Err(AdapterError::Config(_))
        ));

        let opts = fx.options();
        let env = crate::adapter::testing::env(0, None, Some("alice"));
        assert!(matches!(
            fx.adapter(&opts, &env).update(),
            Err(AdapterError::Config(_))
        ));
        assert_eq!(fs::read_dir(&fx.home).unwrap().count(), 0);
    }

    #[test]
    fn test_legacy_mode_refuses_password() {
        let fx = Fixture::new();
        let mut opts = fx.with_directory();
        opts.ldb_mode = crate::directory::DirectoryMode::Legacy;
        let env = env(1000, Some(HASH_HEX), None);
        let res = fx.adapter(&opts, &env).update();
        assert!(matches!(res, Err(AdapterError::Directory { .. })));
        assert!(fx.state.borrow().writes.is_empty());
    }

    #[test]
    fn test_home_and_link_created() {
        let fx = Fixture::new();
        if !fx.xattrs_supported() {
            return;
        }
        let opts = fx.options();
        let env = env(1000, None, Some("alice"));
        fx.adapter(&opts, &env).update().expect("Update failed");

        let home = fx.home.join("1000");
        let meta = home.metadata().unwrap();
        assert!(meta.is_dir());
        assert_eq!(meta.permissions().mode() & 0o777, 0o700);
        assert_eq!(
            fs::read_link(fx.links.join("alice")).unwrap(),
            fs::canonicalize(&home).unwrap()
        );
        assert_eq!(linked_name(&home).unwrap().as_deref(), Some("alice"));

        // Same input again changes nothing
        fs::write(home.join("keep"), b"data").unwrap();
        fx.adapter(&opts, &env).update().expect("Rerun failed");
        assert_eq!(home.metadata().unwrap().ino(), meta.ino());
        assert!(home.join("keep").exists());
        assert_eq!(fs::read_dir(&fx.links).unwrap().count(), 1);
    }

    #[test]
    fn test_rename() {
        let fx = Fixture::new();
        if !fx.xattrs_supported() {
            return;
        }
        let opts = fx.options();
        let env1 = env(1000, None, Some("alice"));
        fx.adapter(&opts, &env1).update().unwrap();
        let env2 = env(1000, None, Some("alice.smith"));
        fx.adapter(&opts, &env2).update().unwrap();

        let home = fx.home.join("1000");
        assert!(fx.links.join("alice").symlink_metadata().is_err());
        assert_eq!(
            fs::read_link(fx.links.join("alice.smith")).unwrap(),
            fs::canonicalize(&home).unwrap()
        );
        assert_eq!(linked_name(&home).unwrap().as_deref(), Some("alice.smith"));
    }

    #[test]
    fn test_password_and_home() {
        let fx = Fixture::new();
        if !fx.xattrs_supported() {
            return;
        }
        let opts = fx.with_directory();
        let env = env(1000, Some(HASH_HEX), Some("alice"));
        fx.adapter(&opts, &env).update().unwrap();
        assert_eq!(fx.state.borrow().writes.len(), 1);
        assert!(fx.links.join("alice").symlink_metadata().is_ok());
    }

    #[test]
    fn test_setup_hook() {
        let fx = Fixture::new();
        if !fx.xattrs_supported() {
            return;
        }
        let out = fx.trash.join("hook.out");
        let hook = fx.trash.join("setup.sh");
        fs::write(&hook, format!("#!/bin/sh\necho \"$@\" > {}\n", out.display()))
            .unwrap();
        fs::set_permissions(&hook, fs::Permissions::from_mode(0o755)).unwrap();

        let mut opts = fx.options();
        opts.setup = Some(hook);
        let env = env(1000, None, Some("alice"));
        fx.adapter(&opts, &env).update().unwrap();

        let expected = format!("1000 {}\n", fx.home.join("1000").display());
        let deadline = Instant::now() + Duration::from_secs(10);
        while fs::read_to_string(&out).ok().as_deref() != Some(expected.as_str()) {
            assert!(Instant::now() < deadline, "Setup hook never ran");
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    #[test]
    fn test_setup_hook_failure() {
        let fx = Fixture::new();
        let mut opts = fx.options();
        opts.setup = Some(fx.trash.join("missing.sh"));
        let env = env(1000, None, Some("alice"));
        let res = fx.adapter(&opts, &env).update();
        assert!(matches!(res, Err(AdapterError::Hook { .. })));
        // The hook failure stops the link step
        assert_eq!(fs::read_dir(&fx.links).unwrap().count(), 0);
    }
}

/*
   Unix SMB/CIFS implementation.

   External IdM adapter command line options

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
use crate::directory::DirectoryMode;
use crate::error::{AdapterError, Result};
use clap::builder::{EnumValueParser, NonEmptyStringValueParser};
use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command};
use dbg::MAX_DEBUG_LEVEL;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

const ENVIRONMENT_HELP: &str = "\
ENVIRONMENT:
  LDB_URL             An alternative way to specify the LDB database.
  __UID__             Both CN and uid of the user account.
  __NAME__            Used if __UID__ is not specified.
  unicodePwd          Hex-encoded Samba password hash.
  sAMAccountName      Login name of the user account.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    Help,
    Version,
    Update,
    List,
    Delete,
}

/// Everything given on the command line, parsed once and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Options {
    pub(crate) ldb_url: Option<String>,
    pub(crate) basedn: Option<String>,
    pub(crate) homedir: Option<PathBuf>,
    pub(crate) setup: Option<PathBuf>,
    pub(crate) linkdir: Option<PathBuf>,
    pub(crate) trashdir: Option<PathBuf>,
    pub(crate) group: Option<u32>,
    pub(crate) ldb_mode: DirectoryMode,
    pub(crate) debuglevel: Option<u32>,
    pub(crate) debug_stdout: bool,
}

fn required<'a, T: ?Sized>(val: Option<&'a T>, flag: &str) -> Result<&'a T> {
    val.ok_or_else(|| AdapterError::config(format!("{} is required", flag)))
}

impl Options {
    pub(crate) fn ldb_url(&self) -> Result<&str> {
        required(self.ldb_url.as_deref(), "--ldb-url")
    }

    pub(crate) fn basedn(&self) -> Result<&str> {
        required(self.basedn.as_deref(), "--basedn")
    }

    pub(crate) fn homedir(&self) -> Result<&Path> {
        required(self.homedir.as_deref(), "--homedir")
    }

    pub(crate) fn linkdir(&self) -> Result<&Path> {
        required(self.linkdir.as_deref(), "--linkdir")
    }

    pub(crate) fn trashdir(&self) -> Result<&Path> {
        required(self.trashdir.as_deref(), "--trashdir")
    }

    /// The database to list from: both of --ldb-url and --basedn, or
    /// neither (list the home directory tree instead).
    pub(crate) fn directory_source(&self) -> Result<Option<(&str, &str)>> {
        match (self.ldb_url.as_deref(), self.basedn.as_deref()) {
            (Some(url), Some(basedn)) => Ok(Some((url, basedn))),
            (None, None) => Ok(None),
            (Some(_), None) => Err(AdapterError::config(
                "--basedn is required together with --ldb-url",
            )),
            (None, Some(_)) => Err(AdapterError::config(
                "--ldb-url is required together with --basedn",
            )),
        }
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Options {
            ldb_url: matches.get_one::<String>("ldb-url").cloned(),
            basedn: matches.get_one::<String>("basedn").cloned(),
            homedir: matches.get_one::<PathBuf>("homedir").cloned(),
            setup: matches.get_one::<PathBuf>("setup").cloned(),
            linkdir: matches.get_one::<PathBuf>("linkdir").cloned(),
            trashdir: matches.get_one::<PathBuf>("trashdir").cloned(),
            group: matches.get_one::<u32>("group").copied(),
            ldb_mode: matches
                .get_one::<DirectoryMode>("ldb-mode")
                .copied()
                .unwrap_or_default(),
            debuglevel: matches.get_one::<u32>("debuglevel").copied(),
            debug_stdout: matches.get_flag("debug-stdout"),
        }
    }
}

fn action_arg(name: &'static str, short: char, help: &'static str) -> Arg {
    Arg::new(name)
        .help(help)
        .short(short)
        .long(name)
        .action(ArgAction::SetTrue)
        .help_heading("Actions")
}

pub(crate) fn command() -> Command {
    Command::new(PROG_NAME)
        .version(env!("CARGO_PKG_VERSION"))
        .about("Create home and change Samba password hash from env.")
        .override_usage(format!("{} [ACTION] OPTION...", PROG_NAME))
        .disable_help_flag(true)
        .disable_version_flag(true)
        .arg(action_arg("help", 'h', "Display this help"))
        .arg(action_arg("version", 'V', "Display version information"))
        .arg(action_arg(
            "update",
            'u',
            "Apply changes from the environment (default)",
        ))
        .arg(action_arg("list", 'l', "List known user accounts"))
        .arg(action_arg(
            "delete",
            'd',
            "Unlink the account and move its home to the trash",
        ))
        .group(
            ArgGroup::new("action")
                .args(["help", "version", "update", "list", "delete"])
                .multiple(false),
        )
        .arg(
            Arg::new("ldb-url")
                .help("LDB database to operate on")
                .short('H')
                .long("ldb-url")
                .value_name("URL")
                .env(ENV_LDB_URL)
                .value_parser(NonEmptyStringValueParser::new())
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("basedn")
                .help("Base DN to update user accounts under")
                .short('b')
                .long("basedn")
                .value_name("DN")
                .value_parser(NonEmptyStringValueParser::new())
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("homedir")
                .help("Directory to maintain home directories under")
                .short('D')
                .long("homedir")
                .value_name("PATH")
                .value_parser(clap::value_parser!(PathBuf))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("setup")
                .help("Program to run as `PATH UID HOME` for new homes")
                .short('s')
                .long("setup")
                .value_name("PATH")
                .value_parser(clap::value_parser!(PathBuf))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("linkdir")
                .help("Directory to maintain links to homes under")
                .short('L')
                .long("linkdir")
                .value_name("PATH")
                .value_parser(clap::value_parser!(PathBuf))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("trashdir")
                .help("Directory to move deleted homes to")
                .short('T')
                .long("trashdir")
                .value_name("PATH")
                .value_parser(clap::value_parser!(PathBuf))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("group")
                .help("Numeric group to own the home directories")
                .short('G')
                .long("group")
                .value_name("GID")
                .value_parser(clap::value_parser!(u32).range(1..))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("ldb-mode")
                .help("Directory capabilities: full, or legacy (no login names, read-only passwords)")
                .long("ldb-mode")
                .value_name("MODE")
                .value_parser(EnumValueParser::<DirectoryMode>::new())
                .default_value("full")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("debuglevel")
                .help("Set debug level")
                .long("debuglevel")
                .value_name("LEVEL")
                .value_parser(
                    clap::value_parser!(u32).range(0..=(MAX_DEBUG_LEVEL as i64)),
                )
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("debug-stdout")
                .help("Send debug output to standard output")
                .long("debug-stdout")
                .action(ArgAction::SetTrue),
        )
        .after_help(ENVIRONMENT_HELP)
}

fn action_from(matches: &ArgMatches) -> Action {
    if matches.get_flag("help") {
        Action::Help
    } else if matches.get_flag("version") {
        Action::Version
    } else if matches.get_flag("list") {
        Action::List
    } else if matches.get_flag("delete") {
        Action::Delete
    } else {
        Action::Update
    }
}

pub(crate) fn parse_args<I, T>(args: I) -> Result<(Action, Options)>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = command().try_get_matches_from(args)?;
    Ok((action_from(&matches), Options::from_matches(&matches)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<(Action, Options)> {
        parse_args(std::iter::once(PROG_NAME).chain(args.iter().copied()))
    }

    #[test]
    fn test_command_is_consistent() {
        command().debug_assert();
    }

    #[test]
    fn test_update_is_default() {
        let (action, opts) = parse(&["-D", "/srv/home", "-L", "/srv/links"])
            .expect("Failed to parse arguments");
        assert_eq!(action, Action::Update);
        assert_eq!(opts.homedir().unwrap(), Path::new("/srv/home"));
        assert_eq!(opts.linkdir().unwrap(), Path::new("/srv/links"));
        assert!(opts.trashdir().is_err());
        assert_eq!(opts.ldb_mode, DirectoryMode::Full);
        assert_eq!(opts.group, None);
    }

    #[test]
    fn test_actions() {
        for (flag, expected) in [
            ("--help", Action::Help),
            ("-h", Action::Help),
            ("--version", Action::Version),
            ("-V", Action::Version),
            ("--update", Action::Update),
            ("-u", Action::Update),
            ("--list", Action::List),
            ("-l", Action::List),
            ("--delete", Action::Delete),
            ("-d", Action::Delete),
        ] {
            let (action, _) = parse(&[flag]).expect("Failed to parse action");
            assert_eq!(action, expected, "{}", flag);
        }
    }

    #[test]
    fn test_conflicting_actions_rejected() {
        let res = parse(&["--list", "--delete"]);
        assert!(matches!(res, Err(AdapterError::Usage(_))));
    }

    #[test]
    fn test_unknown_action_rejected() {
        let res = parse(&["--purge"]);
        assert!(matches!(res, Err(AdapterError::Usage(_))));
    }

    #[test]
    fn test_all_options() {
        let (action, opts) = parse(&[
            "-d",
            "-H",
            "tdb:///var/lib/samba/private/sam.ldb",
            "-b",
            "CN=Users,DC=samdom,DC=example,DC=com",
            "-D",
            "/srv/home",
            "-s",
            "/usr/libexec/idm/setup-home",
            "-L",
            "/srv/links",
            "-T",
            "/srv/trash",
            "-G",
            "100",
            "--ldb-mode",
            "legacy",
            "--debuglevel",
            "5",
            "--debug-stdout",
        ])
        .expect("Failed to parse arguments");
        assert_eq!(action, Action::Delete);
        assert_eq!(
            opts,
            Options {
                ldb_url: Some("tdb:///var/lib/samba/private/sam.ldb".into()),
                basedn: Some("CN=Users,DC=samdom,DC=example,DC=com".into()),
                homedir: Some("/srv/home".into()),
                setup: Some("/usr/libexec/idm/setup-home".into()),
                linkdir: Some("/srv/links".into()),
                trashdir: Some("/srv/trash".into()),
                group: Some(100),
                ldb_mode: DirectoryMode::Legacy,
                debuglevel: Some(5),
                debug_stdout: true,
            }
        );
    }

    #[test]
    fn test_invalid_group_rejected() {
        for group in ["0", "-1", "wheel", ""] {
            let res = parse(&["-G", group]);
            assert!(
                matches!(res, Err(AdapterError::Usage(_))),
                "group {:?} accepted",
                group
            );
        }
    }

    #[test]
    fn test_empty_paths_rejected() {
        for flag in ["-D", "-L", "-T", "-s", "-b"] {
            let res = parse(&[flag, ""]);
            assert!(
                matches!(res, Err(AdapterError::Usage(_))),
                "empty {} accepted",
                flag
            );
        }
    }

    #[test]
    fn test_invalid_ldb_mode_rejected() {
        let res = parse(&["--ldb-mode", "partial"]);
        assert!(matches!(res, Err(AdapterError::Usage(_))));
    }

    #[test]
    fn test_directory_source() {
        let mut opts = Options::default();
        assert!(matches!(opts.directory_source(), Ok(None)));

        opts.ldb_url = Some("tdb:///tmp/sam.ldb".into());
        assert!(matches!(
            opts.directory_source(),
            Err(AdapterError::Config(_))
        ));

        opts.basedn = Some("DC=samdom,DC=example,DC=com".into());
        assert!(matches!(
            opts.directory_source(),
            Ok(Some(("tdb:///tmp/sam.ldb", "DC=samdom,DC=example,DC=com")))
        ));

        opts.ldb_url = None;
        assert!(matches!(
            opts.directory_source(),
            Err(AdapterError::Config(_))
        ));
    }

    #[test]
    fn test_help_lists_environment() {
        let help = command().render_help().to_string();
        assert!(help.contains("--ldb-url"));
        assert!(help.contains("sAMAccountName"));
        assert!(help.contains("__UID__"));
    }
}

/*
   Unix SMB/CIFS implementation.

   Samba external IdM adapter

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

// Ignore unused/dead code when running cargo test
#![cfg_attr(test, allow(unused_imports))]
#![cfg_attr(test, allow(dead_code))]

use dbg::*;
use std::io;
use std::process::ExitCode;

mod constants;
use constants::PROG_NAME;
mod adapter;
use adapter::Adapter;
mod directory;
mod environment;
use environment::Environment;
mod error;
use error::{AdapterError, Result};
mod home;
mod options;
use options::{command, parse_args, Action, Options};
mod trash;
mod xattr;

fn run(action: Action, opts: &Options) -> Result<()> {
    match action {
        Action::Help => {
            println!("{}", command().render_help());
            Ok(())
        }
        Action::Version => {
            println!("{} {}", PROG_NAME, env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Action::Update | Action::List | Action::Delete => {
            let env = Environment::load()?;
            let mut adapter = Adapter::new(opts, &env);
            match action {
                Action::Update => adapter.update(),
                Action::Delete => adapter.delete(),
                _ => adapter.list(&mut io::stdout().lock()),
            }
        }
    }
}

#[cfg(not(test))]
fn main() -> ExitCode {
    let (action, opts) = match parse_args(std::env::args_os()) {
        Ok(parsed) => parsed,
        Err(AdapterError::Usage(e)) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("{}: {}", PROG_NAME, e);
            return ExitCode::FAILURE;
        }
    };

    // Listing output owns stdout unless debug output is asked for there
    match opts.debug_stdout {
        true => setup_logging(PROG_NAME, DEBUG_STDOUT),
        false => setup_logging(PROG_NAME, DEBUG_DEFAULT_STDERR),
    }
    debuglevel_set!(opts.debuglevel.unwrap_or(DBGLVL_WARNING));

    let res = run(action, &opts);
    dbgflush();
    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", PROG_NAME, e);
            ExitCode::FAILURE
        }
    }
}

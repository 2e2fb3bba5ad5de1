/*
   Unix SMB/CIFS implementation.

   Debug logging functions

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

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Mutex;
use tracing_subscriber::fmt::MakeWriter;

#[doc(hidden)]
pub use chelps;
#[doc(hidden)]
pub use tracing;

pub const MAX_DEBUG_LEVEL: u32 = 10;
pub const DBGLVL_ERR: u32 = 0;
pub const DBGLVL_WARNING: u32 = 1;
pub const DBGLVL_NOTICE: u32 = 3;
pub const DBGLVL_INFO: u32 = 5;
pub const DBGLVL_DEBUG: u32 = 10;

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum debug_logtype {
    DefaultStderr = 0,
    DefaultStdout = 1,
    File = 2,
    Stdout = 3,
    Stderr = 4,
}

pub const DEBUG_DEFAULT_STDERR: debug_logtype = debug_logtype::DefaultStderr;
pub const DEBUG_DEFAULT_STDOUT: debug_logtype = debug_logtype::DefaultStdout;
pub const DEBUG_FILE: debug_logtype = debug_logtype::File;
pub const DEBUG_STDOUT: debug_logtype = debug_logtype::Stdout;
pub const DEBUG_STDERR: debug_logtype = debug_logtype::Stderr;

impl debug_logtype {
    fn from_u8(val: u8) -> Self {
        match val {
            1 => debug_logtype::DefaultStdout,
            2 => debug_logtype::File,
            3 => debug_logtype::Stdout,
            4 => debug_logtype::Stderr,
            _ => debug_logtype::DefaultStderr,
        }
    }
}

static DEBUG_LEVEL: AtomicU32 = AtomicU32::new(DBGLVL_ERR);
static LOGTYPE: AtomicU8 = AtomicU8::new(debug_logtype::DefaultStderr as u8);
static LOGFILE: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Routes every event to the destination selected by `setup_logging()`
/// and `debug_set_logfile()` at the time of the write, so the log file
/// may be named after the subscriber is installed.
struct DebugWriter;

impl<'a> MakeWriter<'a> for DebugWriter {
    type Writer = Box<dyn Write + 'a>;

    fn make_writer(&'a self) -> Self::Writer {
        match debug_logtype::from_u8(LOGTYPE.load(Ordering::Relaxed)) {
            debug_logtype::DefaultStdout | debug_logtype::Stdout => {
                Box::new(io::stdout())
            }
            debug_logtype::File => {
                let logfile = match LOGFILE.lock() {
                    Ok(logfile) => logfile.clone(),
                    Err(_) => None,
                };
                match logfile.and_then(|path| {
                    OpenOptions::new().create(true).append(true).open(path).ok()
                }) {
                    Some(file) => Box::new(file),
                    None => Box::new(io::stderr()),
                }
            }
            debug_logtype::DefaultStderr | debug_logtype::Stderr => {
                Box::new(io::stderr())
            }
        }
    }
}

pub fn debug_set_logfile(name: &str) {
    if let Ok(mut logfile) = LOGFILE.lock() {
        *logfile = Some(PathBuf::from(name));
    }
}

/// Install the process wide subscriber. Calling this again only switches
/// the log destination.
pub fn setup_logging(prog_name: &str, new_logtype: debug_logtype) {
    LOGTYPE.store(new_logtype as u8, Ordering::Relaxed);
    let installed = tracing_subscriber::fmt()
        .with_writer(DebugWriter)
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_target(false)
        .try_init();
    if installed.is_ok() {
        crate::DBG_DEBUG!("Logging initialized for {}", prog_name);
    }
}

pub fn debuglevel_set_class(level: u32) {
    DEBUG_LEVEL.store(level.min(MAX_DEBUG_LEVEL), Ordering::Relaxed);
}

pub fn debuglevel_get() -> u32 {
    DEBUG_LEVEL.load(Ordering::Relaxed)
}

pub fn dbgflush() {
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();
}

#[macro_export]
macro_rules! debuglevel_set {
    ($level:expr) => {{
        $crate::debuglevel_set_class($level as u32)
    }};
}

#[macro_export]
macro_rules! DBG_PREFIX {
    ($level:expr $(, $arg:expr)* $(,)?) => {{
        let level = $level as u32;
        if level <= $crate::MAX_DEBUG_LEVEL && level <= $crate::debuglevel_get() {
            let location = format!("{}:{}", file!(), line!());
            let function = $crate::chelps::function!();
            let msg = format!($($arg),*);
            match level {
                l if l <= $crate::DBGLVL_ERR => $crate::tracing::error!(
                    "{}({}): {}", location, function, msg.trim_end()
                ),
                l if l <= $crate::DBGLVL_WARNING => $crate::tracing::warn!(
                    "{}({}): {}", location, function, msg.trim_end()
                ),
                l if l < $crate::DBGLVL_DEBUG => $crate::tracing::info!(
                    "{}({}): {}", location, function, msg.trim_end()
                ),
                _ => $crate::tracing::debug!(
                    "{}({}): {}", location, function, msg.trim_end()
                ),
            }
        }
    }}
}

#[macro_export]
macro_rules! DBG_ERR {
    ($msg:expr $(, $arg:expr)* $(,)?) => {{
        $crate::DBG_PREFIX!($crate::DBGLVL_ERR, $msg, $($arg),*)
    }}
}

#[macro_export]
macro_rules! DBG_WARNING {
    ($msg:expr $(, $arg:expr)* $(,)?) => {{
        $crate::DBG_PREFIX!($crate::DBGLVL_WARNING, $msg, $($arg),*)
    }}
}

#[macro_export]
macro_rules! DBG_NOTICE {
    ($msg:expr $(, $arg:expr)* $(,)?) => {{
        $crate::DBG_PREFIX!($crate::DBGLVL_NOTICE, $msg, $($arg),*)
    }}
}

#[macro_export]
macro_rules! DBG_INFO {
    ($msg:expr $(, $arg:expr)* $(,)?) => {{
        $crate::DBG_PREFIX!($crate::DBGLVL_INFO, $msg, $($arg),*)
    }}
}

#[macro_export]
macro_rules! DBG_DEBUG {
    ($msg:expr $(, $arg:expr)* $(,)?) => {{
        $crate::DBG_PREFIX!($crate::DBGLVL_DEBUG, $msg, $($arg),*)
    }}
}

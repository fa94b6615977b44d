//-
// Copyright (c) 2026, the Maildrop authors
//
// This file is part of Maildrop.
//
// Maildrop is free software: you can  redistribute it and/or modify it under
// the terms  of the  GNU General Public  License as published  by the  Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Maildrop is distributed in the hope that  it will be useful, but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Maildrop. If not, see <http://www.gnu.org/licenses/>.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use log::{error, warn};

use crate::support::error::Error;
use crate::support::file_ops;

/// Tracks client addresses that exhausted their login attempts, with a fixed
/// cooldown window.
///
/// One instance is owned by the process root and shared with every session
/// through an `Arc`; the map and its backing file are mutated under one
/// exclusive lock. Every mutation rewrites the backing file in full, which is
/// fine because the entry count is expected to stay small. A ban therefore
/// survives a restart.
pub struct Blacklist {
    cooldown: Duration,
    inner: Mutex<Inner>,
}

struct Inner {
    path: PathBuf,
    /// Identity => UNIX timestamp of the triggering violation.
    entries: HashMap<String, i64>,
}

impl Blacklist {
    /// Load the blacklist from `path`.
    ///
    /// A missing file is an empty blacklist, not an error. Lines that don't
    /// parse are dropped with a warning.
    pub fn open(path: PathBuf, cooldown: Duration) -> Result<Self, Error> {
        let mut entries = HashMap::new();
        match fs::read_to_string(&path) {
            Ok(text) => {
                for line in text.lines() {
                    match parse_entry(line) {
                        Some((identity, timestamp)) => {
                            entries.insert(identity.to_owned(), timestamp);
                        }
                        None => warn!(
                            "Ignoring malformed blacklist line in {}: {:?}",
                            path.display(),
                            line
                        ),
                    }
                }
            }
            Err(e) if io::ErrorKind::NotFound == e.kind() => (),
            Err(e) => return Err(e.into()),
        }

        Ok(Blacklist {
            cooldown,
            inner: Mutex::new(Inner { path, entries }),
        })
    }

    /// Whether `identity` is currently banned.
    ///
    /// An expired entry found by this check is evicted and the backing file
    /// rewritten; a persist failure at that point is logged but does not
    /// block the (correct, in-memory) verdict.
    pub fn is_blocked(&self, identity: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();

        let timestamp = match inner.entries.get(identity) {
            Some(&timestamp) => timestamp,
            None => return false,
        };

        if self.is_live(timestamp) {
            return true;
        }

        inner.entries.remove(identity);
        if let Err(e) = inner.persist() {
            error!(
                "Failed to rewrite blacklist at {}: {}",
                inner.path.display(),
                e
            );
        }
        false
    }

    /// Ban `identity` as of now, persistently.
    pub fn record_violation(&self, identity: &str) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .entries
            .insert(identity.to_owned(), chrono::Utc::now().timestamp());
        inner.persist()
    }

    fn is_live(&self, timestamp: i64) -> bool {
        let age = chrono::Utc::now().timestamp().saturating_sub(timestamp);
        age >= 0 && (age as u64) < self.cooldown.as_secs()
    }
}

impl Inner {
    fn persist(&self) -> Result<(), Error> {
        let mut text = String::new();
        for (identity, timestamp) in &self.entries {
            text.push_str(identity);
            text.push(' ');
            text.push_str(&timestamp.to_string());
            text.push('\n');
        }

        let tmp = self.path.parent().unwrap_or_else(|| Path::new("."));
        file_ops::spit(tmp, &self.path, true, 0o600, text.as_bytes())?;
        Ok(())
    }
}

fn parse_entry(line: &str) -> Option<(&str, i64)> {
    let mut fields = line.split_whitespace();
    let identity = fields.next()?;
    let timestamp = fields.next()?.parse().ok()?;
    match fields.next() {
        Some(_) => None,
        None => Some((identity, timestamp)),
    }
}

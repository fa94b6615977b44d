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

//! Credential verification.
//!
//! The session only depends on the one-method [`Authenticator`] capability,
//! so deployments can back it by anything that answers yes or no (a directory
//! service, a company SSO bridge, a test fake). Maildrop ships a file-backed
//! implementation verifying argon2 hashes.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::warn;
use rand::{rngs::OsRng, Rng};
use serde::{Deserialize, Serialize};

use crate::support::error::Error;
use crate::support::file_ops;

/// Answers whether `password` is valid for `username`.
///
/// A verdict may involve blocking I/O (e.g. a remote directory round-trip);
/// any failure along the way is simply "no".
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, username: &str, password: &str) -> bool;
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct UserDb {
    /// User name => argon2 encoded hash.
    #[serde(default)]
    users: BTreeMap<String, String>,
}

/// `Authenticator` backed by a TOML file of argon2 password hashes.
///
/// The file is re-read on every attempt, so `maildrop user add` takes effect
/// without a restart.
pub struct FileAuthenticator {
    path: PathBuf,
}

impl FileAuthenticator {
    pub fn new(path: PathBuf) -> Self {
        FileAuthenticator { path }
    }

    /// Create or replace the entry for `username`.
    ///
    /// Used by the `user add` CLI command.
    pub fn set_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(), Error> {
        let mut db = load(&self.path)?;

        let salt: [u8; 16] = OsRng.gen();
        let hash = argon2::hash_encoded(
            password.as_bytes(),
            &salt,
            &argon2::Config::default(),
        )
        .map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, e.to_string())
        })?;
        db.users.insert(username.to_owned(), hash);

        let text = toml::to_string(&db).map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, e.to_string())
        })?;
        let tmp = self.path.parent().unwrap_or_else(|| Path::new("."));
        file_ops::spit(tmp, &self.path, true, 0o600, text.as_bytes())?;
        Ok(())
    }
}

impl Authenticator for FileAuthenticator {
    fn authenticate(&self, username: &str, password: &str) -> bool {
        let db = match load(&self.path) {
            Ok(db) => db,
            Err(e) => {
                warn!(
                    "Unable to read user database at {}: {}",
                    self.path.display(),
                    e
                );
                return false;
            }
        };

        match db.users.get(username) {
            Some(hash) => {
                argon2::verify_encoded(hash, password.as_bytes())
                    .unwrap_or(false)
            }
            None => false,
        }
    }
}

fn load(path: &Path) -> Result<UserDb, Error> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if io::ErrorKind::NotFound == e.kind() => {
            return Ok(UserDb::default())
        }
        Err(e) => return Err(e.into()),
    };

    toml::from_str(&text).map_err(|e| {
        Error::Io(io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
    })
}

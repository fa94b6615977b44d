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

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The system-wide configuration for Maildrop.
///
/// This is stored in a file named `maildrop.toml` under the Maildrop system
/// root, which is typically `/usr/local/etc/maildrop` or `/etc/maildrop`.
#[derive(Clone, Debug, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SystemConfig {
    /// Network settings for the server.
    pub net: NetConfig,

    /// Settings for the on-disk mail spool.
    pub spool: SpoolConfig,

    /// Options relating to authentication and abuse handling.
    ///
    /// The defaults are reasonable for most installations.
    pub security: SecurityConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct NetConfig {
    /// The address and port the server listens on.
    pub listen: String,
}

impl Default for NetConfig {
    fn default() -> Self {
        NetConfig {
            listen: "0.0.0.0:14225".to_owned(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SpoolConfig {
    /// The directory holding all mailboxes, one subdirectory per user.
    ///
    /// Relative paths are resolved against the Maildrop system root. The
    /// directory is created on startup if it does not exist.
    pub root: PathBuf,
}

impl Default for SpoolConfig {
    fn default() -> Self {
        SpoolConfig {
            root: PathBuf::from("spool"),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// The file holding user names and their argon2 password hashes.
    ///
    /// Relative paths are resolved against the Maildrop system root. Entries
    /// are managed with `maildrop user add`.
    pub users_file: PathBuf,

    /// The file in which flagged client addresses are recorded so that bans
    /// survive a restart.
    ///
    /// Relative paths are resolved against the Maildrop system root. A
    /// missing file simply means no client is currently banned.
    pub blacklist_file: PathBuf,

    /// How long, in seconds, a flagged client address is rejected outright.
    pub blacklist_cooldown_secs: u64,

    /// The number of consecutive failed logins after which the client address
    /// is flagged and the connection closed.
    pub max_login_failures: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        SecurityConfig {
            users_file: PathBuf::from("users.toml"),
            blacklist_file: PathBuf::from("blacklist"),
            blacklist_cooldown_secs: 60,
            max_login_failures: 3,
        }
    }
}

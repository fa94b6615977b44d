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

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::error;

use crate::auth::FileAuthenticator;
use crate::protocol::blacklist::Blacklist;
use crate::protocol::server;
use crate::spool::store::SpoolStore;
use crate::support::sysexits::*;
use crate::support::system_config::SystemConfig;

macro_rules! fatal {
    ($ex:expr, $($stuff:tt)*) => {{
        error!($($stuff)*);
        $ex.exit()
    }};
}

pub(super) fn serve(
    mut config: SystemConfig,
    root: PathBuf,
    listen_override: Option<String>,
) {
    if let Some(listen) = listen_override {
        config.net.listen = listen;
    }

    // Relative paths in the config are anchored at the system root.
    let spool_root = root.join(&config.spool.root);
    let users_file = root.join(&config.security.users_file);
    let blacklist_file = root.join(&config.security.blacklist_file);

    if let Err(e) = fs::create_dir_all(&spool_root) {
        fatal!(
            EX_CANTCREAT,
            "Unable to create spool directory '{}': {}",
            spool_root.display(),
            e,
        );
    }

    let blacklist = match Blacklist::open(
        blacklist_file.clone(),
        Duration::from_secs(config.security.blacklist_cooldown_secs),
    ) {
        Ok(blacklist) => blacklist,
        Err(e) => fatal!(
            EX_DATAERR,
            "Unable to read blacklist '{}': {}",
            blacklist_file.display(),
            e,
        ),
    };

    if let Err(e) = server::serve(
        Arc::new(config),
        Arc::new(SpoolStore::new(spool_root)),
        Arc::new(blacklist),
        Arc::new(FileAuthenticator::new(users_file)),
    ) {
        fatal!(EX_UNAVAILABLE, "Server failed: {}", e);
    }
}

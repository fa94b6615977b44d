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

use rand::{rngs::OsRng, Rng};

use super::main::UserAddSubcommand;
use crate::auth::FileAuthenticator;
use crate::support::safe_name::is_safe_name;
use crate::support::system_config::SystemConfig;

pub(super) fn add(
    config: SystemConfig,
    root: PathBuf,
    cmd: UserAddSubcommand,
) {
    if !is_safe_name(&cmd.name) {
        die!(EX_USAGE, "Illegal user name: {}", cmd.name);
    }

    let generated;
    let password = if cmd.prompt_password {
        generated = false;
        let password = match rpassword::prompt_password("Password: ") {
            Ok(password) => password,
            Err(e) => die!(EX_NOINPUT, "Unable to read password: {}", e),
        };
        let confirmation = match rpassword::prompt_password("Confirm: ") {
            Ok(confirmation) => confirmation,
            Err(e) => die!(EX_NOINPUT, "Unable to read password: {}", e),
        };
        if password != confirmation {
            die!(EX_DATAERR, "Passwords do not match");
        }
        password
    } else {
        generated = true;
        base64::encode(OsRng.gen::<[u8; 8]>())
    };

    let authenticator =
        FileAuthenticator::new(root.join(&config.security.users_file));
    if let Err(e) = authenticator.set_password(&cmd.name, &password) {
        die!(EX_CANTCREAT, "Unable to update user database: {}", e);
    }

    if generated {
        println!("Password for '{}' is: {}", cmd.name, password);
    } else {
        println!("Password for '{}' updated", cmd.name);
    }
}

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
use std::io::Read;
use std::path::{Path, PathBuf};

use structopt::StructOpt;

use crate::support::sysexits::*;
use crate::support::system_config::SystemConfig;

#[derive(StructOpt)]
#[structopt(max_term_width = 80)]
enum Command {
    /// Run the mail-drop server.
    ///
    /// Listens for TCP connections on the configured address and serves the
    /// LOGIN/SEND/LIST/READ/DEL/QUIT protocol, one thread per connection.
    Serve(ServeSubcommand),
    /// Manage user accounts.
    User(UserSubcommand),
}

#[derive(StructOpt, Default)]
pub(super) struct CommonOptions {
    /// The directory containing `maildrop.toml` etc
    /// [default: /etc/maildrop or /usr/local/etc/maildrop]
    #[structopt(long, parse(from_os_str))]
    root: Option<PathBuf>,
}

#[derive(StructOpt)]
pub(super) struct ServeSubcommand {
    #[structopt(flatten)]
    pub(super) common: CommonOptions,

    /// Listen on this address instead of the configured one.
    #[structopt(long)]
    pub(super) listen: Option<String>,
}

#[derive(StructOpt)]
enum UserSubcommand {
    /// Create a user account or reset its password.
    Add(UserAddSubcommand),
}

#[derive(StructOpt)]
pub(super) struct UserAddSubcommand {
    #[structopt(flatten)]
    pub(super) common: CommonOptions,

    /// Prompt for the password instead of generating one.
    #[structopt(long)]
    pub(super) prompt_password: bool,

    /// Name of the user to create.
    pub(super) name: String,
}

pub fn main() {
    // Clap exits with status 1 instead of EX_USAGE if we use the more concise
    // API
    let cmd = Command::from_clap(&match Command::clap().get_matches_safe() {
        Ok(matches) => matches,
        Err(
            e @ clap::Error {
                kind: clap::ErrorKind::HelpDisplayed,
                ..
            },
        )
        | Err(
            e @ clap::Error {
                kind: clap::ErrorKind::VersionDisplayed,
                ..
            },
        ) => {
            println!("{}", e.message);
            return;
        }
        Err(e) => {
            eprintln!("{}", e.message);
            EX_USAGE.exit()
        }
    });

    match cmd {
        Command::Serve(cmd) => {
            let (config, root) = load_config(&cmd.common);
            init_logging(&root);
            super::serve::serve(config, root, cmd.listen);
        }
        Command::User(UserSubcommand::Add(cmd)) => {
            let (config, root) = load_config(&cmd.common);
            super::user::add(config, root, cmd);
        }
    }
}

fn load_config(common: &CommonOptions) -> (SystemConfig, PathBuf) {
    let root = common.root.clone().unwrap_or_else(|| {
        if Path::new("/etc/maildrop/maildrop.toml").is_file() {
            "/etc/maildrop".to_owned().into()
        } else if Path::new("/usr/local/etc/maildrop/maildrop.toml").is_file()
        {
            "/usr/local/etc/maildrop".to_owned().into()
        } else {
            eprintln!(
                "Neither /etc/maildrop nor /usr/local/etc/maildrop looks\n\
                 like the Maildrop root; use --root=/path/to/maildrop if\n\
                 your installation is elsewhere."
            );
            EX_CONFIG.exit()
        }
    });

    let system_config_path = root.join("maildrop.toml");
    let mut system_config_toml = Vec::new();
    if let Err(e) = fs::File::open(&system_config_path)
        .and_then(|mut f| f.read_to_end(&mut system_config_toml))
    {
        eprintln!("Error reading '{}': {}", system_config_path.display(), e);
        EX_CONFIG.exit();
    }

    let system_config: SystemConfig =
        match toml::from_slice(&system_config_toml) {
            Ok(config) => config,
            Err(e) => {
                eprintln!(
                    "Error in config file at '{}': {}",
                    system_config_path.display(),
                    e
                );
                EX_CONFIG.exit()
            }
        };

    (system_config, root)
}

fn init_logging(root: &Path) {
    let log_config_file = root.join("logging.toml");
    if log_config_file.is_file() {
        log4rs::init_file(log_config_file, log4rs::file::Deserializers::new())
            .expect("Failed to initialise logging");
    } else {
        crate::init_simple_log();
    }
}

#[cfg(test)]
mod test {
    #[test]
    fn log_config_deserializers_are_constructible() {
        // The type lives under `file` in this log4rs version and only with
        // the "file" feature enabled; keep both pinned down.
        let _ = log4rs::file::Deserializers::new();
    }
}

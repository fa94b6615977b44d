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

use std::fmt;
use std::sync::{Arc, Mutex};

/// Tracks text that should be included at the start of every log statement
/// concerning one connection.
///
/// Clones of a `LogPrefix` share the same underlying data, so setting the
/// user name after login is reflected everywhere the prefix is held.
#[derive(Clone)]
pub struct LogPrefix {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    peer: String,
    user: Option<String>,
}

impl LogPrefix {
    pub fn new(peer: String) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner { peer, user: None })),
        }
    }

    pub fn set_user(&self, user: String) {
        self.inner.lock().unwrap().user = Some(sanitise(user));
    }
}

impl fmt::Display for LogPrefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let inner = self.inner.lock().unwrap();
        write!(f, "{}", inner.peer)?;
        if let Some(ref user) = inner.user {
            write!(f, "[{}]", user)?;
        }
        Ok(())
    }
}

fn sanitise(mut s: String) -> String {
    s.retain(|c| !c.is_control());
    if let Some((truncate_len, _)) = s.char_indices().nth(64) {
        s.truncate(truncate_len);
    }

    s
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn prefix_display() {
        let prefix = LogPrefix::new("127.0.0.1".to_owned());
        assert_eq!("127.0.0.1", prefix.to_string());

        let clone = prefix.clone();
        prefix.set_user("alice\r\n".to_owned());
        assert_eq!("127.0.0.1[alice]", clone.to_string());
    }
}

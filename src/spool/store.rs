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

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::spool::message::Message;
use crate::support::error::Error;
use crate::support::file_ops::{self, IgnoreKinds};
use crate::support::safe_name::is_safe_name;

/// File extension of a message record within a mailbox.
const MSG_EXT: &str = "msg";
/// File extension of an attachment payload within a mailbox.
const ATT_EXT: &str = "att";
/// Per-mailbox file holding the next message index.
const SEQ_FILE: &str = "seq";

/// The filesystem-backed spool holding every user's mailbox.
///
/// One instance is owned by the process root and shared with every session
/// through an `Arc`. All operations take an internal exclusive lock for their
/// whole duration, so operations against the store are totally ordered; in
/// particular, two concurrent appends to the same mailbox cannot observe the
/// same sequence number.
///
/// Message indices come from a per-mailbox `seq` file and are monotonically
/// increasing: deleting a message never causes an index to be reused.
pub struct SpoolStore {
    inner: Mutex<Inner>,
}

struct Inner {
    root: PathBuf,
}

impl SpoolStore {
    pub fn new(root: PathBuf) -> Self {
        SpoolStore {
            inner: Mutex::new(Inner { root }),
        }
    }

    /// Persist `message` into the receiver's mailbox, creating the mailbox if
    /// this is the first message for that receiver.
    ///
    /// Returns the index assigned to the message. On error, no record is
    /// visible to `list`/`fetch`.
    pub fn append(&self, message: &Message) -> Result<u32, Error> {
        let inner = self.inner.lock().unwrap();
        let mailbox = inner.mailbox_path(&message.receiver)?;
        fs::create_dir_all(&mailbox)?;

        let index = next_index(&mailbox)?;
        // Advance the sequence before the record becomes visible; a failure
        // after this point skips an index, which is harmless.
        file_ops::spit(
            &mailbox,
            mailbox.join(SEQ_FILE),
            true,
            0o600,
            format!("{}\n", index + 1).as_bytes(),
        )?;

        if let Some(ref attachment) = message.attachment {
            file_ops::spit(
                &mailbox,
                entry_path(&mailbox, index, ATT_EXT),
                false,
                0o600,
                attachment,
            )?;
        }

        file_ops::spit(
            &mailbox,
            entry_path(&mailbox, index, MSG_EXT),
            false,
            0o600,
            message.to_record().as_bytes(),
        )?;

        Ok(index)
    }

    /// List the subjects of all messages in the receiver's mailbox, in
    /// ascending index order.
    ///
    /// A mailbox that was never created is simply empty.
    pub fn list(&self, receiver: &str) -> Result<Vec<String>, Error> {
        let inner = self.inner.lock().unwrap();
        let mailbox = inner.mailbox_path(receiver)?;

        let entries = match fs::read_dir(&mailbox) {
            Ok(entries) => entries,
            Err(e) if io::ErrorKind::NotFound == e.kind() => {
                return Ok(Vec::new())
            }
            Err(e) => return Err(e.into()),
        };

        let mut subjects = Vec::<(u32, String)>::new();
        for entry in entries {
            let path = entry?.path();
            let index = match message_index(&path) {
                Some(index) => index,
                None => continue,
            };
            let record = fs::read_to_string(&path)?;
            subjects.push((
                index,
                Message::subject_of_record(&record)
                    .unwrap_or_default()
                    .to_owned(),
            ));
        }

        subjects.sort_by_key(|&(index, _)| index);
        Ok(subjects.into_iter().map(|(_, subject)| subject).collect())
    }

    /// Fetch the message at `index` in the receiver's mailbox.
    pub fn fetch(&self, receiver: &str, index: u32) -> Result<Message, Error> {
        let inner = self.inner.lock().unwrap();
        let mailbox = inner.mailbox_path(receiver)?;

        let record = fs::read_to_string(entry_path(&mailbox, index, MSG_EXT))
            .map_err(no_such_message)?;
        Message::parse_record(&record)
    }

    /// Remove the message at `index` in the receiver's mailbox, together with
    /// its attachment payload if any.
    ///
    /// Remaining messages keep their indices.
    pub fn delete(&self, receiver: &str, index: u32) -> Result<(), Error> {
        let inner = self.inner.lock().unwrap();
        let mailbox = inner.mailbox_path(receiver)?;

        fs::remove_file(entry_path(&mailbox, index, MSG_EXT))
            .map_err(no_such_message)?;
        fs::remove_file(entry_path(&mailbox, index, ATT_EXT))
            .ignore_not_found()?;
        Ok(())
    }
}

impl Inner {
    fn mailbox_path(&self, receiver: &str) -> Result<PathBuf, Error> {
        if !is_safe_name(receiver) {
            return Err(Error::UnsafeName);
        }

        Ok(self.root.join(receiver))
    }
}

fn entry_path(mailbox: &Path, index: u32, ext: &str) -> PathBuf {
    mailbox.join(format!("{}.{}", index, ext))
}

/// The index the next appended message gets.
///
/// Normally this comes from the mailbox's `seq` file. If that file is missing
/// or unreadable (e.g. a spool imported from an older installation), it is
/// rebuilt as one past the highest existing entry.
fn next_index(mailbox: &Path) -> Result<u32, Error> {
    let from_seq = fs::read_to_string(mailbox.join(SEQ_FILE))
        .ok()
        .and_then(|text| text.trim().parse::<u32>().ok());
    if let Some(index) = from_seq {
        return Ok(index);
    }

    let mut max = 0;
    for entry in fs::read_dir(mailbox)? {
        if let Some(index) = message_index(&entry?.path()) {
            max = max.max(index);
        }
    }

    Ok(max + 1)
}

fn message_index(path: &Path) -> Option<u32> {
    if Some(OsStr::new(MSG_EXT)) != path.extension() {
        return None;
    }

    path.file_stem()?.to_str()?.parse().ok()
}

fn no_such_message(e: io::Error) -> Error {
    if io::ErrorKind::NotFound == e.kind() {
        Error::NoSuchMessage
    } else {
        Error::Io(e)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use rayon::prelude::*;
    use tempfile::TempDir;

    use super::*;

    struct Setup {
        _root: TempDir,
        store: SpoolStore,
    }

    fn set_up() -> Setup {
        let root = TempDir::new().unwrap();
        let store = SpoolStore::new(root.path().to_owned());
        Setup { _root: root, store }
    }

    fn message(receiver: &str, subject: &str, body: &str) -> Message {
        Message::new(
            "alice".to_owned(),
            receiver.to_owned(),
            subject.to_owned(),
            body.to_owned(),
        )
    }

    #[test]
    fn append_then_fetch_round_trips() {
        let setup = set_up();

        let sent = message("bob", "Hello", "Hi there\n");
        let index = setup.store.append(&sent).unwrap();
        assert_eq!(1, index);

        let fetched = setup.store.fetch("bob", index).unwrap();
        assert_eq!(sent, fetched);
    }

    #[test]
    fn body_starting_with_header_like_line_survives_fetch() {
        let setup = set_up();

        let sent =
            message("bob", "s", "Filename: not-an-attachment\nreal body\n");
        let index = setup.store.append(&sent).unwrap();

        assert_eq!(sent, setup.store.fetch("bob", index).unwrap());
    }

    #[test]
    fn list_is_ordered_and_idempotent() {
        let setup = set_up();

        for subject in &["first", "second", "third"] {
            setup
                .store
                .append(&message("bob", subject, "body\n"))
                .unwrap();
        }

        let subjects = setup.store.list("bob").unwrap();
        assert_eq!(vec!["first", "second", "third"], subjects);
        assert_eq!(subjects, setup.store.list("bob").unwrap());
    }

    #[test]
    fn list_of_unknown_mailbox_is_empty() {
        let setup = set_up();
        assert!(setup.store.list("nobody").unwrap().is_empty());
    }

    #[test]
    fn delete_removes_visibility() {
        let setup = set_up();

        let index = setup
            .store
            .append(&message("bob", "Hello", "body\n"))
            .unwrap();
        setup.store.delete("bob", index).unwrap();

        assert_matches!(
            Err(Error::NoSuchMessage),
            setup.store.fetch("bob", index)
        );
        assert_matches!(
            Err(Error::NoSuchMessage),
            setup.store.delete("bob", index)
        );
        assert!(setup.store.list("bob").unwrap().is_empty());
    }

    #[test]
    fn indices_are_never_reused_after_delete() {
        let setup = set_up();

        for subject in &["first", "second", "third"] {
            setup
                .store
                .append(&message("bob", subject, "body\n"))
                .unwrap();
        }
        setup.store.delete("bob", 2).unwrap();

        let index = setup
            .store
            .append(&message("bob", "fourth", "body\n"))
            .unwrap();
        assert_eq!(4, index);
        assert_eq!(
            vec!["first", "third", "fourth"],
            setup.store.list("bob").unwrap()
        );
    }

    #[test]
    fn sequence_is_rebuilt_when_seq_file_is_missing() {
        let setup = set_up();

        setup
            .store
            .append(&message("bob", "first", "body\n"))
            .unwrap();
        setup
            .store
            .append(&message("bob", "second", "body\n"))
            .unwrap();

        {
            let inner = setup.store.inner.lock().unwrap();
            fs::remove_file(inner.root.join("bob").join(SEQ_FILE)).unwrap();
        }

        let index = setup
            .store
            .append(&message("bob", "third", "body\n"))
            .unwrap();
        assert_eq!(3, index);
    }

    #[test]
    fn attachment_is_stored_beside_the_record_and_deleted_with_it() {
        let setup = set_up();

        let mut sent = message("bob", "Hello", "body\n");
        sent.filename = Some("notes.txt".to_owned());
        sent.attachment = Some(b"payload".to_vec());
        let index = setup.store.append(&sent).unwrap();

        let att_path = {
            let inner = setup.store.inner.lock().unwrap();
            inner.root.join("bob").join(format!("{}.att", index))
        };
        assert_eq!(b"payload".to_vec(), fs::read(&att_path).unwrap());

        let fetched = setup.store.fetch("bob", index).unwrap();
        assert_eq!(Some("notes.txt".to_owned()), fetched.filename);

        setup.store.delete("bob", index).unwrap();
        assert!(!att_path.exists());
    }

    #[test]
    fn unsafe_receiver_names_are_rejected() {
        let setup = set_up();

        assert_matches!(
            Err(Error::UnsafeName),
            setup.store.append(&message("../evil", "s", "b\n"))
        );
        assert_matches!(Err(Error::UnsafeName), setup.store.list(""));
        assert_matches!(
            Err(Error::UnsafeName),
            setup.store.fetch("a/b", 1)
        );
    }

    #[test]
    fn concurrent_appends_get_distinct_indices() {
        let setup = set_up();
        let store = Arc::new(setup.store);

        let mut indices = (0..32u32)
            .into_par_iter()
            .map(|i| {
                store
                    .append(&message("bob", &format!("subject {}", i), "b\n"))
                    .unwrap()
            })
            .collect::<Vec<_>>();

        indices.sort_unstable();
        assert_eq!((1..=32).collect::<Vec<_>>(), indices);
        assert_eq!(32, store.list("bob").unwrap().len());
    }
}

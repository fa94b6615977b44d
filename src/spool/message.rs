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

use crate::support::error::Error;

/// Subjects longer than this are silently truncated, not rejected.
pub const MAX_SUBJECT: usize = 80;

/// One mail-drop message.
///
/// The on-disk record consists of `From:`, `To:`, `Subject:` and `Filename:`
/// header lines, followed by the raw body. The `Filename:` header is always
/// present, with an empty value when there is no attachment, so a body whose
/// first line happens to look like a header is never mistaken for one. The
/// attachment payload itself is kept in a side file next to the record and
/// is never part of it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub sender: String,
    pub receiver: String,
    pub subject: String,
    pub filename: Option<String>,
    pub body: String,
    pub attachment: Option<Vec<u8>>,
}

impl Message {
    pub fn new(
        sender: String,
        receiver: String,
        subject: String,
        body: String,
    ) -> Self {
        Message {
            sender,
            receiver,
            subject: truncate_subject(subject),
            filename: None,
            body,
            attachment: None,
        }
    }

    /// Render the message into its spool record.
    pub fn to_record(&self) -> String {
        let mut record = String::new();
        record.push_str("From: ");
        record.push_str(&self.sender);
        record.push('\n');
        record.push_str("To: ");
        record.push_str(&self.receiver);
        record.push('\n');
        record.push_str("Subject: ");
        record.push_str(&self.subject);
        record.push('\n');
        record.push_str("Filename: ");
        record.push_str(self.filename.as_deref().unwrap_or(""));
        record.push('\n');
        record.push_str(&self.body);
        record
    }

    /// Parse a spool record written by `to_record`.
    ///
    /// The attachment payload lives outside the record, so `attachment` is
    /// always `None` on the result.
    pub fn parse_record(record: &str) -> Result<Self, Error> {
        let (sender, rest) = header_line(record, "From: ")?;
        let (receiver, rest) = header_line(rest, "To: ")?;
        let (subject, rest) = header_line(rest, "Subject: ")?;
        let (filename, body) = header_line(rest, "Filename: ")?;

        Ok(Message {
            sender: sender.to_owned(),
            receiver: receiver.to_owned(),
            subject: subject.to_owned(),
            filename: if filename.is_empty() {
                None
            } else {
                Some(filename.to_owned())
            },
            body: body.to_owned(),
            attachment: None,
        })
    }

    /// Extract the subject of a raw spool record without parsing the whole
    /// thing, for LIST.
    pub fn subject_of_record(record: &str) -> Option<&str> {
        record.lines().find_map(|l| l.strip_prefix("Subject: "))
    }
}

fn header_line<'a>(
    text: &'a str,
    prefix: &str,
) -> Result<(&'a str, &'a str), Error> {
    let nl = text.find('\n').ok_or(Error::CorruptMessage)?;
    let value = text[..nl]
        .strip_prefix(prefix)
        .ok_or(Error::CorruptMessage)?;
    Ok((value, &text[nl + 1..]))
}

fn truncate_subject(mut subject: String) -> String {
    if let Some((truncate_len, _)) = subject.char_indices().nth(MAX_SUBJECT) {
        subject.truncate(truncate_len);
    }

    subject
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    fn message() -> Message {
        Message::new(
            "alice".to_owned(),
            "bob".to_owned(),
            "Hello".to_owned(),
            "Hi there\nBye\n".to_owned(),
        )
    }

    #[test]
    fn record_round_trip() {
        let message = message();
        assert_eq!(
            "From: alice\nTo: bob\nSubject: Hello\nFilename: \n\
             Hi there\nBye\n",
            message.to_record()
        );
        assert_eq!(message, Message::parse_record(&message.to_record()).unwrap());
    }

    #[test]
    fn record_round_trip_with_filename() {
        let mut message = message();
        message.filename = Some("notes.txt".to_owned());
        assert_eq!(
            "From: alice\nTo: bob\nSubject: Hello\nFilename: notes.txt\n\
             Hi there\nBye\n",
            message.to_record()
        );
        assert_eq!(message, Message::parse_record(&message.to_record()).unwrap());
    }

    #[test]
    fn body_line_resembling_filename_header_round_trips() {
        let mut message = message();
        message.body = "Filename: not-an-attachment\nreal body\n".to_owned();
        let reparsed = Message::parse_record(&message.to_record()).unwrap();
        assert_eq!(None, reparsed.filename);
        assert_eq!(message, reparsed);
    }

    #[test]
    fn garbage_record_is_rejected() {
        assert_matches!(
            Err(Error::CorruptMessage),
            Message::parse_record("not a record")
        );
        assert_matches!(
            Err(Error::CorruptMessage),
            Message::parse_record("From: a\nSubject: out of order\n")
        );
    }

    #[test]
    fn overlong_subject_is_truncated() {
        let message = Message::new(
            "a".to_owned(),
            "b".to_owned(),
            "x".repeat(100),
            String::new(),
        );
        assert_eq!("x".repeat(80), message.subject);
    }

    #[test]
    fn subject_truncation_respects_char_boundaries() {
        let message = Message::new(
            "a".to_owned(),
            "b".to_owned(),
            "ä".repeat(100),
            String::new(),
        );
        assert_eq!("ä".repeat(80), message.subject);
    }

    proptest! {
        #[test]
        fn subject_never_exceeds_cap(subject in "\\PC*") {
            let message = Message::new(
                "a".to_owned(),
                "b".to_owned(),
                subject,
                String::new(),
            );
            prop_assert!(message.subject.chars().count() <= MAX_SUBJECT);
        }

        #[test]
        fn arbitrary_bodies_round_trip(
            body in "[a-zA-Z0-9: .\n]*",
        ) {
            let mut message = message();
            message.body = body;
            prop_assert_eq!(
                &message,
                &Message::parse_record(&message.to_record()).unwrap()
            );
        }
    }
}

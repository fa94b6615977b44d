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

use std::io::{BufRead, Read, Write};

use crate::support::error::Error;

/// Upper bound on a single frame, so a peer that never sends a line feed
/// cannot grow the buffer without limit.
const MAX_FRAME: usize = 65536;

/// A newline-delimited text channel over a duplex byte stream.
///
/// The transport has no inherent framing; the reader buffers partial reads
/// and splits on `\n`. Writes go out in full before `write_frame` returns.
pub struct LineChannel {
    read: Box<dyn BufRead + Send>,
    write: Box<dyn Write + Send>,
}

impl LineChannel {
    pub fn new<R: BufRead + Send + 'static, W: Write + Send + 'static>(
        read: R,
        write: W,
    ) -> Self {
        LineChannel {
            read: Box::new(read),
            write: Box::new(write),
        }
    }

    /// Read the next frame, without its line ending.
    ///
    /// Both DOS newlines and sane newlines are accepted. Returns `None` at
    /// EOF; a final frame the peer abandoned mid-line (no terminator before
    /// the stream closed) is also `None`, never a truncated frame.
    pub fn read_frame(&mut self) -> Result<Option<String>, Error> {
        let mut buf = Vec::new();
        let nread = self
            .read
            .by_ref()
            .take(MAX_FRAME as u64 + 1)
            .read_until(b'\n', &mut buf)?;

        if 0 == nread {
            return Ok(None);
        }

        if !buf.ends_with(b"\n") {
            if buf.len() > MAX_FRAME {
                return Err(Error::FrameTooLong);
            }

            // Peer closed mid-line
            return Ok(None);
        }

        buf.pop();
        if buf.ends_with(b"\r") {
            buf.pop();
        }

        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    /// Write one frame, terminated by `\n`, and flush.
    ///
    /// All bytes have been accepted by the transport when this returns
    /// successfully; a write failure is surfaced immediately and never
    /// retried (the connection is presumed dead).
    pub fn write_frame(&mut self, text: &str) -> Result<(), Error> {
        self.write.write_all(text.as_bytes())?;
        self.write.write_all(b"\n")?;
        self.write.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::io;
    use std::sync::{Arc, Mutex};

    use proptest::prelude::*;

    use super::*;

    fn reader(input: &[u8]) -> LineChannel {
        LineChannel::new(io::Cursor::new(input.to_vec()), io::sink())
    }

    /// A clonable sink, so tests can inspect what the channel wrote.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> Vec<u8> {
            self.0.lock().unwrap().clone()
        }
    }

    impl io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn frames_are_split_on_line_feed() {
        let mut channel = reader(b"LOGIN\nalice\nsecret\n");
        assert_eq!(Some("LOGIN".to_owned()), channel.read_frame().unwrap());
        assert_eq!(Some("alice".to_owned()), channel.read_frame().unwrap());
        assert_eq!(Some("secret".to_owned()), channel.read_frame().unwrap());
        assert_eq!(None, channel.read_frame().unwrap());
    }

    #[test]
    fn dos_line_endings_are_stripped() {
        let mut channel = reader(b"LIST\r\n");
        assert_eq!(Some("LIST".to_owned()), channel.read_frame().unwrap());
    }

    #[test]
    fn empty_frames_are_distinct_from_eof() {
        let mut channel = reader(b"\n\n");
        assert_eq!(Some(String::new()), channel.read_frame().unwrap());
        assert_eq!(Some(String::new()), channel.read_frame().unwrap());
        assert_eq!(None, channel.read_frame().unwrap());
    }

    #[test]
    fn unterminated_final_frame_is_eof() {
        let mut channel = reader(b"QUIT\ntrunc");
        assert_eq!(Some("QUIT".to_owned()), channel.read_frame().unwrap());
        assert_eq!(None, channel.read_frame().unwrap());
    }

    #[test]
    fn oversized_frame_is_an_error() {
        let mut big = vec![b'x'; MAX_FRAME + 1];
        big.push(b'\n');
        let mut channel = reader(&big);
        assert_matches!(Err(Error::FrameTooLong), channel.read_frame());
    }

    #[test]
    fn frame_of_exactly_max_length_is_accepted() {
        let mut line = vec![b'x'; MAX_FRAME];
        line.push(b'\n');
        let mut channel = reader(&line);
        assert_eq!(
            MAX_FRAME,
            channel.read_frame().unwrap().unwrap().len()
        );
    }

    #[test]
    fn write_frame_appends_terminator() {
        let out = SharedBuf::default();
        let mut channel =
            LineChannel::new(io::Cursor::new(Vec::new()), out.clone());
        channel.write_frame("OK").unwrap();
        assert_eq!(b"OK\n".to_vec(), out.contents());
    }

    proptest! {
        #[test]
        fn frames_round_trip(text in "[^\r\n]{0,200}") {
            let out = SharedBuf::default();
            let mut channel =
                LineChannel::new(io::Cursor::new(Vec::new()), out.clone());
            channel.write_frame(&text).unwrap();

            let mut channel = reader(&out.contents());
            prop_assert_eq!(Some(text), channel.read_frame().unwrap());
            prop_assert_eq!(None, channel.read_frame().unwrap());
        }
    }
}

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

use std::io::{BufReader, BufWriter};
use std::net::TcpListener;
use std::sync::Arc;

use log::{info, warn};

use crate::auth::Authenticator;
use crate::protocol::blacklist::Blacklist;
use crate::protocol::channel::LineChannel;
use crate::spool::message::Message;
use crate::spool::store::SpoolStore;
use crate::support::error::Error;
use crate::support::log_prefix::LogPrefix;
use crate::support::system_config::SystemConfig;

/// Marks the end of a message body within SEND.
///
/// A body line that is itself a single period cannot be represented; a known
/// limitation of the line-delimited framing, kept for compatibility.
const BODY_SENTINEL: &str = ".";
/// Announces an attachment within SEND; the rest of the frame is the file
/// name.
const ATTACH_MARKER: &str = "ATTACH ";
/// Marks the end of the base64 attachment payload.
const ATTACH_SENTINEL: &str = "ENDATTACH";

const OK: &str = "OK";
const ERR: &str = "ERR";

/// Whether the session loop keeps going after a command.
enum Flow {
    Continue,
    Close,
}

/// One connection's protocol state machine.
///
/// A session starts unauthenticated; a successful LOGIN fixes the user name
/// for the rest of the connection. Mailbox commands before that point are
/// rejected without touching the spool.
pub struct Session {
    channel: LineChannel,
    /// Client network identity, as used by the blacklist.
    peer: String,
    log_prefix: LogPrefix,
    config: Arc<SystemConfig>,
    store: Arc<SpoolStore>,
    blacklist: Arc<Blacklist>,
    authenticator: Arc<dyn Authenticator>,
    user: Option<String>,
    failed_logins: u32,
}

impl Session {
    pub fn new(
        channel: LineChannel,
        peer: String,
        log_prefix: LogPrefix,
        config: Arc<SystemConfig>,
        store: Arc<SpoolStore>,
        blacklist: Arc<Blacklist>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Session {
            channel,
            peer,
            log_prefix,
            config,
            store,
            blacklist,
            authenticator,
            user: None,
            failed_logins: 0,
        }
    }

    /// Run the session.
    ///
    /// Blocks until the client sends QUIT, the channel reaches EOF, the peer
    /// is turned away by the blacklist, or a transport error occurs. Command
    /// failures (bad index, unknown command, spool trouble) are reported to
    /// the client as `ERR` and do not end the session.
    pub fn run(&mut self) -> Result<(), Error> {
        if self.blacklist.is_blocked(&self.peer) {
            info!("{} Rejecting blacklisted client", self.log_prefix);
            self.channel.write_frame(ERR)?;
            return Ok(());
        }

        while let Some(command) = self.channel.read_frame()? {
            let flow = match command.as_str() {
                "LOGIN" => self.cmd_login()?,
                "SEND" => self.cmd_send()?,
                "LIST" => self.cmd_list()?,
                "READ" => self.cmd_read()?,
                "DEL" => self.cmd_del()?,
                // No response for QUIT
                "QUIT" => Flow::Close,
                _ => {
                    self.channel.write_frame(ERR)?;
                    Flow::Continue
                }
            };

            if let Flow::Close = flow {
                break;
            }
        }

        Ok(())
    }

    fn cmd_login(&mut self) -> Result<Flow, Error> {
        let username = match self.channel.read_frame()? {
            Some(frame) => frame,
            None => return Ok(Flow::Close),
        };
        let password = match self.channel.read_frame()? {
            Some(frame) => frame,
            None => return Ok(Flow::Close),
        };

        // The ban may have been placed after this connection was accepted.
        if self.blacklist.is_blocked(&self.peer) {
            info!("{} Rejecting blacklisted client", self.log_prefix);
            self.channel.write_frame(ERR)?;
            return Ok(Flow::Close);
        }

        // The user name is fixed once set.
        if self.user.is_some() {
            self.channel.write_frame(ERR)?;
            return Ok(Flow::Continue);
        }

        if self.authenticator.authenticate(&username, &password) {
            info!("{} Login succeeded for {:?}", self.log_prefix, username);
            self.log_prefix.set_user(username.clone());
            self.user = Some(username);
            self.failed_logins = 0;
            self.channel.write_frame(OK)?;
            return Ok(Flow::Continue);
        }

        self.failed_logins += 1;
        warn!(
            "{} Login failed for {:?} ({} of {})",
            self.log_prefix,
            username,
            self.failed_logins,
            self.config.security.max_login_failures,
        );
        self.channel.write_frame(ERR)?;

        if self.failed_logins >= self.config.security.max_login_failures {
            warn!("{} Blacklisting after repeated failures", self.log_prefix);
            if let Err(e) = self.blacklist.record_violation(&self.peer) {
                warn!("{} Unable to persist blacklist: {}", self.log_prefix, e);
            }
            return Ok(Flow::Close);
        }

        Ok(Flow::Continue)
    }

    fn cmd_send(&mut self) -> Result<Flow, Error> {
        let sender = match self.user {
            Some(ref user) => user.clone(),
            None => return self.err(),
        };

        let receiver = match self.channel.read_frame()? {
            Some(frame) => frame,
            None => return Ok(Flow::Close),
        };
        let subject = match self.channel.read_frame()? {
            Some(frame) => frame,
            None => return Ok(Flow::Close),
        };

        // The frame after the subject is either the attachment marker or
        // already part of the body.
        let mut filename = None;
        let mut pending = match self.channel.read_frame()? {
            Some(frame) => {
                if let Some(name) = frame.strip_prefix(ATTACH_MARKER) {
                    filename = Some(name.to_owned());
                    None
                } else {
                    Some(frame)
                }
            }
            None => return Ok(Flow::Close),
        };

        let mut body = String::new();
        loop {
            let line = match pending.take() {
                Some(line) => line,
                None => match self.channel.read_frame()? {
                    Some(line) => line,
                    None => return Ok(Flow::Close),
                },
            };

            if line == BODY_SENTINEL {
                break;
            }

            body.push_str(&line);
            body.push('\n');
        }

        let attachment = if filename.is_some() {
            let mut encoded = String::new();
            loop {
                let line = match self.channel.read_frame()? {
                    Some(line) => line,
                    None => return Ok(Flow::Close),
                };
                if line == ATTACH_SENTINEL {
                    break;
                }
                encoded.push_str(line.trim());
            }

            match base64::decode(&encoded) {
                Ok(payload) => Some(payload),
                Err(e) => {
                    warn!("{} Undecodable attachment: {}", self.log_prefix, e);
                    return self.err();
                }
            }
        } else {
            None
        };

        let mut message = Message::new(sender, receiver, subject, body);
        message.filename = filename;
        message.attachment = attachment;

        match self.store.append(&message) {
            Ok(index) => {
                info!(
                    "{} Stored message {} for {:?}",
                    self.log_prefix, index, message.receiver,
                );
                self.ok()
            }
            Err(e) => {
                warn!("{} SEND failed: {}", self.log_prefix, e);
                self.err()
            }
        }
    }

    fn cmd_list(&mut self) -> Result<Flow, Error> {
        let user = match self.user {
            Some(ref user) => user.clone(),
            None => return self.err(),
        };

        match self.store.list(&user) {
            Ok(subjects) => {
                self.channel.write_frame(&subjects.len().to_string())?;
                for subject in &subjects {
                    self.channel.write_frame(subject)?;
                }
                Ok(Flow::Continue)
            }
            Err(e) => {
                warn!("{} LIST failed: {}", self.log_prefix, e);
                self.err()
            }
        }
    }

    fn cmd_read(&mut self) -> Result<Flow, Error> {
        let user = match self.user {
            Some(ref user) => user.clone(),
            None => return self.err(),
        };

        let index = match self.channel.read_frame()? {
            Some(frame) => frame,
            None => return Ok(Flow::Close),
        };

        // A non-numeric index is indistinguishable from a missing message.
        let result = index
            .parse::<u32>()
            .map_err(|_| Error::NoSuchMessage)
            .and_then(|index| self.store.fetch(&user, index));

        match result {
            Ok(message) => {
                self.channel.write_frame(OK)?;
                for line in message.body.lines() {
                    self.channel.write_frame(line)?;
                }
                self.channel.write_frame(BODY_SENTINEL)?;
                Ok(Flow::Continue)
            }
            Err(e) => {
                info!("{} READ {:?} failed: {}", self.log_prefix, index, e);
                self.err()
            }
        }
    }

    fn cmd_del(&mut self) -> Result<Flow, Error> {
        let user = match self.user {
            Some(ref user) => user.clone(),
            None => return self.err(),
        };

        let index = match self.channel.read_frame()? {
            Some(frame) => frame,
            None => return Ok(Flow::Close),
        };

        let result = index
            .parse::<u32>()
            .map_err(|_| Error::NoSuchMessage)
            .and_then(|index| self.store.delete(&user, index));

        match result {
            Ok(()) => self.ok(),
            Err(e) => {
                info!("{} DEL {:?} failed: {}", self.log_prefix, index, e);
                self.err()
            }
        }
    }

    fn ok(&mut self) -> Result<Flow, Error> {
        self.channel.write_frame(OK)?;
        Ok(Flow::Continue)
    }

    fn err(&mut self) -> Result<Flow, Error> {
        self.channel.write_frame(ERR)?;
        Ok(Flow::Continue)
    }
}

/// Accept connections forever, one session thread per connection.
///
/// The accept loop never waits on session work. An accept failure is fatal
/// and propagates to the caller.
pub fn serve(
    config: Arc<SystemConfig>,
    store: Arc<SpoolStore>,
    blacklist: Arc<Blacklist>,
    authenticator: Arc<dyn Authenticator>,
) -> Result<(), Error> {
    let listener = TcpListener::bind(&config.net.listen)?;
    info!("Listening on {}", config.net.listen);

    loop {
        let (stream_in, origin) = listener.accept()?;

        let peer = origin.ip().to_string();
        let log_prefix = LogPrefix::new(origin.to_string());

        let stream_out = match stream_in.try_clone() {
            Ok(stream) => stream,
            Err(e) => {
                warn!("{} Failed to duplicate socket handle: {}", log_prefix, e);
                continue;
            }
        };

        let mut session = Session::new(
            LineChannel::new(
                BufReader::new(stream_in),
                BufWriter::new(stream_out),
            ),
            peer,
            log_prefix.clone(),
            Arc::clone(&config),
            Arc::clone(&store),
            Arc::clone(&blacklist),
            Arc::clone(&authenticator),
        );

        std::thread::spawn(move || {
            info!("{} Connection established", log_prefix);
            match session.run() {
                Ok(()) => info!("{} Connection closed", log_prefix),
                Err(e) => warn!("{} Connection error: {}", log_prefix, e),
            }
        });
    }
}

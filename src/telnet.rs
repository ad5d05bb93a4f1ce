//! Minimal Telnet (RFC 854) client-side protocol handling.
//!
//! Network devices only need a dumb terminal: the client accepts the server's
//! ECHO and SUPPRESS-GO-AHEAD, offers SUPPRESS-GO-AHEAD itself, and refuses
//! every other option. Subnegotiations are skipped. The parser is incremental
//! so commands split across socket reads are handled.

use std::collections::HashSet;

use log::trace;

pub const IAC: u8 = 255;
pub const DONT: u8 = 254;
pub const DO: u8 = 253;
pub const WONT: u8 = 252;
pub const WILL: u8 = 251;
pub const SB: u8 = 250;
pub const SE: u8 = 240;

pub const OPT_ECHO: u8 = 1;
pub const OPT_SGA: u8 = 3;

const CR: u8 = b'\r';
const NUL: u8 = 0;

/// Options we let the server enable on its side.
const REMOTE_ACCEPTED: &[u8] = &[OPT_ECHO, OPT_SGA];

/// Options we agree to enable on our side.
const LOCAL_ACCEPTED: &[u8] = &[OPT_SGA];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Data,
    /// Previous data byte was CR.
    Cr,
    Iac,
    Negotiate(u8),
    Sub,
    SubIac,
}

/// Output of one [`TelnetParser::feed`] call.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Parsed {
    /// Terminal data with protocol bytes removed.
    pub data: Vec<u8>,
    /// Negotiation replies to write back to the server.
    pub replies: Vec<u8>,
}

/// Incremental Telnet input parser.
#[derive(Debug)]
pub struct TelnetParser {
    state: State,
    /// Options the server has enabled on its side.
    remote_enabled: HashSet<u8>,
    /// Options we have enabled on our side.
    local_enabled: HashSet<u8>,
}

impl Default for TelnetParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TelnetParser {
    pub fn new() -> Self {
        Self {
            state: State::Data,
            remote_enabled: HashSet::new(),
            local_enabled: HashSet::new(),
        }
    }

    /// Feeds raw bytes from the socket.
    pub fn feed(&mut self, input: &[u8]) -> Parsed {
        let mut out = Parsed::default();
        for &byte in input {
            self.state = match self.state {
                State::Data | State::Cr => {
                    let after_cr = self.state == State::Cr;
                    match byte {
                        IAC => State::Iac,
                        NUL if after_cr => State::Data,
                        CR => {
                            out.data.push(byte);
                            State::Cr
                        }
                        _ => {
                            out.data.push(byte);
                            State::Data
                        }
                    }
                }
                State::Iac => match byte {
                    IAC => {
                        out.data.push(IAC);
                        State::Data
                    }
                    WILL | WONT | DO | DONT => State::Negotiate(byte),
                    SB => State::Sub,
                    _ => {
                        trace!("Dropping telnet command {byte}");
                        State::Data
                    }
                },
                State::Negotiate(verb) => {
                    self.negotiate(verb, byte, &mut out.replies);
                    State::Data
                }
                State::Sub => match byte {
                    IAC => State::SubIac,
                    _ => State::Sub,
                },
                State::SubIac => match byte {
                    SE => State::Data,
                    _ => State::Sub,
                },
            };
        }
        out
    }

    fn negotiate(&mut self, verb: u8, option: u8, replies: &mut Vec<u8>) {
        trace!("Telnet negotiation verb={verb} option={option}");
        match verb {
            WILL => {
                if REMOTE_ACCEPTED.contains(&option) {
                    if self.remote_enabled.insert(option) {
                        replies.extend_from_slice(&[IAC, DO, option]);
                    }
                } else {
                    replies.extend_from_slice(&[IAC, DONT, option]);
                }
            }
            WONT => {
                if self.remote_enabled.remove(&option) {
                    replies.extend_from_slice(&[IAC, DONT, option]);
                }
            }
            DO => {
                if LOCAL_ACCEPTED.contains(&option) {
                    if self.local_enabled.insert(option) {
                        replies.extend_from_slice(&[IAC, WILL, option]);
                    }
                } else {
                    replies.extend_from_slice(&[IAC, WONT, option]);
                }
            }
            DONT => {
                if self.local_enabled.remove(&option) {
                    replies.extend_from_slice(&[IAC, WONT, option]);
                }
            }
            _ => {}
        }
    }
}

/// Doubles IAC bytes so outgoing data is never read as a command.
pub fn escape_iac(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &byte in data {
        if byte == IAC {
            out.push(IAC);
        }
        out.push(byte);
    }
    out
}

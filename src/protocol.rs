// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The wire protocol: a request is a single text message of exactly three
//! space-separated tokens, `get <msg> <delay_ms>`. The response is either
//! the 32-character digest followed by a newline or one of the literal
//! error messages, after which the connection closes.

use thiserror::Error;

/// Requests strictly longer than this many bytes are rejected.
pub const MAX_REQUEST_SIZE: usize = 4096;

/// Upper bound on the client-supplied delay, so a hostile client cannot
/// park a worker indefinitely.
pub const MAX_DELAY_MS: u64 = 60_000;

pub const RESPONSE_TIMEOUT: &[u8] = b"Timeout.\n";
pub const RESPONSE_TOO_LONG: &[u8] = b"Request is too long.\n";
pub const RESPONSE_INVALID: &[u8] = b"Request is not valid.\n";

#[derive(Error, PartialEq, Eq, Debug)]
pub enum ParseError {
    #[error("request is not valid utf-8")]
    NotText,
    #[error("request does not have exactly three fields")]
    FieldCount,
    #[error("unknown command")]
    UnknownCommand,
    #[error("delay is not an unsigned integer in range")]
    BadDelay,
}

/// A parsed client request.
#[derive(Debug, PartialEq, Eq)]
pub struct Request {
    pub msg: String,
    pub delay_ms: u64,
}

impl Request {
    /// Parse a raw request. Tokens are separated by runs of spaces, so an
    /// empty message collapses into a missing field. A trailing line
    /// terminator is tolerated.
    pub fn parse(raw: &[u8]) -> Result<Self, ParseError> {
        let text = std::str::from_utf8(raw).map_err(|_| ParseError::NotText)?;
        let text = text.trim_end_matches(|c| c == '\r' || c == '\n');

        let mut tokens = text.split(' ').filter(|token| !token.is_empty());

        let command = tokens.next().ok_or(ParseError::FieldCount)?;
        let msg = tokens.next().ok_or(ParseError::FieldCount)?;
        let delay = tokens.next().ok_or(ParseError::FieldCount)?;
        if tokens.next().is_some() {
            return Err(ParseError::FieldCount);
        }

        if command != "get" {
            return Err(ParseError::UnknownCommand);
        }

        let delay_ms: u64 = delay.parse().map_err(|_| ParseError::BadDelay)?;
        if delay_ms > MAX_DELAY_MS {
            return Err(ParseError::BadDelay);
        }

        Ok(Request {
            msg: msg.to_string(),
            delay_ms,
        })
    }
}

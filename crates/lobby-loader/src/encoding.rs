//! Field decoding under a declared encoding and error policy

use std::borrow::Cow;
use thiserror::Error;

use crate::config::{EncodingErrorPolicy, SourceEncoding};

/// A field contained bytes that are not valid in the declared encoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {encoding} byte sequence at offset {offset}")]
pub struct DecodeError {
    pub encoding: SourceEncoding,
    pub offset: usize,
}

/// Turns raw field bytes into strings
#[derive(Debug, Clone, Copy)]
pub struct FieldDecoder {
    encoding: SourceEncoding,
    policy: EncodingErrorPolicy,
}

impl FieldDecoder {
    pub fn new(encoding: SourceEncoding, policy: EncodingErrorPolicy) -> Self {
        Self { encoding, policy }
    }

    /// Decode one field, applying the error policy
    ///
    /// Only [`EncodingErrorPolicy::Strict`] can fail.
    pub fn decode(&self, raw: &[u8]) -> Result<String, DecodeError> {
        match (self.encoding, self.policy) {
            (_, EncodingErrorPolicy::Replace) => Ok(self.decode_lossy(raw)),
            (SourceEncoding::Utf8, EncodingErrorPolicy::Strict) => std::str::from_utf8(raw)
                .map(str::to_string)
                .map_err(|e| DecodeError {
                    encoding: self.encoding,
                    offset: e.valid_up_to(),
                }),
            (SourceEncoding::Utf8, EncodingErrorPolicy::Ignore) => {
                Ok(raw.utf8_chunks().map(|chunk| chunk.valid()).collect())
            },
            (SourceEncoding::Ascii, EncodingErrorPolicy::Strict) => {
                match raw.iter().position(|b| !b.is_ascii()) {
                    Some(offset) => Err(DecodeError {
                        encoding: self.encoding,
                        offset,
                    }),
                    None => Ok(ascii_to_string(raw)),
                }
            },
            (SourceEncoding::Ascii, EncodingErrorPolicy::Ignore) => Ok(raw
                .iter()
                .filter(|b| b.is_ascii())
                .map(|&b| char::from(b))
                .collect()),
        }
    }

    /// Decode with U+FFFD substitution regardless of policy
    ///
    /// Used for the header diagnostics and for writing strict-mode rejects to
    /// the error sink.
    pub fn decode_lossy(&self, raw: &[u8]) -> String {
        match self.encoding {
            SourceEncoding::Utf8 => match String::from_utf8_lossy(raw) {
                Cow::Borrowed(s) => s.to_string(),
                Cow::Owned(s) => s,
            },
            SourceEncoding::Ascii => raw
                .iter()
                .map(|&b| {
                    if b.is_ascii() {
                        char::from(b)
                    } else {
                        char::REPLACEMENT_CHARACTER
                    }
                })
                .collect(),
        }
    }
}

fn ascii_to_string(raw: &[u8]) -> String {
    raw.iter().map(|&b| char::from(b)).collect()
}

/// Remove every non-ASCII character
pub fn strip_non_ascii(field: &str) -> String {
    field.chars().filter(char::is_ascii).collect()
}

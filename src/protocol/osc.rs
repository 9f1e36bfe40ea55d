//! Open Sound Control packet encoding and decoding.
//!
//! OSC rides the wireless transport as an alternative payload format over
//! the same UDP socket pair as raw MIDI. Only single messages are handled
//! (no bundles), with the `i` (int32), `f` (float32) and `s` (string)
//! argument types:
//!
//! ```text
//! ┌─────────────────┬──────────────────┬───────────────────┐
//! │ address pattern │ ,type-tag string │  arguments (BE)   │
//! │  NUL-padded /4  │   NUL-padded /4  │  each padded /4   │
//! └─────────────────┴──────────────────┴───────────────────┘
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::OscError;

/// Maximum OSC packet size in either direction, in bytes.
pub const MAX_PACKET_SIZE: usize = 512;

/// Characters the OSC 1.0 spec reserves inside address patterns.
const RESERVED_ADDRESS_CHARS: &[u8] = b" #*,?[]{}";

/// Rounds a string length up to the padded size on the wire (the
/// terminating NUL plus zero padding to a 4-byte boundary).
const fn padded_str_len(len: usize) -> usize {
    (len + 4) & !3
}

/// Validates an OSC address pattern.
fn validate_address(address: &str) -> Result<(), OscError> {
    if !address.starts_with('/') {
        return Err(OscError::BadAddress {
            reason: "must start with '/'",
        });
    }
    if address.len() < 2 {
        return Err(OscError::BadAddress {
            reason: "must name at least one container",
        });
    }
    for byte in address.bytes() {
        if !byte.is_ascii_graphic() {
            return Err(OscError::BadAddress {
                reason: "must be printable ASCII",
            });
        }
        if RESERVED_ADDRESS_CHARS.contains(&byte) {
            return Err(OscError::BadAddress {
                reason: "contains a reserved character",
            });
        }
    }
    Ok(())
}

/// Writes a string in OSC wire form: the bytes, a NUL, then zero padding
/// to the next 4-byte boundary.
fn put_padded_str(buf: &mut BytesMut, s: &str) {
    buf.put_slice(s.as_bytes());
    let pad = padded_str_len(s.len()) - s.len();
    buf.put_bytes(0, pad);
}

/// A decoded OSC argument.
#[derive(Debug, Clone, PartialEq)]
pub enum OscArg {
    /// 32-bit signed integer (`i`).
    Int(i32),
    /// 32-bit float (`f`).
    Float(f32),
    /// NUL-terminated padded string (`s`).
    Str(String),
}

/// Incremental builder for one outgoing OSC message.
///
/// The builder is overwritten wholesale by each new message; there is no
/// history. Arguments that would push the serialized packet past
/// [`MAX_PACKET_SIZE`] are rejected without disturbing what was already
/// added.
#[derive(Debug, Clone)]
pub struct OscWriter {
    address: String,
    tags: String,
    args: BytesMut,
}

impl OscWriter {
    /// Starts a fresh message for the given address pattern.
    ///
    /// # Errors
    ///
    /// Returns [`OscError::BadAddress`] if the pattern is malformed.
    pub fn new(address: &str) -> Result<Self, OscError> {
        validate_address(address)?;
        Ok(Self {
            address: address.to_owned(),
            tags: String::new(),
            args: BytesMut::new(),
        })
    }

    /// Serialized size of the message as built so far, assuming one more
    /// type tag and `arg_len` more argument bytes.
    fn projected_len(&self, arg_len: usize) -> usize {
        padded_str_len(self.address.len())
            + padded_str_len(1 + self.tags.len() + 1)
            + self.args.len()
            + arg_len
    }

    /// Checks that one more argument of `arg_len` bytes still fits.
    fn check_capacity(&self, arg_len: usize) -> Result<(), OscError> {
        let needed = self.projected_len(arg_len);
        if needed > MAX_PACKET_SIZE {
            return Err(OscError::PacketFull {
                needed,
                max: MAX_PACKET_SIZE,
            });
        }
        Ok(())
    }

    /// Appends a 32-bit integer argument.
    ///
    /// # Errors
    ///
    /// Returns [`OscError::PacketFull`] if the packet would overflow; the
    /// message keeps its previous arguments.
    pub fn add_int(&mut self, value: i32) -> Result<(), OscError> {
        self.check_capacity(4)?;
        self.tags.push('i');
        self.args.put_i32(value);
        Ok(())
    }

    /// Appends a 32-bit float argument.
    ///
    /// # Errors
    ///
    /// Returns [`OscError::PacketFull`] if the packet would overflow.
    pub fn add_float(&mut self, value: f32) -> Result<(), OscError> {
        self.check_capacity(4)?;
        self.tags.push('f');
        self.args.put_f32(value);
        Ok(())
    }

    /// Appends a string argument.
    ///
    /// # Errors
    ///
    /// Returns [`OscError::Malformed`] if the string contains a NUL, or
    /// [`OscError::PacketFull`] if the packet would overflow.
    pub fn add_str(&mut self, value: &str) -> Result<(), OscError> {
        if value.contains('\0') {
            return Err(OscError::Malformed {
                reason: "string argument contains NUL",
            });
        }
        self.check_capacity(padded_str_len(value.len()))?;
        self.tags.push('s');
        put_padded_str(&mut self.args, value);
        Ok(())
    }

    /// The address pattern this message is built for.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Serializes the message into its wire form.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.projected_len(0));
        put_padded_str(&mut buf, &self.address);
        put_padded_str(&mut buf, &format!(",{}", self.tags));
        buf.put_slice(&self.args);
        buf.freeze()
    }
}

/// One decoded incoming OSC message with an argument cursor.
///
/// [`OscPacket::next_arg`] advances the cursor on each call; it is not
/// restartable without decoding the packet again.
#[derive(Debug, Clone)]
pub struct OscPacket {
    address: String,
    args: Vec<OscArg>,
    cursor: usize,
}

impl OscPacket {
    /// Decodes a datagram as a single OSC message.
    ///
    /// # Errors
    ///
    /// Returns an [`OscError`] for bundles, truncated data, non-ASCII
    /// strings or unsupported type tags.
    pub fn decode(data: &[u8]) -> Result<Self, OscError> {
        let (address, pos) = read_padded_str(data, 0)?;
        if address.starts_with('#') {
            return Err(OscError::Malformed {
                reason: "bundles are not supported",
            });
        }
        if !address.starts_with('/') {
            return Err(OscError::Malformed {
                reason: "address must start with '/'",
            });
        }

        // A packet may legally end right after the address (no type tags,
        // no arguments).
        if pos >= data.len() {
            return Ok(Self {
                address,
                args: Vec::new(),
                cursor: 0,
            });
        }

        let (tags, mut pos) = read_padded_str(data, pos)?;
        let Some(tags) = tags.strip_prefix(',') else {
            return Err(OscError::Malformed {
                reason: "type-tag string must start with ','",
            });
        };

        let mut args = Vec::with_capacity(tags.len());
        for tag in tags.chars() {
            match tag {
                'i' => {
                    let word = read_word(data, pos)?;
                    args.push(OscArg::Int(i32::from_be_bytes(word)));
                    pos += 4;
                }
                'f' => {
                    let word = read_word(data, pos)?;
                    args.push(OscArg::Float(f32::from_be_bytes(word)));
                    pos += 4;
                }
                's' => {
                    let (s, next) = read_padded_str(data, pos)?;
                    args.push(OscArg::Str(s));
                    pos = next;
                }
                other => return Err(OscError::BadTypeTag(other)),
            }
        }

        Ok(Self {
            address,
            args,
            cursor: 0,
        })
    }

    /// The decoded address pattern.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Number of arguments the cursor has not yet visited.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.args.len() - self.cursor
    }

    /// Returns the next decoded argument, advancing the internal cursor.
    pub fn next_arg(&mut self) -> Option<OscArg> {
        let arg = self.args.get(self.cursor).cloned();
        if arg.is_some() {
            self.cursor += 1;
        }
        arg
    }
}

/// Reads a 4-byte big-endian word at `pos`.
fn read_word(data: &[u8], pos: usize) -> Result<[u8; 4], OscError> {
    let Some(slice) = data.get(pos..pos + 4) else {
        return Err(OscError::Truncated {
            expected: pos + 4,
            got: data.len(),
        });
    };
    let mut word = [0u8; 4];
    word.copy_from_slice(slice);
    Ok(word)
}

/// Reads a NUL-terminated padded string starting at `pos`, returning the
/// string and the position past its padding.
fn read_padded_str(data: &[u8], pos: usize) -> Result<(String, usize), OscError> {
    let tail = data.get(pos..).ok_or(OscError::Truncated {
        expected: pos,
        got: data.len(),
    })?;
    let Some(nul) = tail.iter().position(|&b| b == 0) else {
        return Err(OscError::Truncated {
            expected: pos + tail.len() + 1,
            got: data.len(),
        });
    };
    let raw = &tail[..nul];
    if !raw.is_ascii() {
        return Err(OscError::Malformed {
            reason: "string is not ASCII",
        });
    }
    let s = String::from_utf8_lossy(raw).into_owned();
    let end = pos + padded_str_len(nul);
    if end > data.len() {
        return Err(OscError::Truncated {
            expected: end,
            got: data.len(),
        });
    }
    Ok((s, end))
}

//! Reply framing over the raw byte stream.
//!
//! Text replies are written as-is. Binary replies default to an explicit
//! 8-byte big-endian length prefix; the legacy form (payload followed by
//! a literal `EOF` trailer) is kept behind a flag for compatibility. The
//! legacy trailer can collide with identical bytes inside a compressed
//! payload, which is why it is no longer the default.

use std::io::{self, ErrorKind, Read, Write};

use crate::protocol::{EOF_MARKER, LEN_PREFIX_BYTES, MAX_ARCHIVE_BYTES};

/// How binary payloads are delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// 8-byte big-endian length, then exactly that many bytes.
    #[default]
    LengthPrefixed,
    /// Raw bytes followed by the literal 3-byte `EOF` marker.
    EofMarker,
}

/// A classified server reply as seen by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerReply {
    Text(String),
    Binary(Vec<u8>),
}

/// Write a plain-text reply.
pub fn write_text<W: Write>(w: &mut W, msg: &str) -> io::Result<()> {
    w.write_all(msg.as_bytes())?;
    w.flush()
}

/// Write a binary payload under the given framing.
pub fn write_binary<W: Write>(w: &mut W, payload: &[u8], framing: Framing) -> io::Result<()> {
    match framing {
        Framing::LengthPrefixed => {
            w.write_all(&(payload.len() as u64).to_be_bytes())?;
            w.write_all(payload)?;
        }
        Framing::EofMarker => {
            w.write_all(payload)?;
            w.write_all(EOF_MARKER)?;
        }
    }
    w.flush()
}

/// Read one reply and classify it.
///
/// The first buffer is scanned for any non-printable, non-whitespace
/// byte: finding one means the exchange is binary (a length prefix
/// always trips the scan because its high bytes are zero, and gzip
/// output starts with 0x1f 0x8b). Otherwise the buffer is the whole text
/// reply.
pub fn read_reply<R: Read>(r: &mut R, framing: Framing) -> io::Result<ServerReply> {
    let mut first = [0u8; 4096];
    let n = r.read(&mut first)?;
    if n == 0 {
        return Err(io::Error::new(
            ErrorKind::UnexpectedEof,
            "server closed the connection",
        ));
    }
    let chunk = &first[..n];
    if !looks_binary(chunk) {
        return Ok(ServerReply::Text(
            String::from_utf8_lossy(chunk).into_owned(),
        ));
    }
    let payload = match framing {
        Framing::LengthPrefixed => read_length_prefixed(r, chunk)?,
        Framing::EofMarker => read_until_marker(r, chunk)?,
    };
    Ok(ServerReply::Binary(payload))
}

fn looks_binary(buf: &[u8]) -> bool {
    buf.iter()
        .any(|&b| !(b.is_ascii_graphic() || b.is_ascii_whitespace()))
}

fn read_length_prefixed<R: Read>(r: &mut R, chunk: &[u8]) -> io::Result<Vec<u8>> {
    let mut header = [0u8; LEN_PREFIX_BYTES];
    let have = chunk.len().min(LEN_PREFIX_BYTES);
    header[..have].copy_from_slice(&chunk[..have]);
    if have < LEN_PREFIX_BYTES {
        r.read_exact(&mut header[have..])?;
    }
    let len = u64::from_be_bytes(header);
    if len > MAX_ARCHIVE_BYTES {
        return Err(io::Error::new(
            ErrorKind::InvalidData,
            format!("announced archive length {len} exceeds limit"),
        ));
    }

    let mut payload = Vec::with_capacity(len as usize);
    payload.extend_from_slice(&chunk[have..]);
    let start = payload.len().min(len as usize);
    payload.resize(len as usize, 0);
    r.read_exact(&mut payload[start..])?;
    Ok(payload)
}

fn read_until_marker<R: Read>(r: &mut R, chunk: &[u8]) -> io::Result<Vec<u8>> {
    let mut payload = chunk.to_vec();
    let mut buf = [0u8; 64 * 1024];
    while !payload.ends_with(EOF_MARKER) {
        match r.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                payload.extend_from_slice(&buf[..n]);
                if payload.len() as u64 > MAX_ARCHIVE_BYTES {
                    return Err(io::Error::new(
                        ErrorKind::InvalidData,
                        "archive exceeds size limit",
                    ));
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            // a read timeout is how a vanished marker surfaces; keep what
            // arrived rather than failing the whole exchange
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => break,
            Err(e) => return Err(e),
        }
    }
    if payload.ends_with(EOF_MARKER) {
        payload.truncate(payload.len() - EOF_MARKER.len());
    }
    Ok(payload)
}

//! Server list ping over TCP.
//!
//! Handshake with next-state 1, a bare status request, and a single
//! length-prefixed JSON reply. All integers on the wire are VarInts except
//! the big-endian port in the handshake.

use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::ProbeError;

/// Protocol version sent in the handshake. `-1` asks the server to answer
/// with whatever version it runs.
const HANDSHAKE_PROTOCOL: i32 = -1;

/// Largest reply we are willing to buffer.
const MAX_PACKET_LEN: usize = 1_048_576;

/// Decoded status document.
#[derive(Debug, Clone, Deserialize)]
pub struct PingStatus {
    /// Version block.
    pub version: PingVersion,
    /// Player block.
    pub players: PingPlayers,
}

/// Version block of the status document.
#[derive(Debug, Clone, Deserialize)]
pub struct PingVersion {
    /// Human-readable version name.
    pub name: String,
}

/// Player block of the status document.
#[derive(Debug, Clone, Deserialize)]
pub struct PingPlayers {
    /// Player slot limit.
    pub max: i64,
    /// Number of connected players.
    pub online: i64,
    /// Subset of connected players chosen by the server.
    #[serde(default)]
    pub sample: Option<Vec<PingSample>>,
}

impl PingPlayers {
    /// Connected player count, clamped to `u32`.
    pub fn online_count(&self) -> u32 {
        u32::try_from(self.online).unwrap_or(0)
    }

    /// Slot limit, clamped to `u32`.
    pub fn max_count(&self) -> u32 {
        u32::try_from(self.max).unwrap_or(0)
    }

    /// Names in the sample. Not an exhaustive roster.
    pub fn sample_names(&self) -> Vec<String> {
        self.sample
            .iter()
            .flatten()
            .map(|p| p.name.clone())
            .collect()
    }
}

/// One sampled player.
#[derive(Debug, Clone, Deserialize)]
pub struct PingSample {
    /// Player name.
    pub name: String,
}

/// Ping `host:port` and decode the status document.
///
/// # Errors
///
/// Returns [`ProbeError::Io`] on transport failure and
/// [`ProbeError::Protocol`]/[`ProbeError::Json`] on a malformed reply.
pub async fn ping(host: &str, port: u16) -> Result<PingStatus, ProbeError> {
    let mut stream = TcpStream::connect((host, port)).await?;

    let mut handshake = Vec::new();
    write_varint(&mut handshake, 0x00);
    write_varint(&mut handshake, HANDSHAKE_PROTOCOL);
    write_string(&mut handshake, host)?;
    handshake.extend_from_slice(&port.to_be_bytes());
    write_varint(&mut handshake, 1);

    let mut out = frame(&handshake)?;
    out.extend_from_slice(&frame(&[0x00])?);
    stream.write_all(&out).await?;
    stream.flush().await?;

    let document = read_status_reply(&mut stream).await?;
    parse_status(&document)
}

/// Decode a status JSON document.
///
/// # Errors
///
/// Returns [`ProbeError::Json`] if the document lacks the version or player
/// blocks.
pub fn parse_status(document: &str) -> Result<PingStatus, ProbeError> {
    Ok(serde_json::from_str(document)?)
}

/// Read one status response packet and return its JSON payload.
///
/// # Errors
///
/// Returns an error on EOF, an unexpected packet id, or an oversize payload.
pub async fn read_status_reply<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String, ProbeError> {
    let packet_len = to_len(read_varint(reader).await?)?;
    if packet_len == 0 {
        return Err(ProbeError::Protocol("empty status packet".to_owned()));
    }
    let packet_id = read_varint(reader).await?;
    if packet_id != 0x00 {
        return Err(ProbeError::Protocol(format!("unexpected packet id {packet_id:#04x}")));
    }
    let json_len = to_len(read_varint(reader).await?)?;
    let mut payload = vec![0_u8; json_len];
    reader.read_exact(&mut payload).await?;
    String::from_utf8(payload).map_err(|e| ProbeError::Protocol(format!("status is not UTF-8: {e}")))
}

/// Append `value` as a VarInt.
pub fn write_varint(buf: &mut Vec<u8>, value: i32) {
    let mut rest = u32::from_ne_bytes(value.to_ne_bytes());
    loop {
        let low = u8::try_from(rest & 0x7F).unwrap_or_default();
        rest = rest.wrapping_shr(7);
        if rest == 0 {
            buf.push(low);
            return;
        }
        buf.push(low | 0x80);
    }
}

/// Read one VarInt.
///
/// # Errors
///
/// Returns an error on EOF or if the VarInt runs past five bytes.
pub async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> Result<i32, ProbeError> {
    let mut value: u32 = 0;
    let mut shift: u32 = 0;
    for _ in 0..5 {
        let byte = reader.read_u8().await?;
        value |= u32::from(byte & 0x7F).wrapping_shl(shift);
        if byte & 0x80 == 0 {
            return Ok(i32::from_ne_bytes(value.to_ne_bytes()));
        }
        shift = shift.saturating_add(7);
    }
    Err(ProbeError::Protocol("VarInt is too long".to_owned()))
}

fn write_string(buf: &mut Vec<u8>, text: &str) -> Result<(), ProbeError> {
    let len = i32::try_from(text.len()).map_err(|_| ProbeError::Protocol("string too long".to_owned()))?;
    write_varint(buf, len);
    buf.extend_from_slice(text.as_bytes());
    Ok(())
}

fn frame(packet: &[u8]) -> Result<Vec<u8>, ProbeError> {
    let len = i32::try_from(packet.len()).map_err(|_| ProbeError::Protocol("packet too long".to_owned()))?;
    let mut out = Vec::with_capacity(packet.len().saturating_add(5));
    write_varint(&mut out, len);
    out.extend_from_slice(packet);
    Ok(out)
}

fn to_len(value: i32) -> Result<usize, ProbeError> {
    usize::try_from(value)
        .ok()
        .filter(|len| *len <= MAX_PACKET_LEN)
        .ok_or_else(|| ProbeError::Protocol(format!("invalid length {value}")))
}

//! GameSpy4-style query protocol over UDP.
//!
//! A handshake yields a challenge token; a full-stat request with that
//! token yields a key/value block and the complete player list.

use std::net::SocketAddr;

use tokio::net::UdpSocket;

use super::ProbeError;

const MAGIC: [u8; 2] = [0xFE, 0xFD];
const TYPE_HANDSHAKE: u8 = 0x09;
const TYPE_STAT: u8 = 0x00;

/// Bytes between the session id and the first key in a full-stat reply
/// (`splitnum\0\x80\0`).
const STAT_HEADER_PADDING: usize = 11;

/// Marker preceding the player list (`\x01player_\0\0`).
const PLAYER_SECTION_MARKER: &[u8] = b"\x01player_\x00\x00";

/// Parsed full-stat reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryStat {
    /// Server version.
    pub version: String,
    /// Connected players.
    pub num_players: u32,
    /// Slot limit.
    pub max_players: u32,
    /// Every connected player.
    pub players: Vec<String>,
}

/// Run the handshake and full-stat exchange against `host:port`.
///
/// # Errors
///
/// Returns [`ProbeError::Io`] when the server cannot be reached and
/// [`ProbeError::Protocol`] on an unexpected reply.
pub async fn full_stat(host: &str, port: u16) -> Result<QueryStat, ProbeError> {
    let target = resolve(host, port).await?;
    let bind_addr: SocketAddr = if target.is_ipv4() {
        SocketAddr::from(([0, 0, 0, 0], 0))
    } else {
        SocketAddr::from(([0_u16; 8], 0))
    };
    let socket = UdpSocket::bind(bind_addr).await?;
    socket.connect(target).await?;

    let session = session_id();
    let mut buf = vec![0_u8; 65_535];

    socket.send(&handshake_request(session)).await?;
    let len = socket.recv(&mut buf).await?;
    let token = parse_handshake(buf.get(..len).unwrap_or_default(), session)?;

    socket.send(&full_stat_request(session, token)).await?;
    let len = socket.recv(&mut buf).await?;
    parse_full_stat(buf.get(..len).unwrap_or_default())
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr, ProbeError> {
    tokio::net::lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| ProbeError::Protocol(format!("no address for {host}")))
}

/// Random session id with the high nibble of each byte cleared, as servers
/// expect.
fn session_id() -> i32 {
    rand::random::<i32>() & 0x0F0F_0F0F
}

/// Build a handshake request.
pub fn handshake_request(session: i32) -> Vec<u8> {
    let mut out = Vec::with_capacity(7);
    out.extend_from_slice(&MAGIC);
    out.push(TYPE_HANDSHAKE);
    out.extend_from_slice(&session.to_be_bytes());
    out
}

/// Build a full-stat request for a challenge token.
pub fn full_stat_request(session: i32, token: i32) -> Vec<u8> {
    let mut out = Vec::with_capacity(15);
    out.extend_from_slice(&MAGIC);
    out.push(TYPE_STAT);
    out.extend_from_slice(&session.to_be_bytes());
    out.extend_from_slice(&token.to_be_bytes());
    out.extend_from_slice(&[0, 0, 0, 0]);
    out
}

/// Extract the challenge token from a handshake reply.
///
/// # Errors
///
/// Returns [`ProbeError::Protocol`] if the reply is for another session or
/// the token is not a decimal integer.
pub fn parse_handshake(reply: &[u8], session: i32) -> Result<i32, ProbeError> {
    let payload = check_header(reply, TYPE_HANDSHAKE, session)?;
    let (token, _) = read_cstring(payload)
        .ok_or_else(|| ProbeError::Protocol("unterminated challenge token".to_owned()))?;
    token
        .trim()
        .parse::<i32>()
        .map_err(|e| ProbeError::Protocol(format!("bad challenge token {token:?}: {e}")))
}

/// Decode a full-stat reply.
///
/// # Errors
///
/// Returns [`ProbeError::Protocol`] if the reply is truncated or has the
/// wrong type byte.
pub fn parse_full_stat(reply: &[u8]) -> Result<QueryStat, ProbeError> {
    let truncated = || ProbeError::Protocol("truncated full-stat reply".to_owned());

    if reply.first() != Some(&TYPE_STAT) {
        return Err(ProbeError::Protocol("not a full-stat reply".to_owned()));
    }
    let mut rest = reply.get(5..).ok_or_else(truncated)?;
    rest = rest.get(STAT_HEADER_PADDING..).ok_or_else(truncated)?;

    let mut stat = QueryStat::default();
    loop {
        let (key, after_key) = read_cstring(rest).ok_or_else(truncated)?;
        rest = after_key;
        if key.is_empty() {
            break;
        }
        let (value, after_value) = read_cstring(rest).ok_or_else(truncated)?;
        rest = after_value;
        match key.as_str() {
            "version" => stat.version = value,
            "numplayers" => stat.num_players = value.trim().parse().unwrap_or(0),
            "maxplayers" => stat.max_players = value.trim().parse().unwrap_or(0),
            _ => {}
        }
    }

    rest = rest.strip_prefix(PLAYER_SECTION_MARKER).unwrap_or(rest);

    while let Some((name, after)) = read_cstring(rest) {
        if name.is_empty() {
            break;
        }
        stat.players.push(name);
        rest = after;
    }

    Ok(stat)
}

fn check_header(reply: &[u8], kind: u8, session: i32) -> Result<&[u8], ProbeError> {
    let header = reply
        .get(..5)
        .ok_or_else(|| ProbeError::Protocol("reply shorter than header".to_owned()))?;
    match header.first() {
        Some(found) if *found == kind => {}
        found => {
            return Err(ProbeError::Protocol(format!(
                "unexpected reply type {:#04x}",
                found.copied().unwrap_or_default()
            )))
        }
    }
    if header.get(1..5) != Some(&session.to_be_bytes()[..]) {
        return Err(ProbeError::Protocol("reply for another session".to_owned()));
    }
    Ok(reply.get(5..).unwrap_or_default())
}

/// Split off one null-terminated string. Bytes are decoded as UTF-8,
/// replacing invalid sequences.
fn read_cstring(buf: &[u8]) -> Option<(String, &[u8])> {
    let end = buf.iter().position(|b| *b == 0)?;
    let text = String::from_utf8_lossy(buf.get(..end)?).into_owned();
    let rest = buf.get(end.checked_add(1)?..)?;
    Some((text, rest))
}

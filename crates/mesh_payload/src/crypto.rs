use crate::envelope::{DecodedPayload, Packet};
use crate::proto;
use crate::{PayloadError, Result};
use aes::cipher::{KeyIvInit, StreamCipher};
use base64::prelude::*;
use prost::Message;
use std::fmt;
use tracing::{debug, warn};

type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

pub const KEY_LEN: usize = 32;
pub const SHORT_KEY_LEN: usize = 16;
pub const NONCE_LEN: usize = 16;

/// Channel encryption key normalized to 32 bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct ChannelKey([u8; KEY_LEN]);

impl ChannelKey {
    /// Parse a channel key given as hex or base64 text.
    ///
    /// Hex is detected by exact length (32 or 64 characters) and character
    /// set; anything else is decoded as standard base64. A 16-byte key is
    /// right-padded with zeros to 32 bytes.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let bytes = if is_hex_key(text) {
            hex::decode(text).map_err(|e| PayloadError::InvalidKeyEncoding(e.to_string()))?
        } else {
            BASE64_STANDARD
                .decode(text)
                .map_err(|e| PayloadError::InvalidKeyEncoding(e.to_string()))?
        };
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut key = [0u8; KEY_LEN];
        match bytes.len() {
            KEY_LEN | SHORT_KEY_LEN => {
                key[..bytes.len()].copy_from_slice(bytes);
                Ok(Self(key))
            }
            other => Err(PayloadError::InvalidKeyLength(other)),
        }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

// Never print key material.
impl fmt::Debug for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChannelKey(..)")
    }
}

fn is_hex_key(text: &str) -> bool {
    (text.len() == SHORT_KEY_LEN * 2 || text.len() == KEY_LEN * 2)
        && text.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Build the CTR nonce for a packet: `id` little-endian in bytes 0..4,
/// `from` little-endian as a 64-bit value in bytes 8..16, zeros elsewhere.
pub fn build_nonce(packet_id: u32, from: u32) -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    nonce[0..4].copy_from_slice(&packet_id.to_le_bytes());
    nonce[8..16].copy_from_slice(&u64::from(from).to_le_bytes());
    nonce
}

/// Apply the AES-256-CTR keystream for `(packet_id, from)` to `buf` in place.
///
/// CTR is symmetric, so the same call encrypts and decrypts.
pub fn apply_keystream(key: &ChannelKey, packet_id: u32, from: u32, buf: &mut [u8]) {
    let nonce = build_nonce(packet_id, from);
    let mut cipher = Aes256Ctr::new(key.as_bytes().into(), &nonce.into());
    cipher.apply_keystream(buf);
}

/// Decrypt a packet's encrypted payload into a `DecodedPayload`.
pub fn decrypt_payload(
    key: &ChannelKey,
    packet_id: u32,
    from: u32,
    ciphertext: &[u8],
) -> Result<DecodedPayload> {
    let mut plaintext = ciphertext.to_vec();
    apply_keystream(key, packet_id, from, &mut plaintext);

    let data = proto::Data::decode(plaintext.as_slice()).map_err(|e| {
        PayloadError::DecryptionFailed(format!("plaintext is not a data payload: {}", e))
    })?;

    // CTR carries no integrity tag; a wrong key still "decrypts". Port 0 is
    // never sent by a real node, so treat it as garbage.
    if data.portnum == 0 {
        return Err(PayloadError::DecryptionFailed(
            "plaintext has no port number".to_string(),
        ));
    }

    Ok(data.into())
}

/// Decrypt `packet.encrypted` with `key`.
///
/// Returns `None` when the packet has nothing to decrypt or the plaintext does
/// not parse as a usable payload. Never fails.
pub fn decrypt(packet: &Packet, key: &ChannelKey) -> Option<DecodedPayload> {
    let ciphertext = packet.encrypted.as_deref().filter(|c| !c.is_empty())?;
    let packet_id = packet.id.unwrap_or(0);
    let from = packet.from.unwrap_or(0);

    match decrypt_payload(key, packet_id, from, ciphertext) {
        Ok(decoded) => {
            debug!(
                packet_id = packet_id,
                from = from,
                portnum = decoded.portnum,
                "decrypted packet payload"
            );
            Some(decoded)
        }
        Err(e) => {
            warn!(
                packet_id = packet_id,
                from = from,
                ciphertext_size = ciphertext.len(),
                error = %e,
                "decryption did not yield a usable payload"
            );
            None
        }
    }
}

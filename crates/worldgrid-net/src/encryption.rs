//! Wire encryption seam.
//!
//! Each connection owns a fresh scheme instance, so a scheme may keep
//! per-session state (keys, partial frames).

use crate::error::NetResult;

pub trait WireEncryption: Default + Send + 'static {
    /// Encode one outbound packet into wire bytes.
    fn encrypt(&mut self, packet: &[u8]) -> Vec<u8>;

    /// Decode inbound wire bytes into zero or more complete packets.
    ///
    /// Bytes belonging to an incomplete packet are retained until the rest
    /// arrives.
    fn decrypt(&mut self, data: &[u8]) -> NetResult<Vec<Vec<u8>>>;
}

/// Newline-framed cleartext.
#[derive(Debug, Default)]
pub struct Plaintext {
    pending: Vec<u8>,
}

impl WireEncryption for Plaintext {
    fn encrypt(&mut self, packet: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(packet.len() + 1);
        out.extend_from_slice(packet);
        out.push(b'\n');
        out
    }

    fn decrypt(&mut self, data: &[u8]) -> NetResult<Vec<Vec<u8>>> {
        self.pending.extend_from_slice(data);
        let mut packets = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if !line.is_empty() {
                packets.push(line);
            }
        }
        Ok(packets)
    }
}

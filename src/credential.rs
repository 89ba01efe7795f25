//! Password obfuscation
//!
//! The firmware expects the password XORed byte-by-byte with a fixed vendor
//! key, the key index rolling over every 19 bytes. This is NOT encryption:
//! the key is public and the packet travels as cleartext UDP on the local
//! segment, so anyone on the wire can recover the password.

use crate::config::PasswordMode;

/// Vendor key the firmware XORs passwords with
const VENDOR_KEY: &[u8] = b"NtgrSmartSwitchRock";

/// Obfuscate a plaintext password for embedding in a packet
pub fn obfuscate(password: &str) -> Vec<u8> {
    xor_with_key(password.as_bytes())
}

/// Recover the plaintext from an obfuscated password value
pub fn reveal(bytes: &[u8]) -> Vec<u8> {
    xor_with_key(bytes)
}

/// Password bytes as the switch expects them for `mode`
pub fn encode_password(password: &str, mode: PasswordMode) -> Vec<u8> {
    match mode {
        PasswordMode::Plain => password.as_bytes().to_vec(),
        PasswordMode::Obfuscated => obfuscate(password),
    }
}

fn xor_with_key(bytes: &[u8]) -> Vec<u8> {
    bytes
        .iter()
        .zip(VENDOR_KEY.iter().cycle())
        .map(|(b, k)| b ^ k)
        .collect()
}

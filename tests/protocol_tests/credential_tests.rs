//! Credential Tests
//!
//! Tests for password obfuscation.

use prosafe::credential::{encode_password, obfuscate, reveal};
use prosafe::PasswordMode;

const KEY: &[u8] = b"NtgrSmartSwitchRock";

#[test]
fn test_obfuscate_known_vector() {
    // 'p' ^ 'N', 'a' ^ 't', 's' ^ 'g', 's' ^ 'r'
    assert_eq!(obfuscate("pass"), vec![0x3e, 0x15, 0x14, 0x01]);
}

#[test]
fn test_obfuscate_empty_password() {
    assert!(obfuscate("").is_empty());
}

#[test]
fn test_key_wraps_after_nineteen_bytes() {
    let password = "a".repeat(KEY.len() + 2);
    let bytes = obfuscate(&password);

    assert_eq!(bytes.len(), password.len());
    assert_eq!(bytes[KEY.len()], b'a' ^ KEY[0]);
    assert_eq!(bytes[KEY.len() + 1], b'a' ^ KEY[1]);
}

#[test]
fn test_reveal_inverts_obfuscate() {
    for password in ["password", "Secr3t!", "a much longer password than the key"] {
        assert_eq!(reveal(&obfuscate(password)), password.as_bytes());
    }
}

#[test]
fn test_encode_password_modes() {
    assert_eq!(encode_password("pass", PasswordMode::Plain), b"pass".to_vec());
    assert_eq!(encode_password("pass", PasswordMode::Obfuscated), obfuscate("pass"));
}

//! Decoding of the `LocalCredentials` blob in the device manifest.
//!
//! The blob is base64 text wrapping AES-256-CBC ciphertext (PKCS#7 padded,
//! fixed key and zero IV). The plaintext is a small JSON document whose
//! `apPasswordHash` is the password of the device's local MQTT broker.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use secrecy::SecretString;
use serde::Deserialize;

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const KEY: [u8; 32] = [
    1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26,
    27, 28, 29, 30, 31, 32,
];
const IV: [u8; 16] = [0; 16];

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalCredentialPayload {
    ap_password_hash: String,
}

/// Returns the local broker password hidden in `envelope`. The error is a
/// human readable reason.
pub fn decrypt_local_credentials(envelope: &str) -> Result<SecretString, String> {
    let mut buffer = STANDARD
        .decode(envelope.trim())
        .map_err(|e| format!("not base64: {}", e))?;
    let plaintext = Aes256CbcDec::new(&KEY.into(), &IV.into())
        .decrypt_padded_mut::<Pkcs7>(&mut buffer)
        .map_err(|e| format!("decryption failed: {}", e))?;
    let payload: LocalCredentialPayload = serde_json::from_slice(plaintext)
        .map_err(|e| format!("unexpected plaintext: {}", e))?;
    Ok(SecretString::from(payload.ap_password_hash))
}

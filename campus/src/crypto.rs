use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand_core::{OsRng, RngCore};

#[derive(Debug)]
pub enum CryptoError {
    Encrypt(String),
    Decrypt(String),
    Decode(String),
    Utf8(std::string::FromUtf8Error),
    Key(String),
}

impl std::fmt::Display for CryptoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CryptoError::Encrypt(e) => write!(f, "Encryption error: {e}"),
            CryptoError::Decrypt(e) => write!(f, "Decryption error: {e}"),
            CryptoError::Decode(e) => write!(f, "Base64 decode error: {e}"),
            CryptoError::Utf8(e) => write!(f, "Decrypted secret is not UTF-8: {e}"),
            CryptoError::Key(e) => write!(f, "Invalid encryption key: {e}"),
        }
    }
}

impl std::error::Error for CryptoError {}

/// Encrypt a secret (e.g. a tenant database password) with AES-256-GCM.
/// Returns base64(12-byte nonce ‖ ciphertext+tag).
pub fn encrypt_secret(secret: &str, key: &[u8; 32]) -> Result<String, CryptoError> {
    let mut nonce_bytes = [0u8; 12];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let cipher = Aes256Gcm::new(key.into());
    let ciphertext = cipher
        .encrypt(nonce, secret.as_bytes())
        .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

    let mut combined = nonce_bytes.to_vec();
    combined.extend_from_slice(&ciphertext);

    Ok(STANDARD.encode(&combined))
}

pub fn decrypt_secret(encoded: &str, key: &[u8; 32]) -> Result<String, CryptoError> {
    let data = STANDARD
        .decode(encoded)
        .map_err(|e| CryptoError::Decode(e.to_string()))?;

    if data.len() < 12 {
        return Err(CryptoError::Decrypt(
            "Ciphertext too short (< 12 bytes)".to_string(),
        ));
    }

    let (nonce_bytes, ciphertext) = data.split_at(12);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new(key.into());
    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| CryptoError::Decrypt(e.to_string()))?;

    String::from_utf8(plaintext).map_err(CryptoError::Utf8)
}

/// Parse a 64-char hex string into a 32-byte key.
pub fn parse_hex_key(hex: &str) -> Result<[u8; 32], CryptoError> {
    if hex.len() != 64 {
        return Err(CryptoError::Key(format!(
            "expected 64 hex chars (32 bytes), got {}",
            hex.len()
        )));
    }
    let mut key = [0u8; 32];
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let byte_str = std::str::from_utf8(chunk)
            .map_err(|_| CryptoError::Key("invalid UTF-8 in hex string".to_string()))?;
        key[i] = u8::from_str_radix(byte_str, 16)
            .map_err(|_| CryptoError::Key(format!("invalid hex character at byte {i}")))?;
    }
    Ok(key)
}

pub fn random_key() -> [u8; 32] {
    let mut key = [0u8; 32];
    OsRng.fill_bytes(&mut key);
    key
}

/// Six-digit one-time code, `100000..=999999`.
pub fn random_otp() -> String {
    (100_000 + OsRng.next_u32() % 900_000).to_string()
}

/// Random lowercase hex string of `2 * bytes` characters.
pub fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> [u8; 32] {
        [42u8; 32]
    }

    #[test]
    fn round_trip() {
        let key = test_key();
        let encrypted = encrypt_secret("s3cr3t!", &key).unwrap();
        assert_ne!(encrypted, "s3cr3t!");
        assert_eq!(decrypt_secret(&encrypted, &key).unwrap(), "s3cr3t!");
    }

    #[test]
    fn wrong_key_fails() {
        let encrypted = encrypt_secret("value", &[1u8; 32]).unwrap();
        assert!(decrypt_secret(&encrypted, &[2u8; 32]).is_err());
    }

    #[test]
    fn corrupted_data_fails() {
        assert!(matches!(
            decrypt_secret("not-valid-base64!!!", &test_key()),
            Err(CryptoError::Decode(_))
        ));
        assert!(matches!(
            decrypt_secret("AAAA", &test_key()),
            Err(CryptoError::Decrypt(_))
        ));
    }

    #[test]
    fn two_encryptions_differ() {
        let key = test_key();
        let enc1 = encrypt_secret("pw", &key).unwrap();
        let enc2 = encrypt_secret("pw", &key).unwrap();
        assert_ne!(enc1, enc2, "random nonce per encryption");
    }

    #[test]
    fn hex_key_parsing() {
        let key = parse_hex_key(&"0a".repeat(32)).unwrap();
        assert_eq!(key, [10u8; 32]);
        assert!(parse_hex_key("abc").is_err());
        assert!(parse_hex_key(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn random_hex_length() {
        assert_eq!(random_hex(16).len(), 32);
    }

    #[test]
    fn otp_is_six_digits() {
        for _ in 0..50 {
            let otp = random_otp();
            assert_eq!(otp.len(), 6);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
            assert!(!otp.starts_with('0'));
        }
    }
}

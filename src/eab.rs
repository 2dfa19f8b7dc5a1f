//! 外部帳戶綁定（RFC 8555 §7.3.4）。
//!
//! 部分 CA 要求 newAccount 請求附帶 `externalAccountBinding`：一個以 CA 提供的
//! MAC 金鑰（HS256）簽署、payload 為帳戶 JWK 的內層 JWS。內層 JWS 不含 nonce。

use openssl::{error::ErrorStack, hash::MessageDigest, pkey::PKey, sign::Signer};
use thiserror::Error;

use crate::{
    base64::{Base64, DecodeError},
    jwk::Jwk,
    jws::Jws,
    payload::encode_payload,
    protection::{KeyReference, ProtectedHeader},
};

#[derive(Debug, Error)]
pub enum EabError {
    #[error("Invalid HMAC key: {0}")]
    InvalidKey(#[from] DecodeError),
    #[error("OpenSSL error: {0}")]
    OpenSSL(#[from] ErrorStack),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

type Result<T> = std::result::Result<T, EabError>;

/// 建立外部帳戶綁定的內層 JWS。
///
/// # 參數
///
/// - `kid`: CA 提供的外部帳戶識別碼。
/// - `hmac_key`: CA 提供的 Base64URL MAC 金鑰；容許尾端的 `=` 填充。
/// - `url`: newAccount 的 URL，需與外層 JWS 相同。
/// - `jwk`: 帳戶公鑰。
pub fn external_account_binding(kid: &str, hmac_key: &str, url: &str, jwk: &Jwk) -> Result<Jws> {
    let key = Base64::from_url(hmac_key.trim_end_matches('='))?.decode()?;
    let pkey = PKey::hmac(&key)?;

    let header = ProtectedHeader::without_nonce("HS256", KeyReference::Kid(kid.to_owned()), url);
    let header_b64 = header.to_base64()?;
    let payload_b64 = encode_payload(jwk)?;

    let mut signer = Signer::new(MessageDigest::sha256(), &pkey)?;
    signer.update(format!("{}.{}", header_b64.as_str(), payload_b64.as_str()).as_bytes())?;
    let signature = Base64::new(signer.sign_to_vec()?);

    Ok(Jws::new(&header_b64, &payload_b64, &signature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_pair::KeyDescriptor;

    fn jwk() -> Jwk {
        Jwk::from_descriptor(&KeyDescriptor::Ec {
            bits: 256,
            x: vec![7; 32],
            y: vec![9; 32],
        })
        .unwrap()
    }

    #[test]
    fn test_binding_structure() -> Result<()> {
        let jwk = jwk();
        let jws = external_account_binding("kid-1", "c2VjcmV0", "https://ca/new-acct", &jwk)?;

        assert_eq!(
            jws.decoded_protected().unwrap(),
            r#"{"alg":"HS256","kid":"kid-1","url":"https://ca/new-acct"}"#
        );
        assert_eq!(jws.decoded_payload().unwrap(), jwk.to_acme_json().unwrap());
        Ok(())
    }

    #[test]
    fn test_binding_mac_verifies() -> Result<()> {
        let jws = external_account_binding("kid-1", "c2VjcmV0", "https://ca/new-acct", &jwk())?;

        let pkey = PKey::hmac(b"secret")?;
        let mut signer = Signer::new(MessageDigest::sha256(), &pkey)?;
        signer.update(format!("{}.{}", jws.protected(), jws.payload()).as_bytes())?;
        assert_eq!(jws.decoded_signature().unwrap(), signer.sign_to_vec()?);
        Ok(())
    }

    #[test]
    fn test_padded_key_accepted_invalid_rejected() {
        assert!(external_account_binding("k", "c2VjcmV0", "u", &jwk()).is_ok());
        assert!(external_account_binding("k", "YQ==", "u", &jwk()).is_ok());
        assert!(matches!(
            external_account_binding("k", "not base64!", "u", &jwk()),
            Err(EabError::InvalidKey(_))
        ));
    }
}

use openssl::{
    ecdsa::EcdsaSig,
    error::ErrorStack,
    pkey::{Id, PKey, Private},
    sign::Signer,
};
use thiserror::Error;

use crate::{
    algorithm::{DigestAlgorithm, SignatureFormat, SigningParams},
    base64::Base64,
    key_pair::{KeyError, KeyPair},
};

/// 簽名操作可能遇到的錯誤類型。
#[derive(Debug, Error)]
pub enum SignatureError {
    /// 金鑰類型或曲線不在支援範圍內。
    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),
    /// 無法辨識的 JWS 演算法識別字串。
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    /// 底層密碼學原語失敗。
    #[error("Signing failed: {0}")]
    SigningFailure(#[from] ErrorStack),
}

impl From<KeyError> for SignatureError {
    fn from(e: KeyError) -> Self {
        match e {
            KeyError::UnsupportedKeyType(kind) => SignatureError::UnsupportedKeyType(kind),
            KeyError::OpenSSL(stack) => SignatureError::SigningFailure(stack),
        }
    }
}

type Result<T> = std::result::Result<T, SignatureError>;

/// 以指定的摘要演算法與輸出格式對資料簽名。
///
/// `SignatureFormat::Ecdsa` 會將 OpenSSL 產生的 DER 簽名轉為 JWS 使用的
/// `r || s` 定長格式，每一半補齊到曲線的位元組寬度。
pub fn sign(
    data: &[u8],
    key: &PKey<Private>,
    digest: DigestAlgorithm,
    format: SignatureFormat,
) -> Result<Vec<u8>> {
    let mut signer = Signer::new(digest.message_digest(), key)?;
    signer.update(data)?;
    let der = signer.sign_to_vec()?;

    match format {
        SignatureFormat::Der => Ok(der),
        SignatureFormat::Ecdsa => ecdsa_der_to_raw(&der, key),
    }
}

fn ecdsa_der_to_raw(der: &[u8], key: &PKey<Private>) -> Result<Vec<u8>> {
    if key.id() != Id::EC {
        return Err(SignatureError::UnsupportedKeyType(
            "ECDSA format requires an EC key".to_owned(),
        ));
    }
    let width = key.ec_key()?.group().degree().div_ceil(8) as i32;
    let sig = EcdsaSig::from_der(der)?;

    let mut raw = sig.r().to_vec_padded(width)?;
    raw.extend(sig.s().to_vec_padded(width)?);
    Ok(raw)
}

/// 根據 header 與 payload 的 Base64URL 值組出簽名輸入 `header.payload`，
/// 以金鑰對簽名後回傳 Base64URL 編碼的簽名。
pub fn create_signature(
    header_b64: &Base64,
    payload_b64: &Base64,
    key_pair: &KeyPair,
    params: &SigningParams,
) -> Result<Base64> {
    let signing_input = format!("{}.{}", header_b64.as_str(), payload_b64.as_str());
    let signature = sign(
        signing_input.as_bytes(),
        key_pair.private_key(),
        params.digest,
        params.format,
    )?;

    Ok(Base64::new(signature))
}

/// 測試用：以公鑰驗證 `sign` 產生的簽名。
#[cfg(test)]
pub(crate) fn verify(
    data: &[u8],
    signature: &[u8],
    key_pair: &KeyPair,
    digest: DigestAlgorithm,
    format: SignatureFormat,
) -> Result<bool> {
    use openssl::{bn::BigNum, sign::Verifier};

    let der = match format {
        SignatureFormat::Der => signature.to_vec(),
        SignatureFormat::Ecdsa => {
            let (r, s) = signature.split_at(signature.len() / 2);
            EcdsaSig::from_private_components(BigNum::from_slice(r)?, BigNum::from_slice(s)?)?
                .to_der()?
        }
    };

    let mut verifier = Verifier::new(digest.message_digest(), key_pair.public_key())?;
    verifier.update(data)?;
    Ok(verifier.verify(&der)?)
}

#[cfg(test)]
mod tests {
    use openssl::nid::Nid;

    use super::*;
    use crate::algorithm::select;

    #[test]
    fn test_rsa_signature_verifies() -> Result<()> {
        let key_pair = KeyPair::generate_rsa(2048)?;
        let params = select(&key_pair.descriptor()?)?;
        let sig = sign(b"abc.def", key_pair.private_key(), params.digest, params.format)?;

        assert_eq!(sig.len(), 256);
        assert!(verify(b"abc.def", &sig, &key_pair, params.digest, params.format)?);
        assert!(!verify(b"abc.deg", &sig, &key_pair, params.digest, params.format)?);
        Ok(())
    }

    #[test]
    fn test_ecdsa_raw_signature_lengths() -> Result<()> {
        for (curve, len) in [
            (Nid::X9_62_PRIME256V1, 64),
            (Nid::SECP384R1, 96),
            (Nid::SECP521R1, 132),
        ] {
            let key_pair = KeyPair::generate_ec(curve)?;
            let params = select(&key_pair.descriptor()?)?;
            let sig = sign(
                b"protected.payload",
                key_pair.private_key(),
                params.digest,
                params.format,
            )?;

            assert_eq!(sig.len(), len);
            assert!(verify(
                b"protected.payload",
                &sig,
                &key_pair,
                params.digest,
                params.format
            )?);
        }
        Ok(())
    }

    #[test]
    fn test_ecdsa_format_rejects_rsa_key() -> Result<()> {
        let key_pair = KeyPair::generate_rsa(2048)?;
        let result = sign(
            b"data",
            key_pair.private_key(),
            DigestAlgorithm::Sha256,
            SignatureFormat::Ecdsa,
        );
        assert!(matches!(result, Err(SignatureError::UnsupportedKeyType(_))));
        Ok(())
    }

    #[test]
    fn test_create_signature_signs_dot_joined_input() -> Result<()> {
        let key_pair = KeyPair::generate_ec(Nid::X9_62_PRIME256V1)?;
        let params = select(&key_pair.descriptor()?)?;
        let header = Base64::new(r#"{"alg":"ES256"}"#);
        let payload = Base64::new("");

        let sig = create_signature(&header, &payload, &key_pair, &params)?.decode().unwrap();
        let input = format!("{}.", header.as_str());
        assert!(verify(input.as_bytes(), &sig, &key_pair, params.digest, params.format)?);
        Ok(())
    }
}

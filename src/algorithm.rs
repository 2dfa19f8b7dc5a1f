//! JWS 簽名演算法的選擇與解析。

use std::{fmt, sync::OnceLock};

use openssl::hash::MessageDigest;
use regex::Regex;

use crate::{key_pair::KeyDescriptor, signature::SignatureError};

type Result<T> = std::result::Result<T, SignatureError>;

/// ACME 帳戶金鑰可用的 JWS 演算法。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    RS256,
    ES256,
    ES384,
    ES512,
}

/// 簽名前對訊息使用的摘要演算法。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

/// 簽名位元組的輸出格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureFormat {
    /// OpenSSL 原生的 DER 輸出（RSA PKCS#1 v1.5 簽名本身即為此格式）。
    Der,
    /// JWS 要求的 ECDSA `r || s` 定長串接格式。
    Ecdsa,
}

/// 一次簽名所需的完整參數。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningParams {
    pub algorithm: SignatureAlgorithm,
    pub digest: DigestAlgorithm,
    pub format: SignatureFormat,
}

impl SignatureAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureAlgorithm::RS256 => "RS256",
            SignatureAlgorithm::ES256 => "ES256",
            SignatureAlgorithm::ES384 => "ES384",
            SignatureAlgorithm::ES512 => "ES512",
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DigestAlgorithm {
    pub fn message_digest(&self) -> MessageDigest {
        match self {
            DigestAlgorithm::Sha256 => MessageDigest::sha256(),
            DigestAlgorithm::Sha384 => MessageDigest::sha384(),
            DigestAlgorithm::Sha512 => MessageDigest::sha512(),
        }
    }

    fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            256 => Some(DigestAlgorithm::Sha256),
            384 => Some(DigestAlgorithm::Sha384),
            512 => Some(DigestAlgorithm::Sha512),
            _ => None,
        }
    }
}

/// 根據金鑰描述選擇 JWS 演算法、摘要演算法與簽名格式。
///
/// - RSA（任意長度）一律使用 `RS256`。
/// - EC P-256 / P-384 / P-521 分別對應 `ES256` / `ES384` / `ES512`，
///   其中 P-521 搭配 SHA-512。
///
/// # 錯誤
///
/// 其他 EC 曲線長度回傳 [`SignatureError::UnsupportedKeyType`]。
pub fn select(descriptor: &KeyDescriptor) -> Result<SigningParams> {
    let params = match descriptor {
        KeyDescriptor::Rsa { .. } => SigningParams {
            algorithm: SignatureAlgorithm::RS256,
            digest: DigestAlgorithm::Sha256,
            format: SignatureFormat::Der,
        },
        KeyDescriptor::Ec { bits: 256, .. } => SigningParams {
            algorithm: SignatureAlgorithm::ES256,
            digest: DigestAlgorithm::Sha256,
            format: SignatureFormat::Ecdsa,
        },
        KeyDescriptor::Ec { bits: 384, .. } => SigningParams {
            algorithm: SignatureAlgorithm::ES384,
            digest: DigestAlgorithm::Sha384,
            format: SignatureFormat::Ecdsa,
        },
        KeyDescriptor::Ec { bits: 521, .. } => SigningParams {
            algorithm: SignatureAlgorithm::ES512,
            digest: DigestAlgorithm::Sha512,
            format: SignatureFormat::Ecdsa,
        },
        KeyDescriptor::Ec { bits, .. } => {
            return Err(SignatureError::UnsupportedKeyType(format!(
                "EC key of {bits} bits"
            )))
        }
    };

    Ok(params)
}

fn algorithm_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([A-Z]+)(\d+)$").expect("valid algorithm pattern"))
}

/// 將 JWS 演算法識別字串（例如 `"ES384"`）拆解為摘要演算法與簽名格式。
///
/// 字母前綴決定家族（`RS` → DER，`ES` → ECDSA 原始格式），
/// 數字後綴必須是 256、384 或 512。
pub fn parse_algorithm(alg: &str) -> Result<(DigestAlgorithm, SignatureFormat)> {
    let unsupported = || SignatureError::UnsupportedAlgorithm(alg.to_owned());

    let captures = algorithm_pattern().captures(alg).ok_or_else(unsupported)?;
    let family = &captures[1];
    let digest = captures[2]
        .parse::<u32>()
        .ok()
        .and_then(DigestAlgorithm::from_bits)
        .ok_or_else(unsupported)?;

    let format = match family {
        "RS" => SignatureFormat::Der,
        "ES" => SignatureFormat::Ecdsa,
        _ => return Err(unsupported()),
    };

    Ok((digest, format))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ec(bits: u32) -> KeyDescriptor {
        KeyDescriptor::Ec {
            bits,
            x: vec![1],
            y: vec![2],
        }
    }

    #[test]
    fn test_select_rsa_always_rs256() -> Result<()> {
        for bits in [2048, 3072, 4096] {
            let descriptor = KeyDescriptor::Rsa {
                bits,
                n: vec![1],
                e: vec![1, 0, 1],
            };
            let params = select(&descriptor)?;
            assert_eq!(params.algorithm, SignatureAlgorithm::RS256);
            assert_eq!(params.digest, DigestAlgorithm::Sha256);
            assert_eq!(params.format, SignatureFormat::Der);
        }
        Ok(())
    }

    #[test]
    fn test_select_ec_curves() -> Result<()> {
        let cases = [
            (256, SignatureAlgorithm::ES256, DigestAlgorithm::Sha256),
            (384, SignatureAlgorithm::ES384, DigestAlgorithm::Sha384),
            (521, SignatureAlgorithm::ES512, DigestAlgorithm::Sha512),
        ];
        for (bits, algorithm, digest) in cases {
            let params = select(&ec(bits))?;
            assert_eq!(params.algorithm, algorithm);
            assert_eq!(params.digest, digest);
            assert_eq!(params.format, SignatureFormat::Ecdsa);
        }
        Ok(())
    }

    #[test]
    fn test_select_unsupported_curve() {
        for bits in [224, 512, 571] {
            assert!(matches!(
                select(&ec(bits)),
                Err(SignatureError::UnsupportedKeyType(_))
            ));
        }
    }

    #[test]
    fn test_parse_algorithm() -> Result<()> {
        assert_eq!(
            parse_algorithm("RS256")?,
            (DigestAlgorithm::Sha256, SignatureFormat::Der)
        );
        assert_eq!(
            parse_algorithm("ES384")?,
            (DigestAlgorithm::Sha384, SignatureFormat::Ecdsa)
        );
        assert_eq!(
            parse_algorithm("ES512")?,
            (DigestAlgorithm::Sha512, SignatureFormat::Ecdsa)
        );
        Ok(())
    }

    #[test]
    fn test_parse_algorithm_rejects_unknown() {
        for alg in ["HS256", "ES521", "RS1", "es256", "EdDSA", "ES256K", ""] {
            assert!(
                matches!(
                    parse_algorithm(alg),
                    Err(SignatureError::UnsupportedAlgorithm(_))
                ),
                "{alg} should be rejected"
            );
        }
    }

    #[test]
    fn test_selected_algorithm_parses_back() -> Result<()> {
        for bits in [256, 384, 521] {
            let params = select(&ec(bits))?;
            assert_eq!(
                parse_algorithm(params.algorithm.as_str())?,
                (params.digest, params.format)
            );
        }
        Ok(())
    }
}

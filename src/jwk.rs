use openssl::sha::sha256;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{
    base64::Base64,
    json,
    key_pair::{KeyDescriptor, KeyError, KeyPair},
};

/// JWK 相關操作的錯誤類型。
#[derive(Debug, Error)]
pub enum JwkError {
    /// 不支援的金鑰類型或曲線。
    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),
    /// 讀取金鑰參數失敗。
    #[error("Failed to read key: {0}")]
    KeyConversionError(#[from] openssl::error::ErrorStack),
    /// 序列化錯誤。
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl From<KeyError> for JwkError {
    fn from(e: KeyError) -> Self {
        match e {
            KeyError::UnsupportedKeyType(kind) => JwkError::UnsupportedKeyType(kind),
            KeyError::OpenSSL(stack) => JwkError::KeyConversionError(stack),
        }
    }
}

type Result<T> = std::result::Result<T, JwkError>;

/// 正規形式的 JSON Web Key。
///
/// 欄位宣告順序即序列化順序，依 RFC 7638 縮影計算的字典序排列；
/// 不可調整，否則縮影會與伺服器計算的結果不一致。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Jwk {
    Rsa(RsaJwk),
    Ec(EcJwk),
}

/// RSA 公鑰：成員順序 `e, kty, n`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsaJwk {
    e: String,
    kty: String,
    n: String,
}

/// EC 公鑰：成員順序 `crv, kty, x, y`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcJwk {
    crv: String,
    kty: String,
    x: String,
    y: String,
}

impl Jwk {
    /// 從金鑰描述建立 JWK，數值參數皆以 Base64URL 編碼。
    ///
    /// # 錯誤
    ///
    /// 曲線不是 P-256 / P-384 / P-521 時回傳 [`JwkError::UnsupportedKeyType`]。
    pub fn from_descriptor(descriptor: &KeyDescriptor) -> Result<Self> {
        match descriptor {
            KeyDescriptor::Rsa { n, e, .. } => Ok(Jwk::Rsa(RsaJwk {
                e: Base64::new(e).base64_url(),
                kty: "RSA".to_owned(),
                n: Base64::new(n).base64_url(),
            })),
            KeyDescriptor::Ec { bits, x, y } => {
                let crv = match bits {
                    256 => "P-256",
                    384 => "P-384",
                    521 => "P-521",
                    other => {
                        return Err(JwkError::UnsupportedKeyType(format!(
                            "EC key of {other} bits"
                        )))
                    }
                };
                Ok(Jwk::Ec(EcJwk {
                    crv: crv.to_owned(),
                    kty: "EC".to_owned(),
                    x: Base64::new(x).base64_url(),
                    y: Base64::new(y).base64_url(),
                }))
            }
        }
    }

    /// 根據給定的金鑰對建立對應的 JWK。
    pub fn new(key_pair: &KeyPair) -> Result<Self> {
        Self::from_descriptor(&key_pair.descriptor()?)
    }

    pub fn kty(&self) -> &str {
        match self {
            Jwk::Rsa(jwk) => &jwk.kty,
            Jwk::Ec(jwk) => &jwk.kty,
        }
    }

    /// 產生符合 ACME 協議要求的緊湊 JSON 表示。
    pub fn to_acme_json(&self) -> Result<String> {
        Ok(json::encode(self)?)
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// 計算 RFC 7638 縮影：正規 JSON 的 SHA-256 原始位元組。
    ///
    /// 回傳值未經編碼，呼叫端需要時再自行 Base64URL 編碼。
    pub fn thumbprint(&self) -> Result<[u8; 32]> {
        Ok(sha256(self.to_acme_json()?.as_bytes()))
    }
}

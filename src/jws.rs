//! 扁平化 JSON 序列化的 JWS 物件（RFC 7515 §7.2.2）。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    algorithm::SigningParams,
    base64::{Base64, DecodeError},
    json,
    key_pair::KeyPair,
    protection::ProtectedHeader,
    signature::{create_signature, SignatureError},
};

/// 一次請求使用的 JWS 信封，三個欄位皆為 Base64URL 字串。
///
/// 每次請求建立一次，交換完成即丟棄。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Jws {
    protected: String,
    payload: String,
    signature: String,
}

/// 與 JWS 相關的錯誤。
#[derive(Error, Debug)]
pub enum JwsError {
    #[error("Base64 decode error: {0}")]
    Base64DecodeError(#[from] DecodeError),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Signature error: {0}")]
    SignatureError(#[from] SignatureError),
}

type Result<T> = std::result::Result<T, JwsError>;

impl Jws {
    /// 以已編碼的三個部分直接組成 JWS。
    pub fn new(header_b64: &Base64, payload_b64: &Base64, signature_b64: &Base64) -> Self {
        Jws {
            protected: header_b64.base64_url(),
            payload: payload_b64.base64_url(),
            signature: signature_b64.base64_url(),
        }
    }

    /// 編碼受保護標頭，並以金鑰對簽署 `protected.payload`。
    pub fn sign(
        header: &ProtectedHeader,
        payload_b64: &Base64,
        key_pair: &KeyPair,
        params: &SigningParams,
    ) -> Result<Self> {
        let header_b64 = header.to_base64()?;
        let signature = create_signature(&header_b64, payload_b64, key_pair, params)?;
        Ok(Self::new(&header_b64, payload_b64, &signature))
    }

    pub fn protected(&self) -> &str {
        &self.protected
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// 解碼受保護標頭的 JSON 字串。
    pub fn decoded_protected(&self) -> Result<String> {
        let bytes = Base64::from_url(&self.protected)?.decode()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// 解碼 payload；POST-as-GET 的空 payload 解碼為空字串。
    pub fn decoded_payload(&self) -> Result<String> {
        let bytes = Base64::from_url(&self.payload)?.decode()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn decoded_signature(&self) -> Result<Vec<u8>> {
        Ok(Base64::from_url(&self.signature)?.decode()?)
    }

    /// 序列化為 `{"protected":..,"payload":..,"signature":..}`。
    pub fn to_json(&self) -> Result<String> {
        Ok(json::encode(self)?)
    }
}

use serde::Serialize;

use crate::{base64::Base64, json, jwk::Jwk};

/// 受保護標頭中用來識別簽名金鑰的方式。
///
/// - `Jwk`：直接附上公鑰，用於取得帳戶 URL 之前的請求（例如 newAccount）。
/// - `Kid`：附上伺服器核發的帳戶 URL，用於其後所有已認證的請求。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyReference {
    Jwk(Jwk),
    Kid(String),
}

/// JWS 受保護標頭。
///
/// 序列化順序為 `alg, jwk, kid, nonce, url`，`jwk` 與 `kid` 只會出現其一。
#[derive(Debug, Clone, Serialize)]
pub struct ProtectedHeader {
    alg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    jwk: Option<Jwk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<String>,
    /// 外部帳戶綁定的內層 JWS 沒有 nonce。
    #[serde(skip_serializing_if = "Option::is_none")]
    nonce: Option<String>,
    url: String,
}

impl ProtectedHeader {
    /// 建立一般 ACME 請求使用的標頭。
    pub fn new(
        alg: impl Into<String>,
        key: KeyReference,
        nonce: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        let mut header = Self::without_nonce(alg, key, url);
        header.nonce = Some(nonce.into());
        header
    }

    /// 建立不含 nonce 的標頭。
    pub fn without_nonce(
        alg: impl Into<String>,
        key: KeyReference,
        url: impl Into<String>,
    ) -> Self {
        let (jwk, kid) = match key {
            KeyReference::Jwk(jwk) => (Some(jwk), None),
            KeyReference::Kid(kid) => (None, Some(kid)),
        };

        Self {
            alg: alg.into(),
            jwk,
            kid,
            nonce: None,
            url: url.into(),
        }
    }

    pub fn alg(&self) -> &str {
        &self.alg
    }

    pub fn nonce(&self) -> Option<&str> {
        self.nonce.as_deref()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        json::encode(self)
    }

    /// 將標頭序列化為緊湊 JSON 後以 Base64URL 編碼。
    pub fn to_base64(&self) -> serde_json::Result<Base64> {
        Ok(Base64::new(self.to_json()?))
    }
}

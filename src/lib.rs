//! # ACME Secure HTTP
//!
//! 本庫實作 ACME（RFC 8555）客戶端與 CA 溝通時的簽名與傳輸核心：
//!
//! - **jwk / jws / protection / payload**: 以帳戶金鑰建立 JWK、受保護標頭與扁平化 JWS 信封。
//! - **algorithm / signature**: 依金鑰類型選擇 RS256 或 ES256/ES384/ES512，並產生對應格式的簽名。
//! - **client**: 送出簽名（JWK 或 KID 模式）與未簽名的請求，管理 nonce，遇到 badNonce 時重試一次。
//! - **error**: 將 HTTP 錯誤回應與 RFC 7807 問題文件分類為 ACME 錯誤類型。
//! - **transport**: 可替換的 HTTP 傳輸層，預設以 `reqwest` 實作。
//!
//! 目錄探索、帳戶與訂單流程不在本庫範圍內，呼叫端自行提供各端點 URL。
//!
//! ## 示例
//!
//! ```rust,no_run
//! use acme_secure_http::{KeyPair, SecureHttpClient};
//! use openssl::nid::Nid;
//! use reqwest::Method;
//! use serde_json::json;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let key_pair = KeyPair::generate_ec(Nid::X9_62_PRIME256V1)?;
//!     let mut client = SecureHttpClient::builder(key_pair)
//!         .nonce_endpoint("https://acme-staging-v02.api.letsencrypt.org/acme/new-nonce")
//!         .build()?;
//!
//!     // 1. 以 JWK 模式建立帳戶
//!     client.signed_request(
//!         Method::POST,
//!         "https://acme-staging-v02.api.letsencrypt.org/acme/new-acct",
//!         &json!({ "termsOfServiceAgreed": true }),
//!         true,
//!     )?;
//!     let kid = client.last_location().unwrap_or_default().to_owned();
//!
//!     // 2. 之後以 KID 模式簽名
//!     let order = client.signed_kid_request(
//!         Method::POST,
//!         "https://acme-staging-v02.api.letsencrypt.org/acme/new-order",
//!         &kid,
//!         &json!({ "identifiers": [{ "type": "dns", "value": "example.com" }] }),
//!         true,
//!     )?;
//!     println!("{:?}", order.json());
//!
//!     Ok(())
//! }
//! ```

pub mod algorithm;
pub mod base64;
pub mod client;
pub mod eab;
pub mod error;
pub mod json;
pub mod jwk;
pub mod jws;
pub mod key_pair;
mod nonce;
pub mod payload;
pub mod protection;
pub mod response;
pub mod signature;
pub mod transport;

pub use client::{ResponseBody, SecureHttpClient, SecureHttpClientBuilder};
pub use error::{ClientError, Result, ServerError, ServerErrorKind};
pub use key_pair::KeyPair;
pub use response::LastResponse;
pub use transport::{HttpRequest, HttpResponse, MockTransport, ReqwestTransport, Transport};

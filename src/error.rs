//! 錯誤類型與伺服器錯誤分類。
//!
//! 客戶端錯誤（金鑰、簽名、JSON、傳輸）與伺服器錯誤（帶有錯誤狀態碼的回應）
//! 都彙整到 [`ClientError`]。伺服器錯誤會依 RFC 8555 §6.7 的問題文件類型細分，
//! 其中 [`ServerErrorKind::BadNonce`] 是唯一會被自動重試的情況。

use std::fmt;

use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    eab::EabError,
    jwk::JwkError,
    jws::JwsError,
    key_pair::KeyError,
    signature::SignatureError,
    transport::{HttpResponse, TransportError},
};

/// 錯誤訊息中回應內容摘要的最大字元數。
pub const BODY_SUMMARY_LIMIT: usize = 120;

const ACME_ERROR_PREFIX: &str = "urn:ietf:params:acme:error:";
const LEGACY_ACME_ERROR_PREFIX: &str = "urn:acme:error:";

/// 本 crate 所有操作的錯誤類型。
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("Signing failed: {0}")]
    SigningFailure(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Expected JSON response from {method} {endpoint}, got: {summary}")]
    ExpectedJson {
        method: Method,
        endpoint: String,
        summary: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{method} {endpoint} failed: {source}")]
    Transport {
        method: Method,
        endpoint: String,
        #[source]
        source: TransportError,
    },
    #[error("Failed to build HTTP transport: {0}")]
    TransportSetup(#[source] TransportError),
    #[error("No nonce available to sign request to {url}")]
    MissingNonce { url: String },
    #[error("External account binding error: {0}")]
    ExternalAccount(#[from] EabError),
    #[error(transparent)]
    Server(#[from] ServerError),
}

/// 結果類型，失敗時回傳 [`ClientError`]。
pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// 若為伺服器錯誤則回傳其內容。
    pub fn as_server_error(&self) -> Option<&ServerError> {
        match self {
            ClientError::Server(e) => Some(e),
            _ => None,
        }
    }
}

impl From<KeyError> for ClientError {
    fn from(e: KeyError) -> Self {
        match e {
            KeyError::UnsupportedKeyType(kind) => ClientError::UnsupportedKeyType(kind),
            KeyError::OpenSSL(stack) => ClientError::SigningFailure(stack.to_string()),
        }
    }
}

impl From<SignatureError> for ClientError {
    fn from(e: SignatureError) -> Self {
        match e {
            SignatureError::UnsupportedKeyType(kind) => ClientError::UnsupportedKeyType(kind),
            SignatureError::UnsupportedAlgorithm(alg) => ClientError::UnsupportedAlgorithm(alg),
            SignatureError::SigningFailure(stack) => ClientError::SigningFailure(stack.to_string()),
        }
    }
}

impl From<JwkError> for ClientError {
    fn from(e: JwkError) -> Self {
        match e {
            JwkError::UnsupportedKeyType(kind) => ClientError::UnsupportedKeyType(kind),
            JwkError::KeyConversionError(stack) => ClientError::SigningFailure(stack.to_string()),
            JwkError::SerializationError(e) => ClientError::Json(e),
        }
    }
}

impl From<JwsError> for ClientError {
    fn from(e: JwsError) -> Self {
        match e {
            JwsError::SignatureError(e) => e.into(),
            JwsError::JsonError(e) => ClientError::Json(e),
            JwsError::Base64DecodeError(e) => ClientError::SigningFailure(e.to_string()),
        }
    }
}

/// RFC 7807 問題文件。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subproblems: Vec<Subproblem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subproblem {
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<ProblemIdentifier>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemIdentifier {
    #[serde(rename = "type")]
    pub type_: String,
    pub value: String,
}

impl Problem {
    /// 去掉 ACME 錯誤 URN 前綴後的短名稱，例如 `badNonce`。
    pub fn acme_error_name(&self) -> Option<&str> {
        self.type_
            .strip_prefix(ACME_ERROR_PREFIX)
            .or_else(|| self.type_.strip_prefix(LEGACY_ACME_ERROR_PREFIX))
    }
}

/// 伺服器錯誤的細分類別。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ServerErrorKind {
    AccountDoesNotExist,
    AlreadyRevoked,
    BadCsr,
    BadNonce,
    BadPublicKey,
    BadRevocationReason,
    BadSignatureAlgorithm,
    Caa,
    Compound,
    Connection,
    Dns,
    ExternalAccountRequired,
    IncorrectResponse,
    InvalidContact,
    Malformed,
    OrderNotReady,
    RateLimited,
    RejectedIdentifier,
    ServerInternal,
    Tls,
    Unauthorized,
    UnsupportedContact,
    UnsupportedIdentifier,
    UserActionRequired,
    /// 無法辨識的 4xx 回應。
    Client,
    /// 無法辨識的 5xx 回應。
    Server,
}

impl ServerErrorKind {
    fn from_acme_error_name(name: &str) -> Option<Self> {
        let kind = match name {
            "accountDoesNotExist" => Self::AccountDoesNotExist,
            "alreadyRevoked" => Self::AlreadyRevoked,
            "badCSR" => Self::BadCsr,
            "badNonce" => Self::BadNonce,
            "badPublicKey" => Self::BadPublicKey,
            "badRevocationReason" => Self::BadRevocationReason,
            "badSignatureAlgorithm" => Self::BadSignatureAlgorithm,
            "caa" => Self::Caa,
            "compound" => Self::Compound,
            "connection" => Self::Connection,
            "dns" => Self::Dns,
            "externalAccountRequired" => Self::ExternalAccountRequired,
            "incorrectResponse" => Self::IncorrectResponse,
            "invalidContact" => Self::InvalidContact,
            "malformed" => Self::Malformed,
            "orderNotReady" => Self::OrderNotReady,
            "rateLimited" => Self::RateLimited,
            "rejectedIdentifier" => Self::RejectedIdentifier,
            "serverInternal" => Self::ServerInternal,
            "tls" => Self::Tls,
            "unauthorized" => Self::Unauthorized,
            "unsupportedContact" => Self::UnsupportedContact,
            "unsupportedIdentifier" => Self::UnsupportedIdentifier,
            "userActionRequired" => Self::UserActionRequired,
            _ => return None,
        };
        Some(kind)
    }

    fn generic(status: StatusCode) -> Self {
        if status.is_server_error() {
            Self::Server
        } else {
            Self::Client
        }
    }
}

/// 帶有錯誤狀態碼的 HTTP 交換。
#[derive(Debug, Clone)]
pub struct ServerError {
    pub kind: ServerErrorKind,
    pub status: StatusCode,
    pub method: Method,
    pub endpoint: String,
    /// 可解碼時的問題文件。
    pub problem: Option<Problem>,
    /// 截斷後的回應內容。
    pub summary: String,
}

impl ServerError {
    pub fn is_bad_nonce(&self) -> bool {
        self.kind == ServerErrorKind::BadNonce
    }

    pub fn detail(&self) -> Option<&str> {
        self.problem.as_ref().and_then(|p| p.detail.as_deref())
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} returned {} ({:?})",
            self.method, self.endpoint, self.status, self.kind
        )?;
        match &self.problem {
            Some(problem) => match &problem.detail {
                Some(detail) => write!(f, ": {}: {detail}", problem.type_),
                None => write!(f, ": {}", problem.type_),
            },
            None => write!(f, ": {}", self.summary),
        }
    }
}

impl std::error::Error for ServerError {}

/// 將帶有錯誤狀態碼的回應分類為 [`ServerError`]。
///
/// 回應內容可解碼為含 `type` 的問題文件且類型為已知的 ACME 錯誤時，
/// 使用對應類別；否則依狀態碼落入 `Client` 或 `Server`。
pub fn classify(method: &Method, endpoint: &str, response: &HttpResponse) -> ServerError {
    let problem = serde_json::from_str::<Problem>(&response.body)
        .ok()
        .filter(|p| !p.type_.is_empty());

    let kind = problem
        .as_ref()
        .and_then(Problem::acme_error_name)
        .and_then(ServerErrorKind::from_acme_error_name)
        .unwrap_or_else(|| ServerErrorKind::generic(response.status));

    ServerError {
        kind,
        status: response.status,
        method: method.clone(),
        endpoint: endpoint.to_owned(),
        problem,
        summary: body_summary(&response.body),
    }
}

/// 回應內容的診斷摘要，超過 [`BODY_SUMMARY_LIMIT`] 個字元時截斷。
pub fn body_summary(body: &str) -> String {
    match body.char_indices().nth(BODY_SUMMARY_LIMIT) {
        Some((idx, _)) => format!("{} (truncated...)", &body[..idx]),
        None => body.to_owned(),
    }
}

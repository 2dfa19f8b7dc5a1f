//! ACME 請求的簽名、傳送與 badNonce 重試。

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::debug;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE},
    Method, StatusCode,
};
use serde::Serialize;
use serde_json::Value;

use crate::{
    algorithm,
    base64::Base64,
    eab,
    error::{body_summary, classify, ClientError, Result, ServerError},
    json,
    jwk::Jwk,
    jws::Jws,
    key_pair::KeyPair,
    payload::encode_payload,
    protection::{KeyReference, ProtectedHeader},
    response::LastResponse,
    transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport},
};

const ACCEPT_VALUE: &str = "application/json,application/jose+json,";
const JOSE_CONTENT_TYPE: &str = "application/jose+json";

/// 請求回應的內容。
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// 解碼後的 JSON（物件或陣列）。
    Json(Value),
    /// 未解碼的原始內容，可能為空字串。
    Raw(String),
}

impl ResponseBody {
    pub fn json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Raw(_) => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Raw(_) => None,
        }
    }

    pub fn raw(&self) -> Option<&str> {
        match self {
            ResponseBody::Raw(body) => Some(body),
            ResponseBody::Json(_) => None,
        }
    }
}

/// 一次 HTTP 交換的結果：成功回應，或已分類的伺服器錯誤。
enum Outcome {
    Success(HttpResponse),
    Rejected(ServerError),
}

/// 以帳戶金鑰簽署並傳送 ACME 請求的客戶端。
///
/// 每個實例保存最近一次回應的快照，nonce 也從中取得。
/// 會送出請求的方法都需要 `&mut self`：同一實例一次只能有一個進行中的請求，
/// 需要並行時請為每個工作者建立各自的實例。
#[derive(Debug)]
pub struct SecureHttpClient {
    pub(crate) key_pair: KeyPair,
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) nonce_endpoint: Option<String>,
    pub(crate) last_response: Option<LastResponse>,
}

impl SecureHttpClient {
    /// 以指定的金鑰對與傳輸層建立客戶端。
    pub fn new(key_pair: KeyPair, transport: impl Transport + 'static) -> Self {
        Self {
            key_pair,
            transport: Box::new(transport),
            nonce_endpoint: None,
            last_response: None,
        }
    }

    pub fn builder(key_pair: KeyPair) -> SecureHttpClientBuilder {
        SecureHttpClientBuilder::new(key_pair)
    }

    /// 替換帳戶金鑰對，之後的簽名立即使用新金鑰。
    pub fn set_account_key_pair(&mut self, key_pair: KeyPair) {
        self.key_pair = key_pair;
    }

    pub fn account_key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// 設定 newNonce 端點；快照中沒有可用 nonce 時會對它送出 HEAD 請求。
    pub fn set_nonce_endpoint(&mut self, endpoint: impl Into<String>) {
        self.nonce_endpoint = Some(endpoint.into());
    }

    /// 帳戶公鑰的正規 JWK。
    pub fn jwk(&self) -> Result<Jwk> {
        Ok(Jwk::new(&self.key_pair)?)
    }

    /// 帳戶公鑰的 RFC 7638 縮影（SHA-256 原始位元組）。
    pub fn jwk_thumbprint(&self) -> Result<[u8; 32]> {
        Ok(self.jwk()?.thumbprint()?)
    }

    pub fn last_response(&self) -> Option<&LastResponse> {
        self.last_response.as_ref()
    }

    pub fn last_code(&self) -> Option<StatusCode> {
        self.last_response.as_ref().map(LastResponse::status)
    }

    pub fn last_location(&self) -> Option<&str> {
        self.last_response.as_ref().and_then(LastResponse::location)
    }

    pub fn last_links(&self) -> HashMap<String, String> {
        self.last_response
            .as_ref()
            .map(LastResponse::links)
            .unwrap_or_default()
    }

    pub fn last_link_urls(&self, rel: &str) -> Vec<String> {
        self.last_response
            .as_ref()
            .map(|last| last.link_urls(rel))
            .unwrap_or_default()
    }

    pub fn last_retry_after(&self) -> Option<DateTime<Utc>> {
        self.last_response
            .as_ref()
            .and_then(|last| last.retry_after(Utc::now()))
    }

    /// 以 JWK 模式簽署並送出請求（用於取得帳戶 URL 之前，例如 newAccount）。
    ///
    /// 伺服器回報 badNonce 時，以新的 nonce 重新簽名並重送一次；
    /// 第二次仍失敗則回傳伺服器錯誤。
    pub fn signed_request<T: Serialize + ?Sized>(
        &mut self,
        method: Method,
        endpoint: &str,
        payload: &T,
        decode_json: bool,
    ) -> Result<ResponseBody> {
        self.signed_dispatch(method, endpoint, None, payload, decode_json)
    }

    /// 以 KID 模式簽署並送出請求，`kid` 為伺服器核發的帳戶 URL。
    pub fn signed_kid_request<T: Serialize + ?Sized>(
        &mut self,
        method: Method,
        endpoint: &str,
        kid: &str,
        payload: &T,
        decode_json: bool,
    ) -> Result<ResponseBody> {
        self.signed_dispatch(method, endpoint, Some(kid), payload, decode_json)
    }

    /// 送出未簽名的請求。`payload` 為 `null`（例如 `&()`）時不帶內容。
    pub fn unsigned_request<T: Serialize + ?Sized>(
        &mut self,
        method: Method,
        endpoint: &str,
        payload: &T,
        decode_json: bool,
    ) -> Result<ResponseBody> {
        let body = match serde_json::to_value(payload)? {
            Value::Null => None,
            value => Some(json::encode(&value)?),
        };
        self.dispatch(method, endpoint, body, decode_json)
    }

    /// 建立 JWK 模式的 JWS 但不送出，會消耗一個 nonce。
    pub fn sign_jwk_payload<T: Serialize + ?Sized>(
        &mut self,
        url: &str,
        payload: &T,
    ) -> Result<Jws> {
        self.sign_envelope(url, None, &encode_payload(payload)?)
    }

    /// 建立 KID 模式的 JWS 但不送出，會消耗一個 nonce。
    pub fn sign_kid_payload<T: Serialize + ?Sized>(
        &mut self,
        url: &str,
        kid: &str,
        payload: &T,
    ) -> Result<Jws> {
        self.sign_envelope(url, Some(kid), &encode_payload(payload)?)
    }

    /// 以帳戶 JWK 建立外部帳戶綁定的內層 JWS。
    pub fn external_account_binding(&self, kid: &str, hmac_key: &str, url: &str) -> Result<Jws> {
        Ok(eab::external_account_binding(kid, hmac_key, url, &self.jwk()?)?)
    }

    fn sign_envelope(&mut self, url: &str, kid: Option<&str>, payload_b64: &Base64) -> Result<Jws> {
        let descriptor = self.key_pair.descriptor()?;
        let params = algorithm::select(&descriptor)?;
        let key = match kid {
            Some(kid) => KeyReference::Kid(kid.to_owned()),
            None => KeyReference::Jwk(Jwk::from_descriptor(&descriptor)?),
        };

        let nonce = self
            .current_nonce()?
            .ok_or_else(|| ClientError::MissingNonce { url: url.to_owned() })?;

        let header = ProtectedHeader::new(params.algorithm.as_str(), key, nonce, url);
        Ok(Jws::sign(&header, payload_b64, &self.key_pair, &params)?)
    }

    fn signed_dispatch<T: Serialize + ?Sized>(
        &mut self,
        method: Method,
        endpoint: &str,
        kid: Option<&str>,
        payload: &T,
        decode_json: bool,
    ) -> Result<ResponseBody> {
        let payload_b64 = encode_payload(payload)?;

        let body = self.sign_envelope(endpoint, kid, &payload_b64)?.to_json()?;
        let rejected = match self.exchange(&method, endpoint, Some(body))? {
            Outcome::Success(response) => {
                return Self::decode(&method, endpoint, response, decode_json)
            }
            Outcome::Rejected(e) if e.is_bad_nonce() => e,
            Outcome::Rejected(e) => return Err(e.into()),
        };

        debug!("Retrying {method} {endpoint} on bad nonce");
        // 沒有新的 nonce 可用時，回報原本的 badNonce 錯誤。
        let envelope = match self.sign_envelope(endpoint, kid, &payload_b64) {
            Ok(envelope) => envelope,
            Err(ClientError::MissingNonce { .. }) => return Err(rejected.into()),
            Err(e) => return Err(e),
        };
        self.dispatch(method, endpoint, Some(envelope.to_json()?), decode_json)
    }

    /// 送出請求並依 `decode_json` 回傳 JSON 或原始內容；錯誤狀態碼轉為伺服器錯誤。
    pub(crate) fn dispatch(
        &mut self,
        method: Method,
        endpoint: &str,
        body: Option<String>,
        decode_json: bool,
    ) -> Result<ResponseBody> {
        match self.exchange(&method, endpoint, body)? {
            Outcome::Success(response) => Self::decode(&method, endpoint, response, decode_json),
            Outcome::Rejected(e) => Err(e.into()),
        }
    }

    fn exchange(
        &mut self,
        method: &Method,
        endpoint: &str,
        body: Option<String>,
    ) -> Result<Outcome> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
        if body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(JOSE_CONTENT_TYPE));
        }

        debug!("{method} {endpoint}");
        let request = HttpRequest {
            method: method.clone(),
            url: endpoint.to_owned(),
            headers,
            body,
        };

        let response = self
            .transport
            .send(request)
            .map_err(|source| ClientError::Transport {
                method: method.clone(),
                endpoint: endpoint.to_owned(),
                source,
            })?;

        self.last_response = Some(LastResponse::new(response.clone()));

        if response.status.is_client_error() || response.status.is_server_error() {
            let error = classify(method, endpoint, &response);
            debug!("{method} {endpoint} rejected: {:?} ({})", error.kind, error.status);
            return Ok(Outcome::Rejected(error));
        }

        Ok(Outcome::Success(response))
    }

    fn decode(
        method: &Method,
        endpoint: &str,
        response: HttpResponse,
        decode_json: bool,
    ) -> Result<ResponseBody> {
        if !decode_json {
            return Ok(ResponseBody::Raw(response.body));
        }

        json::decode(&response.body)
            .map(ResponseBody::Json)
            .map_err(|source| ClientError::ExpectedJson {
                method: method.clone(),
                endpoint: endpoint.to_owned(),
                summary: body_summary(&response.body),
                source,
            })
    }
}

/// 用於構建 [`SecureHttpClient`] 的構造器。
///
/// 未指定傳輸層時使用預設設定的 [`ReqwestTransport`]。
pub struct SecureHttpClientBuilder {
    key_pair: KeyPair,
    nonce_endpoint: Option<String>,
    transport: Option<Box<dyn Transport>>,
}

impl SecureHttpClientBuilder {
    pub fn new(key_pair: KeyPair) -> Self {
        Self {
            key_pair,
            nonce_endpoint: None,
            transport: None,
        }
    }

    /// 設置 newNonce 端點。
    pub fn nonce_endpoint(mut self, endpoint: &str) -> Self {
        self.nonce_endpoint = Some(endpoint.to_owned());
        self
    }

    /// 設置傳輸層，例如自訂逾時的 [`ReqwestTransport`] 或測試用的 `MockTransport`。
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    pub fn build(self) -> Result<SecureHttpClient> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Box::new(ReqwestTransport::new().map_err(ClientError::TransportSetup)?),
        };

        Ok(SecureHttpClient {
            key_pair: self.key_pair,
            transport,
            nonce_endpoint: self.nonce_endpoint,
            last_response: None,
        })
    }
}

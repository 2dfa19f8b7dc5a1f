//! HTTP 傳輸協作者。
//!
//! [`Transport`] 只負責把請求送出並取回回應，任何狀態碼的回應都視為成功的交換；
//! 只有在完全沒有取得 HTTP 回應時（連線失敗、逾時等）才回傳 [`TransportError`]。
//! 錯誤狀態碼的分類由呼叫端的錯誤分類器處理。

use std::{collections::VecDeque, fmt, sync::Arc, time::Duration};

use log::trace;
use parking_lot::Mutex;
use reqwest::{
    blocking::Client,
    header::{HeaderMap, HeaderValue, IntoHeaderName},
    Method, StatusCode,
};
use thiserror::Error;

/// 沒有取得 HTTP 回應的傳輸層錯誤。
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Connection error: {0}")]
    Connection(String),
}

/// 送出的 HTTP 請求。
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

/// 取得的 HTTP 回應；標頭為不分大小寫的多值對應。
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: String::new(),
        }
    }

    pub fn with_header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// 取得指定標頭的第一個值；非 ASCII 可見字元的值視為不存在。
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn header_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .get_all(name)
            .into_iter()
            .filter_map(|v| v.to_str().ok())
    }
}

/// 定義送出 HTTP 請求的行為。
pub trait Transport: Send + Sync + fmt::Debug {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// 以 `reqwest` 阻塞客戶端實作的傳輸層。
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// 預設的請求逾時。
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
    /// 預設的 User-Agent（RFC 8555 §6.1 要求客戶端送出）。
    const DEFAULT_USER_AGENT: &'static str =
        concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

    /// 以預設設定建立傳輸層。
    pub fn new() -> Result<Self, TransportError> {
        Self::builder().build()
    }

    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::new()
    }

    /// 使用呼叫端已設定好的 `reqwest` 客戶端（例如自訂 TLS 根憑證）。
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        trace!("{} {}", request.method, request.url);

        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send()?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text()?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// [`ReqwestTransport`] 的構造器。
///
/// 預設值：
/// - 逾時：30 秒
/// - User-Agent：`<套件名稱>/<版本>`
pub struct ReqwestTransportBuilder {
    timeout: Duration,
    user_agent: String,
}

impl ReqwestTransportBuilder {
    pub fn new() -> Self {
        Self {
            timeout: ReqwestTransport::DEFAULT_TIMEOUT,
            user_agent: ReqwestTransport::DEFAULT_USER_AGENT.to_owned(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_owned();
        self
    }

    pub fn build(self) -> Result<ReqwestTransport, TransportError> {
        let client = Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent)
            .build()?;
        Ok(ReqwestTransport { client })
    }
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
struct MockState {
    responses: VecDeque<Result<HttpResponse, TransportError>>,
    requests: Vec<HttpRequest>,
}

/// 依序回放預先排定回應的傳輸層，通常用於測試。
///
/// 可複製；所有複本共享同一份狀態，方便在交給客戶端後檢查收到的請求。
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 排入下一個回應。
    pub fn push_response(&self, response: HttpResponse) -> &Self {
        self.state.lock().responses.push_back(Ok(response));
        self
    }

    /// 排入一次沒有回應的傳輸失敗。
    pub fn push_error(&self, error: TransportError) -> &Self {
        self.state.lock().responses.push_back(Err(error));
        self
    }

    /// 目前為止收到的所有請求。
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().requests.clone()
    }

    pub fn remaining(&self) -> usize {
        self.state.lock().responses.len()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut state = self.state.lock();
        let url = request.url.clone();
        state.requests.push(request);
        state.responses.pop_front().unwrap_or_else(|| {
            Err(TransportError::Connection(format!(
                "no scripted response for {url}"
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str) -> HttpRequest {
        HttpRequest {
            method: Method::GET,
            url: url.to_owned(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    #[test]
    fn test_mock_replays_in_order() {
        let mock = MockTransport::new();
        mock.push_response(HttpResponse::new(StatusCode::OK).with_body("first"))
            .push_response(HttpResponse::new(StatusCode::CREATED).with_body("second"));

        let shared = mock.clone();
        assert_eq!(shared.send(request("/a")).unwrap().body, "first");
        assert_eq!(shared.send(request("/b")).unwrap().status, StatusCode::CREATED);
        assert!(matches!(
            shared.send(request("/c")),
            Err(TransportError::Connection(_))
        ));

        let urls: Vec<_> = mock.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(urls, ["/a", "/b", "/c"]);
        assert_eq!(mock.remaining(), 0);
    }

    #[test]
    fn test_response_headers_case_insensitive() {
        let response = HttpResponse::new(StatusCode::OK)
            .with_header("replay-nonce", HeaderValue::from_static("abc"))
            .with_header("link", HeaderValue::from_static("<a>;rel=\"up\""))
            .with_header("link", HeaderValue::from_static("<b>;rel=\"index\""));

        assert_eq!(response.header("Replay-Nonce"), Some("abc"));
        assert_eq!(response.header_all("Link").count(), 2);
        assert_eq!(response.header("Location"), None);
    }

    #[test]
    fn test_builder_defaults() {
        let builder = ReqwestTransportBuilder::new();
        assert_eq!(builder.timeout, Duration::from_secs(30));
        assert!(builder.user_agent.starts_with("acme-secure-http/"));
    }

    #[test]
    fn test_builder_overrides() {
        let builder = ReqwestTransport::builder()
            .timeout(Duration::from_secs(5))
            .user_agent("my-acme-client/2.0");
        assert_eq!(builder.timeout, Duration::from_secs(5));
        assert_eq!(builder.user_agent, "my-acme-client/2.0");
        assert!(builder.build().is_ok());
    }
}

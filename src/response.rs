use std::{collections::HashMap, sync::OnceLock};

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use reqwest::{header::HeaderMap, StatusCode};

use crate::transport::HttpResponse;

/// 最近一次 HTTP 交換的快照。
///
/// 每次送出請求（含 nonce 探測與錯誤回應）都會覆寫；
/// 回應中的 `Replay-Nonce` 原樣保存，只能被取用一次。
#[derive(Debug, Clone)]
pub struct LastResponse {
    response: HttpResponse,
    replay_nonce: Option<String>,
}

fn link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<([^>]*)>([^,]*)").expect("valid link pattern"))
}

fn rel_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)(?:^|;)\s*rel\s*=\s*(?:"([^"]*)"|([^\s;]+))"#).expect("valid rel pattern")
    })
}

impl LastResponse {
    pub(crate) fn new(response: HttpResponse) -> Self {
        let replay_nonce = response
            .header("Replay-Nonce")
            .filter(|nonce| !nonce.is_empty())
            .map(ToOwned::to_owned);

        Self {
            response,
            replay_nonce,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.response.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.response.headers
    }

    pub fn body(&self) -> &str {
        &self.response.body
    }

    pub fn location(&self) -> Option<&str> {
        self.response.header("Location")
    }

    /// 是否仍有尚未使用的 nonce。
    pub fn has_nonce(&self) -> bool {
        self.replay_nonce.is_some()
    }

    pub(crate) fn take_nonce(&mut self) -> Option<String> {
        self.replay_nonce.take()
    }

    fn parsed_links(&self) -> Vec<(String, String)> {
        let mut links = Vec::new();

        for value in self.response.header_all("Link") {
            for link in link_pattern().captures_iter(value) {
                let url = link[1].trim().to_owned();
                let params = &link[2];
                for rel in rel_pattern().captures_iter(params) {
                    let rels = rel.get(1).or_else(|| rel.get(2)).map_or("", |m| m.as_str());
                    for rel in rels.split_whitespace() {
                        links.push((rel.to_owned(), url.clone()));
                    }
                }
            }
        }

        links
    }

    /// 解析 `Link` 標頭為 relation → URL 的對應；同一 relation 出現多次時取最後一個。
    pub fn links(&self) -> HashMap<String, String> {
        self.parsed_links().into_iter().collect()
    }

    /// 指定 relation 的所有 URL，例如多條 `alternate` 憑證鏈。
    pub fn link_urls(&self, rel: &str) -> Vec<String> {
        self.parsed_links()
            .into_iter()
            .filter(|(r, _)| r == rel)
            .map(|(_, url)| url)
            .collect()
    }

    /// 解析 `Retry-After`，支援秒數與 HTTP-date 兩種格式。
    pub fn retry_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let value = self.response.header("Retry-After")?.trim();

        if let Ok(seconds) = value.parse::<i64>() {
            return Duration::try_seconds(seconds).and_then(|delay| now.checked_add_signed(delay));
        }

        DateTime::parse_from_rfc2822(value)
            .ok()
            .map(|date| date.with_timezone(&Utc))
    }
}

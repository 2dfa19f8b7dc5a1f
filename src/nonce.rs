use log::{debug, trace};
use reqwest::Method;

use crate::{client::SecureHttpClient, error::Result, response::LastResponse};

impl SecureHttpClient {
    /// 取得下一次簽名要用的 nonce。
    ///
    /// 優先使用最近一次回應的 `Replay-Nonce`；沒有時若已設定 newNonce 端點，
    /// 送出 HEAD 請求並取用其回應中的 nonce。兩者皆無則回傳 `None`。
    /// 取出的 nonce 會從快照移除，不會被第二個 JWS 使用。
    pub(crate) fn current_nonce(&mut self) -> Result<Option<String>> {
        if let Some(nonce) = self.last_response.as_mut().and_then(LastResponse::take_nonce) {
            trace!("Using nonce from last response");
            return Ok(Some(nonce));
        }

        let Some(endpoint) = self.nonce_endpoint.clone() else {
            trace!("No cached nonce and no nonce endpoint configured");
            return Ok(None);
        };

        debug!("Requesting new nonce from {endpoint}");
        self.dispatch(Method::HEAD, &endpoint, None, false)?;

        Ok(self.last_response.as_mut().and_then(LastResponse::take_nonce))
    }
}

use base64::prelude::*;
use thiserror::Error;

/// Base64URL 解碼過程中的錯誤。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// 輸入含有 `=` 填充字元，JWS 使用的編碼不允許填充。
    #[error("Unexpected padding")]
    UnexpectedPadding,

    /// 底層解碼器回報的錯誤（無效字元、長度等）。
    #[error("Invalid base64url: {0}")]
    Invalid(#[from] base64::DecodeError),
}

/// JWS 所要求的無填充 Base64URL 編碼資料。
///
/// 內部只保存已編碼的字串，建立時即完成編碼。
///
/// # 示例
///
/// ```
/// # use acme_secure_http::base64::Base64;
/// let b64 = Base64::new("{}");
/// assert_eq!(b64.base64_url(), "e30");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64 {
    encoded: String,
}

impl Base64 {
    /// 將任意位元組編碼為無填充的 Base64URL。
    pub fn new<T: AsRef<[u8]>>(input: T) -> Self {
        Self {
            encoded: BASE64_URL_SAFE_NO_PAD.encode(input),
        }
    }

    /// 從已編碼的 Base64URL 字串建立實例，並驗證其可被解碼。
    ///
    /// # 錯誤
    ///
    /// 含填充字元時回傳 [`DecodeError::UnexpectedPadding`]，
    /// 其餘格式問題回傳 [`DecodeError::Invalid`]。
    pub fn from_url(url_encoded: &str) -> Result<Self, DecodeError> {
        if url_encoded.contains('=') {
            return Err(DecodeError::UnexpectedPadding);
        }
        BASE64_URL_SAFE_NO_PAD.decode(url_encoded)?;

        Ok(Self {
            encoded: url_encoded.to_owned(),
        })
    }

    /// 解碼為原始位元組。
    pub fn decode(&self) -> Result<Vec<u8>, DecodeError> {
        Ok(BASE64_URL_SAFE_NO_PAD.decode(&self.encoded)?)
    }

    /// 回傳 URL 安全、無填充的編碼字串。
    pub fn base64_url(&self) -> String {
        self.encoded.clone()
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }
}

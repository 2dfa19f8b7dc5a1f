//! 簽名內容所用的 JSON 編解碼。
//!
//! ACME 伺服器驗證的是位元組本身，因此編碼規則在此固定：
//! 緊湊輸出（不插入空白）、`/` 不跳脫、物件成員依插入順序輸出。
//! 解碼則嚴格拒絕空字串與格式錯誤的輸入。

use serde::{de::DeserializeOwned, Serialize};

/// 將值編碼為緊湊 JSON 字串。
pub fn encode<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string(value)
}

/// 嚴格解碼 JSON；空字串視為錯誤。
pub fn decode<T: DeserializeOwned>(input: &str) -> serde_json::Result<T> {
    serde_json::from_str(input)
}

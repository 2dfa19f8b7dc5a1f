use serde::Serialize;
use serde_json::Value;

use crate::{base64::Base64, json};

/// 將請求載荷編碼為 JWS 的 `payload` 欄位。
///
/// - `null`（含 `()`、`None`）編碼為空字串，即 RFC 8555 的 POST-as-GET。
/// - 空物件 `{}` 編碼為 `{}` 的 Base64URL（`e30`），用於觸發挑戰驗證等請求。
/// - 其餘值先序列化為緊湊 JSON，再以 Base64URL 編碼。
pub fn encode_payload<T: Serialize + ?Sized>(payload: &T) -> serde_json::Result<Base64> {
    let value = serde_json::to_value(payload)?;

    match value {
        Value::Null => Ok(Base64::new("")),
        value => Ok(Base64::new(json::encode(&value)?)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn decoded(b64: &Base64) -> String {
        String::from_utf8(b64.decode().unwrap()).unwrap()
    }

    #[test]
    fn test_null_payload_is_empty() {
        assert_eq!(encode_payload(&Value::Null).unwrap().as_str(), "");
        assert_eq!(encode_payload(&None::<Value>).unwrap().as_str(), "");
        assert_eq!(encode_payload(&()).unwrap().as_str(), "");
    }

    #[test]
    fn test_empty_object_payload() {
        let b64 = encode_payload(&json!({})).unwrap();
        assert_eq!(b64.as_str(), "e30");
        assert_eq!(decoded(&b64), "{}");
    }

    #[test]
    fn test_payload_decodes_back() {
        let payloads = [
            json!({"identifiers": [{"type": "dns", "value": "example.com"}]}),
            json!({"contact": ["mailto:admin@example.com"], "termsOfServiceAgreed": true}),
            json!([1, "two", null]),
            json!("string payload"),
            json!({"csr": "MIIB/+x"}),
        ];

        for payload in payloads {
            let b64 = encode_payload(&payload).unwrap();
            let round: Value = json::decode(&decoded(&b64)).unwrap();
            assert_eq!(round, payload);
        }
    }

    #[test]
    fn test_struct_field_order_preserved() {
        #[derive(Serialize)]
        struct NewAccount<'a> {
            contact: Vec<&'a str>,
            #[serde(rename = "termsOfServiceAgreed")]
            terms_of_service_agreed: bool,
        }

        let b64 = encode_payload(&NewAccount {
            contact: vec!["mailto:a@b.c"],
            terms_of_service_agreed: true,
        })
        .unwrap();
        assert_eq!(
            decoded(&b64),
            r#"{"contact":["mailto:a@b.c"],"termsOfServiceAgreed":true}"#
        );
    }
}

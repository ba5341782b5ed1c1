//! ヘッダカラムのコーデック
//!
//! `headers` は `{"key": ..., "value": ...}` オブジェクトの JSONB 配列で、
//! value は base64 エンコードする。配列なので順序と重複キーが保たれる。

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use outbox_core::domain::Header;
use outbox_core::ports::StoreError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoredHeader {
    pub key: String,
    pub value: String,
}

pub(crate) fn encode(headers: &[Header]) -> Vec<StoredHeader> {
    headers
        .iter()
        .map(|h| StoredHeader {
            key: h.key.clone(),
            value: STANDARD.encode(&h.value),
        })
        .collect()
}

pub(crate) fn decode(stored: Vec<StoredHeader>) -> Result<Vec<Header>, StoreError> {
    stored
        .into_iter()
        .map(|h| {
            let value = STANDARD.decode(h.value.as_bytes()).map_err(|e| {
                StoreError::InvariantViolation(format!("header {:?} is not base64: {e}", h.key))
            })?;
            Ok(Header { key: h.key, value })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_order_and_duplicates() {
        let headers = vec![
            Header::new("trace", "a"),
            Header::new("tenant", vec![0u8, 255]),
            Header::new("trace", "b"),
        ];
        let stored = encode(&headers);
        assert_eq!(stored[1].value, "AP8=");
        assert_eq!(decode(stored).unwrap(), headers);
    }

    #[test]
    fn json_shape() {
        let json = serde_json::to_value(encode(&[Header::new("k", "v")])).unwrap();
        assert_eq!(json, serde_json::json!([{ "key": "k", "value": "dg==" }]));
    }

    #[test]
    fn bad_base64_is_an_invariant_violation() {
        let stored = vec![StoredHeader {
            key: "k".into(),
            value: "***".into(),
        }];
        assert!(matches!(decode(stored), Err(StoreError::InvariantViolation(_))));
    }
}

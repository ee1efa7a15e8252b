use super::compressor::{CompressionAlgorithm, Compressor};
use crate::core::error::{Result, StashError};
use crate::core::types::QueryResult;
use bytes::Bytes;

/// Turns result sets into cache payloads and back
pub trait Codec: Send + Sync {
    fn serialize(&self, result: &QueryResult) -> Result<Vec<u8>>;

    fn deserialize(&self, bytes: &[u8]) -> Result<QueryResult>;

    fn compress(&self, bytes: &[u8], level: u32) -> Result<Vec<u8>>;

    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>>;

    /// Serialize then compress
    fn encode(&self, result: &QueryResult, level: u32) -> Result<Bytes> {
        let raw = self.serialize(result)?;
        Ok(Bytes::from(self.compress(&raw, level)?))
    }

    /// Decompress then deserialize
    fn decode(&self, payload: &[u8]) -> Result<QueryResult> {
        let raw = self.decompress(payload)?;
        self.deserialize(&raw)
    }
}

/// bincode serialization wrapped in a [`Compressor`] frame
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec {
    compressor: Compressor,
}

impl BincodeCodec {
    pub fn new(algorithm: CompressionAlgorithm) -> Self {
        Self {
            compressor: Compressor::new(algorithm),
        }
    }
}

impl Codec for BincodeCodec {
    fn serialize(&self, result: &QueryResult) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(result, bincode::config::standard())
            .map_err(|e| StashError::Codec(format!("serialize: {e}")))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<QueryResult> {
        let (result, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| StashError::Codec(format!("deserialize: {e}")))?;
        Ok(result)
    }

    fn compress(&self, bytes: &[u8], level: u32) -> Result<Vec<u8>> {
        self.compressor
            .compress(bytes, level)
            .map_err(|e| StashError::Codec(format!("compress: {e}")))
    }

    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        self.compressor
            .decompress(bytes)
            .map_err(|e| StashError::Codec(format!("decompress: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Command, Field, Row, Value};

    fn result_set() -> QueryResult {
        let rows = (0..50)
            .map(|i| {
                Row::new()
                    .with("id", i as i64)
                    .with("name", format!("user-{i}"))
                    .with("score", 0.5 * i as f64)
                    .with("avatar", None::<Vec<u8>>)
            })
            .collect();
        QueryResult::with_rows(
            Command::Select,
            vec![
                Field::new("id", "int8"),
                Field::new("name", "text"),
                Field::new("score", "float8"),
                Field::new("avatar", "bytea"),
            ],
            rows,
        )
    }

    #[test]
    fn test_encode_decode_preserves_result() {
        for algorithm in [
            CompressionAlgorithm::None,
            CompressionAlgorithm::Lz4,
            CompressionAlgorithm::Zstd,
        ] {
            let codec = BincodeCodec::new(algorithm);
            let original = result_set();

            let payload = codec.encode(&original, 1).unwrap();
            assert_eq!(codec.decode(&payload).unwrap(), original);
        }
    }

    #[test]
    fn test_truncated_payload_fails_to_decode() {
        let codec = BincodeCodec::new(CompressionAlgorithm::None);
        let payload = codec.encode(&result_set(), 0).unwrap();

        let truncated = &payload[..payload.len() / 2];
        let err = codec.decode(truncated).unwrap_err();
        assert!(matches!(err, StashError::Codec(_)));
    }

    #[test]
    fn test_row_values_survive() {
        let codec = BincodeCodec::default();
        let payload = codec.encode(&result_set(), 3).unwrap();
        let decoded = codec.decode(&payload).unwrap();

        assert_eq!(decoded.rows[7].get("name"), Some(&Value::Text("user-7".into())));
        assert_eq!(decoded.rows[7].get("avatar"), Some(&Value::Null));
    }
}

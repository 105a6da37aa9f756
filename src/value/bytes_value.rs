use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{invalid_argument, StateResult};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BytesValue(Vec<u8>);

impl BytesValue {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn from_base64(value: &str) -> StateResult<Self> {
        STANDARD
            .decode(value)
            .map(Self)
            .map_err(|err| invalid_argument(format!("Invalid base64 bytes value: {err}")))
    }

    /// Padded standard alphabet, as protobuf JSON renders `bytes`.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for BytesValue {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_uses_padding() {
        let bytes = BytesValue::new(vec![1, 2, 3, 4]);
        assert_eq!(bytes.to_base64(), "AQIDBA==");
        assert_eq!(BytesValue::from_base64("AQIDBA==").unwrap(), bytes);
    }

    #[test]
    fn orders_byte_wise() {
        assert!(BytesValue::new(vec![1, 2]) < BytesValue::new(vec![1, 3]));
        assert!(BytesValue::new(vec![1]) < BytesValue::new(vec![1, 0]));
    }

    #[test]
    fn rejects_invalid_base64() {
        let err = BytesValue::from_base64("***").unwrap_err();
        assert_eq!(err.code_str(), "state/invalid-argument");
    }
}

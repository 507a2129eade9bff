//! Correlation identifiers.
//!
//! Every request handled by the logging middleware gets exactly one id. It is
//! stored twice in the request's extensions: as a [`RequestId`] for handlers
//! that only need the id, and as the `id` binding of the request-scoped
//! [`Logger`](crate::logger::Logger).
//!
//! ```rust,ignore
//! async fn handler(Extension(req_id): Extension<RequestId>) { ... }
//! ```

use std::fmt;

use futures_util::future::BoxFuture;
use uuid::Uuid;

use crate::error::IdError;

/// URL-safe alphabet, 64 symbols so each one maps to six random bits.
const ALPHABET: &[u8; 64] = b"useandom-26T198340PX75pxJACKVERYMINDBUSHWOLF_GQZbfghjklqvwyzrict";

/// Length of a generated id.
pub const ID_LEN: usize = 21;

/// Newtype wrapper carrying the assigned correlation id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of correlation ids.
///
/// Generation is asynchronous so implementations may draw on async entropy
/// sources or remote allocators.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> BoxFuture<'_, Result<String, IdError>>;
}

/// Default generator: 21 symbols from [`ALPHABET`], backed by UUID v4
/// randomness.
#[derive(Debug, Default, Clone, Copy)]
pub struct NanoId;

impl NanoId {
    pub fn new_id() -> String {
        let mut id = String::with_capacity(ID_LEN);
        while id.len() < ID_LEN {
            let bytes = Uuid::new_v4().into_bytes();
            // Bytes 6 and 8 hold the fixed version and variant bits.
            for byte in bytes
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != 6 && *i != 8)
                .map(|(_, b)| *b)
                .take(ID_LEN - id.len())
            {
                id.push(ALPHABET[(byte & 63) as usize] as char);
            }
        }
        id
    }
}

impl IdGenerator for NanoId {
    fn generate(&self) -> BoxFuture<'_, Result<String, IdError>> {
        Box::pin(async { Ok(Self::new_id()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[tokio::test]
    async fn generated_ids_have_fixed_length_and_alphabet() {
        let id = NanoId.generate().await.unwrap();
        assert_eq!(id.len(), ID_LEN);
        assert!(id.bytes().all(|b| ALPHABET.contains(&b)), "unexpected symbol in {id}");
    }

    #[test]
    fn ids_are_unique() {
        let ids: HashSet<_> = (0..1_000).map(|_| NanoId::new_id()).collect();
        assert_eq!(ids.len(), 1_000);
    }

    #[test]
    fn request_id_displays_as_raw_string() {
        let id = RequestId("V1StGXR8_Z5jdHi6B-myT".into());
        assert_eq!(id.to_string(), "V1StGXR8_Z5jdHi6B-myT");
        assert_eq!(id.as_str(), "V1StGXR8_Z5jdHi6B-myT");
    }
}

//! # Key & Value Encoding
//!
//! postcard encodings for everything the overlay writes to the substrate.
//!
//! postcard output is self-delimiting for a fixed type, so a composite index
//! key `enc(primary) ++ enc(secondary)` can be prefix-scanned on
//! `enc(primary)` without matching any other primary.

use crate::{GraphError, RelationId};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Encode a value with postcard.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, GraphError> {
    postcard::to_allocvec(value).map_err(|e| GraphError::SerializationError(e.to_string()))
}

/// Decode a postcard value.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, GraphError> {
    postcard::from_bytes(bytes).map_err(|e| GraphError::DeserializationError(e.to_string()))
}

/// Build a composite `(primary, secondary)` key.
pub fn composite_key<P, S>(primary: &P, secondary: &S) -> Result<Vec<u8>, GraphError>
where
    P: Serialize + ?Sized,
    S: Serialize + ?Sized,
{
    let mut key = encode(primary)?;
    key.extend_from_slice(&encode(secondary)?);
    Ok(key)
}

/// Split a composite key back into `(primary, secondary)`.
pub fn split_composite<P, S>(bytes: &[u8]) -> Result<(P, S), GraphError>
where
    P: DeserializeOwned,
    S: DeserializeOwned,
{
    let (primary, rest) = postcard::take_from_bytes::<P>(bytes)
        .map_err(|e| GraphError::DeserializationError(e.to_string()))?;
    let secondary = decode::<S>(rest)?;
    Ok((primary, secondary))
}

/// Relation table key: big-endian id so scans come back in id order.
#[must_use]
pub fn relation_key(id: RelationId) -> [u8; 8] {
    id.0.to_be_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_key_splits_back() {
        let key = composite_key("alice", "bob").expect("encode");
        let (primary, secondary): (String, String) = split_composite(&key).expect("split");
        assert_eq!(primary, "alice");
        assert_eq!(secondary, "bob");
    }

    #[test]
    fn primary_prefix_does_not_match_longer_primary() {
        let prefix = encode("a").expect("encode");
        let other = composite_key("ab", "x").expect("encode");
        let own = composite_key("a", "x").expect("encode");

        assert!(own.starts_with(&prefix));
        assert!(!other.starts_with(&prefix));
    }

    #[test]
    fn relation_keys_sort_by_id() {
        assert!(relation_key(RelationId(2)) < relation_key(RelationId(10)));
        assert!(relation_key(RelationId(255)) < relation_key(RelationId(256)));
    }

    #[test]
    fn decode_rejects_garbage() {
        let result = decode::<String>(&[0xff, 0xff, 0xff]);
        assert!(matches!(result, Err(GraphError::DeserializationError(_))));
    }
}

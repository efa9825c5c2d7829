//! Tuple identity.
//!
//! A tuple is identified by its relation name and its primary key, an
//! ordered tuple of integers. `TupleId` is the hashable key used by every
//! other component, and its total order fixes universe indexing.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::ValidationError;

/// Ordered, non-empty integer primary key.
///
/// Serialized as the compact string form `k1,k2,...`. Deserialization also
/// accepts a bare integer or an integer array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimaryKey(Vec<i64>);

impl PrimaryKey {
    /// Creates a primary key from its parts.
    pub fn new(parts: Vec<i64>) -> Result<Self, ValidationError> {
        if parts.is_empty() {
            return Err(ValidationError::InvalidPrimaryKey {
                raw: "[]".to_string(),
                reason: "empty key".to_string(),
            });
        }
        Ok(Self(parts))
    }

    /// Single-column key.
    #[must_use]
    pub fn single(value: i64) -> Self {
        Self(vec![value])
    }

    /// Key columns in order.
    #[must_use]
    pub fn parts(&self) -> &[i64] {
        &self.0
    }

    /// Number of key columns.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.0.len()
    }
}

impl FromStr for PrimaryKey {
    type Err = ValidationError;

    /// Parses `7`, `692228,3`, `(692228, 3)` or `[692228,3]`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::InvalidPrimaryKey {
            raw: raw.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = raw.trim();
        let inner = trimmed
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .or_else(|| trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')))
            .unwrap_or(trimmed);

        if inner.trim().is_empty() {
            return Err(invalid("empty key"));
        }

        let mut parts = Vec::new();
        for piece in inner.split(',') {
            let piece = piece.trim();
            if piece.is_empty() {
                // tolerate a trailing comma, as in a one-element tuple "(7,)"
                continue;
            }
            let value = piece
                .parse::<i64>()
                .map_err(|_| invalid(&format!("'{piece}' is not an integer")))?;
            parts.push(value);
        }

        if parts.is_empty() {
            return Err(invalid("empty key"));
        }
        Ok(Self(parts))
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

impl From<i64> for PrimaryKey {
    fn from(value: i64) -> Self {
        Self::single(value)
    }
}

impl Serialize for PrimaryKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PrimaryKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KeyVisitor;

        impl<'de> Visitor<'de> for KeyVisitor {
            type Value = PrimaryKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an integer, an array of integers, or a comma-separated key string")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(PrimaryKey::single(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                let v = i64::try_from(v).map_err(|_| E::custom(format!("key part {v} overflows i64")))?;
                Ok(PrimaryKey::single(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut parts = Vec::new();
                while let Some(part) = seq.next_element::<i64>()? {
                    parts.push(part);
                }
                PrimaryKey::new(parts).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_any(KeyVisitor)
    }
}

/// Canonical `(relation, primary key)` tuple identifier.
///
/// Ordering is by relation name, then lexicographically by key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TupleId {
    /// Relation (table) name.
    pub relation: String,
    /// Primary key within the relation.
    pub key: PrimaryKey,
}

impl TupleId {
    /// Creates a tuple identity, rejecting an empty relation name.
    pub fn new(relation: impl Into<String>, key: PrimaryKey) -> Result<Self, ValidationError> {
        let relation = relation.into();
        let trimmed = relation.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyRelation);
        }
        Ok(Self {
            relation: trimmed.to_string(),
            key,
        })
    }

    /// Parses a tuple identity from its relation and a raw key string.
    pub fn parse(relation: impl Into<String>, raw_key: &str) -> Result<Self, ValidationError> {
        Self::new(relation, raw_key.parse()?)
    }
}

impl fmt::Display for TupleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.relation, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_bracketed_keys() {
        assert_eq!("7".parse::<PrimaryKey>().unwrap().parts(), &[7]);
        assert_eq!("692228,3".parse::<PrimaryKey>().unwrap().parts(), &[692_228, 3]);
        assert_eq!("(692228, 3)".parse::<PrimaryKey>().unwrap().parts(), &[692_228, 3]);
        assert_eq!("[1,2,3]".parse::<PrimaryKey>().unwrap().parts(), &[1, 2, 3]);
        assert_eq!("(7,)".parse::<PrimaryKey>().unwrap().parts(), &[7]);
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!("".parse::<PrimaryKey>().is_err());
        assert!("()".parse::<PrimaryKey>().is_err());
        assert!("a,1".parse::<PrimaryKey>().is_err());
        assert!("1.5".parse::<PrimaryKey>().is_err());
        assert!(PrimaryKey::new(Vec::new()).is_err());
    }

    #[test]
    fn deserializes_every_key_form() {
        let a: PrimaryKey = serde_json::from_str("16353").unwrap();
        let b: PrimaryKey = serde_json::from_str("[692228, 3]").unwrap();
        let c: PrimaryKey = serde_json::from_str("\"692228,3\"").unwrap();
        assert_eq!(a.parts(), &[16353]);
        assert_eq!(b, c);
        assert!(serde_json::from_str::<PrimaryKey>("[]").is_err());
        assert!(serde_json::from_str::<PrimaryKey>("\"x\"").is_err());
        assert!(serde_json::from_str::<PrimaryKey>("1.25").is_err());
    }

    #[test]
    fn serializes_as_compact_string() {
        let key = PrimaryKey::new(vec![692_228, 3]).unwrap();
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"692228,3\"");
    }

    #[test]
    fn tuple_ids_order_by_relation_then_key() {
        let a = TupleId::new("lineitem", PrimaryKey::new(vec![1, 2]).unwrap()).unwrap();
        let b = TupleId::new("lineitem", PrimaryKey::new(vec![1, 3]).unwrap()).unwrap();
        let c = TupleId::new("orders", PrimaryKey::single(0)).unwrap();
        let mut ids = vec![c.clone(), b.clone(), a.clone()];
        ids.sort();
        assert_eq!(ids, vec![a, b, c]);
    }

    #[test]
    fn equality_is_elementwise() {
        let a = TupleId::parse("part", "(5)").unwrap();
        let b = TupleId::parse("part", "5").unwrap();
        let c = TupleId::parse("part", "5,0").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "part:5");
    }

    #[test]
    fn rejects_empty_relation() {
        assert!(matches!(
            TupleId::new("  ", PrimaryKey::single(1)),
            Err(ValidationError::EmptyRelation)
        ));
    }
}

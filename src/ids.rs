//! Opaque per-operation/per-layer identifiers. `groupKey` resolution and
//! per-operation warnings bookkeeping both need a stable key that is not a
//! raw array index (indices shift when operations are filtered); a ULID
//! newtype gives callers something they can hold onto across a pipeline
//! run without coupling identity to position in a `Vec`.

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(Ulid);

impl OperationId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn ulid(&self) -> Ulid {
        self.0
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(Ulid);

impl LayerId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn ulid(&self) -> Ulid {
        self.0
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_are_distinct() {
        assert_ne!(OperationId::new(), OperationId::new());
        assert_ne!(LayerId::new(), LayerId::new());
    }

    #[test]
    fn operation_id_round_trips_through_json() {
        let id = OperationId::new();
        let json = serde_json::to_string(&id).expect("serialize");
        let back: OperationId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(id, back);
    }
}

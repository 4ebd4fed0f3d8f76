//! Addresses of boxes and fields
//!
//! Provides [`Address`], the value that identifies any vertex in the graph:
//! a box UUID plus an optional path of field keys.

use smallvec::SmallVec;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Key of a field inside its parent (box, object or array)
pub type FieldKey = u16;

/// Field path below a box
pub type FieldPath = SmallVec<[FieldKey; 4]>;

/// Address of a box or a nested field
///
/// An empty path denotes the box itself. Addresses are immutable values;
/// every "modifying" method returns a new address.
///
/// Ordering is by UUID first, then by path, so a box sorts directly before
/// all of its fields.
///
/// # Examples
/// - `0f6c…e1` → the box
/// - `0f6c…e1/3/0` → element `0` of field `3`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address {
    uuid: Uuid,
    path: FieldPath,
}

impl Address {
    /// Create an address from a UUID and a field path
    #[inline]
    #[must_use]
    pub fn new(uuid: Uuid, path: impl IntoIterator<Item = FieldKey>) -> Self {
        Self {
            uuid,
            path: path.into_iter().collect(),
        }
    }

    /// Address of a box
    #[inline]
    #[must_use]
    pub fn of_box(uuid: Uuid) -> Self {
        Self {
            uuid,
            path: FieldPath::new(),
        }
    }

    /// Root UUID
    #[inline]
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Field keys below the box
    #[inline]
    #[must_use]
    pub fn field_keys(&self) -> &[FieldKey] {
        &self.path
    }

    /// Whether this address denotes a box (empty path)
    #[inline]
    #[must_use]
    pub fn is_box(&self) -> bool {
        self.path.is_empty()
    }

    /// Address of the owning box
    #[inline]
    #[must_use]
    pub fn box_address(&self) -> Self {
        Self::of_box(self.uuid)
    }

    /// Append a field key, returning a new address
    #[inline]
    #[must_use]
    pub fn append(&self, key: FieldKey) -> Self {
        let mut path = self.path.clone();
        path.push(key);
        Self {
            uuid: self.uuid,
            path,
        }
    }

    /// Parent address (if not a box)
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.path.is_empty() {
            None
        } else {
            Some(Self {
                uuid: self.uuid,
                path: self.path[..self.path.len() - 1].into(),
            })
        }
    }

    /// Check if `other` is this address or one of its ancestors
    ///
    /// # Examples
    /// - `u/1` starts with `u` and with `u/1`
    /// - `u/1` does NOT start with `u/2`
    #[must_use]
    pub fn starts_with(&self, other: &Self) -> bool {
        self.uuid == other.uuid
            && self.path.len() >= other.path.len()
            && self.path[..other.path.len()] == other.path[..]
    }

    /// Same path under a different root
    ///
    /// Used when a sub-graph is copied under fresh UUIDs.
    #[inline]
    #[must_use]
    pub fn move_to(&self, uuid: Uuid) -> Self {
        Self {
            uuid,
            path: self.path.clone(),
        }
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uuid)?;
        for key in &self.path {
            write!(f, "/{key}")?;
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = s.split('/');
        let uuid = segments
            .next()
            .filter(|segment| !segment.is_empty())
            .ok_or(AddressError::MissingUuid)?;
        let uuid = Uuid::parse_str(uuid).map_err(|_| AddressError::InvalidUuid(uuid.to_string()))?;
        let path = segments
            .map(|segment| {
                segment
                    .parse::<FieldKey>()
                    .map_err(|_| AddressError::InvalidFieldKey(segment.to_string()))
            })
            .collect::<Result<FieldPath, _>>()?;
        Ok(Self { uuid, path })
    }
}

impl From<Uuid> for Address {
    fn from(uuid: Uuid) -> Self {
        Self::of_box(uuid)
    }
}

impl serde::Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors when parsing an address
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// No UUID segment
    #[error("address is missing its uuid")]
    MissingUuid,

    /// UUID segment does not parse
    #[error("invalid uuid: {0}")]
    InvalidUuid(String),

    /// Field key segment does not parse
    #[error("invalid field key: {0}")]
    InvalidFieldKey(String),
}

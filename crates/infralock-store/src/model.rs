//! Store data model: keys, leases, and watch events

use std::fmt::{Display, Formatter};
use std::pin::Pin;

use futures::Stream;

use crate::error::Result;

/// Lease identifier allocated by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeaseId(pub i64);

impl LeaseId {
    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl Display for LeaseId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl From<i64> for LeaseId {
    fn from(value: i64) -> Self {
        LeaseId(value)
    }
}

impl std::str::FromStr for LeaseId {
    type Err = std::num::ParseIntError;

    /// Parses the hexadecimal form produced by `Display`, or a decimal id
    /// prefixed with `#`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.strip_prefix('#') {
            Some(decimal) => decimal.parse().map(LeaseId),
            None => i64::from_str_radix(s.trim_start_matches("0x"), 16).map(LeaseId),
        }
    }
}

/// A key read from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: Vec<u8>,
    /// Revision at which the key was created; reset when the key is deleted
    pub create_revision: i64,
    /// Revision of the last modification
    pub mod_revision: i64,
    /// Lease the key is bound to, if any
    pub lease: Option<LeaseId>,
}

/// Kind of change observed on a watched key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Put,
    Delete,
}

impl Display for EventType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Put => write!(f, "PUT"),
            EventType::Delete => write!(f, "DELETE"),
        }
    }
}

/// A single change event delivered by a watch stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub event_type: EventType,
    pub key: String,
    /// New value for `Put`, empty for `Delete`
    pub value: Vec<u8>,
    pub revision: i64,
}

impl WatchEvent {
    pub fn is_delete(&self) -> bool {
        self.event_type == EventType::Delete
    }
}

/// Ordered stream of events for one key. Dropping it cancels the watch.
pub type WatchStream = Pin<Box<dyn Stream<Item = Result<WatchEvent>> + Send>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_id_display_and_parse() {
        let id = LeaseId(0x694d_77aa_9e38_260f);
        let shown = id.to_string();
        assert_eq!(shown, "694d77aa9e38260f");
        assert_eq!(shown.parse::<LeaseId>().unwrap(), id);
        assert_eq!("0x694d77aa9e38260f".parse::<LeaseId>().unwrap(), id);
        assert_eq!("#42".parse::<LeaseId>().unwrap(), LeaseId(42));
        assert!("not-a-lease".parse::<LeaseId>().is_err());
    }

    #[test]
    fn test_event_type_display() {
        assert_eq!(EventType::Put.to_string(), "PUT");
        assert_eq!(EventType::Delete.to_string(), "DELETE");
    }
}

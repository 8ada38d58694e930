use serde::{Deserialize, Serialize};
use std::fmt;

/// How far a ref's target is known to have travelled toward durable storage
///
/// Ordered: a ref is only ever replaced by one of equal or higher status.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RefStatus {
    #[default]
    Unknown = 0,
    Embedded = 1,
    Stored = 2,
    Persisted = 3,
    Verified = 4,
}

impl RefStatus {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(RefStatus::Unknown),
            1 => Some(RefStatus::Embedded),
            2 => Some(RefStatus::Stored),
            3 => Some(RefStatus::Persisted),
            4 => Some(RefStatus::Verified),
            _ => None,
        }
    }

    /// True if this status is at least `other`
    pub fn reaches(self, other: RefStatus) -> bool {
        self >= other
    }
}

impl fmt::Display for RefStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RefStatus::Unknown => "unknown",
            RefStatus::Embedded => "embedded",
            RefStatus::Stored => "stored",
            RefStatus::Persisted => "persisted",
            RefStatus::Verified => "verified",
        };
        f.write_str(s)
    }
}

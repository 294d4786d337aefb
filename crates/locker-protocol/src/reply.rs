//! Bridge reply classification.
//!
//! The bridge answers with a single word. The set of words it has used over
//! time is wider than `OK`/`DENIED`, so replies are matched case-insensitively
//! against two synonym tables and collapsed into a closed enum:
//!
//! ```
//! use locker_protocol::{Decision, Reply};
//!
//! assert_eq!(Reply::classify(" ok\r"), Reply::Granted);
//! assert_eq!(Reply::classify("Fail"), Reply::Denied);
//! assert_eq!(Reply::classify("BUSY").decision(), None);
//! assert_eq!(Reply::Denied.decision(), Some(Decision::Denied));
//! ```
//!
//! Anything outside both tables is an [`Reply::Unrecognized`] anomaly and is
//! never treated as an implicit grant.

use locker_core::constants::{APPROVAL_SYNONYMS, REJECTION_SYNONYMS};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of an authorization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Granted,
    Denied,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Decision::Granted => write!(f, "granted"),
            Decision::Denied => write!(f, "denied"),
        }
    }
}

/// A normalized reply line from the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reply {
    Granted,
    Denied,
    /// Reply text outside both synonym tables, trimmed but otherwise verbatim.
    Unrecognized(String),
}

impl Reply {
    /// Classify one reply line.
    ///
    /// Surrounding whitespace (including a stray `\r`) is ignored and the
    /// comparison is ASCII case-insensitive.
    pub fn classify(line: &str) -> Self {
        let word = line.trim();

        if APPROVAL_SYNONYMS.iter().any(|s| s.eq_ignore_ascii_case(word)) {
            Reply::Granted
        } else if REJECTION_SYNONYMS.iter().any(|s| s.eq_ignore_ascii_case(word)) {
            Reply::Denied
        } else {
            Reply::Unrecognized(word.to_string())
        }
    }

    /// The authorization decision carried by this reply, if any.
    pub fn decision(&self) -> Option<Decision> {
        match self {
            Reply::Granted => Some(Decision::Granted),
            Reply::Denied => Some(Decision::Denied),
            Reply::Unrecognized(_) => None,
        }
    }

    /// Returns `true` for anomalies.
    pub fn is_unrecognized(&self) -> bool {
        matches!(self, Reply::Unrecognized(_))
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Reply::Granted => write!(f, "GRANTED"),
            Reply::Denied => write!(f, "DENIED"),
            Reply::Unrecognized(text) => write!(f, "UNRECOGNIZED({text})"),
        }
    }
}

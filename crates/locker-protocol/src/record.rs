//! Transaction log records.
//!
//! Wire format: `KIND,subjectId,timestamp` where the timestamp is RFC 3339
//! UTC with second precision, e.g. `BORROW,12345678,2025-10-05T12:46:06Z`.

use chrono::{DateTime, SecondsFormat, Utc};
use locker_core::constants::FIELD_SEPARATOR;
use locker_core::{Error, Result, SubjectId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a transaction log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogKind {
    Borrow,
    Return,
    Denied,
    Timeout,
    SecurityBreach,
}

impl LogKind {
    /// Wire token for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::Borrow => "BORROW",
            LogKind::Return => "RETURN",
            LogKind::Denied => "DENIED",
            LogKind::Timeout => "TIMEOUT",
            LogKind::SecurityBreach => "SECURITY_BREACH",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "BORROW" => Ok(LogKind::Borrow),
            "RETURN" => Ok(LogKind::Return),
            "DENIED" => Ok(LogKind::Denied),
            "TIMEOUT" => Ok(LogKind::Timeout),
            "SECURITY_BREACH" => Ok(LogKind::SecurityBreach),
            other => Err(Error::UnknownLogKind(other.to_string())),
        }
    }
}

/// One append-only audit entry relayed to the bridge.
///
/// Breach records are not tied to a user; their subject is `None` and is
/// encoded as an empty field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionLogRecord {
    pub kind: LogKind,
    pub subject: Option<SubjectId>,
    pub timestamp: DateTime<Utc>,
}

impl TransactionLogRecord {
    pub fn new(kind: LogKind, subject: Option<SubjectId>, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            subject,
            timestamp,
        }
    }

    /// Encode without a line terminator.
    pub fn to_line(&self) -> String {
        let subject = self.subject.as_ref().map(SubjectId::as_str).unwrap_or("");
        format!(
            "{}{sep}{}{sep}{}",
            self.kind,
            subject,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            sep = FIELD_SEPARATOR
        )
    }

    /// Parse a record line, tolerating surrounding whitespace.
    ///
    /// # Errors
    /// Returns `Error::InvalidMessageFormat` if the line does not have exactly
    /// three fields or the timestamp is malformed, `Error::UnknownLogKind` for
    /// an unknown kind and `Error::InvalidSubjectId` for a bad identifier.
    pub fn parse(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.trim().split(FIELD_SEPARATOR).collect();
        let [kind, subject, timestamp] = fields.as_slice() else {
            return Err(Error::InvalidMessageFormat {
                message: format!("expected KIND,subject,timestamp, got {line:?}"),
            });
        };

        let kind: LogKind = kind.parse()?;
        let subject = if subject.is_empty() {
            None
        } else {
            Some(SubjectId::new(subject)?)
        };
        let timestamp = DateTime::parse_from_rfc3339(timestamp)
            .map_err(|e| Error::InvalidMessageFormat {
                message: format!("invalid timestamp {timestamp:?}: {e}"),
            })?
            .with_timezone(&Utc);

        Ok(Self::new(kind, subject, timestamp))
    }
}

impl fmt::Display for TransactionLogRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

//! Locker to bridge directives.

use locker_core::constants::{FIELD_SEPARATOR, VERB_BORROW, VERB_RETURN};
use locker_core::SubjectId;
use std::fmt;

use crate::TransactionLogRecord;

/// One outbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Request authorization for a borrow. Answered with a [`Reply`](crate::Reply).
    Borrow(SubjectId),
    /// Announce a completed return. The bridge acknowledges with one line.
    Return(SubjectId),
    /// Relay an audit record. Not acknowledged.
    Record(TransactionLogRecord),
}

impl Directive {
    /// Encode without a line terminator.
    ///
    /// ```
    /// use locker_core::SubjectId;
    /// use locker_protocol::Directive;
    ///
    /// let id = SubjectId::new("12345678").unwrap();
    /// assert_eq!(Directive::Borrow(id).to_line(), "BORROW,12345678");
    /// ```
    pub fn to_line(&self) -> String {
        match self {
            Directive::Borrow(id) => format!("{VERB_BORROW}{FIELD_SEPARATOR}{id}"),
            Directive::Return(id) => format!("{VERB_RETURN}{FIELD_SEPARATOR}{id}"),
            Directive::Record(record) => record.to_line(),
        }
    }

    /// Whether the bridge answers this directive with a reply line.
    pub fn expects_reply(&self) -> bool {
        !matches!(self, Directive::Record(_))
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

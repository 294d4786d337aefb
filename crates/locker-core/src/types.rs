use crate::{
    Result,
    config::IdentifierPolicy,
    constants::MAX_SUBJECT_ID_LENGTH,
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;
use std::time::Duration;
use subtle::ConstantTimeEq;

/// Numeric identity string a user enters to request a borrow.
///
/// Only ASCII digits are accepted. The absolute length cap is
/// [`MAX_SUBJECT_ID_LENGTH`]; the deployment-specific bounds live in
/// [`IdentifierPolicy`] and are checked by [`SubjectId::with_policy`].
///
/// # Security
/// Comparison is constant-time, identifiers are credentials.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectId(String);

impl SubjectId {
    /// Create a subject identifier, validating the digit-only alphabet.
    ///
    /// # Errors
    /// Returns `Error::InvalidSubjectId` if the identifier is empty, longer
    /// than [`MAX_SUBJECT_ID_LENGTH`], or contains anything but `0-9`.
    pub fn new(id: &str) -> Result<Self> {
        if id.is_empty() {
            return Err(Error::InvalidSubjectId("identifier is empty".to_string()));
        }

        if id.len() > MAX_SUBJECT_ID_LENGTH {
            return Err(Error::InvalidSubjectId(format!(
                "identifier must be at most {MAX_SUBJECT_ID_LENGTH} digits, got {}",
                id.len()
            )));
        }

        if !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidSubjectId(format!(
                "identifier must contain only digits: {id:?}"
            )));
        }

        Ok(SubjectId(id.to_string()))
    }

    /// Create a subject identifier and check it against the configured
    /// length bounds.
    ///
    /// # Errors
    /// Returns `Error::InvalidSubjectId` if the identifier is malformed or
    /// its length falls outside `policy.min_len..=policy.max_len`.
    pub fn with_policy(id: &str, policy: &IdentifierPolicy) -> Result<Self> {
        let subject = Self::new(id)?;
        if !policy.accepts_len(subject.len()) {
            return Err(Error::InvalidSubjectId(format!(
                "identifier must be {}-{} digits, got {}",
                policy.min_len,
                policy.max_len,
                subject.len()
            )));
        }
        Ok(subject)
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of digits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false` for a constructed identifier.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SubjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SubjectId::new(s)
    }
}

impl TryFrom<String> for SubjectId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        SubjectId::new(&value)
    }
}

impl From<SubjectId> for String {
    fn from(value: SubjectId) -> Self {
        value.0
    }
}

impl PartialEq for SubjectId {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl std::hash::Hash for SubjectId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

/// Monotonic time in milliseconds since the controller started.
///
/// All waits in the controller are expressed as a stored `Timestamp`
/// compared against the current tick's `Timestamp`; nothing sleeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The controller's zero point.
    pub const ZERO: Timestamp = Timestamp(0);

    /// Create a timestamp from a millisecond count.
    #[inline]
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Timestamp(millis)
    }

    /// Milliseconds since the zero point.
    #[inline]
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Time elapsed since `earlier`. Saturates to zero if `earlier` is in
    /// the future.
    #[inline]
    #[must_use]
    pub fn since(self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }

    /// Returns `true` once at least `duration` has passed since `start`.
    #[inline]
    #[must_use]
    pub fn has_elapsed(self, start: Timestamp, duration: Duration) -> bool {
        self.since(start) >= duration
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        let millis = u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX);
        Timestamp(self.0.saturating_add(millis))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("12345678")]
    #[case("123456789")]
    #[case("0")]
    fn test_subject_id_valid(#[case] input: &str) {
        let id = SubjectId::new(input).unwrap();
        assert_eq!(id.as_str(), input);
        assert_eq!(id.len(), input.len());
    }

    #[rstest]
    #[case("")]
    #[case("1234A678")]
    #[case("1234 5678")]
    #[case("123456789012345678901")]
    fn test_subject_id_invalid(#[case] input: &str) {
        assert!(SubjectId::new(input).is_err());
    }

    #[rstest]
    #[case("1234567", false)] // one below minimum
    #[case("12345678", true)] // exactly minimum
    #[case("123456789", true)] // exactly maximum
    #[case("1234567890", false)] // one above maximum
    fn test_subject_id_policy_bounds(#[case] input: &str, #[case] accepted: bool) {
        let policy = IdentifierPolicy::default();
        assert_eq!(SubjectId::with_policy(input, &policy).is_ok(), accepted);
    }

    #[test]
    fn test_subject_id_equality() {
        let a = SubjectId::new("12345678").unwrap();
        let b: SubjectId = "12345678".parse().unwrap();
        let c = SubjectId::new("87654321").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_subject_id_deserialize_rejects_letters() {
        let result: std::result::Result<SubjectId, _> = serde_yaml::from_str("\"12ab\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_timestamp_since_saturates() {
        let early = Timestamp::from_millis(100);
        let late = Timestamp::from_millis(350);
        assert_eq!(late.since(early), Duration::from_millis(250));
        assert_eq!(early.since(late), Duration::ZERO);
    }

    #[test]
    fn test_timestamp_has_elapsed_boundary() {
        let start = Timestamp::from_millis(1_000);
        let timeout = Duration::from_millis(500);
        assert!(!Timestamp::from_millis(1_499).has_elapsed(start, timeout));
        assert!(Timestamp::from_millis(1_500).has_elapsed(start, timeout));
    }

    #[test]
    fn test_timestamp_add_duration() {
        let t = Timestamp::from_millis(10) + Duration::from_millis(15);
        assert_eq!(t.as_millis(), 25);
        assert_eq!(Timestamp::from_millis(u64::MAX) + Duration::from_secs(1), Timestamp::from_millis(u64::MAX));
    }

    proptest::proptest! {
        #[test]
        fn prop_digit_strings_are_valid(id in "[0-9]{1,20}") {
            proptest::prop_assert!(SubjectId::new(&id).is_ok());
        }

        #[test]
        fn prop_non_digit_rejected(prefix in "[0-9]{0,5}", bad in "[^0-9]", suffix in "[0-9]{0,5}") {
            let id = format!("{prefix}{bad}{suffix}");
            proptest::prop_assert!(SubjectId::new(&id).is_err());
        }
    }
}

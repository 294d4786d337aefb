//! Frame buffer for the locker's character LCD.
//!
//! [`StatusDisplay`] holds what the LCD should show: a fixed grid of
//! `lines × columns` ASCII cells. Text is sanitized, truncated and
//! space-padded to the line width the same way the LCD driver does it, so a
//! frame compares equal exactly when the panel would look the same.
//!
//! A transient notice replaces the status frame until its expiry instant;
//! [`StatusDisplay::update`] drops it once that instant has passed.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use locker_controller::{Alignment, StatusDisplay};
//! use locker_core::Timestamp;
//!
//! let mut display = StatusDisplay::new(2, 16);
//! display.set_status(["AVAILABLE", "PRESS #"]);
//! assert_eq!(display.line(0).unwrap(), "AVAILABLE       ");
//!
//! display
//!     .show_notice("DENIED", Duration::from_secs(3), Timestamp::ZERO)
//!     .unwrap();
//! assert_eq!(display.line(0).unwrap().trim(), "DENIED");
//!
//! assert!(display.update(Timestamp::from_millis(3_000)));
//! assert_eq!(display.line(0).unwrap().trim(), "AVAILABLE");
//! # let _ = Alignment::Left;
//! ```

use std::time::Duration;

use locker_core::{DisplaySettings, Error, Result, Timestamp};

/// Horizontal placement of text within a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// Padded with spaces on the right.
    Left,
    /// Extra space goes on the right when the padding is odd.
    Center,
    /// Padded with spaces on the left.
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Notice {
    lines: Vec<String>,
    expires_at: Timestamp,
}

/// Character LCD frame buffer with status and notice layers.
#[derive(Debug, Clone)]
pub struct StatusDisplay {
    lines: usize,
    columns: usize,

    /// Status layer, always `lines` entries of `columns` cells.
    status: Vec<String>,

    notice: Option<Notice>,
}

impl StatusDisplay {
    /// Create a blank display.
    ///
    /// A zero-line display is bumped to one line.
    pub fn new(lines: usize, columns: usize) -> Self {
        let lines = lines.max(1);
        Self {
            lines,
            columns,
            status: vec![" ".repeat(columns); lines],
            notice: None,
        }
    }

    pub fn from_settings(settings: &DisplaySettings) -> Self {
        Self::new(settings.lines, settings.columns)
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn line_count(&self) -> usize {
        self.lines
    }

    /// Set one status line, left aligned.
    pub fn set_line(&mut self, line: usize, text: &str) -> Result<()> {
        self.set_line_aligned(line, text, Alignment::Left)
    }

    /// Set one status line.
    ///
    /// # Errors
    /// Returns `Error::InvalidLine` if `line` is outside the display.
    pub fn set_line_aligned(&mut self, line: usize, text: &str, align: Alignment) -> Result<()> {
        if line >= self.lines {
            return Err(Error::InvalidLine {
                line,
                max: self.lines - 1,
            });
        }

        self.status[line] = align_text(&sanitize_text(text), self.columns, align);
        Ok(())
    }

    /// Replace the whole status layer. Missing lines are blanked, extra
    /// lines are ignored.
    pub fn set_status<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut lines = lines.into_iter();
        for slot in &mut self.status {
            let text = lines.next();
            let text = text.as_ref().map(AsRef::as_ref).unwrap_or("");
            *slot = align_text(&sanitize_text(text), self.columns, Alignment::Left);
        }
    }

    /// Show a centered notice over the status layer until `now + duration`.
    ///
    /// The notice text may span lines with `\n`; each part is centered.
    ///
    /// # Errors
    /// Returns `Error::InvalidDuration` for a zero duration.
    pub fn show_notice(&mut self, text: &str, duration: Duration, now: Timestamp) -> Result<()> {
        if duration.is_zero() {
            return Err(Error::InvalidDuration);
        }

        let mut parts = text.split('\n');
        let lines = (0..self.lines)
            .map(|_| {
                let part = parts.next().unwrap_or("");
                align_text(&sanitize_text(part), self.columns, Alignment::Center)
            })
            .collect();

        self.notice = Some(Notice {
            lines,
            expires_at: now + duration,
        });
        Ok(())
    }

    /// Expire the notice if its time is up. Returns `true` if one expired.
    pub fn update(&mut self, now: Timestamp) -> bool {
        if let Some(notice) = &self.notice
            && now >= notice.expires_at
        {
            self.notice = None;
            return true;
        }
        false
    }

    pub fn has_notice(&self) -> bool {
        self.notice.is_some()
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    /// Visible text of one line.
    ///
    /// # Errors
    /// Returns `Error::InvalidLine` if `line` is outside the display.
    pub fn line(&self, line: usize) -> Result<&str> {
        if line >= self.lines {
            return Err(Error::InvalidLine {
                line,
                max: self.lines - 1,
            });
        }
        Ok(&self.visible()[line])
    }

    /// Everything currently visible, top to bottom.
    pub fn frame(&self) -> Vec<String> {
        self.visible().to_vec()
    }

    fn visible(&self) -> &[String] {
        match &self.notice {
            Some(notice) => &notice.lines,
            None => &self.status,
        }
    }
}

impl From<&DisplaySettings> for StatusDisplay {
    fn from(settings: &DisplaySettings) -> Self {
        Self::from_settings(settings)
    }
}

/// Keep at most `max_chars` characters.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Pad or truncate `text` to exactly `width` characters.
pub fn align_text(text: &str, width: usize, alignment: Alignment) -> String {
    let char_count = text.chars().count();

    if char_count >= width {
        return truncate_text(text, width);
    }

    let padding = width - char_count;

    match alignment {
        Alignment::Left => format!("{}{}", text, " ".repeat(padding)),
        Alignment::Right => format!("{}{}", " ".repeat(padding), text),
        Alignment::Center => {
            let left_pad = padding / 2;
            let right_pad = padding - left_pad;
            format!("{}{}{}", " ".repeat(left_pad), text, " ".repeat(right_pad))
        }
    }
}

/// The LCD only has the printable ASCII set; anything else becomes `?`.
fn sanitize_text(text: &str) -> String {
    text.trim()
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if c.is_ascii() { c } else { '?' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Alignment::Left, "HELLO     ")]
    #[case(Alignment::Center, "  HELLO   ")]
    #[case(Alignment::Right, "     HELLO")]
    fn test_alignment(#[case] alignment: Alignment, #[case] expected: &str) {
        assert_eq!(align_text("HELLO", 10, alignment), expected);
    }

    #[test]
    fn test_alignment_exact_width() {
        assert_eq!(align_text("HELLO", 5, Alignment::Center), "HELLO");
    }

    #[test]
    fn test_truncation_at_line_width() {
        let mut display = StatusDisplay::new(2, 16);
        display.set_line(0, "THIS LINE IS FAR TOO LONG").unwrap();
        assert_eq!(display.line(0).unwrap(), "THIS LINE IS FAR");
    }

    #[test]
    fn test_invalid_line() {
        let mut display = StatusDisplay::new(2, 16);
        let result = display.set_line(2, "X");
        assert!(matches!(result, Err(Error::InvalidLine { line: 2, max: 1 })));
        assert!(display.line(5).is_err());
    }

    #[test]
    fn test_sanitize_replaces_non_ascii() {
        let mut display = StatusDisplay::new(1, 8);
        display.set_line(0, " caf\u{e9}\t ").unwrap();
        assert_eq!(display.line(0).unwrap(), "caf?    ");
    }

    #[test]
    fn test_set_status_blanks_missing_lines() {
        let mut display = StatusDisplay::new(2, 8);
        display.set_status(["A", "B"]);
        display.set_status(["ONLY"]);
        assert_eq!(display.frame(), ["ONLY    ", "        "]);
    }

    #[test]
    fn test_notice_overlays_and_expires() {
        let mut display = StatusDisplay::new(2, 10);
        display.set_status(["STATUS"]);
        display
            .show_notice("TOP\nBOTTOM", Duration::from_millis(500), Timestamp::from_millis(100))
            .unwrap();

        assert_eq!(display.frame(), ["   TOP    ", "  BOTTOM  "]);
        assert!(!display.update(Timestamp::from_millis(599)));
        assert!(display.update(Timestamp::from_millis(600)));
        assert!(!display.has_notice());
        assert_eq!(display.line(0).unwrap(), "STATUS    ");
    }

    #[test]
    fn test_status_updates_under_notice() {
        let mut display = StatusDisplay::new(1, 6);
        display
            .show_notice("HI", Duration::from_secs(1), Timestamp::ZERO)
            .unwrap();
        display.set_status(["NEW"]);

        assert_eq!(display.line(0).unwrap(), "  HI  ");
        display.clear_notice();
        assert_eq!(display.line(0).unwrap(), "NEW   ");
    }

    #[test]
    fn test_zero_duration_notice() {
        let mut display = StatusDisplay::new(2, 16);
        let result = display.show_notice("X", Duration::ZERO, Timestamp::ZERO);
        assert!(matches!(result, Err(Error::InvalidDuration)));
    }
}

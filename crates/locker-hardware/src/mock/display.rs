//! Mock character display.

use tokio::sync::watch;

use crate::{Result, traits::TextDisplay, types::DeviceInfo};

/// Mock display publishing each frame on a watch channel.
#[derive(Debug)]
pub struct MockDisplay {
    frame_tx: watch::Sender<Vec<String>>,
    frames: usize,
    name: String,
}

impl MockDisplay {
    pub fn new(name: impl Into<String>) -> (Self, MockDisplayHandle) {
        let (frame_tx, frame_rx) = watch::channel(Vec::new());

        let display = Self {
            frame_tx,
            frames: 0,
            name: name.into(),
        };

        (display, MockDisplayHandle { frame_rx })
    }
}

impl TextDisplay for MockDisplay {
    fn show(&mut self, lines: &[String]) -> Result<()> {
        self.frames += 1;
        let lines = lines.to_vec();
        self.frame_tx.send_modify(|frame| *frame = lines);
        Ok(())
    }

    fn info(&self) -> DeviceInfo {
        DeviceInfo::new(self.name.clone(), format!("Mock LCD (frames: {})", self.frames))
    }
}

/// Handle for reading what a mock display shows. Cloneable.
#[derive(Debug, Clone)]
pub struct MockDisplayHandle {
    frame_rx: watch::Receiver<Vec<String>>,
}

impl MockDisplayHandle {
    /// Lines currently shown.
    pub fn lines(&self) -> Vec<String> {
        self.frame_rx.borrow().clone()
    }

    /// Trimmed lines joined with `|`, convenient for assertions.
    pub fn text(&self) -> String {
        self.frame_rx
            .borrow()
            .iter()
            .map(|line| line.trim_end())
            .collect::<Vec<_>>()
            .join("|")
    }

    /// Whether a frame was pushed since the last call.
    pub fn take_changed(&mut self) -> bool {
        let changed = self.frame_rx.has_changed().unwrap_or(false);
        self.frame_rx.borrow_and_update();
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_visible_through_handle() {
        let (mut display, mut handle) = MockDisplay::new("lcd");
        assert!(handle.lines().is_empty());

        display
            .show(&["AVAILABLE       ".to_string(), "Press #         ".to_string()])
            .unwrap();

        assert!(handle.take_changed());
        assert!(!handle.take_changed());
        assert_eq!(handle.text(), "AVAILABLE|Press #");
    }
}

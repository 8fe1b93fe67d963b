use std::path::{Path, PathBuf};

/// A place the browser can display. `Roots` is the "Computer" sentinel
/// (list of drives), distinct from any real directory path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Roots,
    Dir(PathBuf),
}

impl Location {
    pub fn dir(path: impl Into<PathBuf>) -> Self {
        Location::Dir(path.into())
    }

    pub fn as_dir(&self) -> Option<&Path> {
        match self {
            Location::Roots => None,
            Location::Dir(path) => Some(path),
        }
    }

    pub fn display_text(&self) -> String {
        match self {
            Location::Roots => "Computer".to_string(),
            Location::Dir(path) => path.to_string_lossy().to_string(),
        }
    }
}

/// Browser-style navigation history: an ordered sequence of visited
/// locations plus a cursor. Visiting while the cursor is not at the tail
/// discards every forward entry before appending.
#[derive(Debug, Default)]
pub struct NavHistory {
    locations: Vec<Location>,
    cursor: Option<usize>,
}

impl NavHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new location. Truncates any forward branch, appends, and
    /// moves the cursor to the tail. Never fails; callers validate the
    /// location before visiting.
    pub fn visit(&mut self, location: Location) {
        if let Some(cursor) = self.cursor {
            self.locations.truncate(cursor + 1);
        }
        self.locations.push(location);
        self.cursor = Some(self.locations.len() - 1);
    }

    /// Step back one entry. At the start (or empty) this is a no-op and
    /// returns `None`; the cursor only moves, nothing is truncated.
    pub fn back(&mut self) -> Option<&Location> {
        let cursor = self.cursor?;
        if cursor == 0 {
            return None;
        }
        self.cursor = Some(cursor - 1);
        self.locations.get(cursor - 1)
    }

    /// Step forward one entry, or `None` at the tail.
    pub fn forward(&mut self) -> Option<&Location> {
        let cursor = self.cursor?;
        if cursor + 1 >= self.locations.len() {
            return None;
        }
        self.cursor = Some(cursor + 1);
        self.locations.get(cursor + 1)
    }

    pub fn can_go_back(&self) -> bool {
        matches!(self.cursor, Some(cursor) if cursor > 0)
    }

    pub fn can_go_forward(&self) -> bool {
        matches!(self.cursor, Some(cursor) if cursor + 1 < self.locations.len())
    }

    /// The currently displayed location; the root sentinel when nothing has
    /// been visited yet.
    pub fn current(&self) -> Location {
        match self.cursor.and_then(|c| self.locations.get(c)) {
            Some(location) => location.clone(),
            None => Location::Roots,
        }
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    #[cfg(test)]
    fn check_bounds(&self) {
        match self.cursor {
            None => assert!(self.locations.is_empty()),
            Some(cursor) => assert!(cursor < self.locations.len()),
        }
    }
}

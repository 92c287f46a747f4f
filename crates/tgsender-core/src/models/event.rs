use std::path::{Path, PathBuf};

use crate::constants::GRID_PATH_SEGMENT;

/// Notification from the host that an image has been written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSavedEvent {
    pub path: PathBuf,
}

impl ImageSavedEvent {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Composite grid outputs are never forwarded.
    pub fn is_grid(&self) -> bool {
        self.path
            .to_string_lossy()
            .replace('\\', "/")
            .contains(GRID_PATH_SEGMENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_detection() {
        assert!(ImageSavedEvent::new("/sd/outputs/grids/2024-01-01/grid-0001.png").is_grid());
        assert!(ImageSavedEvent::new("C:\\sd\\outputs\\grids\\grid-0001.png").is_grid());
        assert!(!ImageSavedEvent::new("/sd/outputs/txt2img-images/0001.png").is_grid());
    }
}

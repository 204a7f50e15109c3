use std::path::PathBuf;
use std::sync::Arc;

/// What extraction does when a regular-file entry lands on an existing file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CollisionPolicy {
    /// Fail the whole extraction with [`crate::Error::Collision`].
    #[default]
    Abort,
    /// Leave the existing file alone and continue with the next entry.
    Skip,
}

#[derive(Clone, Default)]
pub struct ExtractOptions {
    pub include_directories: bool,
    pub collision: CollisionPolicy,
    pub on_progress: Option<Arc<dyn Fn(Progress) + Send + Sync>>,
}

#[derive(Clone, Debug)]
pub struct Progress {
    pub bytes_processed: u64,
    pub entries_processed: usize,
    pub total_entries: usize,
    pub current_entry: Option<PathBuf>,
}

impl ExtractOptions {
    pub fn include_directories(mut self, include: bool) -> Self {
        self.include_directories = include;
        self
    }

    pub fn collision(mut self, policy: CollisionPolicy) -> Self {
        self.collision = policy;
        self
    }

    pub fn on_progress(mut self, callback: Arc<dyn Fn(Progress) + Send + Sync>) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub(crate) fn report(&self, progress: Progress) {
        if let Some(callback) = &self.on_progress {
            callback(progress);
        }
    }
}

impl std::fmt::Debug for ExtractOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractOptions")
            .field("include_directories", &self.include_directories)
            .field("collision", &self.collision)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

impl Progress {
    pub fn percentage(&self) -> Option<f32> {
        if self.total_entries == 0 {
            None
        } else {
            Some((self.entries_processed as f32 / self.total_entries as f32) * 100.0)
        }
    }
}

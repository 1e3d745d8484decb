// ABOUTME: Durable context store — JSONL history with checkpoint/revert/compaction, plus D-Mail.

pub mod dmail;
pub mod history;

pub use dmail::{DMail, DMailBox};
pub use history::{Context, HistoryRecord};

use std::path::{Path, PathBuf};

/// Identifies one conversation on disk: a work directory and the path of
/// its history file, named after the session id.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub work_dir: PathBuf,
    pub history_file_path: PathBuf,
}

impl Session {
    pub fn new(id: impl Into<String>, work_dir: impl Into<PathBuf>, data_dir: &Path) -> Self {
        let id = id.into();
        let history_file_path = data_dir.join(format!("{id}.jsonl"));
        Session { id, work_dir: work_dir.into(), history_file_path }
    }

    /// Build a `Context` over this session's history file and attempt to
    /// restore any prior state from disk.
    pub fn open_context(&self) -> std::io::Result<Context> {
        let mut ctx = Context::new(self.history_file_path.clone());
        ctx.restore()?;
        Ok(ctx)
    }
}

// ABOUTME: Agent module — the Loop Driver, its compaction strategy, and a reference ChatProvider.

pub mod compaction;
pub mod provider;
pub mod r#loop;

pub use provider::{create_provider, EchoProvider};
pub use r#loop::{CompactionSettings, LoopDriver, RunOutcome};

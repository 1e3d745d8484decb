// ABOUTME: Approval Gate — generic (tool_name, action_key) permission checks with a session allow-list.
// ABOUTME: `allowlist`, `analysis`, `engine`, `policy`, `types` are the teacher's bash-specific
// ABOUTME: layered approval system, kept as reference material for a bash-like example tool.

pub mod allowlist;
pub mod analysis;
pub mod engine;
pub mod gate;
pub mod policy;
pub mod types;

pub use allowlist::*;
pub use analysis::*;
pub use engine::*;
pub use gate::{ApprovalGate, ApprovalResponse};
pub use policy::*;
pub use types::*;

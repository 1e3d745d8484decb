// ABOUTME: Core conversation data model shared by the context store, registry, and facade.
// ABOUTME: Messages and content parts are immutable once constructed.

pub mod message;

pub use message::{ContentPart, Message, Role, Usage};

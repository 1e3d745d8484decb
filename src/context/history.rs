// ABOUTME: Append-only JSONL history file — checkpoints, revert-with-rotation, compaction.
// ABOUTME: Single-writer; the Loop Driver is the only caller that mutates a given Context.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::core::message::{Message, Role};

/// One line of the history file. The `role` field doubles as the record
/// discriminator: a Message's own role for `message`, or a sentinel
/// (`_usage`, `_checkpoint`) for metadata records.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryRecord {
    Message(Message),
    Usage { token_count: u64 },
    Checkpoint { id: u64 },
}

impl HistoryRecord {
    fn to_line(&self) -> serde_json::Result<String> {
        let value = match self {
            HistoryRecord::Message(m) => serde_json::to_value(m)?,
            HistoryRecord::Usage { token_count } => {
                serde_json::json!({ "role": "_usage", "token_count": token_count })
            }
            HistoryRecord::Checkpoint { id } => {
                serde_json::json!({ "role": "_checkpoint", "id": id })
            }
        };
        serde_json::to_string(&value)
    }

    /// Parse one non-blank line. `Ok(None)` means the shape was recognized
    /// as a record but is unusable (unknown role); the caller skips it with
    /// a diagnostic rather than failing the whole restore.
    fn from_line(line: &str) -> Result<Option<Self>, String> {
        let value: Value = serde_json::from_str(line).map_err(|e| e.to_string())?;
        let role = value.get("role").and_then(Value::as_str).ok_or("missing role field")?;
        match role {
            "_usage" => {
                let token_count = value
                    .get("token_count")
                    .and_then(Value::as_u64)
                    .ok_or("_usage record missing token_count")?;
                Ok(Some(HistoryRecord::Usage { token_count }))
            }
            "_checkpoint" => {
                let id = value
                    .get("id")
                    .and_then(Value::as_u64)
                    .ok_or("_checkpoint record missing id")?;
                Ok(Some(HistoryRecord::Checkpoint { id }))
            }
            "user" | "assistant" | "tool" | "system" => {
                let message: Message = serde_json::from_value(value).map_err(|e| e.to_string())?;
                Ok(Some(HistoryRecord::Message(message)))
            }
            other => {
                let _ = other;
                Ok(None)
            }
        }
    }
}

/// Durable, checkpointed, revertible conversation history for one session.
///
/// Accepts any path and never creates parent directories; the caller owns
/// the directory layout. Not safe for concurrent writers (§5: single-writer).
pub struct Context {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    records: Vec<HistoryRecord>,
    history: Vec<Message>,
    /// Record index (into `records`) at which each checkpoint was created,
    /// i.e. the length of `records` just before the checkpoint marker itself.
    checkpoint_boundaries: Vec<usize>,
    /// Message count (into `history`) at the same moment, for compaction's
    /// prefix/tail split.
    message_boundaries: Vec<usize>,
    checkpoint_count: u64,
    token_count: u64,
}

impl Context {
    /// Construct a Context over `path`. No I/O happens until the first
    /// mutation or `restore()`.
    pub fn new(path: PathBuf) -> Self {
        Context {
            path,
            writer: None,
            records: Vec::new(),
            history: Vec::new(),
            checkpoint_boundaries: Vec::new(),
            message_boundaries: Vec::new(),
            checkpoint_count: 0,
            token_count: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn checkpoint_count(&self) -> u64 {
        self.checkpoint_count
    }

    pub fn token_count(&self) -> u64 {
        self.token_count
    }

    fn ensure_writer(&mut self) -> io::Result<&mut BufWriter<File>> {
        if self.writer.is_none() {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.writer = Some(BufWriter::new(file));
        }
        Ok(self.writer.as_mut().unwrap())
    }

    fn write_record(&mut self, record: &HistoryRecord) -> io::Result<()> {
        let line = record
            .to_line()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let writer = self.ensure_writer()?;
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }

    /// §4.5 `append`. Fsync semantics are best-effort, line-oriented: a
    /// crash may lose only the tail line.
    pub fn append(&mut self, message: Message) -> io::Result<()> {
        self.write_record(&HistoryRecord::Message(message.clone()))?;
        self.records.push(HistoryRecord::Message(message.clone()));
        self.history.push(message);
        Ok(())
    }

    /// §4.5 `update_token_count`.
    pub fn update_token_count(&mut self, n: u64) -> io::Result<()> {
        self.token_count = n;
        self.write_record(&HistoryRecord::Usage { token_count: n })?;
        self.records.push(HistoryRecord::Usage { token_count: n });
        Ok(())
    }

    /// §4.5 `checkpoint`. With `ensure_progress`, a checkpoint immediately
    /// following another checkpoint is a no-op that returns the prior id.
    pub fn checkpoint(&mut self, ensure_progress: bool) -> io::Result<u64> {
        if ensure_progress {
            if let Some(HistoryRecord::Checkpoint { id }) = self.records.last() {
                return Ok(*id);
            }
        }
        let id = self.checkpoint_count;
        self.checkpoint_boundaries.push(self.records.len());
        self.message_boundaries.push(self.history.len());
        self.write_record(&HistoryRecord::Checkpoint { id })?;
        self.records.push(HistoryRecord::Checkpoint { id });
        self.checkpoint_count += 1;
        Ok(id)
    }

    /// Rename the current file to the smallest-unused `.<R>` sibling, then
    /// write `records` as the new current file. Shared by `revert_to` and
    /// compaction so both honour (I4): nothing is destroyed, only rotated.
    fn rotate_and_rewrite(&mut self, records: &[HistoryRecord]) -> io::Result<()> {
        self.writer = None;
        if self.path.exists() {
            let rotated = rotated_sibling_path(&self.path)?;
            std::fs::rename(&self.path, &rotated)?;
        }
        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);
        for record in records {
            let line = record
                .to_line()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            writeln!(writer, "{}", line)?;
        }
        writer.flush()?;
        self.writer = Some(writer);
        Ok(())
    }

    /// §4.5 `revert_to`. Requires `0 <= k <= checkpoint_count`.
    pub fn revert_to(&mut self, k: u64) -> io::Result<()> {
        if k > self.checkpoint_count {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("revert_to({k}): only {} checkpoints exist", self.checkpoint_count),
            ));
        }
        let boundary = if k == self.checkpoint_count {
            self.records.len()
        } else {
            self.checkpoint_boundaries[k as usize]
        };
        let new_records = self.records[..boundary].to_vec();
        self.rotate_and_rewrite(&new_records)?;
        self.records = new_records;
        self.history = self
            .records
            .iter()
            .filter_map(|r| match r {
                HistoryRecord::Message(m) => Some(m.clone()),
                _ => None,
            })
            .collect();
        self.checkpoint_boundaries.truncate(k as usize);
        self.message_boundaries.truncate(k as usize);
        self.checkpoint_count = k;
        self.token_count = 0;
        Ok(())
    }

    /// Replace the prefix preceding `checkpoint_id` with a single summary
    /// Message, renumbering surviving checkpoints to start at 0. Used by
    /// the compaction strategy; never a no-op, per §9 Open Question (a).
    pub fn compact_before(&mut self, checkpoint_id: u64, summary: Message) -> io::Result<()> {
        if checkpoint_id >= self.checkpoint_count {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("compact_before({checkpoint_id}): no such checkpoint"),
            ));
        }
        let record_boundary = self.checkpoint_boundaries[checkpoint_id as usize];
        let tail = self.records[record_boundary..].to_vec();

        let mut new_records = Vec::with_capacity(tail.len() + 1);
        let mut new_history = vec![summary.clone()];
        new_records.push(HistoryRecord::Message(summary));

        let mut new_checkpoint_boundaries = Vec::new();
        let mut new_message_boundaries = Vec::new();
        let mut new_checkpoint_count = 0u64;

        for record in tail {
            match record {
                HistoryRecord::Message(m) => {
                    new_history.push(m.clone());
                    new_records.push(HistoryRecord::Message(m));
                }
                HistoryRecord::Usage { token_count } => {
                    new_records.push(HistoryRecord::Usage { token_count });
                }
                HistoryRecord::Checkpoint { .. } => {
                    new_checkpoint_boundaries.push(new_records.len());
                    new_message_boundaries.push(new_history.len());
                    new_records.push(HistoryRecord::Checkpoint { id: new_checkpoint_count });
                    new_checkpoint_count += 1;
                }
            }
        }

        self.rotate_and_rewrite(&new_records)?;
        self.records = new_records;
        self.history = new_history;
        self.checkpoint_boundaries = new_checkpoint_boundaries;
        self.message_boundaries = new_message_boundaries;
        self.checkpoint_count = new_checkpoint_count;
        Ok(())
    }

    /// Boundary (message index) of the most recently created checkpoint,
    /// i.e. where the prefix compaction would cut. `None` if no checkpoint
    /// exists yet.
    pub fn last_checkpoint_message_boundary(&self) -> Option<(u64, usize)> {
        if self.checkpoint_count == 0 {
            return None;
        }
        let id = self.checkpoint_count - 1;
        Some((id, self.message_boundaries[id as usize]))
    }

    /// §4.5 `restore`. Returns false for a missing, empty, or all-blank file.
    pub fn restore(&mut self) -> io::Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        let mut content = String::new();
        File::open(&self.path)?.read_to_string(&mut content)?;

        let mut any_nonblank = false;
        let mut records = Vec::new();
        let mut history = Vec::new();
        let mut checkpoint_boundaries = Vec::new();
        let mut message_boundaries = Vec::new();
        let mut checkpoint_count = 0u64;
        let mut token_count = 0u64;

        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            any_nonblank = true;
            match HistoryRecord::from_line(line) {
                Ok(Some(record)) => {
                    match &record {
                        HistoryRecord::Message(m) => history.push(m.clone()),
                        HistoryRecord::Usage { token_count: n } => token_count = *n,
                        HistoryRecord::Checkpoint { .. } => {
                            checkpoint_boundaries.push(records.len());
                            message_boundaries.push(history.len());
                            checkpoint_count += 1;
                        }
                    }
                    records.push(record);
                }
                Ok(None) => {
                    tracing::warn!(line, "skipping history record with unrecognized role");
                }
                Err(e) => {
                    tracing::warn!(line, error = %e, "skipping malformed history line");
                }
            }
        }

        if !any_nonblank {
            return Ok(false);
        }

        self.records = records;
        self.history = history;
        self.checkpoint_boundaries = checkpoint_boundaries;
        self.message_boundaries = message_boundaries;
        self.checkpoint_count = checkpoint_count;
        self.token_count = token_count;
        self.writer = None;
        Ok(true)
    }
}

fn rotated_sibling_path(path: &Path) -> io::Result<PathBuf> {
    let mut r: u64 = 1;
    loop {
        let candidate = PathBuf::from(format!("{}.{}", path.display(), r));
        if !candidate.exists() {
            return Ok(candidate);
        }
        r += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::ContentPart;

    fn tmp_path(tmp: &tempfile::TempDir, name: &str) -> PathBuf {
        tmp.path().join(name)
    }

    #[test]
    fn append_writes_one_line_per_message() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp_path(&tmp, "history.jsonl");
        let mut ctx = Context::new(path.clone());
        ctx.append(Message::user("hi")).unwrap();
        ctx.append(Message::assistant_text("hello")).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn property_p1_round_trip_via_restore() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp_path(&tmp, "history.jsonl");
        let mut ctx = Context::new(path.clone());
        ctx.append(Message::user("hi")).unwrap();
        ctx.append(Message::assistant_text("hello")).unwrap();
        ctx.update_token_count(3).unwrap();
        ctx.checkpoint(true).unwrap();

        let mut reloaded = Context::new(path);
        assert!(reloaded.restore().unwrap());
        assert_eq!(reloaded.history(), ctx.history());
        assert_eq!(reloaded.token_count(), ctx.token_count());
        assert_eq!(reloaded.checkpoint_count(), ctx.checkpoint_count());
    }

    #[test]
    fn restore_missing_file_returns_false() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp_path(&tmp, "missing.jsonl");
        let mut ctx = Context::new(path);
        assert!(!ctx.restore().unwrap());
    }

    #[test]
    fn restore_skips_unknown_role_with_diagnostic() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp_path(&tmp, "history.jsonl");
        std::fs::write(
            &path,
            "{\"role\":\"user\",\"content\":[{\"type\":\"text\",\"text\":\"hi\"}]}\n{\"role\":\"bogus\"}\n",
        )
        .unwrap();
        let mut ctx = Context::new(path);
        assert!(ctx.restore().unwrap());
        assert_eq!(ctx.history().len(), 1);
    }

    #[test]
    fn checkpoint_ensure_progress_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp_path(&tmp, "history.jsonl");
        let mut ctx = Context::new(path);
        ctx.append(Message::user("hi")).unwrap();
        let id1 = ctx.checkpoint(true).unwrap();
        let id2 = ctx.checkpoint(true).unwrap();
        assert_eq!(id1, id2);
        assert_eq!(ctx.checkpoint_count(), 1);
    }

    #[test]
    fn property_p5_checkpoint_ids_are_dense() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp_path(&tmp, "history.jsonl");
        let mut ctx = Context::new(path.clone());
        for i in 0..3 {
            ctx.append(Message::user(format!("turn {i}"))).unwrap();
            ctx.checkpoint(false).unwrap();
        }
        let content = std::fs::read_to_string(&path).unwrap();
        let ids: Vec<u64> = content
            .lines()
            .filter_map(|l| serde_json::from_str::<Value>(l).ok())
            .filter(|v| v.get("role").and_then(Value::as_str) == Some("_checkpoint"))
            .map(|v| v["id"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn revert_to_restores_prefix_and_resets_token_count() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp_path(&tmp, "history.jsonl");
        let mut ctx = Context::new(path.clone());
        ctx.append(Message::user("one")).unwrap();
        ctx.append(Message::assistant_text("ok")).unwrap();
        ctx.update_token_count(5).unwrap();
        ctx.checkpoint(true).unwrap(); // checkpoint 0

        ctx.append(Message::user("two")).unwrap();
        ctx.append(Message::assistant_text("ok2")).unwrap();
        ctx.update_token_count(10).unwrap();
        ctx.checkpoint(true).unwrap(); // checkpoint 1

        ctx.revert_to(1).unwrap();
        assert_eq!(ctx.history().len(), 2);
        assert_eq!(ctx.token_count(), 0);
        assert_eq!(ctx.checkpoint_count(), 1);
        assert!(path.with_file_name("history.jsonl.1").exists());
    }

    #[test]
    fn property_p2_revert_idempotent_modulo_rotation() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp_path(&tmp, "history.jsonl");
        let mut ctx = Context::new(path.clone());
        ctx.append(Message::user("one")).unwrap();
        ctx.checkpoint(true).unwrap();
        ctx.append(Message::user("two")).unwrap();
        ctx.checkpoint(true).unwrap();

        ctx.revert_to(1).unwrap();
        let history_after_first = ctx.history().to_vec();
        let tokens_after_first = ctx.token_count();

        ctx.revert_to(1).unwrap();
        assert_eq!(ctx.history(), history_after_first.as_slice());
        assert_eq!(ctx.token_count(), tokens_after_first);
        // Rotated twice: .1 from the very first rotation, .2 from the second.
        assert!(path.with_file_name("history.jsonl.1").exists());
        assert!(path.with_file_name("history.jsonl.2").exists());
    }

    #[test]
    fn property_p3_rotation_preserves_all_records() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp_path(&tmp, "history.jsonl");
        let mut ctx = Context::new(path.clone());
        ctx.append(Message::user("one")).unwrap();
        ctx.checkpoint(true).unwrap();
        ctx.append(Message::user("two")).unwrap();
        ctx.checkpoint(true).unwrap();
        ctx.append(Message::user("three")).unwrap();

        ctx.revert_to(1).unwrap();

        let current = std::fs::read_to_string(&path).unwrap();
        let rotated = std::fs::read_to_string(path.with_file_name("history.jsonl.1")).unwrap();

        let mut all_texts: Vec<String> = Vec::new();
        for content in [current, rotated] {
            for line in content.lines() {
                let v: Value = serde_json::from_str(line).unwrap();
                if let Some(text) = v.pointer("/content/0/text").and_then(Value::as_str) {
                    all_texts.push(text.to_string());
                }
            }
        }
        all_texts.sort();
        assert_eq!(all_texts, vec!["one".to_string(), "three".to_string(), "two".to_string()]);
    }

    #[test]
    fn compact_before_replaces_prefix_and_renumbers_checkpoints() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp_path(&tmp, "history.jsonl");
        let mut ctx = Context::new(path);
        ctx.append(Message::user("one")).unwrap();
        ctx.append(Message::assistant_text("ok")).unwrap();
        ctx.checkpoint(true).unwrap(); // checkpoint 0
        ctx.append(Message::user("two")).unwrap();
        ctx.append(Message::assistant_text("ok2")).unwrap();
        ctx.checkpoint(true).unwrap(); // checkpoint 1

        ctx.compact_before(1, Message::assistant_text("summary")).unwrap();

        assert_eq!(ctx.checkpoint_count(), 1);
        assert_eq!(ctx.history().len(), 3); // summary + "two" + "ok2"
        match &ctx.history()[0].content[0] {
            ContentPart::Text { text } => assert_eq!(text, "summary"),
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn compact_before_never_a_no_op() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp_path(&tmp, "history.jsonl");
        let mut ctx = Context::new(path);
        for i in 0..5 {
            ctx.append(Message::user(format!("msg {i}"))).unwrap();
        }
        ctx.checkpoint(true).unwrap();
        let before = ctx.history().len();
        ctx.compact_before(0, Message::assistant_text("summary")).unwrap();
        assert!(ctx.history().len() < before);
    }
}

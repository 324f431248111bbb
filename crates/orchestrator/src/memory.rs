//! Memory (§3/§4.5 "Memory") — an append-only, ordered message log.
//!
//! Shared by reference between the Planning Flow and whichever executor is
//! currently running a step (§9 "Shared memory between flow and
//! executor"): both see the same ordering, and only one of them mutates it
//! at a time since steps run strictly sequentially (§5).

use std::sync::Arc;

use parking_lot::RwLock;

use sa_domain::tool::Message;

/// An ordered, append-only message log. Cloning a [`Memory`] clones the
/// handle, not the contents — exactly the "memory handle passed by
/// reference" §9 calls for.
#[derive(Clone, Default)]
pub struct Memory {
    inner: Arc<RwLock<Vec<Message>>>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(messages)),
        }
    }

    pub fn append(&self, message: Message) {
        self.inner.write().push(message);
    }

    pub fn append_all(&self, messages: impl IntoIterator<Item = Message>) {
        self.inner.write().extend(messages);
    }

    /// Replace the entire log, e.g. after summarization (§4.9 step 3).
    pub fn replace_all(&self, messages: Vec<Message>) {
        *self.inner.write() = messages;
    }

    /// A point-in-time copy of the log, safe to read while no step is
    /// running (§9: "snapshot reads are taken while no step is running").
    pub fn snapshot(&self) -> Vec<Message> {
        self.inner.read().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn first_user_message(&self) -> Option<Message> {
        self.inner
            .read()
            .iter()
            .find(|m| m.role == sa_domain::tool::Role::User)
            .cloned()
    }

    /// True if two handles alias the same underlying log (flow/executor
    /// memory sharing, §4.7 step 3e).
    pub fn is_same_as(&self, other: &Memory) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::tool::Message;

    #[test]
    fn append_preserves_insertion_order() {
        let memory = Memory::new();
        memory.append(Message::user("first"));
        memory.append(Message::assistant("second"));
        let snap = memory.snapshot();
        assert_eq!(snap[0].content.text(), Some("first"));
        assert_eq!(snap[1].content.text(), Some("second"));
    }

    #[test]
    fn cloned_handle_shares_the_same_log() {
        let memory = Memory::new();
        let alias = memory.clone();
        memory.append(Message::user("hello"));
        assert_eq!(alias.len(), 1);
        assert!(memory.is_same_as(&alias));
    }

    #[test]
    fn replace_all_swaps_contents_atomically() {
        let memory = Memory::from_messages(vec![Message::user("a"), Message::user("b")]);
        memory.replace_all(vec![Message::summary("compressed")]);
        assert_eq!(memory.len(), 1);
        assert_eq!(memory.snapshot()[0].role, sa_domain::tool::Role::Summary);
    }

    #[test]
    fn distinct_handles_are_not_the_same_log() {
        let a = Memory::new();
        let b = Memory::new();
        assert!(!a.is_same_as(&b));
    }
}

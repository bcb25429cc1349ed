//! In-memory transport used by tests and local experiments.
//!
//! `MemoryChannel` and `MemoryMessage` record every call and the resulting
//! reaction state so assertions can inspect what a real platform would show.
//! Failures can be scripted per operation with [`MemoryChannel::fail_next`].

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use reactkit_core::{ChannelId, MessageId, Permission, UserId};

use crate::channel::{ChatMessage, MessageChannel};
use crate::error::TransportError;

/// Operation classes that can have failures scripted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryOp {
    CreateMessage,
    Edit,
    AddReaction,
    /// Any of the three reaction-removal calls.
    RemoveReaction,
    Permissions,
}

#[derive(Default)]
struct FailureScript {
    queued: HashMap<MemoryOp, Vec<TransportError>>,
}

impl FailureScript {
    fn take(&mut self, op: MemoryOp) -> Option<TransportError> {
        let queue = self.queued.get_mut(&op)?;
        if queue.is_empty() {
            return None;
        }
        Some(queue.remove(0))
    }
}

/// An in-memory channel. Guild channels check permissions against the set
/// granted to the bot; direct channels grant everything.
pub struct MemoryChannel {
    id: ChannelId,
    guild: bool,
    bot_user: UserId,
    self_ref: Weak<MemoryChannel>,
    granted: Mutex<HashSet<Permission>>,
    next_message_id: AtomicU64,
    messages: Mutex<Vec<Weak<MemoryMessage>>>,
    failures: Mutex<FailureScript>,
    permission_checks: AtomicU64,
}

impl MemoryChannel {
    /// A guild channel where the bot holds `granted`.
    pub fn guild(id: u64, bot_user: UserId, granted: &[Permission]) -> Arc<Self> {
        Self::build(id, true, bot_user, granted)
    }

    /// A direct-message channel. Permission checks always pass.
    pub fn direct(id: u64, bot_user: UserId) -> Arc<Self> {
        Self::build(id, false, bot_user, &[])
    }

    fn build(id: u64, guild: bool, bot_user: UserId, granted: &[Permission]) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            id: ChannelId(id),
            guild,
            bot_user,
            self_ref: self_ref.clone(),
            granted: Mutex::new(granted.iter().copied().collect()),
            // Message ids are derived from the channel id so they stay unique
            // across channels in a single test.
            next_message_id: AtomicU64::new(id * 1_000 + 1),
            messages: Mutex::new(Vec::new()),
            failures: Mutex::new(FailureScript::default()),
            permission_checks: AtomicU64::new(0),
        })
    }

    pub fn bot_user(&self) -> UserId {
        self.bot_user
    }

    pub fn grant(&self, permission: Permission) {
        self.granted.lock().unwrap().insert(permission);
    }

    pub fn revoke(&self, permission: Permission) {
        self.granted.lock().unwrap().remove(&permission);
    }

    /// Make the next `times` calls of `op` fail with `error`.
    pub fn fail_next(&self, op: MemoryOp, error: TransportError, times: usize) {
        let mut script = self.failures.lock().unwrap();
        let queue = script.queued.entry(op).or_default();
        queue.extend(std::iter::repeat(error).take(times));
    }

    /// Messages created through this channel that are still alive.
    pub fn messages(&self) -> Vec<Arc<MemoryMessage>> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    pub fn last_message(&self) -> Option<Arc<MemoryMessage>> {
        self.messages().pop()
    }

    pub fn permission_checks(&self) -> u64 {
        self.permission_checks.load(Ordering::SeqCst)
    }

    /// Post a message without going through the trait object.
    pub fn post(self: &Arc<Self>, content: &str) -> Arc<MemoryMessage> {
        self.new_message(Arc::clone(self), content)
    }

    fn new_message(&self, channel: Arc<MemoryChannel>, content: &str) -> Arc<MemoryMessage> {
        let id = MessageId(self.next_message_id.fetch_add(1, Ordering::SeqCst));
        let message = Arc::new(MemoryMessage {
            id,
            channel,
            content: Mutex::new(content.to_string()),
            edits: Mutex::new(Vec::new()),
            reactions: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
        });
        self.messages.lock().unwrap().push(Arc::downgrade(&message));
        message
    }

    fn scripted_failure(&self, op: MemoryOp) -> Result<(), TransportError> {
        match self.failures.lock().unwrap().take(op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MessageChannel for MemoryChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn is_guild(&self) -> bool {
        self.guild
    }

    async fn has_permissions(
        &self,
        _user: UserId,
        permissions: &[Permission],
    ) -> Result<bool, TransportError> {
        self.permission_checks.fetch_add(1, Ordering::SeqCst);
        self.scripted_failure(MemoryOp::Permissions)?;
        if !self.guild {
            return Ok(true);
        }
        let granted = self.granted.lock().unwrap();
        Ok(permissions.iter().all(|p| granted.contains(p)))
    }

    async fn create_message(
        &self,
        content: &str,
    ) -> Result<Arc<dyn ChatMessage>, TransportError> {
        tokio::task::yield_now().await;
        self.scripted_failure(MemoryOp::CreateMessage)?;
        let channel = self
            .self_ref
            .upgrade()
            .ok_or_else(|| TransportError::NotFound(format!("channel {}", self.id)))?;
        Ok(self.new_message(channel, content))
    }
}

/// A message held by a [`MemoryChannel`].
pub struct MemoryMessage {
    id: MessageId,
    channel: Arc<MemoryChannel>,
    content: Mutex<String>,
    edits: Mutex<Vec<String>>,
    reactions: Mutex<BTreeMap<String, BTreeSet<UserId>>>,
    calls: Mutex<Vec<String>>,
}

impl MemoryMessage {
    /// Simulate `user` reacting with `symbol`.
    pub fn react_as(&self, user: UserId, symbol: &str) {
        self.reactions
            .lock()
            .unwrap()
            .entry(symbol.to_string())
            .or_default()
            .insert(user);
    }

    /// Users currently reacting with `symbol`.
    pub fn reactors(&self, symbol: &str) -> Vec<UserId> {
        self.reactions
            .lock()
            .unwrap()
            .get(symbol)
            .map(|users| users.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Symbols with at least one reactor, in sorted order.
    pub fn reaction_symbols(&self) -> Vec<String> {
        self.reactions.lock().unwrap().keys().cloned().collect()
    }

    /// Every edit applied so far, oldest first.
    pub fn edits(&self) -> Vec<String> {
        self.edits.lock().unwrap().clone()
    }

    /// Every transport call made against this message, as `op:arg` strings.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn remove_reactor(&self, symbol: &str, user: Option<UserId>) {
        let mut reactions = self.reactions.lock().unwrap();
        match user {
            Some(user) => {
                if let Some(users) = reactions.get_mut(symbol) {
                    users.remove(&user);
                    if users.is_empty() {
                        reactions.remove(symbol);
                    }
                }
            }
            None => {
                reactions.remove(symbol);
            }
        }
    }
}

#[async_trait]
impl ChatMessage for MemoryMessage {
    fn id(&self) -> MessageId {
        self.id
    }

    fn channel(&self) -> Arc<dyn MessageChannel> {
        self.channel.clone()
    }

    fn content(&self) -> String {
        self.content.lock().unwrap().clone()
    }

    async fn edit(&self, content: &str) -> Result<(), TransportError> {
        tokio::task::yield_now().await;
        self.record(format!("edit:{content}"));
        self.channel.scripted_failure(MemoryOp::Edit)?;
        *self.content.lock().unwrap() = content.to_string();
        self.edits.lock().unwrap().push(content.to_string());
        Ok(())
    }

    async fn add_reaction(&self, symbol: &str) -> Result<(), TransportError> {
        tokio::task::yield_now().await;
        self.record(format!("add_reaction:{symbol}"));
        self.channel.scripted_failure(MemoryOp::AddReaction)?;
        self.react_as(self.channel.bot_user, symbol);
        Ok(())
    }

    async fn remove_own_reaction(&self, symbol: &str) -> Result<(), TransportError> {
        tokio::task::yield_now().await;
        self.record(format!("remove_own_reaction:{symbol}"));
        self.channel.scripted_failure(MemoryOp::RemoveReaction)?;
        self.remove_reactor(symbol, Some(self.channel.bot_user));
        Ok(())
    }

    async fn remove_reaction_emoji(&self, symbol: &str) -> Result<(), TransportError> {
        tokio::task::yield_now().await;
        self.record(format!("remove_reaction_emoji:{symbol}"));
        self.channel.scripted_failure(MemoryOp::RemoveReaction)?;
        self.remove_reactor(symbol, None);
        Ok(())
    }

    async fn remove_all_reactions(&self) -> Result<(), TransportError> {
        tokio::task::yield_now().await;
        self.record("remove_all_reactions".to_string());
        self.channel.scripted_failure(MemoryOp::RemoveReaction)?;
        self.reactions.lock().unwrap().clear();
        Ok(())
    }
}

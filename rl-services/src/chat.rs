//! Chat timeline and per-ride chat sessions.

use std::sync::{Arc, Mutex, MutexGuard};

use rl_core::config::ChatDedup;
use rl_models::ChatMessage;
use tracing::debug;

use crate::channel::EventChannel;
use rl_socket::Subscription;

/// Messages of one conversation, kept in ascending timestamp order.
///
/// Messages with equal timestamps keep their arrival order.
#[derive(Debug, Clone)]
pub struct ChatTimeline {
    dedup: ChatDedup,
    messages: Vec<ChatMessage>,
}

impl ChatTimeline {
    pub fn new(dedup: ChatDedup) -> Self {
        Self {
            dedup,
            messages: Vec::new(),
        }
    }

    /// Insert `message` in timestamp order. Returns `false` if the dedup
    /// rule dropped it.
    pub fn insert(&mut self, message: ChatMessage) -> bool {
        if self.dedup == ChatDedup::ContentMatch
            && self.messages.iter().any(|m| m.same_content(&message))
        {
            debug!("duplicate chat message from {} dropped", message.sender_id);
            return false;
        }
        let at = self
            .messages
            .partition_point(|m| m.timestamp <= message.timestamp);
        self.messages.insert(at, message);
        true
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

fn lock(timeline: &Mutex<ChatTimeline>) -> MutexGuard<'_, ChatTimeline> {
    timeline.lock().unwrap_or_else(|e| e.into_inner())
}

/// Chat for a single ride, bound to a channel.
///
/// Inbound messages for the ride land in the timeline; outbound messages are
/// appended once they were actually transmitted. Dropping the session stops
/// listening.
pub struct ChatSession {
    ride_id: String,
    channel: EventChannel,
    timeline: Arc<Mutex<ChatTimeline>>,
    _subscription: Subscription,
}

impl ChatSession {
    pub fn open(channel: &EventChannel, ride_id: &str) -> Self {
        let dedup = channel.manager().policy().chat_dedup;
        let timeline = Arc::new(Mutex::new(ChatTimeline::new(dedup)));

        let sink = timeline.clone();
        let ride = ride_id.to_string();
        let subscription = channel.on_chat_message(move |message| {
            if message.ride_id == ride {
                lock(&sink).insert(message);
            }
        });

        Self {
            ride_id: ride_id.to_string(),
            channel: channel.clone(),
            timeline,
            _subscription: subscription,
        }
    }

    pub fn ride_id(&self) -> &str {
        &self.ride_id
    }

    /// Send `text`; on success the message joins the timeline.
    pub async fn send(&self, text: &str) -> bool {
        match self.channel.send_chat(&self.ride_id, text).await {
            Some(message) => {
                lock(&self.timeline).insert(message);
                true
            }
            None => false,
        }
    }

    /// Snapshot of the conversation in timestamp order.
    pub fn messages(&self) -> Vec<ChatMessage> {
        lock(&self.timeline).messages().to_vec()
    }

    pub fn len(&self) -> usize {
        lock(&self.timeline).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.timeline).is_empty()
    }
}

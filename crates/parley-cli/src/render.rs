//! Turns snapshot changes into terminal lines.

use std::collections::HashSet;

use parley_client::{Message, SessionSnapshot};
use parley_core::{ConnectionState, DisconnectKind, Disconnection};
use parley_proto::{ConversationId, MessageStatus, UserId};

/// What has been printed already, keyed by message identity and status so a
/// confirmation or failure prints again.
type Seen = HashSet<(ConversationId, String, MessageStatus)>;

/// Remembers the last rendered snapshot and prints only what changed.
#[derive(Debug, Default)]
pub struct Printer {
    connection: ConnectionState,
    active: Option<ConversationId>,
    typing: Vec<String>,
    older: bool,
    seen: Seen,
}

impl Printer {
    /// Printer that has shown nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines describing what changed since the previous snapshot.
    pub fn update(&mut self, snapshot: &SessionSnapshot) -> Vec<String> {
        let mut lines = Vec::new();
        let local = snapshot.identity.as_ref().map(|i| i.id);

        if snapshot.connection_state != self.connection {
            self.connection = snapshot.connection_state;
            lines.push(connection_line(
                snapshot.connection_state,
                snapshot.last_disconnect.as_ref(),
            ));
        }

        if snapshot.active_conversation != self.active {
            self.active = snapshot.active_conversation;
            lines.push(match self.active {
                Some(id) => format!("* opened conversation {id}"),
                None => "* closed conversation".to_owned(),
            });
        }

        let older = self.active.is_some_and(|id| snapshot.older_history.contains(&id));
        if older && !self.older {
            lines.push("* older messages available, /older to load them".to_owned());
        }
        self.older = older;

        let mut current = Seen::new();
        for (&conversation_id, messages) in &snapshot.messages_by_conversation {
            for message in messages {
                let entry = (conversation_id, key(message), message.status);
                if !self.seen.contains(&entry) {
                    if Some(conversation_id) == self.active {
                        lines.push(message_line(message, local));
                    } else if Some(message.sender_id) != local
                        && message.status != MessageStatus::Read
                    {
                        lines.push(format!(
                            "* conversation {conversation_id}: new message from user {}",
                            message.sender_id
                        ));
                    }
                }
                current.insert(entry);
            }
        }
        self.seen = current;

        let typing = self.active.map(|id| snapshot.typing(id).to_vec()).unwrap_or_default();
        if typing != self.typing {
            if !typing.is_empty() {
                lines.push(format!("* {} typing...", typing.join(", ")));
            }
            self.typing = typing;
        }

        lines
    }
}

/// The conversation list, one line each.
pub fn conversation_list(snapshot: &SessionSnapshot) -> Vec<String> {
    if snapshot.conversations.is_empty() {
        return vec!["no conversations, try /refresh".to_owned()];
    }

    let local = snapshot.identity.as_ref().map_or(0, |i| i.id);
    snapshot
        .conversations
        .iter()
        .map(|c| {
            let marker = if snapshot.active_conversation == Some(c.id) { '>' } else { ' ' };
            let unread = match c.unread_count {
                0 => String::new(),
                n => format!("  ({n} unread)"),
            };
            format!("{marker} {:>4}  with user {}{unread}", c.id, c.counterpart(local))
        })
        .collect()
}

fn connection_line(state: ConnectionState, last_disconnect: Option<&Disconnection>) -> String {
    let Some(last) = last_disconnect.filter(|_| state == ConnectionState::Disconnected) else {
        return format!("* {}", state.as_str());
    };
    match last.kind {
        DisconnectKind::Terminal => "* disconnected by the server".to_owned(),
        DisconnectKind::Transient => format!("* connection lost ({})", last.reason),
        DisconnectKind::Local => format!("* {}", state.as_str()),
    }
}

fn key(message: &Message) -> String {
    if message.is_confirmed() {
        message.id.to_string()
    } else {
        message.client_temp_id.clone().unwrap_or_default()
    }
}

fn message_line(message: &Message, local: Option<UserId>) -> String {
    let who = if Some(message.sender_id) == local {
        "you".to_owned()
    } else {
        format!("user {}", message.sender_id)
    };
    format!(
        "[{}] {who}: {}  ({} {})",
        message.created_at.format("%H:%M:%S"),
        message.content,
        message.status,
        key(message)
    )
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, name: String },

    /// A user came online or went offline
    PresenceUpdate {
        user_id: Uuid,
        name: String,
        online: bool,
    },

    /// A connection joined a group room
    RoomJoined { group_id: Uuid, user_id: Uuid },

    /// A new message was posted to a group
    MessageCreate {
        id: Uuid,
        group_id: Uuid,
        sender_id: Uuid,
        sender_name: String,
        content: String,
        kind: String,
        reply_to: Option<Uuid>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A message was edited
    MessageUpdate {
        id: Uuid,
        group_id: Uuid,
        content: String,
    },

    /// A message was soft-deleted
    MessageDelete { id: Uuid, group_id: Uuid },

    /// A reaction was added to a message
    ReactionAdd {
        group_id: Uuid,
        message_id: Uuid,
        user_id: Uuid,
        emoji: String,
    },

    /// A reaction was removed from a message
    ReactionRemove {
        group_id: Uuid,
        message_id: Uuid,
        user_id: Uuid,
        emoji: String,
    },

    /// A user marked a message as seen
    MessageSeen {
        group_id: Uuid,
        message_id: Uuid,
        user_id: Uuid,
    },

    /// A member joined or was added to a group
    MemberJoin {
        group_id: Uuid,
        user_id: Uuid,
        name: String,
    },

    /// A member left or was removed from a group
    MemberLeave { group_id: Uuid, user_id: Uuid },
}

impl GatewayEvent {
    /// Returns the group_id if this event is scoped to a specific group room.
    /// Events that return `None` are global and are delivered to all clients.
    pub fn group_id(&self) -> Option<Uuid> {
        match self {
            Self::RoomJoined { group_id, .. } => Some(*group_id),
            Self::MessageCreate { group_id, .. } => Some(*group_id),
            Self::MessageUpdate { group_id, .. } => Some(*group_id),
            Self::MessageDelete { group_id, .. } => Some(*group_id),
            Self::ReactionAdd { group_id, .. } => Some(*group_id),
            Self::ReactionRemove { group_id, .. } => Some(*group_id),
            Self::MessageSeen { group_id, .. } => Some(*group_id),
            Self::MemberJoin { group_id, .. } => Some(*group_id),
            Self::MemberLeave { group_id, .. } => Some(*group_id),
            // Ready and PresenceUpdate are global
            Self::Ready { .. } | Self::PresenceUpdate { .. } => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Subscribe to a group's room. Idempotent; requires membership.
    JoinGroup { group_id: Uuid },

    /// Unsubscribe from a group's room. Idempotent.
    LeaveGroup { group_id: Uuid },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_scoped_events_expose_their_room() {
        let gid = Uuid::new_v4();
        let event = GatewayEvent::MessageDelete {
            id: Uuid::new_v4(),
            group_id: gid,
        };
        assert_eq!(event.group_id(), Some(gid));

        let global = GatewayEvent::PresenceUpdate {
            user_id: Uuid::new_v4(),
            name: "ada".into(),
            online: true,
        };
        assert_eq!(global.group_id(), None);
    }

    #[test]
    fn commands_use_tagged_wire_format() {
        let cmd: GatewayCommand =
            serde_json::from_str(r#"{"type":"Identify","data":{"token":"abc"}}"#).unwrap();
        assert!(matches!(cmd, GatewayCommand::Identify { token } if token == "abc"));
    }
}

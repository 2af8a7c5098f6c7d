use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ConversationId, ConversationKind, FriendRequest, UserId};

// -- Friend requests --

/// Pending requests touching a user, split by direction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FriendRequestLists {
    pub received: Vec<FriendRequest>,
    pub sent: Vec<FriendRequest>,
}

// -- Conversations --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSummary {
    pub id: UserId,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMessage {
    pub content: String,
    pub sender_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// One entry of a user's conversation list. `participants` never contains the
/// requesting user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    #[serde(rename = "type")]
    pub kind: ConversationKind,
    pub name: Option<String>,
    pub participants: Vec<ParticipantSummary>,
    pub last_message: Option<LastMessage>,
}

// -- Messages --

pub const DEFAULT_MESSAGE_LIMIT: u32 = 50;

/// Offset pagination over a conversation's messages, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    DEFAULT_MESSAGE_LIMIT
}

impl Default for MessageQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_MESSAGE_LIMIT,
            offset: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn summary_wire_shape() {
        let summary = ConversationSummary {
            id: 9,
            kind: ConversationKind::Direct,
            name: None,
            participants: vec![ParticipantSummary {
                id: 2,
                display_name: "Bea".into(),
                avatar_url: None,
            }],
            last_message: Some(LastMessage {
                content: "hi".into(),
                sender_id: 2,
                created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            }),
        };

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["type"], "direct");
        assert!(json["name"].is_null());
        assert_eq!(json["participants"][0]["display_name"], "Bea");
        assert_eq!(json["last_message"]["sender_id"], 2);
        assert_eq!(json["last_message"]["created_at"], "2024-05-01T12:00:00Z");
    }

    #[test]
    fn empty_conversation_has_null_last_message() {
        let summary = ConversationSummary {
            id: 1,
            kind: ConversationKind::Group,
            name: Some("crew".into()),
            participants: vec![],
            last_message: None,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json["last_message"].is_null());
        assert_eq!(json["name"], "crew");
    }

    #[test]
    fn message_query_defaults() {
        let q: MessageQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q, MessageQuery::default());
        assert_eq!(q.limit, 50);

        let q: MessageQuery = serde_json::from_str(r#"{"offset": 10}"#).unwrap();
        assert_eq!((q.limit, q.offset), (50, 10));
    }
}

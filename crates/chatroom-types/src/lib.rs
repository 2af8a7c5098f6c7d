pub mod api;
pub mod models;

pub use models::{
    Conversation, ConversationId, ConversationKind, FriendRequest, FriendRequestId,
    FriendRequestStatus, Friendship, Message, MessageId, MessageRead, User, UserId,
};

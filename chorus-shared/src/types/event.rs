use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope wrapping every domain event published on the Chorus exchange.
///
/// Routing key format: `chorus.{domain}.{entity}.{action}`
/// Example: `chorus.social.like.created`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T> {
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub data: T,
}

impl<T> Event<T> {
    pub fn new(source: impl Into<String>, event_type: impl Into<String>, data: T) -> Self {
        Self {
            id: Uuid::now_v7(),
            source: source.into(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            correlation_id: None,
            user_id: None,
            data,
        }
    }
}

pub mod routing_keys {
    // Auth events
    pub const AUTH_USER_LOGIN: &str = "chorus.auth.user.login";

    // Social events
    pub const SOCIAL_LIKE_CREATED: &str = "chorus.social.like.created";
    pub const SOCIAL_COMMENT_CREATED: &str = "chorus.social.comment.created";
    pub const SOCIAL_FOLLOW_CREATED: &str = "chorus.social.follow.created";

    // Messaging events
    pub const MESSAGING_MESSAGE_SENT: &str = "chorus.messaging.message.sent";

    // Gamification events
    pub const GAMIFICATION_ACHIEVEMENT_UNLOCKED: &str = "chorus.gamification.achievement.unlocked";
}

pub mod payloads {
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct UserLogin {
        pub user_id: Uuid,
        pub device_info: String,
        pub ip_address: Option<String>,
    }

    /// A like on a post, podcast episode, or verification submission.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct LikeCreated {
        pub actor_id: Uuid,
        pub actor_display_name: String,
        pub owner_id: Uuid,
        pub target_id: String,
        pub target_kind: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct CommentCreated {
        pub comment_id: Uuid,
        pub actor_id: Uuid,
        pub actor_display_name: String,
        pub owner_id: Uuid,
        pub target_id: String,
        pub content_preview: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct FollowCreated {
        pub follower_id: Uuid,
        pub following_id: Uuid,
        pub follower_display_name: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MessageSent {
        pub message_id: Uuid,
        pub conversation_id: Uuid,
        pub sender_id: Uuid,
        pub sender_display_name: String,
        pub recipient_ids: Vec<Uuid>,
        pub content_preview: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct AchievementUnlocked {
        pub user_id: Uuid,
        pub achievement_type: String,
        pub achievement_name: String,
    }
}

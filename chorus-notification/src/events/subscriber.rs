use std::sync::Arc;
use std::time::Duration;

use futures_lite::StreamExt;
use lapin::options::{BasicAckOptions, BasicNackOptions};
use serde::de::DeserializeOwned;
use serde_json::json;

use chorus_shared::clients::rabbitmq::RabbitMQClient;
use chorus_shared::types::event::{payloads, routing_keys, Event};

use chorus_shared::errors::AppError;

use crate::models::NewNotification;
use crate::services::NotificationStore;
use crate::AppState;

pub const SOCIAL_QUEUE: &str = "chorus-notification.social";
pub const MESSAGING_QUEUE: &str = "chorus-notification.messaging";
pub const ACCOUNT_QUEUE: &str = "chorus-notification.account";

/// Pause before handing a delivery back after a store failure.
const REQUEUE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("unhandled routing key: {0}")]
    UnknownRoutingKey(String),

    #[error("invalid event payload: {0}")]
    Payload(#[from] serde_json::Error),
}

fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T, EventError> {
    Ok(serde_json::from_slice::<Event<T>>(body)?.data)
}

/// Turn one platform event into the notifications it produces.
///
/// Self-directed actions (liking your own post, messaging yourself) produce nothing.
pub fn notifications_for_event(routing_key: &str, body: &[u8]) -> Result<Vec<NewNotification>, EventError> {
    let drafts = match routing_key {
        routing_keys::MESSAGING_MESSAGE_SENT => {
            let data: payloads::MessageSent = parse(body)?;
            data.recipient_ids
                .iter()
                .filter(|&&recipient| recipient != data.sender_id)
                .map(|&recipient| {
                    NewNotification::new(
                        recipient,
                        "message",
                        "New message",
                        format!("New message from {}", data.sender_display_name),
                    )
                    .with_category("messages")
                    .with_data(json!({
                        "conversation_id": data.conversation_id,
                        "message_id": data.message_id,
                        "sender_id": data.sender_id,
                        "sender_display_name": data.sender_display_name,
                        "content_preview": data.content_preview,
                    }))
                })
                .collect()
        }
        routing_keys::SOCIAL_LIKE_CREATED => {
            let data: payloads::LikeCreated = parse(body)?;
            if data.actor_id == data.owner_id {
                return Ok(Vec::new());
            }
            vec![NewNotification::new(
                data.owner_id,
                "like",
                "New like",
                format!("{} liked your {}", data.actor_display_name, data.target_kind),
            )
            .with_category("social")
            .with_data(json!({
                "target_id": data.target_id,
                "target_kind": data.target_kind,
                "actor_id": data.actor_id,
                "actor_display_name": data.actor_display_name,
            }))]
        }
        routing_keys::SOCIAL_COMMENT_CREATED => {
            let data: payloads::CommentCreated = parse(body)?;
            if data.actor_id == data.owner_id {
                return Ok(Vec::new());
            }
            vec![NewNotification::new(
                data.owner_id,
                "comment",
                "New comment",
                format!("{} commented: {}", data.actor_display_name, data.content_preview),
            )
            .with_category("social")
            .with_data(json!({
                "target_id": data.target_id,
                "comment_id": data.comment_id,
                "actor_id": data.actor_id,
                "actor_display_name": data.actor_display_name,
            }))]
        }
        routing_keys::SOCIAL_FOLLOW_CREATED => {
            let data: payloads::FollowCreated = parse(body)?;
            if data.follower_id == data.following_id {
                return Ok(Vec::new());
            }
            vec![NewNotification::new(
                data.following_id,
                "follow",
                "New follower",
                format!("{} started following you", data.follower_display_name),
            )
            .with_category("social")
            .with_data(json!({
                "actor_id": data.follower_id,
                "actor_display_name": data.follower_display_name,
            }))]
        }
        routing_keys::AUTH_USER_LOGIN => {
            let data: payloads::UserLogin = parse(body)?;
            vec![NewNotification::new(
                data.user_id,
                "login",
                "New sign-in",
                format!("New sign-in from {}", data.device_info),
            )
            .with_category("security")
            .with_data(json!({
                "device_info": data.device_info,
                "ip_address": data.ip_address,
            }))]
        }
        routing_keys::GAMIFICATION_ACHIEVEMENT_UNLOCKED => {
            let data: payloads::AchievementUnlocked = parse(body)?;
            vec![NewNotification::new(
                data.user_id,
                "achievement",
                "Achievement unlocked",
                format!("You unlocked {}", data.achievement_name),
            )
            .with_category("achievements")
            .with_data(json!({
                "achievement_type": data.achievement_type,
                "achievement_name": data.achievement_name,
            }))]
        }
        other => return Err(EventError::UnknownRoutingKey(other.to_string())),
    };

    Ok(drafts)
}

/// How a delivery is settled with the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Ack,
    Requeue,
}

/// Store every notification `body` produces.
///
/// Events that can never succeed (unknown routing key, bad payload, invalid
/// draft) are acked and dropped. Any other store failure requeues the event;
/// drafts stored before the failure will be stored again on redelivery.
pub fn process_event(store: &dyn NotificationStore, routing_key: &str, body: &[u8]) -> Settlement {
    let drafts = match notifications_for_event(routing_key, body) {
        Ok(drafts) => drafts,
        Err(e) => {
            tracing::error!(error = %e, routing_key = %routing_key, "dropping event");
            return Settlement::Ack;
        }
    };

    tracing::info!(routing_key = %routing_key, notifications = drafts.len(), "received event");

    for draft in drafts {
        match store.create(draft) {
            Ok(_) => {}
            Err(AppError::Validation(reason)) => {
                tracing::error!(reason = %reason, routing_key = %routing_key, "dropping invalid notification");
            }
            Err(e) => {
                tracing::error!(error = %e, routing_key = %routing_key, "failed to create notification");
                return Settlement::Requeue;
            }
        }
    }

    Settlement::Ack
}

/// Consume `queue` until the channel closes, storing a notification per event.
async fn consume(
    state: Arc<AppState>,
    rabbitmq: RabbitMQClient,
    queue: &str,
    bindings: &[&str],
) -> anyhow::Result<()> {
    let mut consumer = rabbitmq.subscribe(queue, bindings).await?;

    tracing::info!(queue = %queue, "listening for events");

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(e) => {
                tracing::error!(error = %e, queue = %queue, "consumer error");
                continue;
            }
        };

        let settled = match process_event(state.store.as_ref(), delivery.routing_key.as_str(), &delivery.data) {
            Settlement::Ack => delivery.ack(BasicAckOptions::default()).await,
            Settlement::Requeue => {
                tokio::time::sleep(REQUEUE_DELAY).await;
                delivery
                    .nack(BasicNackOptions {
                        requeue: true,
                        ..BasicNackOptions::default()
                    })
                    .await
            }
        };

        if let Err(e) = settled {
            tracing::warn!(error = %e, queue = %queue, "failed to settle delivery");
        }
    }

    tracing::warn!(queue = %queue, "consumer stream ended");
    Ok(())
}

/// Likes, comments and follows.
pub async fn listen_social_events(state: Arc<AppState>, rabbitmq: RabbitMQClient) -> anyhow::Result<()> {
    consume(
        state,
        rabbitmq,
        SOCIAL_QUEUE,
        &[
            routing_keys::SOCIAL_LIKE_CREATED,
            routing_keys::SOCIAL_COMMENT_CREATED,
            routing_keys::SOCIAL_FOLLOW_CREATED,
        ],
    )
    .await
}

/// Direct messages.
pub async fn listen_messaging_events(state: Arc<AppState>, rabbitmq: RabbitMQClient) -> anyhow::Result<()> {
    consume(state, rabbitmq, MESSAGING_QUEUE, &[routing_keys::MESSAGING_MESSAGE_SENT]).await
}

/// Sign-ins and achievements.
pub async fn listen_account_events(state: Arc<AppState>, rabbitmq: RabbitMQClient) -> anyhow::Result<()> {
    consume(
        state,
        rabbitmq,
        ACCOUNT_QUEUE,
        &[
            routing_keys::AUTH_USER_LOGIN,
            routing_keys::GAMIFICATION_ACHIEVEMENT_UNLOCKED,
        ],
    )
    .await
}

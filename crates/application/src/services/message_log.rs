use std::sync::Arc;
use std::time::Duration;

use domain::{Message, MessageId, MessageText, RoomId, UserId};

use crate::{clock::Clock, error::ApplicationError, repository::MessageRepository};

use super::within;

/// 加入房间时回放的默认消息条数
pub const DEFAULT_HISTORY_LIMIT: u32 = 100;

pub struct MessageLogDependencies {
    pub message_repository: Arc<dyn MessageRepository>,
    pub clock: Arc<dyn Clock>,
    pub store_timeout: Duration,
}

pub struct MessageLog {
    deps: MessageLogDependencies,
}

impl MessageLog {
    pub fn new(deps: MessageLogDependencies) -> Self {
        Self { deps }
    }

    /// 校验并持久化一条消息，时间戳在此刻分配
    pub async fn append(
        &self,
        room_id: RoomId,
        sender_display_name: &str,
        text: &str,
        sender_ref: Option<UserId>,
    ) -> Result<Message, ApplicationError> {
        let text = MessageText::new(text)?;
        let message = Message::new(
            MessageId::generate(),
            room_id,
            sender_ref,
            sender_display_name,
            text,
            self.deps.clock.now(),
        )?;

        let stored = within(
            self.deps.store_timeout,
            self.deps.message_repository.insert(message),
        )
        .await?;
        tracing::debug!(room_id = %room_id, message_id = %stored.id, "message stored");
        Ok(stored)
    }

    /// 房间最近 `limit` 条消息，按时间升序
    pub async fn recent_history(
        &self,
        room_id: RoomId,
        limit: u32,
    ) -> Result<Vec<Message>, ApplicationError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut messages = within(
            self.deps.store_timeout,
            self.deps.message_repository.list_recent(room_id, limit),
        )
        .await?;
        messages.sort_by_key(|message| (message.timestamp, message.id));
        let excess = messages.len().saturating_sub(limit as usize);
        messages.drain(..excess);
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SteppingClock;
    use crate::repository::memory::InMemoryMessageRepository;

    fn log() -> MessageLog {
        MessageLog::new(MessageLogDependencies {
            message_repository: Arc::new(InMemoryMessageRepository::new()),
            clock: Arc::new(SteppingClock::default()),
            store_timeout: Duration::from_secs(5),
        })
    }

    #[tokio::test]
    async fn append_trims_and_enforces_length() {
        let log = log();
        let room_id = RoomId::generate();

        let stored = log
            .append(room_id, "a@example.com", "  hello  ", None)
            .await
            .unwrap();
        assert_eq!(stored.text.as_str(), "hello");
        assert_eq!(stored.sender_display_name, "a@example.com");

        assert!(log
            .append(room_id, "a@example.com", &"x".repeat(500), None)
            .await
            .is_ok());
        let err = log
            .append(room_id, "a@example.com", &"x".repeat(501), None)
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(log
            .append(room_id, "a@example.com", " \t ", None)
            .await
            .unwrap_err()
            .is_validation());

        assert_eq!(log.recent_history(room_id, 100).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn recent_history_is_bounded_and_ascending() {
        let log = log();
        let room_id = RoomId::generate();
        for i in 0..120 {
            log.append(room_id, "a@example.com", &format!("m{i}"), None)
                .await
                .unwrap();
        }

        let history = log
            .recent_history(room_id, DEFAULT_HISTORY_LIMIT)
            .await
            .unwrap();
        assert_eq!(history.len(), 100);
        assert_eq!(history[0].text.as_str(), "m20");
        assert_eq!(history[99].text.as_str(), "m119");
        assert!(history
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp));

        assert!(log
            .recent_history(RoomId::generate(), 100)
            .await
            .unwrap()
            .is_empty());
    }
}

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{MessageId, MessageText, RoomId, Timestamp, UserId};

/// 房间内的一条聊天记录，写入后不可变。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender_ref: Option<UserId>,
    pub sender_display_name: String,
    pub text: MessageText,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: Timestamp,
}

impl Message {
    pub fn new(
        id: MessageId,
        room_id: RoomId,
        sender_ref: Option<UserId>,
        sender_display_name: impl Into<String>,
        text: MessageText,
        timestamp: Timestamp,
    ) -> Result<Self, DomainError> {
        let sender_display_name = sender_display_name.into().trim().to_owned();
        if sender_display_name.is_empty() {
            return Err(DomainError::invalid_argument(
                "sender_display_name",
                "cannot be empty",
            ));
        }

        Ok(Self {
            id,
            room_id,
            sender_ref,
            sender_display_name,
            text,
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    #[test]
    fn sender_display_name_is_trimmed_and_required() {
        let text = MessageText::new("hi").unwrap();
        let message = Message::new(
            MessageId::generate(),
            RoomId::generate(),
            None,
            "  alice@example.com ",
            text.clone(),
            OffsetDateTime::now_utc(),
        )
        .unwrap();
        assert_eq!(message.sender_display_name, "alice@example.com");

        let err = Message::new(
            MessageId::generate(),
            RoomId::generate(),
            None,
            "   ",
            text,
            OffsetDateTime::now_utc(),
        )
        .unwrap_err();
        assert!(err.is_validation());
    }
}

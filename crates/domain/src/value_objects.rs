use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::errors::DomainError;

/// 统一的时间戳类型。
pub type Timestamp = OffsetDateTime;

/// 单条消息正文允许的最大字符数。
pub const MAX_MESSAGE_CHARS: usize = 500;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new(id: Uuid) -> Self {
                Self(id)
            }

            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$name> for Uuid {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

uuid_id!(
    /// 用户唯一标识（由外部认证服务签发）。
    UserId
);
uuid_id!(
    /// 聊天室唯一标识。
    RoomId
);
uuid_id!(
    /// 消息唯一标识。
    MessageId
);
uuid_id!(
    /// 实时连接标识，每条 WebSocket 连接一个。
    ConnectionId
);

impl RoomId {
    /// 只有形如 UUID 的标识才会被当作房间 ID 查询，其余一律按房间名处理。
    pub fn parse_identifier(identifier: &str) -> Option<Self> {
        Uuid::parse_str(identifier.trim()).ok().map(Self)
    }
}

/// 在线身份（通常是邮箱），也作为消息发送者显示名。只要求去除首尾空白后非空。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserEmail(String);

impl UserEmail {
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into().trim().to_owned();
        if value.is_empty() {
            return Err(DomainError::invalid_argument("email", "cannot be empty"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 去除首尾空白后的房间名，不能为空。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomName(String);

impl RoomName {
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid_argument("room_name", "cannot be empty"));
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RoomName> for String {
    fn from(value: RoomName) -> Self {
        value.0
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 消息正文：去除首尾空白，非空，最多 [`MAX_MESSAGE_CHARS`] 个字符。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageText(String);

impl MessageText {
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid_argument("text", "cannot be empty"));
        }
        if trimmed.chars().count() > MAX_MESSAGE_CHARS {
            return Err(DomainError::invalid_argument(
                "text",
                format!("cannot exceed {MAX_MESSAGE_CHARS} characters"),
            ));
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MessageText {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MessageText> for String {
    fn from(value: MessageText) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_text_is_trimmed() {
        let text = MessageText::new("  hello  ").unwrap();
        assert_eq!(text.as_str(), "hello");
    }

    #[test]
    fn message_text_length_limit_counts_characters() {
        assert!(MessageText::new("a".repeat(MAX_MESSAGE_CHARS)).is_ok());

        let err = MessageText::new("a".repeat(MAX_MESSAGE_CHARS + 1)).unwrap_err();
        assert!(err.is_validation());

        // 多字节字符按字符计数而不是字节
        assert!(MessageText::new("你".repeat(MAX_MESSAGE_CHARS)).is_ok());
    }

    #[test]
    fn whitespace_only_text_is_rejected() {
        assert!(MessageText::new(" \t\n ").is_err());
        assert!(MessageText::new("").is_err());
    }

    #[test]
    fn room_name_rejects_blank() {
        assert_eq!(RoomName::parse("  lobby ").unwrap().as_str(), "lobby");
        assert!(RoomName::parse("   ").unwrap_err().is_validation());
    }

    #[test]
    fn only_uuid_shaped_identifiers_are_room_ids() {
        let id = uuid::Uuid::new_v4();
        assert_eq!(RoomId::parse_identifier(&id.to_string()), Some(RoomId(id)));
        assert_eq!(RoomId::parse_identifier("general"), None);
    }

    #[test]
    fn identity_only_needs_to_be_non_blank() {
        assert!(UserEmail::parse("alice@example.com").is_ok());
        assert_eq!(UserEmail::parse(" alice ").unwrap().as_str(), "alice");
        assert!(UserEmail::parse("  ").is_err());
    }
}

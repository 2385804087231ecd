use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::room::Room;
use crate::value_objects::{Timestamp, UserId};

/// 系统消息使用的发送者名称
pub const SYSTEM_SENDER: &str = "System";

/// 客户端发往服务器的事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// 加入房间（房间 ID 或房间名）
    Join(JoinRequest),
    /// 在当前房间发送消息。正文按原样保留，非字符串由服务层拒绝
    ChatMessage(serde_json::Value),
    /// 正在输入状态
    Typing(bool),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub email: String,
    pub room_id: String,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

/// 服务器推送给客户端的事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// 加入房间后回放的最近消息（按时间升序）
    ChatHistory(Vec<Message>),
    /// 房间当前在线成员
    RoomUsers(Vec<RoomUser>),
    /// 聊天消息或系统消息
    Message(ChatLine),
    TypingStatus(TypingStatus),
    /// 面向用户的错误描述，只发给触发事件的连接
    Error(String),
    /// 新房间被创建，发给所有连接
    RoomCreated(Room),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::ChatHistory(_) => "chatHistory",
            ServerEvent::RoomUsers(_) => "roomUsers",
            ServerEvent::Message(_) => "message",
            ServerEvent::TypingStatus(_) => "typingStatus",
            ServerEvent::Error(_) => "error",
            ServerEvent::RoomCreated(_) => "roomCreated",
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error(message.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomUser {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingStatus {
    pub email: String,
    pub is_typing: bool,
}

/// 广播给房间成员的消息体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatLine {
    pub sender_display_name: String,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: Timestamp,
}

impl ChatLine {
    pub fn system(text: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            sender_display_name: SYSTEM_SENDER.to_owned(),
            text: text.into(),
            timestamp,
        }
    }
}

impl From<&Message> for ChatLine {
    fn from(message: &Message) -> Self {
        Self {
            sender_display_name: message.sender_display_name.clone(),
            text: message.text.as_str().to_owned(),
            timestamp: message.timestamp,
        }
    }
}

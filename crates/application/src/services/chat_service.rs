use std::sync::Arc;

use domain::{
    ChatLine, ClientEvent, ConnectionId, DomainError, Message, Room, RoomId, ServerEvent,
    TypingStatus, UserEmail, UserId,
};

use crate::{
    broadcaster::{EventBroadcast, EventBroadcaster},
    clock::Clock,
    error::ApplicationError,
    presence::{ConnectionRegistry, PresenceRecord},
};

use super::{MessageLog, RoomDirectory};

pub const JOIN_FAILED: &str = "Failed to join room";
pub const HISTORY_LOAD_FAILED: &str = "Failed to load chat history";
pub const SEND_REJECTED: &str = "Cannot send empty message or user not in a room";
pub const SEND_FAILED: &str = "Failed to send message";

#[derive(Debug, Clone)]
pub struct JoinRoomRequest {
    pub email: String,
    /// 房间 ID 或房间名
    pub room_identifier: String,
    pub user_ref: Option<UserId>,
}

pub struct ChatServiceDependencies {
    pub registry: Arc<ConnectionRegistry>,
    pub room_directory: Arc<RoomDirectory>,
    pub message_log: Arc<MessageLog>,
    pub broadcaster: Arc<dyn EventBroadcaster>,
    pub clock: Arc<dyn Clock>,
    pub history_limit: u32,
}

/// 实时聊天协议：加入房间、消息扇出、输入状态与断线清理。
///
/// 面向用户的失败都会以 `error` 事件回给发起连接，同时以 `Err` 返回给调用方记日志。
pub struct ChatService {
    deps: ChatServiceDependencies,
}

impl ChatService {
    pub fn new(deps: ChatServiceDependencies) -> Self {
        Self { deps }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.deps.registry
    }

    /// 连接建立，之后才能登记在线状态
    pub async fn connect(&self, connection_id: ConnectionId) {
        if !self.deps.registry.open(connection_id).await {
            tracing::warn!(connection_id = %connection_id, "connection opened twice");
        }
    }

    /// 分发一条入站事件；连接关闭后的事件一律丢弃
    pub async fn handle_event(
        &self,
        connection_id: ConnectionId,
        event: ClientEvent,
    ) -> Result<(), ApplicationError> {
        if !self.deps.registry.is_open(connection_id).await {
            return Err(ApplicationError::ConnectionClosed);
        }

        match event {
            ClientEvent::Join(join) => self
                .join(
                    connection_id,
                    JoinRoomRequest {
                        email: join.email,
                        room_identifier: join.room_id,
                        user_ref: join.user_id,
                    },
                )
                .await
                .map(|_| ()),
            ClientEvent::ChatMessage(payload) => match payload.as_str() {
                Some(text) => self.send_message(connection_id, text).await.map(|_| ()),
                None => {
                    self.reply_error(connection_id, SEND_REJECTED).await;
                    Err(DomainError::invalid_argument("text", "must be a string").into())
                }
            },
            ClientEvent::Typing(is_typing) => self.set_typing(connection_id, is_typing).await,
        }
    }

    pub async fn join(
        &self,
        connection_id: ConnectionId,
        request: JoinRoomRequest,
    ) -> Result<Room, ApplicationError> {
        let email = match UserEmail::parse(request.email) {
            Ok(email) => email,
            Err(err) => {
                self.reply_error(connection_id, JOIN_FAILED).await;
                return Err(err.into());
            }
        };

        // 先离开当前房间，之后任何失败都让连接停在未加入状态
        if let Some(previous) = self.deps.registry.remove(connection_id).await {
            self.leave_current_room(connection_id, &previous).await;
        }

        let room = match self
            .deps
            .room_directory
            .find_or_create(&request.room_identifier)
            .await
        {
            Ok(room) => room,
            Err(err) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    room = %request.room_identifier,
                    error = %err,
                    "join failed"
                );
                self.reply_error(connection_id, JOIN_FAILED).await;
                return Err(err);
            }
        };

        if let Err(err) = self.deps.broadcaster.join_group(connection_id, room.id).await {
            tracing::error!(connection_id = %connection_id, room_id = %room.id, error = %err, "join_group failed");
            self.reply_error(connection_id, JOIN_FAILED).await;
            return Err(err.into());
        }

        let registered = self
            .deps
            .registry
            .register(PresenceRecord {
                connection_id,
                identity_email: email.clone(),
                current_room_id: room.id,
                user_ref: request.user_ref,
            })
            .await;
        if !registered {
            // 断线已先于此处处理完毕，不能再复活在线记录
            tracing::debug!(connection_id = %connection_id, room_id = %room.id, "join finished after disconnect");
            self.leave_group(connection_id, room.id).await;
            return Err(ApplicationError::ConnectionClosed);
        }

        match self
            .deps
            .message_log
            .recent_history(room.id, self.deps.history_limit)
            .await
        {
            Ok(history) => {
                self.deliver(EventBroadcast::to_connection(
                    connection_id,
                    ServerEvent::ChatHistory(history),
                ))
                .await
            }
            Err(err) => {
                tracing::warn!(room_id = %room.id, error = %err, "history load failed");
                self.reply_error(connection_id, HISTORY_LOAD_FAILED).await;
            }
        }

        self.publish_room_users(room.id).await;

        let now = self.deps.clock.now();
        self.deliver(EventBroadcast::to_connection(
            connection_id,
            ServerEvent::Message(ChatLine::system(
                format!("Welcome to {}, {}!", room.name, email),
                now,
            )),
        ))
        .await;
        self.deliver(EventBroadcast::to_room_except(
            room.id,
            connection_id,
            ServerEvent::Message(ChatLine::system(format!("{email} has joined the room."), now)),
        ))
        .await;

        tracing::info!(connection_id = %connection_id, room_id = %room.id, email = %email, "joined room");
        Ok(room)
    }

    pub async fn send_message(
        &self,
        connection_id: ConnectionId,
        raw_text: &str,
    ) -> Result<Message, ApplicationError> {
        let Some(record) = self.deps.registry.lookup(connection_id).await else {
            self.reply_error(connection_id, SEND_REJECTED).await;
            return Err(DomainError::NotInRoom.into());
        };
        if raw_text.trim().is_empty() {
            self.reply_error(connection_id, SEND_REJECTED).await;
            return Err(DomainError::invalid_argument("text", "cannot be empty").into());
        }

        let message = match self
            .deps
            .message_log
            .append(
                record.current_room_id,
                record.identity_email.as_str(),
                raw_text,
                record.user_ref,
            )
            .await
        {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    room_id = %record.current_room_id,
                    error = %err,
                    "message append failed"
                );
                self.reply_error(connection_id, SEND_FAILED).await;
                return Err(err);
            }
        };

        self.deliver(EventBroadcast::to_room(
            message.room_id,
            ServerEvent::Message(ChatLine::from(&message)),
        ))
        .await;
        Ok(message)
    }

    /// 没有在线记录时静默忽略
    pub async fn set_typing(
        &self,
        connection_id: ConnectionId,
        is_typing: bool,
    ) -> Result<(), ApplicationError> {
        if let Some(record) = self.deps.registry.lookup(connection_id).await {
            self.deliver(EventBroadcast::to_room_except(
                record.current_room_id,
                connection_id,
                ServerEvent::TypingStatus(TypingStatus {
                    email: record.identity_email.as_str().to_owned(),
                    is_typing,
                }),
            ))
            .await;
        }
        Ok(())
    }

    /// 连接断开，终态。返回断开前的在线记录。
    pub async fn disconnect(&self, connection_id: ConnectionId) -> Option<PresenceRecord> {
        let record = self.deps.registry.close(connection_id).await?;
        let room_id = record.current_room_id;

        self.leave_group(connection_id, room_id).await;
        self.publish_room_users(room_id).await;
        self.deliver(EventBroadcast::to_room(
            room_id,
            ServerEvent::Message(ChatLine::system(
                format!("{} has left the room.", record.identity_email),
                self.deps.clock.now(),
            )),
        ))
        .await;

        tracing::info!(connection_id = %connection_id, room_id = %room_id, "left room on disconnect");
        Some(record)
    }

    async fn leave_current_room(&self, connection_id: ConnectionId, previous: &PresenceRecord) {
        self.leave_group(connection_id, previous.current_room_id)
            .await;
        self.publish_room_users(previous.current_room_id).await;
    }

    async fn publish_room_users(&self, room_id: RoomId) {
        let users = self.deps.registry.list_in_room(room_id).await;
        self.deliver(EventBroadcast::to_room(room_id, ServerEvent::RoomUsers(users)))
            .await;
    }

    async fn leave_group(&self, connection_id: ConnectionId, room_id: RoomId) {
        if let Err(err) = self.deps.broadcaster.leave_group(connection_id, room_id).await {
            tracing::error!(connection_id = %connection_id, room_id = %room_id, error = %err, "leave_group failed");
        }
    }

    async fn reply_error(&self, connection_id: ConnectionId, message: &str) {
        self.deliver(EventBroadcast::to_connection(
            connection_id,
            ServerEvent::error(message),
        ))
        .await;
    }

    // 推送失败只记日志，不影响已完成的状态变更
    async fn deliver(&self, payload: EventBroadcast) {
        let event = payload.event.name();
        if let Err(err) = self.deps.broadcaster.broadcast(payload).await {
            tracing::error!(event, error = %err, "event delivery failed");
        }
    }
}

use async_trait::async_trait;
use domain::{ConnectionId, RoomId, ServerEvent};
use thiserror::Error;

/// 事件的投递对象
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// 单个连接
    Connection(ConnectionId),
    /// 房间传输分组内的所有连接
    Room(RoomId),
    /// 房间内除指定连接外的所有连接
    RoomExcept {
        room_id: RoomId,
        except: ConnectionId,
    },
    /// 进程内所有连接
    Everyone,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventBroadcast {
    pub audience: Audience,
    pub event: ServerEvent,
}

impl EventBroadcast {
    pub fn to_connection(connection_id: ConnectionId, event: ServerEvent) -> Self {
        Self {
            audience: Audience::Connection(connection_id),
            event,
        }
    }

    pub fn to_room(room_id: RoomId, event: ServerEvent) -> Self {
        Self {
            audience: Audience::Room(room_id),
            event,
        }
    }

    pub fn to_room_except(room_id: RoomId, except: ConnectionId, event: ServerEvent) -> Self {
        Self {
            audience: Audience::RoomExcept { room_id, except },
            event,
        }
    }

    pub fn to_everyone(event: ServerEvent) -> Self {
        Self {
            audience: Audience::Everyone,
            event,
        }
    }
}

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("broadcast failed: {0}")]
    Failed(String),
}

/// 传输层抽象：房间分组成员关系与事件推送。
///
/// 推送是尽力而为的，只面向当前在线的连接。
#[async_trait]
pub trait EventBroadcaster: Send + Sync {
    /// 将连接加入房间分组，连接同一时刻最多属于一个分组
    async fn join_group(
        &self,
        connection_id: ConnectionId,
        room_id: RoomId,
    ) -> Result<(), BroadcastError>;

    async fn leave_group(
        &self,
        connection_id: ConnectionId,
        room_id: RoomId,
    ) -> Result<(), BroadcastError>;

    async fn broadcast(&self, payload: EventBroadcast) -> Result<(), BroadcastError>;
}

//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务：房间目录、消息日志、
//! 连接在线登记，以及加入房间 / 消息扇出的实时协议。
//! 持久化与事件推送通过 trait 抽象，由基础设施层和 Web 层注入。

pub mod broadcaster;
pub mod clock;
pub mod error;
pub mod local_broadcast;
pub mod presence;
pub mod repository;
pub mod services;

pub use broadcaster::{Audience, BroadcastError, EventBroadcast, EventBroadcaster};
pub use clock::{Clock, SteppingClock, SystemClock};
pub use error::ApplicationError;
pub use local_broadcast::LocalEventHub;
pub use presence::{ConnectionRegistry, PresenceRecord};
pub use repository::{MessageRepository, RoomRepository};
pub use repository::memory::{InMemoryMessageRepository, InMemoryRoomRepository};
pub use services::{
    ChatService, ChatServiceDependencies, JoinRoomRequest, MessageLog, MessageLogDependencies,
    RoomDirectory, RoomDirectoryDependencies, DEFAULT_HISTORY_LIMIT, HISTORY_LOAD_FAILED,
    JOIN_FAILED, SEND_FAILED, SEND_REJECTED,
};

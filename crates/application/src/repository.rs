use async_trait::async_trait;
use domain::{Message, RepositoryError, Room, RoomId, RoomName};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// 持久化新房间；名称或 ID 重复时返回 `RepositoryError::Conflict`
    async fn insert(&self, room: Room) -> Result<Room, RepositoryError>;
    async fn find_by_id(&self, id: RoomId) -> Result<Option<Room>, RepositoryError>;
    // 名称已去除首尾空白，精确匹配
    async fn find_by_name(&self, name: RoomName) -> Result<Option<Room>, RepositoryError>;
    /// 按创建时间升序列出所有房间
    async fn list_all(&self) -> Result<Vec<Room>, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    // 保存消息，返回后即已持久化
    async fn insert(&self, message: Message) -> Result<Message, RepositoryError>;

    // 房间最近的 limit 条消息，按时间升序返回
    async fn list_recent(&self, room_id: RoomId, limit: u32)
        -> Result<Vec<Message>, RepositoryError>;
}

/// 内存实现，用于测试和无数据库的本地运行
pub mod memory {
    use std::collections::HashMap;

    use super::*;
    use tokio::sync::RwLock;

    #[derive(Default)]
    pub struct InMemoryRoomRepository {
        rooms: RwLock<Vec<Room>>,
    }

    impl InMemoryRoomRepository {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl RoomRepository for InMemoryRoomRepository {
        async fn insert(&self, room: Room) -> Result<Room, RepositoryError> {
            let mut rooms = self.rooms.write().await;
            if rooms
                .iter()
                .any(|existing| existing.id == room.id || existing.name == room.name)
            {
                return Err(RepositoryError::Conflict);
            }
            rooms.push(room.clone());
            Ok(room)
        }

        async fn find_by_id(&self, id: RoomId) -> Result<Option<Room>, RepositoryError> {
            let rooms = self.rooms.read().await;
            Ok(rooms.iter().find(|room| room.id == id).cloned())
        }

        async fn find_by_name(&self, name: RoomName) -> Result<Option<Room>, RepositoryError> {
            let rooms = self.rooms.read().await;
            Ok(rooms.iter().find(|room| room.name == name).cloned())
        }

        async fn list_all(&self) -> Result<Vec<Room>, RepositoryError> {
            let mut rooms = self.rooms.read().await.clone();
            rooms.sort_by_key(|room| room.created_at);
            Ok(rooms)
        }
    }

    #[derive(Default)]
    pub struct InMemoryMessageRepository {
        messages: RwLock<HashMap<RoomId, Vec<Message>>>,
    }

    impl InMemoryMessageRepository {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl MessageRepository for InMemoryMessageRepository {
        async fn insert(&self, message: Message) -> Result<Message, RepositoryError> {
            let mut messages = self.messages.write().await;
            let entries = messages.entry(message.room_id).or_default();
            if entries.iter().any(|existing| existing.id == message.id) {
                return Err(RepositoryError::Conflict);
            }
            entries.push(message.clone());
            Ok(message)
        }

        async fn list_recent(
            &self,
            room_id: RoomId,
            limit: u32,
        ) -> Result<Vec<Message>, RepositoryError> {
            let messages = self.messages.read().await;
            let Some(entries) = messages.get(&room_id) else {
                return Ok(Vec::new());
            };
            let mut sorted = entries.clone();
            sorted.sort_by_key(|message| (message.timestamp, message.id));
            let skip = sorted.len().saturating_sub(limit as usize);
            Ok(sorted.split_off(skip))
        }
    }
}

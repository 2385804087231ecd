use std::sync::Arc;
use std::time::Duration;

use domain::{DomainError, RepositoryError, Room, RoomId, RoomName, ServerEvent};

use crate::{
    broadcaster::{EventBroadcast, EventBroadcaster},
    clock::Clock,
    error::ApplicationError,
    repository::RoomRepository,
};

use super::within;

pub struct RoomDirectoryDependencies {
    pub room_repository: Arc<dyn RoomRepository>,
    pub broadcaster: Arc<dyn EventBroadcaster>,
    pub clock: Arc<dyn Clock>,
    pub store_timeout: Duration,
}

/// 房间目录：按 ID 或名称查找房间，必要时创建。
pub struct RoomDirectory {
    deps: RoomDirectoryDependencies,
}

impl RoomDirectory {
    pub fn new(deps: RoomDirectoryDependencies) -> Self {
        Self { deps }
    }

    pub async fn find_by_id(&self, id: RoomId) -> Result<Option<Room>, ApplicationError> {
        within(
            self.deps.store_timeout,
            self.deps.room_repository.find_by_id(id),
        )
        .await
    }

    /// 空白名称不可能对应任何房间，直接返回 `None`
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Room>, ApplicationError> {
        let Ok(name) = RoomName::parse(name) else {
            return Ok(None);
        };
        within(
            self.deps.store_timeout,
            self.deps.room_repository.find_by_name(name),
        )
        .await
    }

    /// 先按 ID（仅当标识符形如 UUID）再按名称查找，都找不到则以该名称创建。
    ///
    /// 并发创建同名房间时唯一约束会让后到者失败，此时重新按名称查找一次，
    /// 两个调用方拿到同一个房间。
    pub async fn find_or_create(&self, identifier: &str) -> Result<Room, ApplicationError> {
        let name = RoomName::parse(identifier)?;

        if let Some(id) = RoomId::parse_identifier(identifier) {
            if let Some(room) = self.find_by_id(id).await? {
                return Ok(room);
            }
        }

        if let Some(room) = self.lookup_name(&name).await? {
            return Ok(room);
        }

        match self.insert(name.clone()).await {
            Ok(room) => Ok(room),
            Err(ApplicationError::Repository(RepositoryError::Conflict)) => {
                tracing::debug!(name = %name, "room created concurrently, retrying lookup");
                self.lookup_name(&name)
                    .await?
                    .ok_or(ApplicationError::Repository(RepositoryError::NotFound))
            }
            Err(err) => Err(err),
        }
    }

    /// 显式创建房间，名称已存在时返回 `RoomAlreadyExists`
    pub async fn create(&self, name: &str) -> Result<Room, ApplicationError> {
        let name = RoomName::parse(name)?;

        if self.lookup_name(&name).await?.is_some() {
            return Err(DomainError::room_already_exists(name.as_str()).into());
        }

        match self.insert(name.clone()).await {
            Err(ApplicationError::Repository(RepositoryError::Conflict)) => {
                Err(DomainError::room_already_exists(name.as_str()).into())
            }
            other => other,
        }
    }

    pub async fn list_all(&self) -> Result<Vec<Room>, ApplicationError> {
        let mut rooms = within(self.deps.store_timeout, self.deps.room_repository.list_all()).await?;
        rooms.sort_by_key(|room| room.created_at);
        Ok(rooms)
    }

    async fn lookup_name(&self, name: &RoomName) -> Result<Option<Room>, ApplicationError> {
        within(
            self.deps.store_timeout,
            self.deps.room_repository.find_by_name(name.clone()),
        )
        .await
    }

    // 插入成功后才通知，冲突的那一方不会重复发送 roomCreated
    async fn insert(&self, name: RoomName) -> Result<Room, ApplicationError> {
        let room = Room::new(RoomId::generate(), name, self.deps.clock.now());
        let stored = within(
            self.deps.store_timeout,
            self.deps.room_repository.insert(room),
        )
        .await?;

        tracing::info!(room_id = %stored.id, name = %stored.name, "room created");
        if let Err(err) = self
            .deps
            .broadcaster
            .broadcast(EventBroadcast::to_everyone(ServerEvent::RoomCreated(
                stored.clone(),
            )))
            .await
        {
            tracing::error!(room_id = %stored.id, error = %err, "roomCreated broadcast failed");
        }
        Ok(stored)
    }
}

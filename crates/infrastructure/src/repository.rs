use std::sync::Arc;

use application::{MessageRepository, RoomRepository};
use async_trait::async_trait;
use domain::{
    Message, MessageId, MessageText, RepositoryError, Room, RoomId, RoomName, UserId,
};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::RowNotFound => RepositoryError::NotFound,
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            tracing::debug!(constraint = ?db_err.constraint(), "unique violation");
            RepositoryError::Conflict
        }
        _ => RepositoryError::storage(err.to_string()),
    }
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

#[derive(Debug, FromRow)]
struct RoomRecord {
    id: Uuid,
    name: String,
    created_at: OffsetDateTime,
}

impl TryFrom<RoomRecord> for Room {
    type Error = RepositoryError;

    fn try_from(value: RoomRecord) -> Result<Self, Self::Error> {
        let name = RoomName::parse(value.name).map_err(|err| invalid_data(err.to_string()))?;
        Ok(Room::new(RoomId::from(value.id), name, value.created_at))
    }
}

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: Uuid,
    room_id: Uuid,
    sender_ref: Option<Uuid>,
    sender_display_name: String,
    text: String,
    created_at: OffsetDateTime,
}

impl TryFrom<MessageRecord> for Message {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let text = MessageText::new(value.text).map_err(|err| invalid_data(err.to_string()))?;
        Message::new(
            MessageId::from(value.id),
            RoomId::from(value.room_id),
            value.sender_ref.map(UserId::from),
            value.sender_display_name,
            text,
            value.created_at,
        )
        .map_err(|err| invalid_data(err.to_string()))
    }
}

#[derive(Clone)]
pub struct PgRoomRepository {
    pool: PgPool,
}

impl PgRoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomRepository for PgRoomRepository {
    async fn insert(&self, room: Room) -> Result<Room, RepositoryError> {
        let record = sqlx::query_as::<_, RoomRecord>(
            r#"
            INSERT INTO rooms (id, name, created_at)
            VALUES ($1, $2, $3)
            RETURNING id, name, created_at
            "#,
        )
        .bind(Uuid::from(room.id))
        .bind(room.name.as_str())
        .bind(room.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Room::try_from(record)
    }

    async fn find_by_id(&self, id: RoomId) -> Result<Option<Room>, RepositoryError> {
        let record = sqlx::query_as::<_, RoomRecord>(
            r#"SELECT id, name, created_at FROM rooms WHERE id = $1"#,
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Room::try_from).transpose()
    }

    async fn find_by_name(&self, name: RoomName) -> Result<Option<Room>, RepositoryError> {
        let record = sqlx::query_as::<_, RoomRecord>(
            r#"SELECT id, name, created_at FROM rooms WHERE name = $1"#,
        )
        .bind(name.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Room::try_from).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Room>, RepositoryError> {
        let records = sqlx::query_as::<_, RoomRecord>(
            r#"SELECT id, name, created_at FROM rooms ORDER BY created_at ASC, id ASC"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Room::try_from).collect()
    }
}

#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn insert(&self, message: Message) -> Result<Message, RepositoryError> {
        let record = sqlx::query_as::<_, MessageRecord>(
            r#"
            INSERT INTO messages (id, room_id, sender_ref, sender_display_name, text, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, room_id, sender_ref, sender_display_name, text, created_at
            "#,
        )
        .bind(Uuid::from(message.id))
        .bind(Uuid::from(message.room_id))
        .bind(message.sender_ref.map(Uuid::from))
        .bind(&message.sender_display_name)
        .bind(message.text.as_str())
        .bind(message.timestamp)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Message::try_from(record)
    }

    async fn list_recent(
        &self,
        room_id: RoomId,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError> {
        // 先倒序取最近的 limit 条，再翻转成升序；同一时刻的消息按 id 排
        let records = sqlx::query_as::<_, MessageRecord>(
            r#"SELECT id, room_id, sender_ref, sender_display_name, text, created_at
            FROM messages
            WHERE room_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2"#,
        )
        .bind(Uuid::from(room_id))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        let mut items: Vec<Message> = records
            .into_iter()
            .map(Message::try_from)
            .collect::<Result<_, _>>()?;
        items.reverse();
        Ok(items)
    }
}

#[derive(Clone)]
pub struct PgStorage {
    pub pool: PgPool,
    pub room_repository: Arc<PgRoomRepository>,
    pub message_repository: Arc<PgMessageRepository>,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            room_repository: Arc::new(PgRoomRepository::new(pool.clone())),
            message_repository: Arc::new(PgMessageRepository::new(pool.clone())),
            pool,
        }
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert_eq!(map_sqlx_err(sqlx::Error::RowNotFound), RepositoryError::NotFound);
    }

    #[test]
    fn other_errors_map_to_storage() {
        let err = map_sqlx_err(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, RepositoryError::Storage { .. }));
    }

    #[test]
    fn blank_room_record_is_rejected() {
        let record = RoomRecord {
            id: Uuid::new_v4(),
            name: "   ".into(),
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        assert!(Room::try_from(record).is_err());
    }

    #[test]
    fn message_record_converts() {
        let record = MessageRecord {
            id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            sender_ref: None,
            sender_display_name: "a@example.com".into(),
            text: "hello".into(),
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let message = Message::try_from(record).unwrap();
        assert_eq!(message.text.as_str(), "hello");
        assert!(message.sender_ref.is_none());
    }
}

use std::collections::{HashMap, HashSet};

use domain::{ConnectionId, RoomId, RoomUser, UserEmail, UserId};
use tokio::sync::RwLock;

/// 在线连接的身份与当前房间
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceRecord {
    pub connection_id: ConnectionId,
    pub identity_email: UserEmail,
    pub current_room_id: RoomId,
    pub user_ref: Option<UserId>,
}

struct Entry {
    record: PresenceRecord,
    // 加入顺序，用于稳定地列出房间成员
    seq: u64,
}

#[derive(Default)]
struct RegistryState {
    open: HashSet<ConnectionId>,
    presence: HashMap<ConnectionId, Entry>,
    next_seq: u64,
}

/// 进程内的连接在线登记表
///
/// 连接建立时 `open`，断开时 `close`。已关闭的连接不会再被登记，
/// 这样在存储 I/O 期间先处理完的断开事件不会被迟到的加入覆盖。
/// 锁内只做内存操作。
#[derive(Default)]
pub struct ConnectionRegistry {
    state: RwLock<RegistryState>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 标记连接为存活，重复打开返回 `false`
    pub async fn open(&self, connection_id: ConnectionId) -> bool {
        self.state.write().await.open.insert(connection_id)
    }

    /// 关闭连接并返回其在线记录（如有）。之后该连接不能再登记。
    pub async fn close(&self, connection_id: ConnectionId) -> Option<PresenceRecord> {
        let mut state = self.state.write().await;
        state.open.remove(&connection_id);
        let removed = state.presence.remove(&connection_id).map(|entry| entry.record);
        tracing::debug!(
            connection_id = %connection_id,
            email = removed.as_ref().map(|record| record.identity_email.as_str()).unwrap_or("unknown"),
            "connection closed"
        );
        removed
    }

    pub async fn is_open(&self, connection_id: ConnectionId) -> bool {
        self.state.read().await.open.contains(&connection_id)
    }

    /// 插入或覆盖在线记录；连接未打开或已关闭时不做任何修改并返回 `false`
    pub async fn register(&self, record: PresenceRecord) -> bool {
        let mut state = self.state.write().await;
        if !state.open.contains(&record.connection_id) {
            return false;
        }

        let seq = match state.presence.get(&record.connection_id) {
            Some(entry) if entry.record.current_room_id == record.current_room_id => entry.seq,
            _ => {
                state.next_seq += 1;
                state.next_seq
            }
        };

        tracing::debug!(
            connection_id = %record.connection_id,
            email = %record.identity_email,
            room_id = %record.current_room_id,
            "presence registered"
        );
        state
            .presence
            .insert(record.connection_id, Entry { record, seq });
        true
    }

    /// 删除并返回在线记录，连接本身保持打开
    pub async fn remove(&self, connection_id: ConnectionId) -> Option<PresenceRecord> {
        self.state
            .write()
            .await
            .presence
            .remove(&connection_id)
            .map(|entry| entry.record)
    }

    pub async fn lookup(&self, connection_id: ConnectionId) -> Option<PresenceRecord> {
        self.state
            .read()
            .await
            .presence
            .get(&connection_id)
            .map(|entry| entry.record.clone())
    }

    /// 房间当前成员快照（按加入顺序）
    pub async fn list_in_room(&self, room_id: RoomId) -> Vec<RoomUser> {
        let state = self.state.read().await;
        let mut members: Vec<&Entry> = state
            .presence
            .values()
            .filter(|entry| entry.record.current_room_id == room_id)
            .collect();
        members.sort_by_key(|entry| entry.seq);
        members
            .into_iter()
            .map(|entry| RoomUser {
                email: entry.record.identity_email.as_str().to_owned(),
            })
            .collect()
    }

    pub async fn open_connections(&self) -> usize {
        self.state.read().await.open.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(connection_id: ConnectionId, email: &str, room_id: RoomId) -> PresenceRecord {
        PresenceRecord {
            connection_id,
            identity_email: UserEmail::parse(email).unwrap(),
            current_room_id: room_id,
            user_ref: None,
        }
    }

    fn emails(users: Vec<RoomUser>) -> Vec<String> {
        users.into_iter().map(|user| user.email).collect()
    }

    #[tokio::test]
    async fn register_overwrites_single_record_per_connection() {
        let registry = ConnectionRegistry::new();
        let conn = ConnectionId::generate();
        let (lobby, games) = (RoomId::generate(), RoomId::generate());
        assert!(registry.open(conn).await);

        assert!(registry.register(record(conn, "a@example.com", lobby)).await);
        assert!(registry.register(record(conn, "a@example.com", games)).await);

        assert!(registry.list_in_room(lobby).await.is_empty());
        assert_eq!(emails(registry.list_in_room(games).await), ["a@example.com"]);
        assert_eq!(
            registry.lookup(conn).await.map(|r| r.current_room_id),
            Some(games)
        );
    }

    #[tokio::test]
    async fn members_are_listed_in_join_order() {
        let registry = ConnectionRegistry::new();
        let room = RoomId::generate();
        let conns: Vec<_> = (0..3).map(|_| ConnectionId::generate()).collect();
        for (i, conn) in conns.iter().enumerate() {
            registry.open(*conn).await;
            registry
                .register(record(*conn, &format!("u{i}@example.com"), room))
                .await;
        }

        assert_eq!(
            emails(registry.list_in_room(room).await),
            ["u0@example.com", "u1@example.com", "u2@example.com"]
        );

        let removed = registry.remove(conns[1]).await.unwrap();
        assert_eq!(removed.identity_email.as_str(), "u1@example.com");
        assert!(registry.remove(conns[1]).await.is_none());
        assert_eq!(
            emails(registry.list_in_room(room).await),
            ["u0@example.com", "u2@example.com"]
        );
    }

    #[tokio::test]
    async fn closed_connection_cannot_be_registered_again() {
        let registry = ConnectionRegistry::new();
        let conn = ConnectionId::generate();
        let room = RoomId::generate();

        // 未打开的连接不会被登记
        assert!(!registry.register(record(conn, "a@example.com", room)).await);

        registry.open(conn).await;
        registry.register(record(conn, "a@example.com", room)).await;
        let closed = registry.close(conn).await;
        assert_eq!(closed.map(|r| r.current_room_id), Some(room));

        assert!(!registry.register(record(conn, "a@example.com", room)).await);
        assert!(registry.lookup(conn).await.is_none());
        assert!(!registry.is_open(conn).await);
        assert_eq!(registry.open_connections().await, 0);
    }
}

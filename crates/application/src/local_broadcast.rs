// 进程内的事件分发器实现
use std::collections::HashMap;

use async_trait::async_trait;
use domain::{ConnectionId, RoomId, ServerEvent};
use tokio::sync::{mpsc, RwLock};

use crate::broadcaster::{Audience, BroadcastError, EventBroadcast, EventBroadcaster};

#[derive(Default)]
struct HubState {
    senders: HashMap<ConnectionId, mpsc::Sender<ServerEvent>>,
    groups: HashMap<ConnectionId, RoomId>,
}

/// 单进程的连接集线器
///
/// 每条连接注册一个有界发送队列，广播时按投递对象解析收件人后逐个 `try_send`。
/// 队列已满的连接会丢弃该事件，不阻塞其他连接。
pub struct LocalEventHub {
    state: RwLock<HubState>,
    buffer: usize,
}

impl LocalEventHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            state: RwLock::new(HubState::default()),
            buffer: buffer.max(1),
        }
    }

    /// 注册连接，返回该连接的出站事件接收端
    pub async fn attach(&self, connection_id: ConnectionId) -> mpsc::Receiver<ServerEvent> {
        let (sender, receiver) = mpsc::channel(self.buffer);
        let mut state = self.state.write().await;
        if state.senders.insert(connection_id, sender).is_some() {
            tracing::warn!(connection_id = %connection_id, "connection re-attached, previous queue dropped");
        }
        receiver
    }

    /// 注销连接，同时移除其分组成员关系
    pub async fn detach(&self, connection_id: ConnectionId) {
        let mut state = self.state.write().await;
        state.senders.remove(&connection_id);
        state.groups.remove(&connection_id);
    }

    pub async fn connection_count(&self) -> usize {
        self.state.read().await.senders.len()
    }

    pub async fn group_of(&self, connection_id: ConnectionId) -> Option<RoomId> {
        self.state.read().await.groups.get(&connection_id).copied()
    }

    fn recipients(state: &HubState, audience: Audience) -> Vec<ConnectionId> {
        match audience {
            Audience::Connection(id) => vec![id],
            Audience::Room(room_id) => state
                .groups
                .iter()
                .filter(|(_, group)| **group == room_id)
                .map(|(id, _)| *id)
                .collect(),
            Audience::RoomExcept { room_id, except } => state
                .groups
                .iter()
                .filter(|(id, group)| **group == room_id && **id != except)
                .map(|(id, _)| *id)
                .collect(),
            Audience::Everyone => state.senders.keys().copied().collect(),
        }
    }
}

impl Default for LocalEventHub {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EventBroadcaster for LocalEventHub {
    async fn join_group(
        &self,
        connection_id: ConnectionId,
        room_id: RoomId,
    ) -> Result<(), BroadcastError> {
        let mut state = self.state.write().await;
        if !state.senders.contains_key(&connection_id) {
            // 连接已经断开，分组没有意义
            tracing::debug!(connection_id = %connection_id, room_id = %room_id, "join_group for detached connection ignored");
            return Ok(());
        }
        state.groups.insert(connection_id, room_id);
        Ok(())
    }

    async fn leave_group(
        &self,
        connection_id: ConnectionId,
        room_id: RoomId,
    ) -> Result<(), BroadcastError> {
        let mut state = self.state.write().await;
        if state.groups.get(&connection_id) == Some(&room_id) {
            state.groups.remove(&connection_id);
        }
        Ok(())
    }

    async fn broadcast(&self, payload: EventBroadcast) -> Result<(), BroadcastError> {
        let state = self.state.read().await;
        let recipients = Self::recipients(&state, payload.audience);
        let mut dropped = 0usize;

        for connection_id in recipients {
            let Some(sender) = state.senders.get(&connection_id) else {
                continue;
            };
            match sender.try_send(payload.event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    dropped += 1;
                    tracing::warn!(
                        connection_id = %connection_id,
                        event = payload.event.name(),
                        "outbound queue full, event dropped"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!(connection_id = %connection_id, "outbound queue closed");
                }
            }
        }

        if dropped > 0 {
            tracing::warn!(dropped, event = payload.event.name(), "broadcast partially dropped");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn routes_by_audience() {
        let hub = LocalEventHub::new(16);
        let room = RoomId::generate();
        let (a, b, c) = (
            ConnectionId::generate(),
            ConnectionId::generate(),
            ConnectionId::generate(),
        );
        let mut rx_a = hub.attach(a).await;
        let mut rx_b = hub.attach(b).await;
        let mut rx_c = hub.attach(c).await;

        hub.join_group(a, room).await.unwrap();
        hub.join_group(b, room).await.unwrap();

        hub.broadcast(EventBroadcast::to_room(room, ServerEvent::error("room")))
            .await
            .unwrap();
        hub.broadcast(EventBroadcast::to_room_except(room, a, ServerEvent::error("others")))
            .await
            .unwrap();
        hub.broadcast(EventBroadcast::to_connection(c, ServerEvent::error("direct")))
            .await
            .unwrap();
        hub.broadcast(EventBroadcast::to_everyone(ServerEvent::error("all")))
            .await
            .unwrap();

        assert_eq!(
            drain(&mut rx_a),
            vec![ServerEvent::error("room"), ServerEvent::error("all")]
        );
        assert_eq!(
            drain(&mut rx_b),
            vec![
                ServerEvent::error("room"),
                ServerEvent::error("others"),
                ServerEvent::error("all")
            ]
        );
        assert_eq!(
            drain(&mut rx_c),
            vec![ServerEvent::error("direct"), ServerEvent::error("all")]
        );
    }

    #[tokio::test]
    async fn leaving_and_detaching_stop_delivery() {
        let hub = LocalEventHub::new(16);
        let room = RoomId::generate();
        let a = ConnectionId::generate();
        let mut rx = hub.attach(a).await;

        hub.join_group(a, room).await.unwrap();
        hub.leave_group(a, room).await.unwrap();
        hub.broadcast(EventBroadcast::to_room(room, ServerEvent::error("x")))
            .await
            .unwrap();
        assert!(drain(&mut rx).is_empty());

        hub.detach(a).await;
        hub.join_group(a, room).await.unwrap();
        assert_eq!(hub.group_of(a).await, None);
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let hub = LocalEventHub::new(1);
        let a = ConnectionId::generate();
        let mut rx = hub.attach(a).await;

        for i in 0..3 {
            hub.broadcast(EventBroadcast::to_connection(a, ServerEvent::error(i.to_string())))
                .await
                .unwrap();
        }
        assert_eq!(drain(&mut rx), vec![ServerEvent::error("0")]);
    }
}

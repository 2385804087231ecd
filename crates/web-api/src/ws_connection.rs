use application::ApplicationError;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use domain::{ClientEvent, ConnectionId, ServerEvent, UserId};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::auth::AuthUser;
use crate::state::AppState;

const UNRECOGNIZED_EVENT: &str = "Unrecognized event";

/// 单条 WebSocket 连接
///
/// 发送任务独占 socket 写端，合并两路输出：集线器推来的事件和本连接的控制帧。
/// 入站事件在当前任务里逐条处理完才读取下一条。
pub struct WebSocketConnection {
    connection_id: ConnectionId,
    state: AppState,
    identity: Option<AuthUser>,
}

impl WebSocketConnection {
    pub fn new(state: AppState, identity: Option<AuthUser>) -> Self {
        Self {
            connection_id: ConnectionId::generate(),
            state,
            identity,
        }
    }

    pub async fn run(self, socket: WebSocket) {
        let connection_id = self.connection_id;
        // 先挂到集线器再登记，避免漏掉登记后立刻发出的事件
        let mut outbound = self.state.hub.attach(connection_id).await;
        self.state.chat_service.connect(connection_id).await;
        tracing::info!(
            connection_id = %connection_id,
            verified = self.identity.is_some(),
            "websocket connected"
        );

        let (mut sender, mut incoming) = socket.split();
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<WsCommand>(32);

        let mut send_task = tokio::spawn(async move {
            loop {
                let frame = tokio::select! {
                    Some(cmd) = cmd_rx.recv() => match cmd {
                        WsCommand::SendEvent(event) => encode(&event),
                        WsCommand::SendPong(data) => Some(WsMessage::Pong(data.into())),
                    },
                    Some(event) = outbound.recv() => encode(&event),
                    else => break,
                };
                let Some(frame) = frame else { continue };
                if sender.send(frame).await.is_err() {
                    tracing::debug!(connection_id = %connection_id, "websocket write failed");
                    break;
                }
            }
        });

        let mut send_finished = false;
        loop {
            let next = tokio::select! {
                next = incoming.next() => next,
                _ = &mut send_task => {
                    send_finished = true;
                    break;
                }
            };
            let Some(Ok(message)) = next else { break };
            if self.handle_incoming(message, &cmd_tx).await.is_err() {
                break;
            }
        }

        self.state.chat_service.disconnect(connection_id).await;
        self.state.hub.detach(connection_id).await;
        drop(cmd_tx);
        if !send_finished {
            send_task.abort();
        }

        tracing::info!(connection_id = %connection_id, "websocket disconnected");
    }

    /// 返回 `Err` 表示连接应当结束
    async fn handle_incoming(
        &self,
        message: WsMessage,
        cmd_tx: &mpsc::Sender<WsCommand>,
    ) -> Result<(), ()> {
        match message {
            WsMessage::Text(text) => {
                match serde_json::from_str::<ClientEvent>(text.as_str()) {
                    Ok(event) => self.dispatch(event).await,
                    Err(err) => {
                        tracing::debug!(connection_id = %self.connection_id, error = %err, "unparsable frame");
                        cmd_tx
                            .send(WsCommand::SendEvent(ServerEvent::error(UNRECOGNIZED_EVENT)))
                            .await
                            .map_err(|_| ())?;
                    }
                }
            }
            WsMessage::Binary(_) => {
                cmd_tx
                    .send(WsCommand::SendEvent(ServerEvent::error(UNRECOGNIZED_EVENT)))
                    .await
                    .map_err(|_| ())?;
            }
            WsMessage::Ping(data) => {
                cmd_tx
                    .send(WsCommand::SendPong(data.to_vec()))
                    .await
                    .map_err(|_| ())?;
            }
            WsMessage::Pong(_) => {}
            WsMessage::Close(_) => return Err(()),
        }
        Ok(())
    }

    async fn dispatch(&self, event: ClientEvent) {
        let event = self.apply_identity(event);
        match self
            .state
            .chat_service
            .handle_event(self.connection_id, event)
            .await
        {
            Ok(()) => {}
            Err(ApplicationError::ConnectionClosed) => {
                tracing::debug!(connection_id = %self.connection_id, "event after close dropped");
            }
            // 用户可见的错误已经作为 error 事件回给了连接
            Err(err) => {
                tracing::debug!(connection_id = %self.connection_id, error = %err, "event failed");
            }
        }
    }

    /// 握手时验证过的身份覆盖客户端在 join 里自报的身份
    fn apply_identity(&self, event: ClientEvent) -> ClientEvent {
        match (event, &self.identity) {
            (ClientEvent::Join(mut join), Some(identity)) => {
                join.email = identity.email.clone();
                join.user_id = Some(UserId::from(identity.id));
                ClientEvent::Join(join)
            }
            (event, _) => event,
        }
    }
}

fn encode(event: &ServerEvent) -> Option<WsMessage> {
    match serde_json::to_string(event) {
        Ok(json) => Some(WsMessage::Text(json.into())),
        Err(err) => {
            tracing::warn!(event = event.name(), error = %err, "failed to serialize websocket payload");
            None
        }
    }
}

/// WebSocket 写操作命令
#[derive(Debug)]
enum WsCommand {
    SendEvent(ServerEvent),
    SendPong(Vec<u8>),
}

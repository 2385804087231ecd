#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use application::{InMemoryMessageRepository, InMemoryRoomRepository};
use config::AppConfig;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;
use web_api::{router, AppState, AuthUser};

pub type TestSocket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub const TEST_SECRET: &str = "integration-test-secret-with-32-plus-chars";

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn start(require_token: bool) -> Self {
        let mut config = AppConfig::default();
        config.jwt.secret = TEST_SECRET.into();
        config.websocket.require_token = require_token;

        let state = AppState::from_config(
            &config,
            Arc::new(InMemoryRoomRepository::new()),
            Arc::new(InMemoryMessageRepository::new()),
        );
        let app = router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        Self {
            addr,
            state,
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn http(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn token_for(&self, email: &str) -> String {
        self.state
            .jwt_service
            .generate_token(AuthUser {
                id: Uuid::new_v4(),
                email: email.into(),
            })
            .expect("token")
    }

    /// 建立连接并等待服务端的连接循环就绪
    pub async fn connect(&self, token: Option<&str>) -> TestSocket {
        let url = match token {
            Some(token) => format!("ws://{}/ws?token={}", self.addr, token),
            None => format!("ws://{}/ws", self.addr),
        };
        let (mut socket, _) = connect_async(url).await.expect("websocket connect");

        // 无法识别的帧会得到 error 回复，收到即说明连接已挂到集线器
        socket
            .send(WsMessage::Text("ping".into()))
            .await
            .expect("send probe");
        let reply = next_event(&mut socket).await;
        assert_eq!(reply, json!({"event": "error", "data": "Unrecognized event"}));
        socket
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

pub async fn send_event(socket: &mut TestSocket, event: Value) {
    socket
        .send(WsMessage::Text(event.to_string().into()))
        .await
        .expect("send event");
}

pub async fn join(socket: &mut TestSocket, email: &str, room: &str) {
    send_event(
        socket,
        json!({"event": "join", "data": {"email": email, "roomId": room}}),
    )
    .await;
}

/// 读取下一条 JSON 事件，超时视为失败
pub async fn next_event(socket: &mut TestSocket) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(3), socket.next())
            .await
            .expect("timed out waiting for event")
            .expect("socket closed")
            .expect("socket error");
        if let WsMessage::Text(text) = frame {
            return serde_json::from_str(text.as_str()).expect("json frame");
        }
    }
}

/// 在一段时间内没有任何事件到达
pub async fn assert_silent(socket: &mut TestSocket) {
    let result = tokio::time::timeout(Duration::from_millis(200), socket.next()).await;
    assert!(result.is_err(), "unexpected frame: {result:?}");
}

pub fn room_users(emails: &[&str]) -> Value {
    let users: Vec<Value> = emails.iter().map(|email| json!({"email": email})).collect();
    json!({"event": "roomUsers", "data": users})
}

pub fn system_text(event: &Value) -> (&str, &str) {
    assert_eq!(event["event"], "message", "not a message event: {event}");
    (
        event["data"]["senderDisplayName"].as_str().unwrap_or_default(),
        event["data"]["text"].as_str().unwrap_or_default(),
    )
}

use std::sync::Arc;

use application::{
    ChatService, ChatServiceDependencies, ConnectionRegistry, LocalEventHub, MessageLog,
    MessageLogDependencies, MessageRepository, RoomDirectory, RoomDirectoryDependencies,
    RoomRepository, SystemClock,
};
use config::AppConfig;

use crate::JwtService;

#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ChatService>,
    pub room_directory: Arc<RoomDirectory>,
    pub message_log: Arc<MessageLog>,
    pub hub: Arc<LocalEventHub>,
    pub jwt_service: Arc<JwtService>,
    /// WebSocket 握手是否必须携带有效 token
    pub require_token: bool,
    pub cors_origins: Arc<Vec<String>>,
}

impl AppState {
    /// 根据配置装配应用层服务，存储实现由调用方注入
    pub fn from_config(
        config: &AppConfig,
        room_repository: Arc<dyn RoomRepository>,
        message_repository: Arc<dyn MessageRepository>,
    ) -> Self {
        let clock = Arc::new(SystemClock);
        let hub = Arc::new(LocalEventHub::new(config.websocket.outbound_buffer));
        let store_timeout = config.store_timeout();

        let room_directory = Arc::new(RoomDirectory::new(RoomDirectoryDependencies {
            room_repository,
            broadcaster: hub.clone(),
            clock: clock.clone(),
            store_timeout,
        }));
        let message_log = Arc::new(MessageLog::new(MessageLogDependencies {
            message_repository,
            clock: clock.clone(),
            store_timeout,
        }));
        let chat_service = Arc::new(ChatService::new(ChatServiceDependencies {
            registry: Arc::new(ConnectionRegistry::new()),
            room_directory: room_directory.clone(),
            message_log: message_log.clone(),
            broadcaster: hub.clone(),
            clock,
            history_limit: config.chat.history_limit,
        }));

        Self {
            chat_service,
            room_directory,
            message_log,
            hub,
            jwt_service: Arc::new(JwtService::new(config.jwt.clone())),
            require_token: config.websocket.require_token,
            cors_origins: Arc::new(config.server.cors_origins.clone()),
        }
    }
}

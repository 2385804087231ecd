//! Web API 层。
//!
//! 提供 Axum 路由：房间 HTTP 接口与 WebSocket 实时通道，
//! 请求委托给应用层的房间目录、消息日志和聊天服务。

mod auth;
mod error;
mod routes;
mod state;
mod ws_connection;

pub use auth::{AuthUser, Claims, JwtService, AUTH_TOKEN_HEADER};
pub use config::JwtConfig;
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;

mod chat_service;
mod message_log;
mod room_directory;


use std::future::Future;
use std::time::Duration;

use crate::error::ApplicationError;

pub use chat_service::{
    ChatService, ChatServiceDependencies, JoinRoomRequest, HISTORY_LOAD_FAILED, JOIN_FAILED,
    SEND_FAILED, SEND_REJECTED,
};
pub use message_log::{MessageLog, MessageLogDependencies, DEFAULT_HISTORY_LIMIT};
pub use room_directory::{RoomDirectory, RoomDirectoryDependencies};

/// 给存储调用加上超时，超时映射为 `ApplicationError::StoreTimeout`
pub(crate) async fn within<T, E, F>(timeout: Duration, call: F) -> Result<T, ApplicationError>
where
    F: Future<Output = Result<T, E>>,
    ApplicationError: From<E>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result.map_err(ApplicationError::from),
        Err(_) => Err(ApplicationError::StoreTimeout(timeout)),
    }
}

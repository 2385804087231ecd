use serde::{Deserialize, Serialize};

use crate::value_objects::{RoomId, RoomName, Timestamp};

/// 持久化的聊天室。房间名在目录内唯一。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub name: RoomName,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: Timestamp,
}

impl Room {
    pub fn new(id: RoomId, name: RoomName, created_at: Timestamp) -> Self {
        Self {
            id,
            name,
            created_at,
        }
    }
}

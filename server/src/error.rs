//! Handler-level failures.
//!
//! Every variant is reported back to the originating connection as a
//! structured `error` message. None of them close the connection.

use shared::{DecodeError, ErrorCode, Message, PlayerId, RoomId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GameError {
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    #[error("room {0} not found")]
    RoomNotFound(RoomId),
    #[error("room {0} is full")]
    RoomFull(RoomId),
    #[error("slot {0} is not available")]
    SlotUnavailable(u32),
    #[error("only the host can {0}")]
    NotHost(&'static str),
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),
    #[error("cannot {0}")]
    CannotStart(String),
    #[error("room {0} already has a game in progress")]
    GameInProgress(RoomId),
    #[error("internal error: {0}")]
    Internal(String),
}

impl GameError {
    pub fn code(&self) -> ErrorCode {
        match self {
            GameError::InvalidMessage(_) => ErrorCode::InvalidMessage,
            GameError::RoomNotFound(_) => ErrorCode::RoomNotFound,
            GameError::RoomFull(_) => ErrorCode::RoomFull,
            GameError::SlotUnavailable(_) => ErrorCode::SlotUnavailable,
            GameError::NotHost(_) => ErrorCode::NotHost,
            GameError::PlayerNotFound(_) => ErrorCode::PlayerNotFound,
            GameError::CannotStart(_) => ErrorCode::CannotStart,
            GameError::GameInProgress(_) => ErrorCode::GameInProgress,
            GameError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// The wire message sent back to the connection that caused this error.
    pub fn to_message(&self) -> Message {
        Message::error(self.code(), self.to_string())
    }
}

impl From<DecodeError> for GameError {
    fn from(err: DecodeError) -> Self {
        GameError::InvalidMessage(err.to_string())
    }
}

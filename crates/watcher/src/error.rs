use {revwatch_common::FromMessage, thiserror::Error};

use crate::lifecycle::LifecycleState;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Record(#[from] revwatch_common::Error),

    #[error(transparent)]
    Client(#[from] revwatch_channels::Error),

    #[error(transparent)]
    Journal(#[from] revwatch_journal::Error),

    #[error("watcher cannot start from the {state:?} state")]
    AlreadyStarted { state: LifecycleState },

    #[error("{0}")]
    Message(String),
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

revwatch_common::impl_context!();

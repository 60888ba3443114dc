//! Cloneable front door to the controller task

use tokio::sync::{mpsc, oneshot};

use super::controller::{AppStatus, CategoryListing, Command};
use crate::settings::Settings;
use crate::store::{NewShortcut, ShortcutPatch, ShortcutRecord};

/// Errors talking to the controller
#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    #[error("controller is no longer running")]
    Stopped,
}

/// Sends commands to the controller and awaits replies
#[derive(Clone)]
pub struct AppHandle {
    commands: mpsc::Sender<Command>,
}

impl AppHandle {
    pub fn new(commands: mpsc::Sender<Command>) -> Self {
        Self { commands }
    }

    /// Send a command that has no reply
    pub async fn send(&self, command: Command) -> Result<(), HandleError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| HandleError::Stopped)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, HandleError> {
        let (reply, rx) = oneshot::channel();
        self.send(build(reply)).await?;
        rx.await.map_err(|_| HandleError::Stopped)
    }

    pub async fn query(
        &self,
        category: Option<String>,
        search: Option<String>,
    ) -> Result<Vec<ShortcutRecord>, HandleError> {
        self.request(|reply| Command::Query {
            category,
            search,
            reply,
        })
        .await
    }

    pub async fn categories(&self) -> Result<CategoryListing, HandleError> {
        self.request(|reply| Command::ListCategories { reply }).await
    }

    pub async fn add_shortcut(&self, shortcut: NewShortcut) -> Result<ShortcutRecord, HandleError> {
        self.request(|reply| Command::AddShortcut { shortcut, reply })
            .await
    }

    pub async fn update_shortcut(
        &self,
        id: String,
        patch: ShortcutPatch,
    ) -> Result<Option<ShortcutRecord>, HandleError> {
        self.request(|reply| Command::UpdateShortcut { id, patch, reply })
            .await
    }

    pub async fn remove_shortcut(&self, id: String) -> Result<bool, HandleError> {
        self.request(|reply| Command::RemoveShortcut { id, reply })
            .await
    }

    pub async fn status(&self) -> Result<AppStatus, HandleError> {
        self.request(|reply| Command::GetStatus { reply }).await
    }

    pub async fn settings(&self) -> Result<Settings, HandleError> {
        self.request(|reply| Command::GetSettings { reply }).await
    }

    pub async fn update_settings(&self, settings: Settings) -> Result<Settings, HandleError> {
        self.request(|reply| Command::UpdateSettings {
            settings: Box::new(settings),
            reply,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stopped_controller_is_an_error() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = AppHandle::new(tx);
        assert!(matches!(handle.status().await, Err(HandleError::Stopped)));
    }

    #[tokio::test]
    async fn test_request_round_trip() {
        let (tx, mut rx) = mpsc::channel(1);
        let handle = AppHandle::new(tx);

        let responder = tokio::spawn(async move {
            if let Some(Command::RemoveShortcut { id, reply }) = rx.recv().await {
                let _ = reply.send(id == "abc");
            }
        });

        assert!(handle.remove_shortcut("abc".into()).await.unwrap());
        responder.await.unwrap();
    }
}

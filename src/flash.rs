//! One-time flash messages
//!
//! Messages survive exactly one redirect: handlers push them into the
//! session, the next rendered page takes (and thereby clears) them.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

const FLASH_KEY: &str = "flash";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Exito,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub kind: FlashKind,
    pub message: String,
}

impl FlashMessage {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Exito,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }
}

/// Append one message to the pending flash list
pub async fn push(session: &Session, message: FlashMessage) {
    push_all(session, vec![message]).await;
}

/// Append several messages (e.g. an aggregated validation error list)
pub async fn push_all(session: &Session, messages: Vec<FlashMessage>) {
    let mut pending: Vec<FlashMessage> = session
        .get(FLASH_KEY)
        .await
        .ok()
        .flatten()
        .unwrap_or_default();
    pending.extend(messages);
    if let Err(e) = session.insert(FLASH_KEY, pending).await {
        tracing::error!("Failed to store flash messages: {}", e);
    }
}

/// Take all pending messages, clearing them from the session
pub async fn take(session: &Session) -> Vec<FlashMessage> {
    match session.remove::<Vec<FlashMessage>>(FLASH_KEY).await {
        Ok(messages) => messages.unwrap_or_default(),
        Err(e) => {
            tracing::error!("Failed to read flash messages: {}", e);
            Vec::new()
        }
    }
}

/// Convenience: a list of error strings as flash messages
pub fn errors(messages: Vec<String>) -> Vec<FlashMessage> {
    messages.into_iter().map(FlashMessage::error).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flash_serialization() {
        let msg = FlashMessage::success("Se ha creado el grupo correctamente");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["kind"], "exito");
        let back: FlashMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_errors_helper() {
        let list = errors(vec!["Agrega un título".to_string(), "Agrega una fecha".to_string()]);
        assert_eq!(list.len(), 2);
        assert!(list.iter().all(|m| m.kind == FlashKind::Error));
    }
}

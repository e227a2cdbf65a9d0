//! Outside services the core depends on: notifications, blob storage, and
//! syllabus extraction. Each is a trait with a default implementation that
//! needs no external account.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub enum CollaboratorError {
    NotConfigured(&'static str),
    InvalidKey(String),
    NotFound(String),
    Io(std::io::Error),
    Upstream(String),
}

impl std::fmt::Display for CollaboratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollaboratorError::NotConfigured(what) => write!(f, "{what} is not configured"),
            CollaboratorError::InvalidKey(k) => write!(f, "Invalid object key: {k}"),
            CollaboratorError::NotFound(k) => write!(f, "Object not found: {k}"),
            CollaboratorError::Io(e) => write!(f, "I/O error: {e}"),
            CollaboratorError::Upstream(e) => write!(f, "Upstream error: {e}"),
        }
    }
}

impl std::error::Error for CollaboratorError {}

// ---------- notifications ----------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Welcome,
    PasswordReset,
}

impl NotificationKind {
    pub fn subject(&self) -> &'static str {
        match self {
            NotificationKind::Welcome => "Welcome to Campus",
            NotificationKind::PasswordReset => "Password Reset Request",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Notification {
    pub kind: NotificationKind,
    pub to: String,
    pub user_name: String,
    pub school_name: Option<String>,
    pub otp: Option<String>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), CollaboratorError>;
}

/// Writes notifications to the log instead of delivering them.
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send(&self, n: &Notification) -> Result<(), CollaboratorError> {
        tracing::info!(
            kind = ?n.kind,
            to = %n.to,
            user = %n.user_name,
            school = n.school_name.as_deref().unwrap_or("-"),
            subject = n.kind.subject(),
            "notification sent"
        );
        Ok(())
    }
}

// ---------- object storage ----------

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), CollaboratorError>;
    async fn get(&self, key: &str) -> Result<Vec<u8>, CollaboratorError>;
    async fn delete(&self, key: &str) -> Result<(), CollaboratorError>;
}

/// Stores objects as files under a root directory.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, CollaboratorError> {
        let rel = Path::new(key);
        let clean = !key.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(CollaboratorError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), CollaboratorError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(CollaboratorError::Io)?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(CollaboratorError::Io)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, CollaboratorError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CollaboratorError::NotFound(key.to_string()))
            }
            Err(e) => Err(CollaboratorError::Io(e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CollaboratorError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CollaboratorError::Io(e)),
        }
    }
}

// ---------- syllabus extraction ----------

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ExtractedChapter {
    pub chapter_number: i32,
    pub chapter_name: String,
    #[serde(default)]
    pub sub_topics: Vec<String>,
    #[serde(default)]
    pub pre_requisites: Vec<ExtractedPrerequisite>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ExtractedPrerequisite {
    pub topic: String,
    pub explanation: String,
}

/// Turns an uploaded syllabus document into chapters, sub-topics and
/// prerequisites.
#[async_trait]
pub trait SyllabusExtractor: Send + Sync {
    async fn extract(&self, document: &[u8]) -> Result<Vec<ExtractedChapter>, CollaboratorError>;
}

pub struct UnconfiguredExtractor;

#[async_trait]
impl SyllabusExtractor for UnconfiguredExtractor {
    async fn extract(&self, _document: &[u8]) -> Result<Vec<ExtractedChapter>, CollaboratorError> {
        Err(CollaboratorError::NotConfigured("syllabus extractor"))
    }
}

/// Returns a fixed extraction regardless of input.
pub struct StaticExtractor(pub Vec<ExtractedChapter>);

#[async_trait]
impl SyllabusExtractor for StaticExtractor {
    async fn extract(&self, _document: &[u8]) -> Result<Vec<ExtractedChapter>, CollaboratorError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        store
            .put("ebooks/class_6/CBSE/Science/Science", b"%PDF-1.4")
            .await
            .unwrap();
        assert_eq!(
            store.get("ebooks/class_6/CBSE/Science/Science").await.unwrap(),
            b"%PDF-1.4"
        );
        store.delete("ebooks/class_6/CBSE/Science/Science").await.unwrap();
        assert!(matches!(
            store.get("ebooks/class_6/CBSE/Science/Science").await,
            Err(CollaboratorError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn local_store_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        for key in ["../etc/passwd", "/abs/path", "", "a/../../b"] {
            assert!(
                matches!(store.put(key, b"x").await, Err(CollaboratorError::InvalidKey(_))),
                "{key}"
            );
        }
    }

    #[tokio::test]
    async fn tracing_notifier_accepts_everything() {
        let n = Notification {
            kind: NotificationKind::Welcome,
            to: "admin@oak.example".into(),
            user_name: "oakadmin".into(),
            school_name: Some("Oak".into()),
            otp: None,
        };
        TracingNotifier.send(&n).await.unwrap();
    }

    #[tokio::test]
    async fn unconfigured_extractor_says_so() {
        let err = UnconfiguredExtractor.extract(b"doc").await.unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[test]
    fn extraction_json_shape() {
        let raw = r#"[{"chapter_number": 1, "chapter_name": "Cells",
            "sub_topics": ["Cell wall"],
            "pre_requisites": [{"topic": "Microscope", "explanation": "Used to see cells"}]}]"#;
        let parsed: Vec<ExtractedChapter> = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed[0].sub_topics, vec!["Cell wall".to_string()]);
        assert_eq!(parsed[0].pre_requisites[0].topic, "Microscope");
    }
}

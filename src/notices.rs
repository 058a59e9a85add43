use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// In-band error reported by the backend; the stream stays open.
    Application,
    /// The session stream dropped and is being retried.
    Reconnecting,
    /// The session stream closed for good.
    Fatal,
}

impl NoticeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Application => "error",
            Self::Reconnecting => "reconnecting",
            Self::Fatal => "disconnected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub kind: NoticeKind,
    pub message: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.as_str(), self.message)
    }
}

/// Observable list of dismissible notices.
#[derive(Debug, Clone)]
pub struct NoticeBoard {
    tx: Arc<watch::Sender<Vec<Notice>>>,
    next_id: Arc<AtomicU64>,
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl NoticeBoard {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self {
            tx: Arc::new(tx),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Notice>> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Vec<Notice> {
        self.tx.borrow().clone()
    }

    pub fn push(&self, kind: NoticeKind, message: impl Into<String>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let notice = Notice {
            id,
            kind,
            message: message.into(),
        };
        self.tx.send_modify(|notices| notices.push(notice));
        id
    }

    /// Push a notice replacing any earlier notice of the same kind.
    pub fn replace(&self, kind: NoticeKind, message: impl Into<String>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let notice = Notice {
            id,
            kind,
            message: message.into(),
        };
        self.tx.send_modify(|notices| {
            notices.retain(|existing| existing.kind != kind);
            notices.push(notice);
        });
        id
    }

    pub fn dismiss(&self, id: u64) -> bool {
        self.tx.send_if_modified(|notices| {
            let before = notices.len();
            notices.retain(|notice| notice.id != id);
            notices.len() != before
        })
    }

    pub fn dismiss_kind(&self, kind: NoticeKind) -> bool {
        self.tx.send_if_modified(|notices| {
            let before = notices.len();
            notices.retain(|notice| notice.kind != kind);
            notices.len() != before
        })
    }

    pub fn clear(&self) -> bool {
        self.tx.send_if_modified(|notices| {
            let had_any = !notices.is_empty();
            notices.clear();
            had_any
        })
    }
}

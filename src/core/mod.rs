//! Host plugin surface: the contract between an orchestrator and the uploaders it drives.

use std::collections::HashMap;

use tracing::{debug, info};

pub type UploaderKey = String;
pub type UploaderKeyRef = str;

pub struct Core {
    pub uploaders: HashMap<UploaderKey, Box<dyn Uploader>>,
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown uploader: {0}")]
pub struct UnknownUploader(pub UploaderKey);

impl Core {
    pub fn uploader(&self, key: &UploaderKeyRef) -> Option<&dyn Uploader> {
        self.uploaders
            .get(key)
            .map(|val| val.as_ref() as &dyn Uploader)
    }

    /// Drive one batch through an uploader's hooks.
    ///
    /// The after-upload hook only runs when the upload hook reported success.
    pub async fn run_batch(
        &self,
        key: &UploaderKeyRef,
        items: &mut [UploadItem],
    ) -> Result<bool, UnknownUploader> {
        let uploader = self
            .uploader(key)
            .ok_or_else(|| UnknownUploader(key.to_owned()))?;

        if let Some(hook) = uploader.before_upload() {
            debug!(message = "Running before-upload hook", uploader = key);
            hook.prepare(items).await;
        }

        info!(message = "Uploading batch", uploader = key, items = items.len());
        let success = uploader.handle(items).await;
        if success {
            uploader.after_upload(items).await;
        }
        Ok(success)
    }
}

/// An image moving through one batch.
#[derive(Debug, Clone, Default)]
pub struct UploadItem {
    pub bytes: Vec<u8>,
    pub file_name: String,
    /// Extension hint, with or without the leading dot.
    pub extension: Option<String>,
    /// Set only once the media endpoint returned a non-empty URL.
    pub remote_url: Option<String>,
    /// Set only after `remote_url`.
    pub display_markup: Option<String>,
    pub raw_response: Option<serde_json::Value>,
}

impl UploadItem {
    pub fn new(file_name: impl Into<String>, extension: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            file_name: file_name.into(),
            extension,
            ..Self::default()
        }
    }

    /// Size in megabytes (1024 * 1024 bytes).
    pub fn size_mb(&self) -> f64 {
        self.bytes.len() as f64 / (1024.0 * 1024.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Input,
    Password,
}

/// One entry of an uploader's configuration schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigField {
    pub name: &'static str,
    pub kind: FieldKind,
    pub message: &'static str,
    pub required: bool,
    pub default: Option<&'static str>,
}

#[async_trait::async_trait]
pub trait Uploader: Send + Sync {
    fn display_name(&self) -> &str;
    fn config_schema(&self) -> Vec<ConfigField>;

    /// Upload the batch. Failures are reported by the uploader itself.
    async fn handle(&self, items: &mut [UploadItem]) -> bool;

    /// Post-process a successfully uploaded batch. Best-effort.
    async fn after_upload(&self, items: &mut [UploadItem]);

    fn before_upload(&self) -> Option<&dyn BeforeUpload> {
        None
    }
}

/// Optional hook run ahead of the upload.
#[async_trait::async_trait]
pub trait BeforeUpload: Send + Sync {
    async fn prepare(&self, items: &mut [UploadItem]);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Forwards notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn notify(&self, notification: Notification) {
        tracing::error!(
            message = "Notification",
            title = %notification.title,
            body = %notification.body,
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;

    #[derive(Default)]
    struct Counters {
        before: AtomicUsize,
        handle: AtomicUsize,
        after: AtomicUsize,
    }

    struct FakeUploader {
        succeed: bool,
        with_before: bool,
        counters: Arc<Counters>,
    }

    #[async_trait::async_trait]
    impl BeforeUpload for FakeUploader {
        async fn prepare(&self, _items: &mut [UploadItem]) {
            self.counters.before.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait::async_trait]
    impl Uploader for FakeUploader {
        fn display_name(&self) -> &str {
            "fake"
        }

        fn config_schema(&self) -> Vec<ConfigField> {
            vec![]
        }

        async fn handle(&self, items: &mut [UploadItem]) -> bool {
            self.counters.handle.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                for item in items.iter_mut() {
                    item.remote_url = Some(format!("https://example.com/{}", item.file_name));
                }
            }
            self.succeed
        }

        async fn after_upload(&self, _items: &mut [UploadItem]) {
            self.counters.after.fetch_add(1, Ordering::SeqCst);
        }

        fn before_upload(&self) -> Option<&dyn BeforeUpload> {
            if self.with_before {
                Some(self)
            } else {
                None
            }
        }
    }

    fn core_with(succeed: bool, with_before: bool) -> (Core, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let uploader = FakeUploader {
            succeed,
            with_before,
            counters: Arc::clone(&counters),
        };
        let uploaders = vec![("fake".to_owned(), Box::new(uploader) as _)]
            .into_iter()
            .collect();
        (Core { uploaders }, counters)
    }

    #[tokio::test]
    async fn successful_batch_runs_after_upload() {
        let (core, counters) = core_with(true, false);
        let mut items = vec![UploadItem::new("a.png", None, vec![1, 2, 3])];

        let success = core.run_batch("fake", &mut items).await.unwrap();

        assert!(success);
        assert_eq!(counters.handle.load(Ordering::SeqCst), 1);
        assert_eq!(counters.after.load(Ordering::SeqCst), 1);
        assert_eq!(counters.before.load(Ordering::SeqCst), 0);
        assert_eq!(items[0].remote_url.as_deref(), Some("https://example.com/a.png"));
    }

    #[tokio::test]
    async fn failed_batch_skips_after_upload() {
        let (core, counters) = core_with(false, true);
        let mut items = vec![UploadItem::new("a.png", None, vec![])];

        let success = core.run_batch("fake", &mut items).await.unwrap();

        assert!(!success);
        assert_eq!(counters.before.load(Ordering::SeqCst), 1);
        assert_eq!(counters.after.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_uploader_is_an_error() {
        let (core, _) = core_with(true, false);
        let err = core.run_batch("missing", &mut []).await.unwrap_err();
        assert_eq!(err.0, "missing");
    }

    #[test]
    fn size_is_reported_in_megabytes() {
        let item = UploadItem::new("big.jpg", None, vec![0; 3 * 1024 * 1024 / 2]);
        assert_eq!(item.size_mb(), 1.5);
    }
}

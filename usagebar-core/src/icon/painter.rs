//! Debounced, cached icon painting
//!
//! Invalidations arrive over a channel. The painter waits until no new
//! invalidation has arrived for [`PAINT_DEBOUNCE`], renders the latest
//! params, and hands the image to an [`IconSink`] unless the result would be
//! identical to the last delivered icon.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{render, IconImage, IconKey, IconParams};
use crate::error::Result;

/// Quiet period before a paint
pub const PAINT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Destination for painted icons (tray shell, file, test recorder)
pub trait IconSink: Send + Sync {
    fn deliver(&self, key: &IconKey, image: &IconImage) -> Result<()>;
}

/// Writes each painted icon as a PNG file, replacing the previous one.
#[derive(Debug, Clone)]
pub struct PngFileSink {
    path: PathBuf,
}

impl PngFileSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl IconSink for PngFileSink {
    fn deliver(&self, key: &IconKey, image: &IconImage) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let png = image.to_png()?;

        // Write then rename so readers never see a truncated file
        let tmp = self.path.with_extension("png.tmp");
        std::fs::write(&tmp, &png)?;
        std::fs::rename(&tmp, &self.path)?;

        tracing::debug!(
            path = %self.path.display(),
            percentage = key.percentage,
            style = key.style.as_str(),
            "Wrote icon"
        );
        Ok(())
    }
}

/// Handle to the painter task
pub struct IconPainter {
    tx: mpsc::UnboundedSender<IconParams>,
    task: JoinHandle<()>,
}

impl IconPainter {
    /// Spawn the painter task on the current runtime.
    pub fn spawn(sink: Arc<dyn IconSink>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_painter(rx, sink));
        Self { tx, task }
    }

    /// Request a repaint with `params`. The latest request in a burst wins.
    pub fn invalidate(&self, params: IconParams) {
        if self.tx.send(params).is_err() {
            tracing::warn!("Icon painter has stopped, dropping invalidation");
        }
    }

    /// Flush any pending paint and stop the task.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Icon painter task failed");
        }
    }
}

async fn run_painter(mut rx: mpsc::UnboundedReceiver<IconParams>, sink: Arc<dyn IconSink>) {
    let mut last_key: Option<IconKey> = None;

    while let Some(first) = rx.recv().await {
        let mut latest = first;

        // Restart the quiet period on every invalidation
        let closed = loop {
            tokio::select! {
                next = rx.recv() => match next {
                    Some(params) => latest = params,
                    None => break true,
                },
                _ = tokio::time::sleep(PAINT_DEBOUNCE) => break false,
            }
        };

        paint(&latest, &mut last_key, sink.as_ref());

        if closed {
            break;
        }
    }

    tracing::debug!("Icon painter stopped");
}

fn paint(params: &IconParams, last_key: &mut Option<IconKey>, sink: &dyn IconSink) {
    let key = params.key();
    if last_key.as_ref() == Some(&key) {
        tracing::trace!(?key, "Icon unchanged, skipping repaint");
        return;
    }

    let image = render(params);
    match sink.deliver(&key, &image) {
        Ok(()) => *last_key = Some(key),
        // Leave last_key alone so the next invalidation retries
        Err(e) => tracing::warn!(error = %e, "Failed to deliver icon"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Appearance, IconStyle};
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingSink {
        painted: Mutex<Vec<IconKey>>,
    }

    impl RecordingSink {
        fn painted(&self) -> Vec<IconKey> {
            self.painted.lock().unwrap().clone()
        }
    }

    impl IconSink for RecordingSink {
        fn deliver(&self, key: &IconKey, _image: &IconImage) -> Result<()> {
            self.painted.lock().unwrap().push(*key);
            Ok(())
        }
    }

    fn params(percentage: f64) -> IconParams {
        IconParams {
            percentage,
            style: IconStyle::Battery,
            appearance: Appearance::Light,
            monochrome: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_paints_once_with_latest() {
        let sink = Arc::new(RecordingSink::default());
        let painter = IconPainter::spawn(sink.clone());

        painter.invalidate(params(40.0));
        tokio::time::sleep(Duration::from_millis(50)).await;
        painter.invalidate(params(61.0));
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(sink.painted(), vec![params(61.0).key()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_key_skips_repaint() {
        let sink = Arc::new(RecordingSink::default());
        let painter = IconPainter::spawn(sink.clone());

        painter.invalidate(params(40.2));
        tokio::time::sleep(Duration::from_millis(500)).await;
        painter.invalidate(params(39.8));
        tokio::time::sleep(Duration::from_millis(500)).await;
        painter.invalidate(params(41.0));
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(
            sink.painted(),
            vec![params(40.0).key(), params(41.0).key()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_pending_paint() {
        let sink = Arc::new(RecordingSink::default());
        let painter = IconPainter::spawn(sink.clone());

        painter.invalidate(params(12.0));
        painter.shutdown().await;

        assert_eq!(sink.painted(), vec![params(12.0).key()]);
    }

    #[test]
    fn test_png_file_sink_writes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("icon.png");
        let sink = PngFileSink::new(path.clone());

        let p = params(80.0);
        sink.deliver(&p.key(), &render(&p)).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
        assert!(!path.with_extension("png.tmp").exists());
    }
}

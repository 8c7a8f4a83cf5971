// src/exec/output.rs

//! Growable capture buffers shared between the stream drains and readers.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    data: Mutex<Vec<u8>>,
    changed: Notify,
    parent: Option<OutputBuffer>,
}

/// Append-only byte buffer that can be read while a process is still
/// writing to it.
///
/// Cloning is cheap and yields a handle to the same buffer. A buffer created
/// with [`OutputBuffer::tee_into`] also forwards every append to its parent,
/// which is how per-stack captures feed the run-wide capture.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    inner: Arc<Inner>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// New empty buffer whose appends are mirrored into `parent`.
    pub fn tee_into(parent: &OutputBuffer) -> Self {
        Self {
            inner: Arc::new(Inner {
                parent: Some(parent.clone()),
                ..Inner::default()
            }),
        }
    }

    pub fn append(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.lock().extend_from_slice(bytes);
        self.inner.changed.notify_waiters();

        if let Some(parent) = &self.inner.parent {
            parent.append(bytes);
        }
    }

    pub fn append_str(&self, s: &str) {
        self.append(s.as_bytes());
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.lock().clone()
    }

    /// Current contents, lossily decoded as UTF-8.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of non-overlapping occurrences of `needle` captured so far.
    pub fn count(&self, needle: &str) -> usize {
        if needle.is_empty() {
            return 0;
        }
        self.contents().matches(needle).count()
    }

    /// Wait until `needle` has been captured at least `times` times.
    ///
    /// No timeout is applied here; wrap the call in `tokio::time::timeout`.
    pub async fn wait_for_count(&self, needle: &str, times: usize) {
        loop {
            let notified = self.inner.changed.notified();
            tokio::pin!(notified);
            // Register before checking so an append between the check and
            // the await still wakes us.
            notified.as_mut().enable();

            if self.count(needle) >= times {
                return;
            }
            notified.await;
        }
    }

    pub async fn wait_for(&self, needle: &str) {
        self.wait_for_count(needle, 1).await
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.inner
            .data
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn tee_forwards_to_parent() {
        let run = OutputBuffer::new();
        let a = OutputBuffer::tee_into(&run);
        let b = OutputBuffer::tee_into(&run);

        a.append_str("/s1\n");
        b.append_str("/s2\n");

        assert_eq!(a.contents(), "/s1\n");
        assert_eq!(b.contents(), "/s2\n");
        assert_eq!(run.contents(), "/s1\n/s2\n");
    }

    #[test]
    fn count_is_non_overlapping() {
        let buf = OutputBuffer::new();
        buf.append_str("ready\ninterrupt\ninterrupt\n");
        assert_eq!(buf.count("interrupt"), 2);
        assert_eq!(buf.count(""), 0);
    }

    #[tokio::test]
    async fn wait_for_wakes_on_later_append() {
        let buf = OutputBuffer::new();
        let writer = buf.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            writer.append_str("rea");
            writer.append_str("dy\n");
        });

        tokio::time::timeout(Duration::from_secs(2), buf.wait_for("ready"))
            .await
            .expect("marker never observed");
    }
}

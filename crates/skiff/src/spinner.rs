use std::io::Write;
use std::time::Duration;
use tokio::task::JoinHandle;

const FRAMES: [char; 4] = ['|', '/', '-', '\\'];

/// Terminal progress indicator running on its own tokio task.
///
/// Purely cosmetic: it only writes to stderr and shares no state with the
/// caller. Dropping it aborts the task; [`Spinner::stop`] also waits for it.
pub struct Spinner {
    handle: Option<JoinHandle<()>>,
    width: usize,
}

impl Spinner {
    pub fn start(message: &str, interval: Duration) -> Self {
        let text = message.to_string();
        let width = text.len() + 2;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            for frame in FRAMES.iter().cycle() {
                ticker.tick().await;
                let mut err = std::io::stderr();
                let _ = write!(err, "\r{} {}", frame, text);
                let _ = err.flush();
            }
        });

        Self {
            handle: Some(handle),
            width,
        }
    }

    pub fn disabled() -> Self {
        Self { handle: None, width: 0 }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    pub async fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
            eprint!("\r{}\r", " ".repeat(self.width));
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

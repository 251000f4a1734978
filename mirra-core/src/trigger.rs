use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Turns a storm of filesystem events into single rebuilds.
///
/// Every event restarts the countdown; a rebuild starts only once the
/// countdown runs out. Rebuilds run one at a time on the trigger's own
/// task, so events that arrive during a rebuild queue up and produce one
/// follow-up rebuild after it finishes.
pub struct RebuildTrigger {
    debounce: Duration,
}

impl Default for RebuildTrigger {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl RebuildTrigger {
    pub fn new(debounce: Duration) -> Self {
        Self { debounce }
    }

    /// Runs until the sending side of `events` is dropped. A batch still
    /// waiting on its countdown at that point is rebuilt before returning.
    pub async fn run<T, F, Fut>(&self, mut events: mpsc::Receiver<T>, mut rebuild: F)
    where
        F: FnMut(Vec<T>) -> Fut,
        Fut: Future<Output = ()>,
    {
        while let Some(first) = events.recv().await {
            let mut batch = vec![first];
            let mut closed = false;

            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Some(event) => batch.push(event),
                        None => {
                            closed = true;
                            break;
                        }
                    },
                    _ = tokio::time::sleep(self.debounce) => break,
                }
            }

            log::debug!("Rebuilding after {} change event(s)", batch.len());
            rebuild(batch).await;

            if closed {
                break;
            }
        }
    }
}

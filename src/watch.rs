//! Periodic overdue recompute.
//!
//! While a task list is on screen its partitions are reloaded on a fixed
//! interval so tasks turn overdue without user action. The timer runs on its
//! own thread and stops when the watcher is stopped or dropped; once
//! [`OverdueWatcher::stop`] returns no further reload happens.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;

use crate::storage::Partition;
use crate::task::{TaskStatus, TaskStore};

/// Outcome of one reload of one partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTick {
    pub partition: Partition,
    pub overdue: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Tick(WatchTick),
    Error { partition: Partition, message: String },
}

pub struct OverdueWatcher {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl OverdueWatcher {
    /// Reload `partitions` now and then every `interval`
    pub fn spawn(
        store: TaskStore,
        partitions: Vec<Partition>,
        interval: Duration,
    ) -> (Self, Receiver<WatchEvent>) {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (event_tx, event_rx) = mpsc::channel();

        let handle = thread::spawn(move || loop {
            if !reload_all(&store, &partitions, &event_tx) {
                break;
            }
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        (
            Self {
                stop_tx: Some(stop_tx),
                handle: Some(handle),
            },
            event_rx,
        )
    }

    /// Cancel the timer and wait for the worker to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("overdue watcher thread panicked");
            }
        }
    }
}

impl Drop for OverdueWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Returns false once nobody listens anymore
fn reload_all(store: &TaskStore, partitions: &[Partition], events: &Sender<WatchEvent>) -> bool {
    let now = Utc::now();
    for partition in partitions {
        let event = match store.list_tasks(partition, now) {
            Ok(tasks) => WatchEvent::Tick(WatchTick {
                partition: partition.clone(),
                overdue: tasks
                    .iter()
                    .filter(|task| task.status == TaskStatus::Overdue)
                    .count(),
                total: tasks.len(),
            }),
            Err(err) => {
                tracing::warn!(%partition, error = %err, "overdue reload failed");
                WatchEvent::Error {
                    partition: partition.clone(),
                    message: err.to_string(),
                }
            }
        };
        if events.send(event).is_err() {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TasksConfig;
    use crate::storage::Storage;
    use crate::task::Task;
    use chrono::Duration as ChronoDuration;
    use tempfile::TempDir;

    #[test]
    fn ticks_promote_and_stop_ends_the_timer() {
        let temp = TempDir::new().unwrap();
        let store = TaskStore::new(Storage::new(temp.path()), TasksConfig::default());
        let partition = Partition::team("t1");
        let now = Utc::now();
        store
            .save_task(
                &partition,
                Task {
                    id: "a".to_string(),
                    title: "late".to_string(),
                    description: String::new(),
                    status: TaskStatus::Pending,
                    created_at: now - ChronoDuration::days(2),
                    due_at: now - ChronoDuration::days(1),
                    responsible_name: "Ana".to_string(),
                    responsible_id: None,
                    team_id: None,
                },
            )
            .unwrap();

        let (watcher, events) =
            OverdueWatcher::spawn(store.clone(), vec![partition.clone()], Duration::from_millis(20));

        let first = events.recv_timeout(Duration::from_secs(5)).expect("first tick");
        assert_eq!(
            first,
            WatchEvent::Tick(WatchTick {
                partition: partition.clone(),
                overdue: 1,
                total: 1,
            })
        );
        assert_eq!(store.read_partition(&partition).unwrap()[0].status, TaskStatus::Overdue);

        let second = events.recv_timeout(Duration::from_secs(5));
        assert!(second.is_ok());

        watcher.stop();
        while events.try_recv().is_ok() {}
        assert!(matches!(
            events.recv_timeout(Duration::from_millis(100)),
            Err(RecvTimeoutError::Disconnected)
        ));
    }
}

//! Background task execution with a typed event stream.
//!
//! [`TaskRunner`] adapts a fallible async operation to a UI-consumable
//! lifecycle: Idle until started, Running while the spawned task works, then
//! exactly one terminal event. There are no retries and no cancellation; a
//! runner is single-shot.

use std::future::Future;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use easel_types::{TaskError, TaskEvent, TaskState};

use crate::errors::user_message;

const TASK_EVENT_CHANNEL_CAPACITY: usize = 64;

/// Single-shot background task with observable progress.
///
/// The runner's state reflects the events the caller has consumed, not the
/// spawned task's instantaneous progress: it stays `Running` until the
/// terminal event is drained through [`next_event`](Self::next_event) or
/// [`poll_events`](Self::poll_events).
#[derive(Debug)]
pub struct TaskRunner<T> {
    label: String,
    state: TaskState,
    events: Option<mpsc::Receiver<TaskEvent<T>>>,
}

impl<T> TaskRunner<T> {
    /// `label` prefixes the initial progress line ("\<label\>...").
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            state: TaskState::Idle,
            events: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> TaskState {
        self.state
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == TaskState::Running
    }

    /// Spawn `future` and transition to `Running`.
    ///
    /// A runner that is not `Idle` ignores the request; failures surface as a
    /// single [`TaskEvent::Failed`] carrying a user-facing message.
    pub fn start<F>(&mut self, future: F)
    where
        T: Send + 'static,
        F: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        if self.state != TaskState::Idle {
            tracing::warn!(state = ?self.state, "task already started; ignoring start request");
            return;
        }

        let (tx, rx) = mpsc::channel(TASK_EVENT_CHANNEL_CAPACITY);
        self.state = TaskState::Running;
        self.events = Some(rx);

        let label = self.label.clone();
        tokio::spawn(async move {
            let _ = tx.send(TaskEvent::Progress(format!("{label}..."))).await;
            match future.await {
                Ok(value) => {
                    let _ = tx.send(TaskEvent::Progress("Done!".to_string())).await;
                    let _ = tx.send(TaskEvent::Done(value)).await;
                }
                Err(err) => {
                    tracing::warn!("task failed: {err}");
                    let _ = tx.send(TaskEvent::Failed(user_message(&err))).await;
                }
            }
        });
    }

    /// Await the next event, updating state when it is terminal.
    ///
    /// Returns `None` before [`start`](Self::start) and after the task's
    /// channel is exhausted.
    pub async fn next_event(&mut self) -> Option<TaskEvent<T>> {
        let events = self.events.as_mut()?;
        let event = events.recv().await?;
        self.observe(&event);
        Some(event)
    }

    /// Drain any pending events without blocking.
    pub fn poll_events(&mut self) -> Vec<TaskEvent<T>> {
        let Some(events) = self.events.as_mut() else {
            return Vec::new();
        };
        let mut drained = Vec::new();
        loop {
            match events.try_recv() {
                Ok(event) => drained.push(event),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        for event in &drained {
            self.observe(event);
        }
        drained
    }

    fn observe(&mut self, event: &TaskEvent<T>) {
        match event {
            TaskEvent::Done(_) => self.state = TaskState::Completed,
            TaskEvent::Failed(_) => self.state = TaskState::Failed,
            TaskEvent::Progress(_) => {}
        }
    }
}

//! Fan-out seam for independent units of work.

use std::future::Future;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::future::join_all;
use log::error;

/// One independent unit of work with a name used in logs.
pub struct NamedTask {
    pub name: String,
    pub future: BoxFuture<'static, ()>,
}

impl NamedTask {
    pub fn new<F>(name: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            name: name.into(),
            future: Box::pin(future),
        }
    }
}

/// Runs a batch of units and returns once all of them have finished.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run_all(&self, tasks: Vec<NamedTask>);
}

/// Spawns every unit on the tokio runtime. A panicking unit is logged and
/// does not affect its siblings.
#[derive(Debug, Default, Clone)]
pub struct SpawnedRunner;

#[async_trait]
impl TaskRunner for SpawnedRunner {
    async fn run_all(&self, tasks: Vec<NamedTask>) {
        let (names, handles): (Vec<String>, Vec<_>) = tasks
            .into_iter()
            .map(|task| (task.name, tokio::spawn(task.future)))
            .unzip();

        for (name, result) in names.into_iter().zip(join_all(handles).await) {
            if let Err(e) = result {
                error!("Task {name} did not complete: {e}");
            }
        }
    }
}

/// Runs units one after another on the caller's task.
#[derive(Debug, Default, Clone)]
pub struct SequentialRunner;

#[async_trait]
impl TaskRunner for SequentialRunner {
    async fn run_all(&self, tasks: Vec<NamedTask>) {
        for task in tasks {
            task.future.await;
        }
    }
}

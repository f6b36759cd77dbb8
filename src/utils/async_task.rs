use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;

use crate::Result;

// Helper function to spawn tasks and track their JoinHandles
pub(crate) fn spawn_task<F, Fut>(
    name: &str,
    task_fn: F,
    handles: Option<&mut Vec<JoinHandle<()>>>,
) where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<()>> + Send + 'static,
{
    // Clone the name so it can be safely moved into the async block
    let name = name.to_string();
    let handle = tokio::spawn(async move {
        if let Err(e) = task_fn().await {
            error!("spawned task: {name} stopped or encountered an error: {:?}", e);
        } else {
            debug!("spawned task: {name} exited");
        }
    });

    if let Some(h) = handles {
        h.push(handle);
    }
}

/// Wait for every tracked task to finish, logging tasks that panicked.
pub(crate) async fn join_tasks(handles: Vec<JoinHandle<()>>) {
    for result in join_all(handles).await {
        if let Err(e) = result {
            error!("background task failed to join: {:?}", e);
        }
    }
}

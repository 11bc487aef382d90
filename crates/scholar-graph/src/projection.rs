//! Shared handle for the named centrality projection.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;

use crate::client::GraphError;
use crate::executor::ProjectionAdmin;

/// Tracks one named in-memory projection.
///
/// Concurrent callers of [`ensure`](Self::ensure) serialize on an async
/// mutex, so the projection is created at most once per handle no matter
/// how many discoveries start together.
#[derive(Debug)]
pub struct ProjectionHandle {
    name: String,
    ready: AtomicBool,
    lifecycle: Mutex<()>,
}

impl ProjectionHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ready: AtomicBool::new(false),
            lifecycle: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Make sure the projection exists, creating it if the server lacks it.
    pub async fn ensure<A>(&self, admin: &A) -> Result<(), GraphError>
    where
        A: ProjectionAdmin + ?Sized,
    {
        if self.is_ready() {
            return Ok(());
        }
        let _guard = self.lifecycle.lock().await;
        if self.is_ready() {
            return Ok(());
        }

        if admin.projection_exists(&self.name).await? {
            tracing::debug!(projection = %self.name, "Reusing existing graph projection");
        } else {
            admin.create_projection(&self.name).await?;
        }
        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    /// Drop the projection. Returns whether the server had one to drop.
    pub async fn drop_projection<A>(&self, admin: &A) -> Result<bool, GraphError>
    where
        A: ProjectionAdmin + ?Sized,
    {
        let _guard = self.lifecycle.lock().await;
        let dropped = admin.drop_projection(&self.name).await?;
        self.ready.store(false, Ordering::Release);
        Ok(dropped)
    }

    /// Forget local readiness, e.g. after the server reported the
    /// projection missing.
    pub fn invalidate(&self) {
        self.ready.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    #[derive(Default)]
    struct CountingAdmin {
        exists: AtomicBool,
        creations: AtomicUsize,
        drops: AtomicUsize,
    }

    #[async_trait]
    impl ProjectionAdmin for CountingAdmin {
        async fn projection_exists(&self, _name: &str) -> Result<bool, GraphError> {
            Ok(self.exists.load(Ordering::SeqCst))
        }

        async fn create_projection(&self, _name: &str) -> Result<(), GraphError> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.creations.fetch_add(1, Ordering::SeqCst);
            self.exists.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn drop_projection(&self, _name: &str) -> Result<bool, GraphError> {
            self.drops.fetch_add(1, Ordering::SeqCst);
            Ok(self.exists.swap(false, Ordering::SeqCst))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_ensure_creates_once() {
        let admin = Arc::new(CountingAdmin::default());
        let handle = Arc::new(ProjectionHandle::new("research_graph"));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let admin = Arc::clone(&admin);
                let handle = Arc::clone(&handle);
                tokio::spawn(async move { handle.ensure(admin.as_ref()).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert!(handle.is_ready());
        assert_eq!(admin.creations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_existing_projection_is_reused() {
        let admin = CountingAdmin::default();
        admin.exists.store(true, Ordering::SeqCst);
        let handle = ProjectionHandle::new("research_graph");

        handle.ensure(&admin).await.unwrap();
        assert!(handle.is_ready());
        assert_eq!(admin.creations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_drop_then_ensure_recreates() {
        let admin = CountingAdmin::default();
        let handle = ProjectionHandle::new("research_graph");

        handle.ensure(&admin).await.unwrap();
        assert!(handle.drop_projection(&admin).await.unwrap());
        assert!(!handle.is_ready());
        assert!(!handle.drop_projection(&admin).await.unwrap());

        handle.ensure(&admin).await.unwrap();
        assert_eq!(admin.creations.load(Ordering::SeqCst), 2);
        assert_eq!(admin.drops.load(Ordering::SeqCst), 2);
    }
}

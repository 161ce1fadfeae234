//! Construct-once client cache shared by the sinks

use crate::error::SinkError;
use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

type Connect<C> = Box<dyn Fn() -> BoxFuture<'static, Result<Arc<C>, SinkError>> + Send + Sync>;

/// A client that is built on first use and then shared for the process lifetime
///
/// Concurrent first callers wait on the same construction; a failed
/// construction leaves the cache empty so the next call tries again.
pub struct LazyClient<C: ?Sized> {
    name: &'static str,
    cell: OnceCell<Arc<C>>,
    connect: Connect<C>,
}

impl<C: ?Sized + Send + Sync + 'static> LazyClient<C> {
    /// Build the client with `connect` the first time it is needed
    pub fn new<F, Fut>(name: &'static str, connect: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<C>, SinkError>> + Send + 'static,
    {
        Self {
            name,
            cell: OnceCell::new(),
            connect: Box::new(move || connect().boxed()),
        }
    }

    /// Wrap a client that was constructed up front
    pub fn ready(name: &'static str, client: Arc<C>) -> Self {
        Self {
            name,
            cell: OnceCell::new_with(Some(client)),
            connect: Box::new(move || {
                async move { Err::<Arc<C>, _>(SinkError::Config(format!("{} client was pre-built", name))) }
                    .boxed()
            }),
        }
    }

    /// Get the client, constructing it if this is the first use
    pub async fn get(&self) -> Result<Arc<C>, SinkError> {
        if let Some(client) = self.cell.get() {
            return Ok(Arc::clone(client));
        }

        let client = self
            .cell
            .get_or_try_init(|| async {
                debug!(client = self.name, "Constructing client");
                let client = (self.connect)().await?;
                info!(client = self.name, "Client constructed");
                Ok::<_, SinkError>(client)
            })
            .await?;
        Ok(Arc::clone(client))
    }

    /// Whether the client has been constructed
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

impl<C: ?Sized> fmt::Debug for LazyClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyClient")
            .field("name", &self.name)
            .field("initialized", &self.cell.initialized())
            .finish()
    }
}

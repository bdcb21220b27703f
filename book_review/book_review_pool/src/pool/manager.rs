//! Lifecycle callbacks for pooled resources.

use crate::error::BoxError;

/// Creates, resets and closes the resources held by a
/// [`ResourcePool`](super::ResourcePool).
///
/// The pool never looks inside a resource; everything it needs to know about
/// one goes through these callbacks.
pub trait ResourceManager: Send + Sync + 'static {
    /// The pooled resource
    type Resource: Send + 'static;

    /// Error reported by `create` and `recycle`
    type Error: Into<BoxError>;

    /// Create a new resource.
    ///
    /// Called while the pool holds its admission lock, so it should not wait
    /// on anything that itself needs the pool.
    fn create(&self) -> Result<Self::Resource, Self::Error>;

    /// Reset a resource that is being returned to the pool.
    ///
    /// An error causes the resource to be closed and discarded instead of
    /// going back to the idle list.
    fn recycle(&self, _resource: &mut Self::Resource) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Close a resource for good
    fn close(&self, resource: Self::Resource);
}

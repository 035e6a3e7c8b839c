use crate::record::REQUEST_ID_UNSET;
use std::future::Future;
use uuid::Uuid;

tokio::task_local! {
    /// Correlation id of the request this task is serving.
    static CURRENT_REQUEST_ID: String;
}

/// Run a future with `id` bound as the current correlation id.
///
/// Every record emitted while the future executes carries `id`; the binding
/// ends with the future. Nested calls shadow the outer id for their
/// duration. Concurrent tasks never observe each other's binding.
pub async fn with_request_id<F, T>(id: impl Into<String>, fut: F) -> T
where
    F: Future<Output = T>,
{
    CURRENT_REQUEST_ID.scope(id.into(), fut).await
}

/// Synchronous variant of [`with_request_id`] for non-async call sites.
pub fn with_request_id_sync<T>(id: impl Into<String>, f: impl FnOnce() -> T) -> T {
    CURRENT_REQUEST_ID.sync_scope(id.into(), f)
}

/// The correlation id bound to the calling task, or the `"----"` sentinel
/// when no scope is active. Never fails; background work without a scope
/// simply reports the sentinel.
pub fn current_request_id() -> String {
    CURRENT_REQUEST_ID
        .try_with(|id| id.clone())
        .unwrap_or_else(|_| REQUEST_ID_UNSET.to_string())
}

/// Fresh correlation id for requests that arrive without one.
pub fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

//! The seam between the controller and the lock service

use async_trait::async_trait;

use editlock_api::{
    AcquireRequest, AcquireResponse, ActiveLock, LockSettingsView, ReleaseRequest,
    ReleaseResponse, RenewRequest, RenewResponse, StatusQuery, StatusResponse,
};

use crate::error::Result;

/// Lock service operations as seen by a client.
///
/// `LockHttpClient` is the production implementation; tests plug in an
/// in-process fake.
#[async_trait]
pub trait LockApi: Send + Sync {
    async fn acquire(&self, request: &AcquireRequest) -> Result<AcquireResponse>;

    async fn renew(&self, request: &RenewRequest) -> Result<RenewResponse>;

    async fn release(&self, request: &ReleaseRequest) -> Result<ReleaseResponse>;

    async fn status(&self, query: &StatusQuery) -> Result<StatusResponse>;

    async fn settings(&self) -> Result<LockSettingsView>;

    async fn list(&self) -> Result<Vec<ActiveLock>>;
}

//! The "fetch page N" capability the registry job pages through.

use std::future::Future;

use onjn_registry::{RegistryClient, RegistryError, RegistryPage};

pub trait PageSource: Send + Sync + 'static {
    /// Fetches 1-based page `page` of `per_page` rows.
    fn fetch_page(
        &self,
        page: u32,
        per_page: u32,
    ) -> impl Future<Output = Result<RegistryPage, RegistryError>> + Send;
}

impl PageSource for RegistryClient {
    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<RegistryPage, RegistryError> {
        RegistryClient::fetch_page(self, page, per_page).await
    }
}

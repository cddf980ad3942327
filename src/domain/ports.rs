use crate::domain::model::{DeliveryReport, DispatchBatch, Extracted, Origin, Record};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = bool> + Send;
}

/// Where campaign rows come from.
#[async_trait]
pub trait RowSource: Send + Sync {
    fn describe(&self) -> String;

    /// Polls the source once. `None` means there is nothing new to process.
    async fn fetch(&self) -> Result<Option<Extracted>>;

    /// Marks a fetched batch as taken before any of its rows is sent. Never called on a dry run.
    async fn commit(&self, _origin: &Origin) -> Result<()> {
        Ok(())
    }

    /// Called after a row was sent successfully.
    async fn acknowledge(&self, _record: &Record) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    fn name(&self) -> &str;
    fn dry_run(&self) -> bool {
        false
    }
    async fn extract(&self) -> Result<Option<Extracted>>;
    async fn transform(&self, data: Extracted) -> Result<DispatchBatch>;
    async fn load(&self, batch: DispatchBatch) -> Result<DeliveryReport>;
}

use crate::adapters::spreadsheet::{parse_sheet, SheetFormat};
use crate::domain::model::{Extracted, Origin};
use crate::domain::ports::RowSource;
use crate::utils::error::{RelayError, Result};
use async_trait::async_trait;

pub struct FileSource {
    path: String,
}

impl FileSource {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RowSource for FileSource {
    fn describe(&self) -> String {
        format!("file ({})", self.path)
    }

    async fn fetch(&self) -> Result<Option<Extracted>> {
        let format = SheetFormat::from_name(&self.path).ok_or_else(|| {
            RelayError::validation(format!("'{}' is not an .xlsx or .csv file", self.path))
        })?;

        let bytes = tokio::fs::read(&self.path).await?;
        let table = parse_sheet(&bytes, format)?;
        tracing::info!("📄 Read {} row(s) from {}", table.records.len(), self.path);

        Ok(Some(Extracted {
            origin: Origin::LocalFile {
                path: self.path.clone(),
            },
            columns: Some(table.columns),
            records: table.records,
        }))
    }
}

//! Source data locations
//!
//! The local platform reads plain paths and `file://` URIs pointing at CSV
//! or Parquet files. Remote schemes are rejected.

use std::path::{Path, PathBuf};

use datafusion::arrow::compute::concat_batches;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::prelude::{CsvReadOptions, ParquetReadOptions, SessionContext};
use tracing::{debug, instrument};

use crate::error::{PlatformError, Result};

/// File format of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Parquet,
}

/// A parsed, readable source location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUri {
    path: PathBuf,
    format: SourceFormat,
}

impl SourceUri {
    /// Parse a user-supplied URI
    pub fn parse(uri: &str) -> Result<Self> {
        let trimmed = uri.trim();
        if trimmed.is_empty() {
            return Err(PlatformError::unsupported_uri(uri, "empty location"));
        }

        let path = match trimmed.split_once("://") {
            None => PathBuf::from(trimmed),
            Some(("file", rest)) => PathBuf::from(rest),
            Some((scheme, _)) => {
                return Err(PlatformError::unsupported_uri(
                    uri,
                    format!("scheme '{scheme}' is not readable by the local platform"),
                ))
            }
        };

        let format = match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("csv") => SourceFormat::Csv,
            Some("parquet") => SourceFormat::Parquet,
            _ => {
                return Err(PlatformError::unsupported_uri(
                    uri,
                    "expected a .csv or .parquet file",
                ))
            }
        };

        Ok(Self { path, format })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    /// Read the whole source into one batch
    #[instrument(name = "source_read", skip(self), fields(path = %self.path.display()))]
    pub async fn read(&self) -> Result<RecordBatch> {
        if !self.path.is_file() {
            return Err(PlatformError::unsupported_uri(
                self.path.display().to_string(),
                "file does not exist",
            ));
        }

        let location = self.path.to_string_lossy().into_owned();
        let ctx = SessionContext::new();
        let frame = match self.format {
            SourceFormat::Csv => ctx.read_csv(location, CsvReadOptions::new()).await?,
            SourceFormat::Parquet => {
                ctx.read_parquet(location, ParquetReadOptions::default())
                    .await?
            }
        };

        let logical = frame.schema().inner().clone();
        let batches = frame.collect().await?;
        let schema = batches.first().map(|b| b.schema()).unwrap_or(logical);
        let batch = concat_batches(&schema, &batches)?;
        debug!(rows = batch.num_rows(), columns = batch.num_columns(), "source loaded");
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_and_file_uris() {
        let plain = SourceUri::parse("data/taxi_zone_lookup.csv").unwrap();
        assert_eq!(plain.format(), SourceFormat::Csv);
        assert_eq!(plain.path(), Path::new("data/taxi_zone_lookup.csv"));

        let file = SourceUri::parse("file:///tmp/trips.PARQUET").unwrap();
        assert_eq!(file.format(), SourceFormat::Parquet);
        assert_eq!(file.path(), Path::new("/tmp/trips.PARQUET"));
    }

    #[test]
    fn test_remote_scheme_rejected() {
        let err = SourceUri::parse("s3://bucket/taxi_zone_lookup.csv").unwrap_err();
        assert!(err.to_string().contains("scheme 's3'"));
    }

    #[test]
    fn test_unknown_extension_rejected() {
        assert!(SourceUri::parse("zones.xlsx").is_err());
        assert!(SourceUri::parse("   ").is_err());
    }

    #[tokio::test]
    async fn test_read_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zones.csv");
        std::fs::write(
            &path,
            "LocationID,Borough,Zone\n1,Manhattan,Alphabet City\n2,Bronx,Allerton\n",
        )
        .unwrap();

        let source = SourceUri::parse(path.to_str().unwrap()).unwrap();
        let batch = source.read().await.unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 3);
        assert!(batch.column_by_name("Borough").is_some());
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let source = SourceUri::parse("/definitely/not/here.csv").unwrap();
        assert!(source.read().await.is_err());
    }
}

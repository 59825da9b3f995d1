//! Download, archive, transform and archive again.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::api::ExportApi;
use crate::period::ReportingPeriod;
use crate::storage::{ArtifactStore, StorageError};
use crate::transform::{transform_to_digrin, TickerRules, TransformError};

/// Key prefix for the export exactly as downloaded.
pub const RAW_PREFIX: &str = "t212";

/// Key prefix for the Digrin-shaped export.
pub const DIGRIN_PREFIX: &str = "digrin";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to download export: {0}")]
    Download(#[source] t212_api::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error("Failed to write local copy {path}: {source}")]
    LocalCopy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What a pipeline run wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSummary {
    pub raw_key: String,
    pub digrin_key: String,
    pub raw_bytes: usize,
    pub rows_in: usize,
    pub rows_out: usize,
    pub local_copy: Option<PathBuf>,
}

pub fn raw_key(period: &ReportingPeriod) -> String {
    format!("{}/{}", RAW_PREFIX, period.file_name())
}

pub fn digrin_key(period: &ReportingPeriod) -> String {
    format!("{}/{}", DIGRIN_PREFIX, period.file_name())
}

/// Turns a resolved download link into stored artifacts.
pub struct ArtifactPipeline<'a, A, S> {
    api: &'a A,
    store: &'a S,
    bucket: String,
    rules: TickerRules,
    output_dir: Option<PathBuf>,
}

impl<'a, A, S> ArtifactPipeline<'a, A, S>
where
    A: ExportApi,
    S: ArtifactStore,
{
    pub fn new(api: &'a A, store: &'a S, bucket: impl Into<String>, rules: TickerRules) -> Self {
        Self {
            api,
            store,
            bucket: bucket.into(),
            rules,
            output_dir: None,
        }
    }

    /// Also write the Digrin CSV to `<dir>/<period>.csv`.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub async fn run(
        &self,
        period: &ReportingPeriod,
        download_link: &str,
    ) -> Result<ArtifactSummary, PipelineError> {
        let raw = self
            .api
            .download_export(download_link)
            .await
            .map_err(PipelineError::Download)?;
        let raw_bytes = raw.len();
        tracing::info!(raw_bytes, "Downloaded export for {}", period);

        let raw_key = raw_key(period);
        self.store
            .put_object(&self.bucket, &raw_key, raw.clone())
            .await?;

        let transformed = transform_to_digrin(&raw, &self.rules)?;

        let digrin_key = digrin_key(period);
        self.store
            .put_object(&self.bucket, &digrin_key, transformed.csv.clone())
            .await?;

        let local_copy = match &self.output_dir {
            Some(dir) => Some(self.write_local_copy(dir, period, &transformed.csv).await?),
            None => None,
        };

        tracing::info!(
            rows_in = transformed.rows_in,
            rows_out = transformed.rows_out,
            "Archived {} and {}",
            raw_key,
            digrin_key
        );

        Ok(ArtifactSummary {
            raw_key,
            digrin_key,
            raw_bytes,
            rows_in: transformed.rows_in,
            rows_out: transformed.rows_out,
            local_copy,
        })
    }

    async fn write_local_copy(
        &self,
        dir: &Path,
        period: &ReportingPeriod,
        csv: &[u8],
    ) -> Result<PathBuf, PipelineError> {
        let path = dir.join(period.file_name());
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| PipelineError::LocalCopy {
                path: dir.to_path_buf(),
                source,
            })?;
        tokio::fs::write(&path, csv)
            .await
            .map_err(|source| PipelineError::LocalCopy {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }
}

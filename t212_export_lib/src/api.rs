//! Seam between the poller/pipeline and the remote export API.

use t212_api::{Client, Error, ExportJobRecord, ExportJobRequest, ReportId};

/// The remote operations the export job needs.
///
/// Implemented by [`t212_api::Client`]; tests substitute scripted fakes.
#[allow(async_fn_in_trait)]
pub trait ExportApi {
    async fn submit_export(&self, request: &ExportJobRequest) -> Result<ReportId, Error>;
    async fn list_exports(&self) -> Result<Vec<ExportJobRecord>, Error>;
    async fn download_export(&self, download_link: &str) -> Result<Vec<u8>, Error>;
}

impl ExportApi for Client {
    async fn submit_export(&self, request: &ExportJobRequest) -> Result<ReportId, Error> {
        Client::submit_export(self, request).await
    }

    async fn list_exports(&self) -> Result<Vec<ExportJobRecord>, Error> {
        Client::list_exports(self).await
    }

    async fn download_export(&self, download_link: &str) -> Result<Vec<u8>, Error> {
        Client::download_export(self, download_link).await
    }
}

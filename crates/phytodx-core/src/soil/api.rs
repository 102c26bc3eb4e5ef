use std::future::Future;

use phytodx_types::error::RemoteError;
use phytodx_types::soil::{SoilAssessment, SoilAssessmentRequest};

/// Remote soil-assessment service.
pub trait SoilApi: Send + Sync + 'static {
    fn assess_soil(
        &self,
        request: &SoilAssessmentRequest,
    ) -> impl Future<Output = Result<SoilAssessment, RemoteError>> + Send;
}

use std::sync::Arc;

use crate::application::certificates::CertificatePipeline;
use crate::application::jobs::CertificateJobQueue;
use crate::application::repos::HealthCheck;
use crate::application::templates::TemplateService;
use crate::application::verification::VerificationService;

/// Services shared by every HTTP handler.
#[derive(Clone)]
pub struct ApiState {
    pub templates: Arc<TemplateService>,
    pub certificates: Arc<CertificatePipeline>,
    pub jobs: Arc<CertificateJobQueue>,
    pub verification: Arc<VerificationService>,
    pub health: Arc<dyn HealthCheck>,
}

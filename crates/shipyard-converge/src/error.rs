//! Error taxonomy shared by all orchestration components.

use std::time::Duration;

use thiserror::Error;

use shipyard_cloud::CloudError;

/// Result type alias for orchestration operations.
pub type OrchestrationResult<T> = Result<T, OrchestrationError>;

/// Errors surfaced by orchestration operations.
///
/// Every variant names the resource and the operation that failed so that
/// a caller can attribute the failure without parsing messages.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// A convergence wait exhausted its budget.
    #[error(
        "{operation} on {resource} did not converge within {elapsed:?} \
         (last observed: {last_observed})"
    )]
    ProvisioningTimeout {
        resource: String,
        operation: String,
        last_observed: String,
        elapsed: Duration,
    },

    /// The control plane refused a request.
    #[error("{operation} on {resource} rejected ({code}): {message}")]
    ControlPlaneRejected {
        resource: String,
        operation: String,
        code: String,
        message: String,
    },

    /// The caller cancelled the operation while it was waiting.
    #[error("{operation} on {resource} cancelled (last observed: {last_observed})")]
    Cancelled {
        resource: String,
        operation: String,
        last_observed: String,
    },

    /// A participating host of a revision deployment could not be described.
    #[error("deployment {deployment_id}: lookup of host {host_id} failed ({code}): {message}")]
    HostLookupFailed {
        deployment_id: String,
        host_id: String,
        code: String,
        message: String,
    },

    #[error("{resource} not found during {operation}")]
    NotFound { resource: String, operation: String },

    /// Transport-level failure talking to the control plane.
    #[error("{operation} on {resource} failed: {source}")]
    ControlPlane {
        resource: String,
        operation: String,
        #[source]
        source: CloudError,
    },

    #[error("invalid spec: {0}")]
    InvalidSpec(String),
}

impl OrchestrationError {
    /// Attribute a control-plane error to an operation on a resource.
    pub fn from_cloud(err: CloudError, operation: &str, resource: &str) -> Self {
        match err {
            CloudError::Rejected { code, message } => Self::ControlPlaneRejected {
                resource: resource.to_string(),
                operation: operation.to_string(),
                code,
                message,
            },
            CloudError::NotFound(_) => Self::NotFound {
                resource: resource.to_string(),
                operation: operation.to_string(),
            },
            other => Self::ControlPlane {
                resource: resource.to_string(),
                operation: operation.to_string(),
                source: other,
            },
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ProvisioningTimeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Attach operation/resource context to a raw control-plane result.
pub trait CloudResultExt<T> {
    fn during(self, operation: &str, resource: &str) -> OrchestrationResult<T>;
}

impl<T> CloudResultExt<T> for Result<T, CloudError> {
    fn during(self, operation: &str, resource: &str) -> OrchestrationResult<T> {
        self.map_err(|e| OrchestrationError::from_cloud(e, operation, resource))
    }
}

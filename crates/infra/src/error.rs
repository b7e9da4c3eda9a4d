use thiserror::Error;

use quartermaster_auth::AuthzError;
use quartermaster_core::DomainError;

/// Error returned by every infra service operation.
///
/// Business failures travel as [`DomainError`]; `Storage` covers the backing
/// store itself misbehaving (a poisoned lock for the in-memory backends).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("storage failure: {0}")]
    Storage(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub(crate) fn poisoned(what: &str) -> Self {
        ServiceError::Storage(format!("{what} lock poisoned"))
    }

    /// The domain error, when this is one.
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(e) => Some(e),
            ServiceError::Storage(_) => None,
        }
    }
}

impl From<AuthzError> for ServiceError {
    fn from(value: AuthzError) -> Self {
        ServiceError::Domain(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quartermaster_auth::Capability;

    #[test]
    fn authz_errors_surface_as_unauthorized() {
        let err = ServiceError::from(AuthzError::MissingCapability(Capability::Admin));
        assert!(matches!(
            err.as_domain(),
            Some(DomainError::Unauthorized(msg)) if msg.contains("admin")
        ));
    }

    #[test]
    fn storage_errors_are_not_domain_errors() {
        assert_eq!(ServiceError::poisoned("ledger").as_domain(), None);
    }
}

//! Certificate business logic service

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::domain::{Certificate, CertificateId, IdSequence};
use crate::errors::{AglbError, Result};
use crate::storage::ResourceStore;
use crate::validation::{validate_certificate, CreateCertificatePayload};

/// Service for uploading, reading and deleting certificates
#[derive(Clone)]
pub struct CertificateService {
    store: Arc<dyn ResourceStore>,
    ids: IdSequence,
}

impl CertificateService {
    pub fn new(store: Arc<dyn ResourceStore>, ids: IdSequence) -> Self {
        Self { store, ids }
    }

    #[instrument(skip(self, payload), fields(label = %payload.label), name = "create_certificate")]
    pub async fn create_certificate(&self, payload: CreateCertificatePayload) -> Result<Certificate> {
        let certificate = validate_certificate(&self.ids, &payload).map_err(|report| {
            warn!(issues = report.len(), "Certificate rejected by validation");
            AglbError::Validation(report)
        })?;

        let created = self.store.insert_certificate(&certificate).await?;
        info!(
            certificate_id = %created.id,
            certificate_type = %created.certificate_type,
            "Certificate created"
        );
        Ok(created)
    }

    pub async fn get_certificate(&self, id: CertificateId) -> Result<Certificate> {
        self.store
            .get_certificate_by_id(id)
            .await?
            .ok_or_else(|| AglbError::not_found("certificate", id.to_string()))
    }

    /// Delete a certificate that nothing references any more
    #[instrument(skip(self), fields(certificate_id = %id), name = "delete_certificate")]
    pub async fn delete_certificate(&self, id: CertificateId) -> Result<()> {
        self.store.delete_certificate(id).await?;
        info!(certificate_id = %id, "Certificate deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CertificateType;
    use crate::storage::InMemoryStore;
    use crate::validation::ErrorKind;

    fn service() -> CertificateService {
        CertificateService::new(Arc::new(InMemoryStore::new()), IdSequence::default())
    }

    fn ca_payload() -> CreateCertificatePayload {
        CreateCertificatePayload {
            key: None,
            certificate: "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----".into(),
            label: "internal-ca".into(),
            certificate_type: "ca".into(),
        }
    }

    #[tokio::test]
    async fn create_get_delete() {
        let service = service();
        let created = service.create_certificate(ca_payload()).await.unwrap();
        assert_eq!(created.certificate_type, CertificateType::Ca);

        let fetched = service.get_certificate(created.id).await.unwrap();
        assert_eq!(fetched, created);

        service.delete_certificate(created.id).await.unwrap();
        assert!(matches!(
            service.get_certificate(created.id).await,
            Err(AglbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn downstream_without_key_is_rejected() {
        let service = service();
        let payload = CreateCertificatePayload { certificate_type: "downstream".into(), ..ca_payload() };

        let Err(AglbError::Validation(report)) = service.create_certificate(payload).await else {
            panic!("expected a validation error");
        };
        assert!(report.contains(ErrorKind::Required));
    }
}

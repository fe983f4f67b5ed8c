//! Certificate payload validation.

use crate::domain::{CertificateType, IdSequence, NewCertificate};

use super::error::{FieldError, IssueCollector, ValidationReport};
use super::primitives::{validate_certificate_type, validate_label};
use super::requests::CreateCertificatePayload;

const PEM_CERTIFICATE_HEADER: &str = "-----BEGIN CERTIFICATE-----";
const PEM_PRIVATE_KEY_MARKER: &str = "PRIVATE KEY-----";

/// Validate a certificate upload. Downstream certificates are served to
/// clients and therefore need their private key; CA certificates must not
/// carry one.
pub fn validate_certificate(
    ids: &IdSequence,
    payload: &CreateCertificatePayload,
) -> Result<NewCertificate, ValidationReport> {
    let mut issues = IssueCollector::new();

    let label = issues.check("label", validate_label(&payload.label));
    let certificate_type = issues.check("type", validate_certificate_type(&payload.certificate_type));
    let certificate = issues.check("certificate", validate_pem_certificate(&payload.certificate));
    let key = match certificate_type {
        Some(certificate_type) => {
            issues.check("key", validate_key(certificate_type, payload.key.as_deref()))
        }
        None => None,
    };

    match (label, certificate_type, certificate, key) {
        (Some(label), Some(certificate_type), Some(certificate), Some(key)) if issues.is_clean() => {
            Ok(NewCertificate { id: ids.next_id(), label, certificate_type, certificate, key })
        }
        _ => Err(issues.into_report()),
    }
}

fn validate_pem_certificate(pem: &str) -> Result<String, FieldError> {
    let pem = pem.trim();
    if pem.is_empty() {
        return Err(FieldError::required("certificate cannot be empty"));
    }
    if !pem.contains(PEM_CERTIFICATE_HEADER) {
        return Err(FieldError::format("certificate must be PEM encoded"));
    }
    Ok(pem.to_string())
}

fn validate_key(
    certificate_type: CertificateType,
    key: Option<&str>,
) -> Result<Option<String>, FieldError> {
    let key = key.map(str::trim).filter(|k| !k.is_empty());
    match (certificate_type, key) {
        (CertificateType::Downstream, None) => {
            Err(FieldError::required("downstream certificates require a private key"))
        }
        (CertificateType::Downstream, Some(key)) if !key.contains(PEM_PRIVATE_KEY_MARKER) => {
            Err(FieldError::format("key must be a PEM encoded private key"))
        }
        (CertificateType::Downstream, Some(key)) => Ok(Some(key.to_string())),
        (CertificateType::Ca, Some(_)) => {
            Err(FieldError::format("ca certificates must not include a private key"))
        }
        (CertificateType::Ca, None) => Ok(None),
    }
}

//! Business logic services
//!
//! Service layer components that run validation and commits, separated
//! from HTTP concerns.

pub mod certificate_service;
pub mod loadbalancer_service;

pub use certificate_service::CertificateService;
pub use loadbalancer_service::LoadbalancerService;

use std::sync::Arc;

use crate::domain::IdSequence;
use crate::errors::Result;
use crate::storage::ResourceStore;

/// Both services over one store, sharing one id sequence
#[derive(Clone)]
pub struct Services {
    pub loadbalancers: LoadbalancerService,
    pub certificates: CertificateService,
}

impl Services {
    /// Seed the id sequence past every id already in `store`
    pub async fn open(store: Arc<dyn ResourceStore>, base_domain: &str) -> Result<Self> {
        let highest = store.max_id().await?;
        tracing::debug!(highest_id = highest, "Seeding id sequence");
        Ok(Self::with_ids(store, IdSequence::after(highest), base_domain))
    }

    pub fn with_ids(store: Arc<dyn ResourceStore>, ids: IdSequence, base_domain: &str) -> Self {
        Self {
            loadbalancers: LoadbalancerService::new(store.clone(), ids.clone(), base_domain),
            certificates: CertificateService::new(store, ids),
        }
    }
}

//! Vendor directory operations.
//!
//! Vendors are keyed by their lower-cased email. A vendor referenced by an
//! RFP or proposal is deactivated instead of deleted.

use serde::Serialize;
use validator::Validate;

use procura_core::error::CoreError;
use procura_core::pagination::{clamp_limit, clamp_offset, DEFAULT_LIMIT, MAX_LIMIT};
use procura_core::types::DbId;
use procura_core::vendor::{validate_vendor_email, validate_vendor_name, validate_vendor_website};
use procura_db::models::vendor::{CreateVendor, UpdateVendor, Vendor, VendorListParams};
use procura_db::SharedStore;

const VENDOR_ENTITY: &str = "Vendor";

/// What `delete` did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VendorRemoval {
    Deleted { id: DbId },
    /// Still referenced; kept as an inactive row.
    Deactivated { vendor: Vendor },
}

#[derive(Clone)]
pub struct VendorService {
    store: SharedStore,
}

impl VendorService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn list(&self, params: &VendorListParams) -> Result<Vec<Vendor>, CoreError> {
        let limit = clamp_limit(params.limit, DEFAULT_LIMIT, MAX_LIMIT);
        let offset = clamp_offset(params.offset);
        Ok(self
            .store
            .list_vendors(params.include_inactive.unwrap_or(false), limit, offset)
            .await?)
    }

    pub async fn get(&self, id: DbId) -> Result<Vendor, CoreError> {
        self.store.get_vendor(id).await?.ok_or(CoreError::NotFound {
            entity: VENDOR_ENTITY,
            id,
        })
    }

    pub async fn create(&self, input: CreateVendor) -> Result<Vendor, CoreError> {
        let input = input.normalized();
        validate_vendor_name(&input.name)?;
        validate_vendor_email(&input.email)?;
        validate_vendor_website(input.website.as_deref())?;
        input
            .validate()
            .map_err(|e| CoreError::InvalidInput(e.to_string()))?;

        let vendor = self.store.create_vendor(&input).await.map_err(|e| {
            duplicate_email(e.into(), &input.email)
        })?;
        tracing::info!(vendor_id = vendor.id, email = %vendor.email, "Vendor created");
        Ok(vendor)
    }

    pub async fn update(&self, id: DbId, input: UpdateVendor) -> Result<Vendor, CoreError> {
        let input = input.normalized();
        if let Some(name) = &input.name {
            validate_vendor_name(name)?;
        }
        if let Some(email) = &input.email {
            validate_vendor_email(email)?;
        }
        validate_vendor_website(input.website.as_deref())?;
        input
            .validate()
            .map_err(|e| CoreError::InvalidInput(e.to_string()))?;

        let updated = self.store.update_vendor(id, &input).await.map_err(|e| {
            duplicate_email(e.into(), input.email.as_deref().unwrap_or_default())
        })?;
        let vendor = updated.ok_or(CoreError::NotFound {
            entity: VENDOR_ENTITY,
            id,
        })?;
        tracing::info!(vendor_id = id, "Vendor updated");
        Ok(vendor)
    }

    pub async fn toggle_active(&self, id: DbId) -> Result<Vendor, CoreError> {
        let current = self.get(id).await?;
        let vendor = self
            .store
            .set_vendor_active(id, !current.active)
            .await?
            .ok_or(CoreError::NotFound {
                entity: VENDOR_ENTITY,
                id,
            })?;
        tracing::info!(vendor_id = id, active = vendor.active, "Vendor active flag toggled");
        Ok(vendor)
    }

    /// Hard-delete an unreferenced vendor; deactivate a referenced one.
    pub async fn delete(&self, id: DbId) -> Result<VendorRemoval, CoreError> {
        self.get(id).await?;
        if self.store.vendor_is_referenced(id).await? {
            let vendor = self
                .store
                .set_vendor_active(id, false)
                .await?
                .ok_or(CoreError::NotFound {
                    entity: VENDOR_ENTITY,
                    id,
                })?;
            tracing::info!(vendor_id = id, "Referenced vendor deactivated instead of deleted");
            return Ok(VendorRemoval::Deactivated { vendor });
        }

        if !self.store.delete_vendor(id).await? {
            return Err(CoreError::NotFound {
                entity: VENDOR_ENTITY,
                id,
            });
        }
        tracing::info!(vendor_id = id, "Vendor deleted");
        Ok(VendorRemoval::Deleted { id })
    }
}

fn duplicate_email(err: CoreError, email: &str) -> CoreError {
    match err {
        CoreError::Conflict(_) => {
            CoreError::Conflict(format!("A vendor with email '{email}' already exists"))
        }
        other => other,
    }
}

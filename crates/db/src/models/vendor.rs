//! Vendor entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use procura_core::types::{DbId, Timestamp};
use procura_core::vendor::normalize_email;

/// A row from the `vendors` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Vendor {
    pub id: DbId,
    pub name: String,
    pub email: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
    pub active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a vendor.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateVendor {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    #[validate(url)]
    pub website: Option<String>,
    pub notes: Option<String>,
    pub active: Option<bool>,
}

impl CreateVendor {
    /// Trim the name, lower-case the email and blank-out empty optionals.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.email = normalize_email(&self.email);
        for field in [
            &mut self.contact_person,
            &mut self.phone,
            &mut self.address,
            &mut self.city,
            &mut self.country,
            &mut self.website,
            &mut self.notes,
        ] {
            blank_to_none(field);
        }
        self
    }
}

/// DTO for updating a vendor. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateVendor {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    #[validate(url)]
    pub website: Option<String>,
    pub notes: Option<String>,
}

impl UpdateVendor {
    pub fn normalized(mut self) -> Self {
        self.name = self.name.map(|n| n.trim().to_string());
        self.email = self.email.map(|e| normalize_email(&e));
        blank_to_none(&mut self.website);
        self
    }
}

/// Query parameters for listing vendors.
#[derive(Debug, Default, Deserialize)]
pub struct VendorListParams {
    pub include_inactive: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn blank_to_none(field: &mut Option<String>) {
    if field.as_deref().is_some_and(|v| v.trim().is_empty()) {
        *field = None;
    }
}

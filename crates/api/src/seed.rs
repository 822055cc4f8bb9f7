//! Sample vendor directory for local development.
//!
//! Seeding is idempotent: a vendor whose email is already on file is left
//! untouched.

use serde::Serialize;

use procura_core::error::CoreError;
use procura_db::models::vendor::CreateVendor;
use procura_db::SharedStore;
use procura_pipeline::VendorService;

/// What one seeding run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub created: usize,
    pub existing: usize,
}

struct SampleVendor {
    name: &'static str,
    email: &'static str,
    contact_person: &'static str,
    phone: &'static str,
    address: &'static str,
    city: &'static str,
    website: &'static str,
    notes: &'static str,
}

const SAMPLE_VENDORS: &[SampleVendor] = &[
    SampleVendor {
        name: "Tech Solutions Inc",
        email: "sales@techsolutions.com",
        contact_person: "John Smith",
        phone: "555-0101",
        address: "123 Tech Street",
        city: "San Francisco",
        website: "https://techsolutions.com",
        notes: "Preferred vendor for IT equipment",
    },
    SampleVendor {
        name: "Global Hardware Ltd",
        email: "procurement@globalhw.com",
        contact_person: "Sarah Johnson",
        phone: "555-0102",
        address: "456 Hardware Ave",
        city: "New York",
        website: "https://globalhw.com",
        notes: "Reliable supplier with good pricing",
    },
    SampleVendor {
        name: "Prime Equipment Supply",
        email: "sales@primeequip.com",
        contact_person: "Mike Chen",
        phone: "555-0103",
        address: "789 Supply Road",
        city: "Chicago",
        website: "https://primeequip.com",
        notes: "Fast delivery capability",
    },
    SampleVendor {
        name: "Enterprise Solutions Group",
        email: "quote@esg.com",
        contact_person: "Linda Davis",
        phone: "555-0104",
        address: "321 Enterprise Blvd",
        city: "Boston",
        website: "https://esgservices.com",
        notes: "High-end enterprise solutions",
    },
];

impl SampleVendor {
    fn to_input(&self) -> CreateVendor {
        CreateVendor {
            name: self.name.into(),
            email: self.email.into(),
            contact_person: Some(self.contact_person.into()),
            phone: Some(self.phone.into()),
            address: Some(self.address.into()),
            city: Some(self.city.into()),
            country: Some("USA".into()),
            website: Some(self.website.into()),
            notes: Some(self.notes.into()),
            active: Some(true),
        }
    }
}

/// Create every sample vendor not already on file.
pub async fn seed_vendors(store: SharedStore) -> Result<SeedReport, CoreError> {
    let vendors = VendorService::new(store.clone());
    let mut report = SeedReport::default();

    for sample in SAMPLE_VENDORS {
        if let Some(existing) = store.find_vendor_by_email(sample.email).await? {
            tracing::info!(
                vendor_id = existing.id,
                email = sample.email,
                "Vendor already exists"
            );
            report.existing += 1;
            continue;
        }
        vendors.create(sample.to_input()).await?;
        report.created += 1;
    }

    tracing::info!(
        created = report.created,
        existing = report.existing,
        "Vendor seeding complete"
    );
    Ok(report)
}

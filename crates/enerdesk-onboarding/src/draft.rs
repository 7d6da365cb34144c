//! The client-held onboarding draft.
//!
//! Nothing in here touches the network. A draft is filled field by field,
//! attached files are kept in memory, and the whole thing can be discarded at
//! any point before submission.

use serde::Serialize;
use std::fmt;
use std::path::Path;
use strum::{AsRefStr, Display, EnumIter, EnumString};

use enerdesk_backend::DocumentKind;

/// Access tariff preselected for new supply points.
pub const DEFAULT_ACCESS_TARIFF: &str = "2.0TD";

/// Every editable text field of the draft.
///
/// Field names are the snake_case variant names (`tax_id`, `postal_code`,
/// `p1`...), which is also how draft files and error maps refer to them.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DraftField {
    // Holder
    Name,
    TaxId,
    ContactPerson,
    Email,
    Phone,
    BankAccount,
    // Supply point
    Cups,
    Address,
    PostalCode,
    Province,
    AccessTariff,
    Distributor,
    // Contract
    Retailer,
    Product,
    StartDate,
    EndDate,
    P1,
    P2,
    P3,
    P4,
    P5,
    P6,
}

impl DraftField {
    /// The six contracted power tiers, in order.
    pub const POWER_TIERS: [DraftField; 6] = [
        DraftField::P1,
        DraftField::P2,
        DraftField::P3,
        DraftField::P4,
        DraftField::P5,
        DraftField::P6,
    ];
}

/// Named slot a document file is attached to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentSlot {
    Identity,
    Invoice,
}

impl DocumentSlot {
    /// Upload order: identity proof first, then the prior invoice.
    pub const ALL: [DocumentSlot; 2] = [DocumentSlot::Identity, DocumentSlot::Invoice];

    #[must_use]
    pub fn kind(self) -> DocumentKind {
        match self {
            DocumentSlot::Identity => DocumentKind::Identity,
            DocumentSlot::Invoice => DocumentKind::Invoice,
        }
    }
}

/// A picked file that has not been uploaded yet.
#[derive(Clone, PartialEq, Eq)]
pub struct PendingFile {
    filename: String,
    bytes: Vec<u8>,
}

impl PendingFile {
    #[must_use]
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    /// Read a file from disk, keeping only its final path component as the name.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the file cannot be read.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { filename, bytes })
    }

    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for PendingFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingFile")
            .field("filename", &self.filename)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Everything the wizard has collected for one new client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingDraft {
    pub name: String,
    pub tax_id: String,
    pub contact_person: String,
    pub email: String,
    pub phone: String,
    pub bank_account: String,

    pub cups: String,
    pub address: String,
    pub postal_code: String,
    pub province: String,
    pub access_tariff: String,
    pub distributor: String,

    pub retailer: String,
    pub product: String,
    pub start_date: String,
    pub end_date: String,
    /// Power tiers `p1`..`p6` as typed; coerced to numbers at submission.
    pub power: [String; 6],

    pub identity_document: Option<PendingFile>,
    pub invoice_document: Option<PendingFile>,
}

impl Default for OnboardingDraft {
    fn default() -> Self {
        Self::with_access_tariff(DEFAULT_ACCESS_TARIFF)
    }
}

impl OnboardingDraft {
    /// Empty draft with the access tariff preselected.
    #[must_use]
    pub fn with_access_tariff(tariff: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            tax_id: String::new(),
            contact_person: String::new(),
            email: String::new(),
            phone: String::new(),
            bank_account: String::new(),
            cups: String::new(),
            address: String::new(),
            postal_code: String::new(),
            province: String::new(),
            access_tariff: tariff.into(),
            distributor: String::new(),
            retailer: String::new(),
            product: String::new(),
            start_date: String::new(),
            end_date: String::new(),
            power: Default::default(),
            identity_document: None,
            invoice_document: None,
        }
    }

    #[must_use]
    pub fn get(&self, field: DraftField) -> &str {
        match field {
            DraftField::Name => &self.name,
            DraftField::TaxId => &self.tax_id,
            DraftField::ContactPerson => &self.contact_person,
            DraftField::Email => &self.email,
            DraftField::Phone => &self.phone,
            DraftField::BankAccount => &self.bank_account,
            DraftField::Cups => &self.cups,
            DraftField::Address => &self.address,
            DraftField::PostalCode => &self.postal_code,
            DraftField::Province => &self.province,
            DraftField::AccessTariff => &self.access_tariff,
            DraftField::Distributor => &self.distributor,
            DraftField::Retailer => &self.retailer,
            DraftField::Product => &self.product,
            DraftField::StartDate => &self.start_date,
            DraftField::EndDate => &self.end_date,
            DraftField::P1 => &self.power[0],
            DraftField::P2 => &self.power[1],
            DraftField::P3 => &self.power[2],
            DraftField::P4 => &self.power[3],
            DraftField::P5 => &self.power[4],
            DraftField::P6 => &self.power[5],
        }
    }

    pub fn set(&mut self, field: DraftField, value: impl Into<String>) {
        *self.slot_mut(field) = value.into();
    }

    fn slot_mut(&mut self, field: DraftField) -> &mut String {
        match field {
            DraftField::Name => &mut self.name,
            DraftField::TaxId => &mut self.tax_id,
            DraftField::ContactPerson => &mut self.contact_person,
            DraftField::Email => &mut self.email,
            DraftField::Phone => &mut self.phone,
            DraftField::BankAccount => &mut self.bank_account,
            DraftField::Cups => &mut self.cups,
            DraftField::Address => &mut self.address,
            DraftField::PostalCode => &mut self.postal_code,
            DraftField::Province => &mut self.province,
            DraftField::AccessTariff => &mut self.access_tariff,
            DraftField::Distributor => &mut self.distributor,
            DraftField::Retailer => &mut self.retailer,
            DraftField::Product => &mut self.product,
            DraftField::StartDate => &mut self.start_date,
            DraftField::EndDate => &mut self.end_date,
            DraftField::P1 => &mut self.power[0],
            DraftField::P2 => &mut self.power[1],
            DraftField::P3 => &mut self.power[2],
            DraftField::P4 => &mut self.power[3],
            DraftField::P5 => &mut self.power[4],
            DraftField::P6 => &mut self.power[5],
        }
    }

    #[must_use]
    pub fn file(&self, slot: DocumentSlot) -> Option<&PendingFile> {
        match slot {
            DocumentSlot::Identity => self.identity_document.as_ref(),
            DocumentSlot::Invoice => self.invoice_document.as_ref(),
        }
    }

    pub fn set_file(&mut self, slot: DocumentSlot, file: Option<PendingFile>) {
        match slot {
            DocumentSlot::Identity => self.identity_document = file,
            DocumentSlot::Invoice => self.invoice_document = file,
        }
    }

    /// Populated document slots in upload order.
    pub fn attached_documents(&self) -> impl Iterator<Item = (DocumentSlot, &PendingFile)> {
        DocumentSlot::ALL
            .into_iter()
            .filter_map(|slot| self.file(slot).map(|file| (slot, file)))
    }
}

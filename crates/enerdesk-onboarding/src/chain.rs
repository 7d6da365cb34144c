//! Onboarding chain as an explicit list of step descriptors.
//!
//! Each [`ChainStep`] turns the draft plus the outputs of earlier steps into
//! exactly one [`BackendRequest`], and records what the backend answered. The
//! orchestrator runs the list with a single driver loop; [`dispatch`] is the
//! only place a request meets a [`CrmBackend`].

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use enerdesk_backend::{
    ContractState, Created, CrmBackend, EntityId, NewClient, NewContract, NewDocument,
    NewSupplyPoint, NewSwitchingRequest, StoredFile, SwitchingKind,
};
use enerdesk_utils::error::BackendError;
use enerdesk_utils::types::StageId;

use crate::draft::{DocumentSlot, DraftField, OnboardingDraft};

/// One remote call of the chain.
#[derive(Debug)]
pub enum BackendRequest<'a> {
    CreateClient(NewClient),
    UploadFile { filename: &'a str, bytes: &'a [u8] },
    CreateDocument(NewDocument),
    CreateSupplyPoint(NewSupplyPoint),
    CreateContract(NewContract),
    CreateSwitchingRequest(NewSwitchingRequest),
}

#[derive(Debug)]
pub enum BackendResponse {
    Created(Created),
    Stored(StoredFile),
}

/// Execute one request against the backend.
///
/// # Errors
///
/// Propagates the backend's error unchanged.
pub async fn dispatch(
    backend: &dyn CrmBackend,
    request: BackendRequest<'_>,
) -> Result<BackendResponse, BackendError> {
    let response = match request {
        BackendRequest::CreateClient(body) => BackendResponse::Created(backend.create_client(&body).await?),
        BackendRequest::UploadFile { filename, bytes } => {
            BackendResponse::Stored(backend.upload_file(filename, bytes).await?)
        }
        BackendRequest::CreateDocument(body) => {
            BackendResponse::Created(backend.create_document(&body).await?)
        }
        BackendRequest::CreateSupplyPoint(body) => {
            BackendResponse::Created(backend.create_supply_point(&body).await?)
        }
        BackendRequest::CreateContract(body) => {
            BackendResponse::Created(backend.create_contract(&body).await?)
        }
        BackendRequest::CreateSwitchingRequest(body) => {
            BackendResponse::Created(backend.create_switching_request(&body).await?)
        }
    };
    Ok(response)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StepError {
    /// A draft value could not be turned into what the backend expects.
    #[error("invalid {field}: {reason}")]
    InvalidField { field: DraftField, reason: String },

    /// A step ran before the step producing its input.
    #[error("{0} is not available yet")]
    MissingOutput(&'static str),

    #[error("{0} answered with an unexpected response")]
    UnexpectedResponse(&'static str),
}

/// A document registered during the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisteredDocument {
    pub slot: DocumentSlot,
    pub filename: String,
    pub stored_path: String,
    pub document_id: EntityId,
}

/// Identifiers produced so far, consumed by later steps.
#[derive(Debug, Clone, Default)]
pub struct StepOutputs {
    pub client_id: Option<EntityId>,
    pub stored_files: Vec<(DocumentSlot, StoredFile)>,
    pub documents: Vec<RegisteredDocument>,
    pub supply_point_id: Option<EntityId>,
    pub contract_id: Option<EntityId>,
    pub switching_request_id: Option<EntityId>,
}

impl StepOutputs {
    fn client_id(&self) -> Result<EntityId, StepError> {
        self.client_id.clone().ok_or(StepError::MissingOutput("client id"))
    }

    fn stored_file(&self, slot: DocumentSlot) -> Result<&StoredFile, StepError> {
        self.stored_files
            .iter()
            .find(|(stored_slot, _)| *stored_slot == slot)
            .map(|(_, file)| file)
            .ok_or(StepError::MissingOutput("stored file path"))
    }

    /// Path the upload reported, or the original filename when it reported none.
    fn stored_path(&self, slot: DocumentSlot, filename: &str) -> Result<String, StepError> {
        Ok(self
            .stored_file(slot)?
            .stored_path
            .clone()
            .unwrap_or_else(|| filename.to_string()))
    }
}

/// A single call of the onboarding chain.
pub trait ChainStep: Send + Sync {
    /// Stage the step belongs to; consecutive steps may share a stage.
    fn stage(&self) -> StageId;

    /// Backend operation the step calls.
    fn operation(&self) -> &'static str;

    /// Build the request from the draft and earlier outputs.
    fn build<'a>(
        &self,
        draft: &'a OnboardingDraft,
        outputs: &StepOutputs,
    ) -> Result<BackendRequest<'a>, StepError>;

    /// Store what this step produced.
    fn record(
        &self,
        draft: &OnboardingDraft,
        response: BackendResponse,
        outputs: &mut StepOutputs,
    ) -> Result<(), StepError>;
}

fn created(response: BackendResponse, operation: &'static str) -> Result<EntityId, StepError> {
    match response {
        BackendResponse::Created(created) => Ok(created.id),
        BackendResponse::Stored(_) => Err(StepError::UnexpectedResponse(operation)),
    }
}

pub struct CreateClientStep;

impl ChainStep for CreateClientStep {
    fn stage(&self) -> StageId {
        StageId::Client
    }

    fn operation(&self) -> &'static str {
        "create_client"
    }

    fn build<'a>(
        &self,
        draft: &'a OnboardingDraft,
        _outputs: &StepOutputs,
    ) -> Result<BackendRequest<'a>, StepError> {
        Ok(BackendRequest::CreateClient(NewClient {
            name: draft.name.trim().to_string(),
            tax_id: draft.tax_id.trim().to_string(),
            contact_person: optional(&draft.contact_person),
            email: optional(&draft.email),
            phone: optional(&draft.phone),
            bank_account: optional(&draft.bank_account),
        }))
    }

    fn record(
        &self,
        _draft: &OnboardingDraft,
        response: BackendResponse,
        outputs: &mut StepOutputs,
    ) -> Result<(), StepError> {
        outputs.client_id = Some(created(response, "create_client")?);
        Ok(())
    }
}

pub struct UploadDocumentStep {
    pub slot: DocumentSlot,
}

impl ChainStep for UploadDocumentStep {
    fn stage(&self) -> StageId {
        StageId::Documents
    }

    fn operation(&self) -> &'static str {
        "upload_file"
    }

    fn build<'a>(
        &self,
        draft: &'a OnboardingDraft,
        _outputs: &StepOutputs,
    ) -> Result<BackendRequest<'a>, StepError> {
        let file = draft
            .file(self.slot)
            .ok_or(StepError::MissingOutput("document file"))?;
        Ok(BackendRequest::UploadFile {
            filename: file.filename(),
            bytes: file.bytes(),
        })
    }

    fn record(
        &self,
        _draft: &OnboardingDraft,
        response: BackendResponse,
        outputs: &mut StepOutputs,
    ) -> Result<(), StepError> {
        match response {
            BackendResponse::Stored(stored) => {
                outputs.stored_files.push((self.slot, stored));
                Ok(())
            }
            BackendResponse::Created(_) => Err(StepError::UnexpectedResponse("upload_file")),
        }
    }
}

pub struct RegisterDocumentStep {
    pub slot: DocumentSlot,
}

impl RegisterDocumentStep {
    fn filename<'a>(&self, draft: &'a OnboardingDraft) -> Result<&'a str, StepError> {
        draft
            .file(self.slot)
            .map(|file| file.filename())
            .ok_or(StepError::MissingOutput("document file"))
    }
}

impl ChainStep for RegisterDocumentStep {
    fn stage(&self) -> StageId {
        StageId::Documents
    }

    fn operation(&self) -> &'static str {
        "create_document"
    }

    fn build<'a>(
        &self,
        draft: &'a OnboardingDraft,
        outputs: &StepOutputs,
    ) -> Result<BackendRequest<'a>, StepError> {
        let filename = self.filename(draft)?;
        Ok(BackendRequest::CreateDocument(NewDocument {
            kind: self.slot.kind(),
            filename: filename.to_string(),
            stored_path: outputs.stored_path(self.slot, filename)?,
            client_id: outputs.client_id()?,
        }))
    }

    fn record(
        &self,
        draft: &OnboardingDraft,
        response: BackendResponse,
        outputs: &mut StepOutputs,
    ) -> Result<(), StepError> {
        let document_id = created(response, "create_document")?;
        let filename = self.filename(draft)?;
        let stored_path = outputs.stored_path(self.slot, filename)?;
        outputs.documents.push(RegisteredDocument {
            slot: self.slot,
            filename: filename.to_string(),
            stored_path,
            document_id,
        });
        Ok(())
    }
}

pub struct CreateSupplyPointStep;

impl ChainStep for CreateSupplyPointStep {
    fn stage(&self) -> StageId {
        StageId::SupplyPoint
    }

    fn operation(&self) -> &'static str {
        "create_supply_point"
    }

    fn build<'a>(
        &self,
        draft: &'a OnboardingDraft,
        outputs: &StepOutputs,
    ) -> Result<BackendRequest<'a>, StepError> {
        Ok(BackendRequest::CreateSupplyPoint(NewSupplyPoint {
            cups: draft.cups.trim().to_string(),
            address: draft.address.trim().to_string(),
            postal_code: draft.postal_code.trim().to_string(),
            province: draft.province.trim().to_string(),
            access_tariff: draft.access_tariff.trim().to_string(),
            distributor: optional(&draft.distributor),
            client_id: outputs.client_id()?,
        }))
    }

    fn record(
        &self,
        _draft: &OnboardingDraft,
        response: BackendResponse,
        outputs: &mut StepOutputs,
    ) -> Result<(), StepError> {
        outputs.supply_point_id = Some(created(response, "create_supply_point")?);
        Ok(())
    }
}

pub struct CreateContractStep;

impl ChainStep for CreateContractStep {
    fn stage(&self) -> StageId {
        StageId::Contract
    }

    fn operation(&self) -> &'static str {
        "create_contract"
    }

    fn build<'a>(
        &self,
        draft: &'a OnboardingDraft,
        outputs: &StepOutputs,
    ) -> Result<BackendRequest<'a>, StepError> {
        let supply_point_id = outputs
            .supply_point_id
            .clone()
            .ok_or(StepError::MissingOutput("supply point id"))?;

        let mut power = [0.0_f64; 6];
        for (slot, field) in power.iter_mut().zip(DraftField::POWER_TIERS) {
            *slot = parse_power(field, draft.get(field))?;
        }

        Ok(BackendRequest::CreateContract(NewContract {
            supply_point_id,
            retailer: draft.retailer.trim().to_string(),
            product: draft.product.trim().to_string(),
            start_date: parse_date(DraftField::StartDate, &draft.start_date)?,
            end_date: parse_date(DraftField::EndDate, &draft.end_date)?,
            p1: power[0],
            p2: power[1],
            p3: power[2],
            p4: power[3],
            p5: power[4],
            p6: power[5],
            state: ContractState::Draft,
        }))
    }

    fn record(
        &self,
        _draft: &OnboardingDraft,
        response: BackendResponse,
        outputs: &mut StepOutputs,
    ) -> Result<(), StepError> {
        outputs.contract_id = Some(created(response, "create_contract")?);
        Ok(())
    }
}

pub struct CreateSwitchingRequestStep {
    pub request_code: String,
    pub initial_status: String,
}

impl ChainStep for CreateSwitchingRequestStep {
    fn stage(&self) -> StageId {
        StageId::SwitchingRequest
    }

    fn operation(&self) -> &'static str {
        "create_switching_request"
    }

    fn build<'a>(
        &self,
        _draft: &'a OnboardingDraft,
        outputs: &StepOutputs,
    ) -> Result<BackendRequest<'a>, StepError> {
        let contract_id = outputs
            .contract_id
            .clone()
            .ok_or(StepError::MissingOutput("contract id"))?;
        Ok(BackendRequest::CreateSwitchingRequest(NewSwitchingRequest {
            kind: SwitchingKind::C1,
            code: self.request_code.clone(),
            status: self.initial_status.clone(),
            contract_id,
        }))
    }

    fn record(
        &self,
        _draft: &OnboardingDraft,
        response: BackendResponse,
        outputs: &mut StepOutputs,
    ) -> Result<(), StepError> {
        outputs.switching_request_id = Some(created(response, "create_switching_request")?);
        Ok(())
    }
}

/// The full ordered chain for `draft`. Empty document slots contribute no steps.
#[must_use]
pub fn plan(draft: &OnboardingDraft, request_code: &str, initial_status: &str) -> Vec<Box<dyn ChainStep>> {
    let mut steps: Vec<Box<dyn ChainStep>> = vec![Box::new(CreateClientStep)];

    for (slot, _) in draft.attached_documents() {
        steps.push(Box::new(UploadDocumentStep { slot }));
        steps.push(Box::new(RegisterDocumentStep { slot }));
    }

    steps.push(Box::new(CreateSupplyPointStep));
    steps.push(Box::new(CreateContractStep));
    steps.push(Box::new(CreateSwitchingRequestStep {
        request_code: request_code.to_string(),
        initial_status: initial_status.to_string(),
    }));

    steps
}

/// Check the contract's numeric and date fields without building a request.
///
/// # Errors
///
/// Returns [`StepError::InvalidField`] for the first power tier or date that
/// does not parse.
pub fn check_contract_fields(draft: &OnboardingDraft) -> Result<(), StepError> {
    for field in DraftField::POWER_TIERS {
        parse_power(field, draft.get(field))?;
    }
    parse_date(DraftField::StartDate, &draft.start_date)?;
    parse_date(DraftField::EndDate, &draft.end_date)?;
    Ok(())
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Empty means 0. A decimal comma is accepted.
pub fn parse_power(field: DraftField, text: &str) -> Result<f64, StepError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(0.0);
    }
    match text.replace(',', ".").parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(StepError::InvalidField {
            field,
            reason: format!("'{text}' is not a number"),
        }),
    }
}

/// `YYYY-MM-DD`; empty means no date.
pub fn parse_date(field: DraftField, text: &str) -> Result<Option<NaiveDate>, StepError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| StepError::InvalidField {
            field,
            reason: format!("'{text}' is not a YYYY-MM-DD date"),
        })
}

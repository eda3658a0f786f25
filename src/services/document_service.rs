use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Document;
use crate::error::ApiError;
use crate::filter::{FieldKind, Filter, FilterField, FilterOp, ListParams, ListSpec, Page, SortField};
use crate::middleware::AuthUser;
use crate::observer::{Effects, NewActivity, NewNotification};
use crate::services::{list_page, optional_text, required_text};
use crate::types::{DocumentStatus, DocumentType, Role};

const DOCUMENT_SORTS: &[SortField] = &[SortField::new("createdAt", "d.created_at"), SortField::new("docType", "d.doc_type")];

/// A tutor's own paperwork.
pub static OWN_DOCUMENTS: ListSpec = ListSpec {
    select: "SELECT d.*",
    from: "FROM documents d",
    base_where: None,
    count: "COUNT(*)",
    filters: &[
        FilterField::new("status", &["d.status"], FilterOp::Eq, FieldKind::OneOf(DocumentStatus::ALL)),
        FilterField::new("docType", &["d.doc_type"], FilterOp::Eq, FieldKind::OneOf(DocumentType::ALL)),
    ],
    sorts: DOCUMENT_SORTS,
    default_sort: "createdAt",
    tie_breaker: "d.id",
    default_limit: 20,
};

/// Every tutor's paperwork, as seen by admins.
pub static ALL_DOCUMENTS: ListSpec = ListSpec {
    select: "SELECT d.*",
    from: "FROM documents d",
    base_where: None,
    count: "COUNT(*)",
    filters: &[
        FilterField::new("status", &["d.status"], FilterOp::Eq, FieldKind::OneOf(DocumentStatus::ALL)),
        FilterField::new("docType", &["d.doc_type"], FilterOp::Eq, FieldKind::OneOf(DocumentType::ALL)),
        FilterField::new("tutorId", &["d.tutor_id"], FilterOp::Eq, FieldKind::Uuid),
    ],
    sorts: DOCUMENT_SORTS,
    default_sort: "createdAt",
    tie_breaker: "d.id",
    default_limit: 20,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocumentRequest {
    pub doc_type: DocumentType,
    pub file_name: String,
    pub file_url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewRequest {
    pub reason: Option<String>,
}

pub struct DocumentService<'a> {
    state: &'a AppState,
}

impl<'a> DocumentService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn create(&self, caller: &AuthUser, req: CreateDocumentRequest) -> Result<Document, ApiError> {
        caller.require_role(&[Role::Tutor])?;
        let file_name = required_text("fileName", &req.file_name, 255)?;
        let file_url = required_text("fileUrl", &req.file_url, 2048)?;
        if !(file_url.starts_with("https://") || file_url.starts_with("http://")) {
            return Err(ApiError::invalid_field("fileUrl", "fileUrl must be an http(s) URL"));
        }

        let document: Document = sqlx::query_as(
            "INSERT INTO documents (id, tutor_id, doc_type, file_name, file_url, status) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(caller.id)
        .bind(req.doc_type.as_str())
        .bind(&file_name)
        .bind(&file_url)
        .bind(DocumentStatus::Pending.as_str())
        .fetch_one(self.state.db.pool())
        .await?;

        self.state
            .dispatch(Effects::new().activity(
                NewActivity::new(caller.id, "document.upload", "document", document.id).details(json!({ "docType": document.doc_type })),
            ))
            .await;
        Ok(document)
    }

    pub async fn list(&self, caller: &AuthUser, params: &ListParams) -> Result<Page<Document>, ApiError> {
        let filter = match caller.role {
            Role::Admin => Filter::new(&ALL_DOCUMENTS),
            Role::Tutor => Filter::new(&OWN_DOCUMENTS).scope("d.tutor_id", caller.id),
            Role::Student => return Err(ApiError::forbidden("Only tutors and admins can view documents")),
        };
        list_page(self.state, filter, params).await
    }

    pub async fn verify(&self, admin: &AuthUser, document_id: Uuid) -> Result<Document, ApiError> {
        let document = self.review(admin, document_id, DocumentStatus::Verified, None).await?;

        let effects = Effects::new()
            .notify(
                NewNotification::new(document.tutor_id, "document.verified", "Document verified", format!("{} was verified", document.file_name))
                    .about("document", document.id),
            )
            .activity(NewActivity::new(admin.id, "document.verify", "document", document.id));
        self.state.dispatch(effects).await;
        Ok(document)
    }

    pub async fn reject(&self, admin: &AuthUser, document_id: Uuid, req: ReviewRequest) -> Result<Document, ApiError> {
        let reason = optional_text("reason", req.reason.as_deref(), 500)?
            .ok_or_else(|| ApiError::invalid_field("reason", "reason is required"))?;
        let document = self.review(admin, document_id, DocumentStatus::Rejected, Some(&reason)).await?;

        let effects = Effects::new()
            .notify(
                NewNotification::new(
                    document.tutor_id,
                    "document.rejected",
                    "Document rejected",
                    format!("{} was rejected: {}", document.file_name, reason),
                )
                .about("document", document.id),
            )
            .activity(NewActivity::new(admin.id, "document.reject", "document", document.id).details(json!({ "reason": reason })));
        self.state.dispatch(effects).await;
        Ok(document)
    }

    async fn review(&self, admin: &AuthUser, document_id: Uuid, to: DocumentStatus, note: Option<&str>) -> Result<Document, ApiError> {
        let mut tx = self.state.db.begin().await?;

        let status: Option<String> = sqlx::query_scalar("SELECT status FROM documents WHERE id = $1 FOR UPDATE")
            .bind(document_id)
            .fetch_optional(&mut *tx)
            .await?;
        match status {
            None => return Err(ApiError::not_found("Document not found")),
            Some(s) if s != DocumentStatus::Pending => {
                return Err(ApiError::conflict(format!("Document has already been {}", s)))
            }
            Some(_) => {}
        }

        let document: Document = sqlx::query_as(
            "UPDATE documents SET status = $2, review_note = $3, reviewed_by = $4, reviewed_at = now() \
             WHERE id = $1 RETURNING *",
        )
        .bind(document_id)
        .bind(to.as_str())
        .bind(note)
        .bind(admin.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(document)
    }
}

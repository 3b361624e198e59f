//! Deal workflow: transactions, their tasks, files and timeline.
//!
//! Every mutation runs in one database transaction together with the
//! timeline events that record it. Task completion additionally holds a row
//! lock on the transaction so that the phase check and the advance are
//! atomic per deal.

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::{Listing, TimelineEvent, Transaction, TransactionFile, TransactionTask};
use crate::db::{inquiries, listings, transactions as queries};
use crate::domain::transaction::{
    can_complete_task, can_view_file, phase_after_completion, phase_change_description,
};
use crate::domain::{
    Actor, FileCategory, InquiryStatus, ListingStatus, Phase, TaskStatus, TimelineEventType,
    TransactionStatus,
};
use crate::error::AppError;
use crate::services::notifications::{Notification, NotificationDispatcher};
use crate::validation::{
    sanitize_string, sanitize_text, validate_max_len, validate_positive_amount, validate_text,
    validate_url, CODE_MAX_LEN, DESCRIPTION_MAX_LEN, FILENAME_MAX_LEN, MESSAGE_MAX_LEN,
    TITLE_MAX_LEN,
};

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransaction {
    #[serde(alias = "noteListingId")]
    pub listing_id: Uuid,
    pub buyer_id: Uuid,
    pub inquiry_id: Option<Uuid>,
    /// Defaults to the accepted offer, then to the asking price.
    #[schema(value_type = Option<String>)]
    pub initial_amount: Option<BigDecimal>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTransaction {
    #[schema(value_type = Option<String>)]
    pub final_amount: Option<BigDecimal>,
    pub status: Option<TransactionStatus>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTask {
    /// Defaults to the transaction's current phase.
    pub phase: Option<Phase>,
    pub title: String,
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_required: bool,
    pub assigned_to: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateFile {
    pub filename: String,
    pub file_url: String,
    pub file_type: String,
    pub file_size: i64,
    #[serde(default)]
    pub is_public: bool,
    pub category: Option<FileCategory>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateNote {
    pub description: String,
}

/// Result of completing a task: the task and the transaction as it stands
/// afterwards, which may have moved to the next phase.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskCompletion {
    pub task: TransactionTask,
    pub transaction: Transaction,
    pub phase_advanced: bool,
}

fn default_true() -> bool {
    true
}

/// Opens a deal inside the caller's database transaction and records its
/// first timeline event. The listing row stays locked until commit, so two
/// deals can never be opened on one listing.
pub(crate) async fn open_transaction(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    listing: &Listing,
    buyer_id: Uuid,
    inquiry_id: Option<Uuid>,
    initial_amount: BigDecimal,
    opened_by: Uuid,
) -> Result<Transaction, AppError> {
    validate_positive_amount("initialAmount", &initial_amount)?;

    let listing = listings::get_listing_for_update(&mut **tx, listing.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Listing {} not found", listing.id)))?;
    if listing.status != ListingStatus::Active {
        return Err(AppError::Conflict(format!(
            "Cannot open a transaction on a {} listing",
            listing.status
        )));
    }
    if let Some(running) = queries::open_for_listing(&mut **tx, listing.id).await? {
        return Err(AppError::Conflict(format!(
            "Listing already has an open transaction ({})",
            running.id
        )));
    }

    let now = Utc::now();
    let transaction = Transaction {
        id: Uuid::new_v4(),
        buyer_id,
        seller_id: listing.seller_id,
        listing_id: listing.id,
        inquiry_id,
        initial_amount,
        final_amount: None,
        status: TransactionStatus::Pending,
        current_phase: Phase::Negotiations,
        completed_at: None,
        created_at: now,
        updated_at: now,
    };
    let saved = queries::insert_transaction(&mut **tx, &transaction).await?;
    append(
        tx,
        saved.id,
        TimelineEventType::Info,
        "Transaction created".to_string(),
        Some(opened_by),
        None,
        None,
    )
    .await?;

    tracing::info!(
        transaction_id = %saved.id,
        listing_id = %listing.id,
        buyer_id = %buyer_id,
        "Transaction opened"
    );
    Ok(saved)
}

async fn append(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    transaction_id: Uuid,
    event_type: TimelineEventType,
    description: String,
    user_id: Option<Uuid>,
    task_id: Option<Uuid>,
    file_id: Option<Uuid>,
) -> Result<TimelineEvent, AppError> {
    let event = TimelineEvent {
        id: Uuid::new_v4(),
        transaction_id,
        description,
        event_type,
        user_id,
        task_id,
        file_id,
        created_at: Utc::now(),
    };
    Ok(queries::append_event(&mut **tx, &event).await?)
}

#[derive(Clone)]
pub struct TransactionWorkflow {
    pool: PgPool,
    notifier: NotificationDispatcher,
}

impl TransactionWorkflow {
    pub fn new(pool: PgPool, notifier: NotificationDispatcher) -> Self {
        Self { pool, notifier }
    }

    /// Opens a deal directly, outside the inquiry flow. Seller or admin only.
    pub async fn create(
        &self,
        actor: &Actor,
        input: CreateTransaction,
    ) -> Result<Transaction, AppError> {
        let mut tx = self.pool.begin().await?;

        let listing = listings::get_listing(&mut *tx, input.listing_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Listing {} not found", input.listing_id)))?;
        if !actor.is_or_admin(listing.seller_id) {
            return Err(AppError::Forbidden("Only the seller can open a transaction".to_string()));
        }
        if listing.status != ListingStatus::Active {
            return Err(AppError::Conflict(format!(
                "Cannot open a transaction on a {} listing",
                listing.status
            )));
        }
        if input.buyer_id == listing.seller_id {
            return Err(AppError::Validation("buyerId: must differ from the seller".to_string()));
        }

        let mut amount = input.initial_amount;
        if let Some(inquiry_id) = input.inquiry_id {
            let inquiry = inquiries::get_inquiry(&mut *tx, inquiry_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Inquiry {} not found", inquiry_id)))?;
            if inquiry.listing_id != listing.id || inquiry.buyer_id != input.buyer_id {
                return Err(AppError::Validation(
                    "inquiryId: belongs to a different listing or buyer".to_string(),
                ));
            }
            if inquiry.status != InquiryStatus::Accepted {
                return Err(AppError::Conflict(
                    "Only an accepted inquiry can open a transaction".to_string(),
                ));
            }
            amount = amount.or(inquiry.offer_amount);
        }
        let amount = amount.unwrap_or_else(|| listing.asking_price.clone());

        let saved = open_transaction(
            &mut tx,
            &listing,
            input.buyer_id,
            input.inquiry_id,
            amount,
            actor.user_id,
        )
        .await?;
        tx.commit().await?;

        for recipient in [saved.buyer_id, saved.seller_id] {
            self.notifier.dispatch(Notification::TransactionCreated {
                recipient,
                transaction_id: saved.id,
            });
        }
        Ok(saved)
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<Transaction, AppError> {
        let transaction = self.load(id).await?;
        ensure_party(actor, &transaction)?;
        Ok(transaction)
    }

    pub async fn list_for_user(
        &self,
        actor: &Actor,
        user_id: Uuid,
    ) -> Result<Vec<Transaction>, AppError> {
        if !actor.is_or_admin(user_id) {
            return Err(AppError::Forbidden("Cannot view another user's transactions".to_string()));
        }
        Ok(queries::list_for_user(&self.pool, user_id).await?)
    }

    /// Sets the agreed final amount and/or activates a pending deal.
    /// Completion only happens through the phase machine and nothing
    /// cancels.
    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        changes: UpdateTransaction,
    ) -> Result<Transaction, AppError> {
        if let Some(amount) = &changes.final_amount {
            validate_positive_amount("finalAmount", amount)?;
        }

        let mut tx = self.pool.begin().await?;
        let current = queries::lock_transaction(&mut *tx, id)
            .await?
            .ok_or_else(|| transaction_not_found(id))?;
        ensure_party(actor, &current)?;
        if current.status == TransactionStatus::Completed {
            return Err(AppError::Conflict("Transaction is already completed".to_string()));
        }

        let status = match changes.status {
            None => current.status,
            Some(next) if next == current.status => next,
            Some(TransactionStatus::Cancelled) => {
                return Err(AppError::Validation(
                    "status: cancellation is not supported".to_string(),
                ));
            }
            Some(next) if current.status.can_update_to(next) => next,
            Some(next) => {
                return Err(AppError::Conflict(format!(
                    "Cannot move a {} transaction to {}",
                    current.status, next
                )));
            }
        };

        let updated =
            queries::update_terms(&mut *tx, id, changes.final_amount.as_ref(), status).await?;
        if let Some(amount) = &changes.final_amount {
            append(
                &mut tx,
                id,
                TimelineEventType::Info,
                format!("Final amount set to {}", amount),
                Some(actor.user_id),
                None,
                None,
            )
            .await?;
        }
        if status != current.status {
            append(
                &mut tx,
                id,
                TimelineEventType::Info,
                format!("Status changed from {} to {}", current.status, status),
                Some(actor.user_id),
                None,
                None,
            )
            .await?;
        }
        tx.commit().await?;

        Ok(updated)
    }

    pub async fn add_task(
        &self,
        actor: &Actor,
        id: Uuid,
        input: CreateTask,
    ) -> Result<TransactionTask, AppError> {
        let title = sanitize_string(&input.title);
        validate_text("title", &title, TITLE_MAX_LEN)?;
        let description = input
            .description
            .as_deref()
            .map(sanitize_text)
            .filter(|description| !description.is_empty());
        if let Some(description) = &description {
            validate_max_len("description", description, DESCRIPTION_MAX_LEN)?;
        }

        let mut tx = self.pool.begin().await?;
        let transaction = queries::lock_transaction(&mut *tx, id)
            .await?
            .ok_or_else(|| transaction_not_found(id))?;
        if !actor.is_or_admin(transaction.seller_id) {
            return Err(AppError::Forbidden("Only the seller can add tasks".to_string()));
        }

        let phase = input.phase.unwrap_or(transaction.current_phase);
        if !phase.accepts_tasks() || phase.is_before(transaction.current_phase) {
            return Err(AppError::Conflict(format!(
                "Cannot add a {} task to a transaction in {}",
                phase, transaction.current_phase
            )));
        }

        let now = Utc::now();
        let task = TransactionTask {
            id: Uuid::new_v4(),
            transaction_id: id,
            phase,
            title,
            description,
            status: TaskStatus::Pending,
            is_required: input.is_required,
            assigned_to: input.assigned_to,
            due_date: input.due_date,
            completed_by: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        let saved = queries::insert_task(&mut *tx, &task).await?;
        append(
            &mut tx,
            id,
            TimelineEventType::Task,
            format!("Task added: {}", saved.title),
            Some(actor.user_id),
            Some(saved.id),
            None,
        )
        .await?;
        tx.commit().await?;

        Ok(saved)
    }

    pub async fn list_tasks(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<Vec<TransactionTask>, AppError> {
        let transaction = self.load(id).await?;
        ensure_party(actor, &transaction)?;
        Ok(queries::list_tasks(&self.pool, id).await?)
    }

    /// Marks a task complete and, when it was the last open required task of
    /// the current phase, advances the deal exactly one phase. Reaching
    /// `completed` closes the deal and marks the listing sold.
    pub async fn complete_task(
        &self,
        actor: &Actor,
        id: Uuid,
        task_id: Uuid,
    ) -> Result<TaskCompletion, AppError> {
        let mut tx = self.pool.begin().await?;

        let transaction = queries::lock_transaction(&mut *tx, id)
            .await?
            .ok_or_else(|| transaction_not_found(id))?;
        let task = queries::get_task(&mut *tx, id, task_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Task {} not found", task_id)))?;

        if !can_complete_task(
            actor,
            task.assigned_to,
            transaction.buyer_id,
            transaction.seller_id,
        ) {
            return Err(AppError::Forbidden("Not allowed to complete this task".to_string()));
        }
        if task.status == TaskStatus::Complete {
            return Err(AppError::Conflict("Task is already complete".to_string()));
        }
        if task.phase != transaction.current_phase {
            return Err(AppError::Conflict(format!(
                "Task belongs to the {} phase but the transaction is in {}",
                task.phase, transaction.current_phase
            )));
        }

        let task = queries::mark_task_complete(&mut *tx, task_id, actor.user_id).await?;
        append(
            &mut tx,
            id,
            TimelineEventType::Task,
            format!("Task completed: {}", task.title),
            Some(actor.user_id),
            Some(task.id),
            None,
        )
        .await?;

        let from = transaction.current_phase;
        let required = queries::required_task_statuses(&mut *tx, id, from).await?;
        let next_phase = phase_after_completion(from, task.is_required, &required);
        let (transaction, advanced_to) = match next_phase {
            Some(next) => {
                let advanced = queries::advance_phase(&mut *tx, id, next).await?;
                append(
                    &mut tx,
                    id,
                    TimelineEventType::Info,
                    phase_change_description(from, next),
                    Some(actor.user_id),
                    Some(task.id),
                    None,
                )
                .await?;

                if next == Phase::Completed {
                    listings::transition_status(
                        &mut *tx,
                        advanced.listing_id,
                        ListingStatus::Active,
                        ListingStatus::Sold,
                        None,
                    )
                    .await?
                    .ok_or_else(|| {
                        AppError::Conflict("Listing is no longer active".to_string())
                    })?;
                    append(
                        &mut tx,
                        id,
                        TimelineEventType::Info,
                        "Transaction completed".to_string(),
                        Some(actor.user_id),
                        None,
                        None,
                    )
                    .await?;
                }
                (advanced, Some(next))
            }
            None => (transaction, None),
        };

        tx.commit().await?;

        tracing::info!(
            transaction_id = %id,
            task_id = %task_id,
            phase = %transaction.current_phase,
            "Task completed"
        );
        if let Some(phase) = advanced_to {
            for recipient in [transaction.buyer_id, transaction.seller_id] {
                self.notifier.dispatch(Notification::PhaseAdvanced {
                    recipient,
                    transaction_id: id,
                    phase,
                });
            }
        }

        Ok(TaskCompletion {
            task,
            transaction,
            phase_advanced: advanced_to.is_some(),
        })
    }

    /// Records a document stored elsewhere.
    pub async fn add_file(
        &self,
        actor: &Actor,
        id: Uuid,
        input: CreateFile,
    ) -> Result<TransactionFile, AppError> {
        let filename = sanitize_string(&input.filename);
        validate_text("filename", &filename, FILENAME_MAX_LEN)?;
        let file_url = input.file_url.trim().to_string();
        validate_url("fileUrl", &file_url)?;
        let file_type = sanitize_string(&input.file_type);
        validate_text("fileType", &file_type, CODE_MAX_LEN)?;
        if input.file_size < 0 {
            return Err(AppError::Validation("fileSize: must not be negative".to_string()));
        }

        let mut tx = self.pool.begin().await?;
        let transaction = queries::lock_transaction(&mut *tx, id)
            .await?
            .ok_or_else(|| transaction_not_found(id))?;
        ensure_party(actor, &transaction)?;

        let file = TransactionFile {
            id: Uuid::new_v4(),
            transaction_id: id,
            uploaded_by: actor.user_id,
            filename,
            file_url,
            file_type,
            file_size: input.file_size,
            is_public: input.is_public,
            category: input.category.unwrap_or(FileCategory::Other),
            created_at: Utc::now(),
        };
        let saved = queries::insert_file(&mut *tx, &file).await?;
        append(
            &mut tx,
            id,
            TimelineEventType::Document,
            format!("File uploaded: {}", saved.filename),
            Some(actor.user_id),
            None,
            Some(saved.id),
        )
        .await?;
        tx.commit().await?;

        Ok(saved)
    }

    /// Files the caller may see: public ones plus their own uploads. Admins
    /// see everything.
    pub async fn list_files(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<Vec<TransactionFile>, AppError> {
        let transaction = self.load(id).await?;
        ensure_party(actor, &transaction)?;
        let files = queries::list_files(&self.pool, id).await?;
        Ok(files
            .into_iter()
            .filter(|file| can_view_file(actor, file.uploaded_by, file.is_public))
            .collect())
    }

    pub async fn timeline(&self, actor: &Actor, id: Uuid) -> Result<Vec<TimelineEvent>, AppError> {
        let transaction = self.load(id).await?;
        ensure_party(actor, &transaction)?;
        Ok(queries::list_events(&self.pool, id).await?)
    }

    pub async fn add_note(
        &self,
        actor: &Actor,
        id: Uuid,
        input: CreateNote,
    ) -> Result<TimelineEvent, AppError> {
        let description = sanitize_text(&input.description);
        validate_text("description", &description, MESSAGE_MAX_LEN)?;

        let mut tx = self.pool.begin().await?;
        let transaction = queries::lock_transaction(&mut *tx, id)
            .await?
            .ok_or_else(|| transaction_not_found(id))?;
        ensure_party(actor, &transaction)?;

        let event = append(
            &mut tx,
            id,
            TimelineEventType::Note,
            description,
            Some(actor.user_id),
            None,
            None,
        )
        .await?;
        tx.commit().await?;
        Ok(event)
    }

    async fn load(&self, id: Uuid) -> Result<Transaction, AppError> {
        queries::get_transaction(&self.pool, id)
            .await?
            .ok_or_else(|| transaction_not_found(id))
    }
}

fn ensure_party(actor: &Actor, transaction: &Transaction) -> Result<(), AppError> {
    if actor.is_party_or_admin(transaction.buyer_id, transaction.seller_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Not a party to this transaction".to_string()))
    }
}

fn transaction_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Transaction {} not found", id))
}

use bigdecimal::BigDecimal;
use sqlx::{PgExecutor, Result};
use uuid::Uuid;

use crate::db::models::{TimelineEvent, Transaction, TransactionFile, TransactionTask};
use crate::domain::{Phase, TaskStatus, TransactionStatus};

// --- Transaction Queries ---

pub async fn insert_transaction<'e>(
    executor: impl PgExecutor<'e>,
    transaction: &Transaction,
) -> Result<Transaction> {
    sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            id, buyer_id, seller_id, listing_id, inquiry_id, initial_amount, final_amount,
            status, current_phase, completed_at, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(transaction.id)
    .bind(transaction.buyer_id)
    .bind(transaction.seller_id)
    .bind(transaction.listing_id)
    .bind(transaction.inquiry_id)
    .bind(&transaction.initial_amount)
    .bind(&transaction.final_amount)
    .bind(transaction.status.as_str())
    .bind(transaction.current_phase.as_str())
    .bind(transaction.completed_at)
    .bind(transaction.created_at)
    .bind(transaction.updated_at)
    .fetch_one(executor)
    .await
}

pub async fn get_transaction<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// Row-locks the transaction for the rest of the database transaction.
pub async fn lock_transaction<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// The deal currently running on a listing, if any.
pub async fn open_for_listing<'e>(
    executor: impl PgExecutor<'e>,
    listing_id: Uuid,
) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE listing_id = $1 AND status <> 'completed'",
    )
    .bind(listing_id)
    .fetch_optional(executor)
    .await
}

pub async fn list_for_user<'e>(
    executor: impl PgExecutor<'e>,
    user_id: Uuid,
) -> Result<Vec<Transaction>> {
    sqlx::query_as::<_, Transaction>(
        r#"
        SELECT * FROM transactions
        WHERE buyer_id = $1 OR seller_id = $1
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
}

pub async fn update_terms<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
    final_amount: Option<&BigDecimal>,
    status: TransactionStatus,
) -> Result<Transaction> {
    sqlx::query_as::<_, Transaction>(
        r#"
        UPDATE transactions
        SET final_amount = COALESCE($2, final_amount), status = $3, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(final_amount)
    .bind(status.as_str())
    .fetch_one(executor)
    .await
}

/// Moves the phase one step. Entering `completed` also closes the deal.
pub async fn advance_phase<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
    phase: Phase,
) -> Result<Transaction> {
    sqlx::query_as::<_, Transaction>(
        r#"
        UPDATE transactions
        SET current_phase = $2,
            status = CASE WHEN $2 = 'completed' THEN 'completed' ELSE status END,
            completed_at = CASE WHEN $2 = 'completed' THEN NOW() ELSE completed_at END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(phase.as_str())
    .fetch_one(executor)
    .await
}

// --- Task Queries ---

pub async fn insert_task<'e>(
    executor: impl PgExecutor<'e>,
    task: &TransactionTask,
) -> Result<TransactionTask> {
    sqlx::query_as::<_, TransactionTask>(
        r#"
        INSERT INTO transaction_tasks (
            id, transaction_id, phase, title, description, status, is_required,
            assigned_to, due_date, completed_by, completed_at, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        "#,
    )
    .bind(task.id)
    .bind(task.transaction_id)
    .bind(task.phase.as_str())
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.status.as_str())
    .bind(task.is_required)
    .bind(task.assigned_to)
    .bind(task.due_date)
    .bind(task.completed_by)
    .bind(task.completed_at)
    .bind(task.created_at)
    .bind(task.updated_at)
    .fetch_one(executor)
    .await
}

pub async fn list_tasks<'e>(
    executor: impl PgExecutor<'e>,
    transaction_id: Uuid,
) -> Result<Vec<TransactionTask>> {
    sqlx::query_as::<_, TransactionTask>(
        r#"
        SELECT * FROM transaction_tasks
        WHERE transaction_id = $1
        ORDER BY CASE phase WHEN 'negotiations' THEN 0 ELSE 1 END, created_at, id
        "#,
    )
    .bind(transaction_id)
    .fetch_all(executor)
    .await
}

pub async fn get_task<'e>(
    executor: impl PgExecutor<'e>,
    transaction_id: Uuid,
    task_id: Uuid,
) -> Result<Option<TransactionTask>> {
    sqlx::query_as::<_, TransactionTask>(
        "SELECT * FROM transaction_tasks WHERE id = $1 AND transaction_id = $2",
    )
    .bind(task_id)
    .bind(transaction_id)
    .fetch_optional(executor)
    .await
}

pub async fn mark_task_complete<'e>(
    executor: impl PgExecutor<'e>,
    task_id: Uuid,
    completed_by: Uuid,
) -> Result<TransactionTask> {
    sqlx::query_as::<_, TransactionTask>(
        r#"
        UPDATE transaction_tasks
        SET status = 'complete', completed_by = $2, completed_at = NOW(), updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(task_id)
    .bind(completed_by)
    .fetch_one(executor)
    .await
}

/// Statuses of the required tasks in one phase.
pub async fn required_task_statuses<'e>(
    executor: impl PgExecutor<'e>,
    transaction_id: Uuid,
    phase: Phase,
) -> Result<Vec<TaskStatus>> {
    let rows: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT status FROM transaction_tasks
        WHERE transaction_id = $1 AND phase = $2 AND is_required
        "#,
    )
    .bind(transaction_id)
    .bind(phase.as_str())
    .fetch_all(executor)
    .await?;

    rows.into_iter()
        .map(|status| {
            status
                .parse::<TaskStatus>()
                .map_err(|err| sqlx::Error::Decode(Box::new(err)))
        })
        .collect()
}

// --- File Queries ---

pub async fn insert_file<'e>(
    executor: impl PgExecutor<'e>,
    file: &TransactionFile,
) -> Result<TransactionFile> {
    sqlx::query_as::<_, TransactionFile>(
        r#"
        INSERT INTO transaction_files (
            id, transaction_id, uploaded_by, filename, file_url, file_type,
            file_size, is_public, category, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(file.id)
    .bind(file.transaction_id)
    .bind(file.uploaded_by)
    .bind(&file.filename)
    .bind(&file.file_url)
    .bind(&file.file_type)
    .bind(file.file_size)
    .bind(file.is_public)
    .bind(file.category.as_str())
    .bind(file.created_at)
    .fetch_one(executor)
    .await
}

pub async fn list_files<'e>(
    executor: impl PgExecutor<'e>,
    transaction_id: Uuid,
) -> Result<Vec<TransactionFile>> {
    sqlx::query_as::<_, TransactionFile>(
        "SELECT * FROM transaction_files WHERE transaction_id = $1 ORDER BY created_at, id",
    )
    .bind(transaction_id)
    .fetch_all(executor)
    .await
}

// --- Timeline Queries ---

pub async fn append_event<'e>(
    executor: impl PgExecutor<'e>,
    event: &TimelineEvent,
) -> Result<TimelineEvent> {
    sqlx::query_as::<_, TimelineEvent>(
        r#"
        INSERT INTO transaction_timeline (
            id, transaction_id, description, event_type, user_id, task_id, file_id
        ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, transaction_id, description, event_type, user_id, task_id, file_id, created_at
        "#,
    )
    .bind(event.id)
    .bind(event.transaction_id)
    .bind(&event.description)
    .bind(event.event_type.as_str())
    .bind(event.user_id)
    .bind(event.task_id)
    .bind(event.file_id)
    .fetch_one(executor)
    .await
}

/// Events in the order they were written.
pub async fn list_events<'e>(
    executor: impl PgExecutor<'e>,
    transaction_id: Uuid,
) -> Result<Vec<TimelineEvent>> {
    sqlx::query_as::<_, TimelineEvent>(
        r#"
        SELECT id, transaction_id, description, event_type, user_id, task_id, file_id, created_at
        FROM transaction_timeline
        WHERE transaction_id = $1
        ORDER BY seq
        "#,
    )
    .bind(transaction_id)
    .fetch_all(executor)
    .await
}

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection,
    DatabaseTransaction, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionError, TransactionTrait,
};
use uuid::Uuid;

use wonpay_core::sea_ext::LockForUpdate;
use wonpay_domain::event::DomainEvent;
use wonpay_domain::id::{OrderId, PaymentId, WalletId};
use wonpay_domain::money::Money;
use wonpay_domain::payment::PaymentStatus;
use wonpay_settlement_schema::{ledger_entries, outbox_events, payments, wallets};

use crate::domain::repository::{LedgerReader, OutboxStore, SettlementStore};
use crate::domain::types::{
    BonusOutcome, CancelCommit, CancelOutcome, CompensationOutcome, ConfirmCommit, ConfirmOutcome,
    OutboxRecord, OutboxStatus, Payment, bonus_history_key, cancel_history_key,
    confirm_history_key,
};
use crate::error::SettlementError;

fn lift<T>(res: Result<T, TransactionError<SettlementError>>) -> Result<T, SettlementError> {
    match res {
        Ok(value) => Ok(value),
        Err(TransactionError::Connection(db)) => Err(SettlementError::from(db)),
        Err(TransactionError::Transaction(err)) => Err(err),
    }
}

// ── Settlement store ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbSettlementStore {
    pub db: DatabaseConnection,
}

impl SettlementStore for DbSettlementStore {
    async fn create_payment(&self, payment: &Payment) -> Result<(), SettlementError> {
        payment_active_model(payment)
            .insert(&self.db)
            .await
            .context("create payment")?;
        Ok(())
    }

    async fn find_by_order_id(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<Payment>, SettlementError> {
        let model = payments::Entity::find()
            .filter(payments::Column::OrderId.eq(order_id.as_str()))
            .one(&self.db)
            .await
            .context("find payment by order id")?;
        model.map(payment_from_model).transpose()
    }

    async fn commit_confirmation(
        &self,
        order_id: &OrderId,
        commit: &ConfirmCommit,
    ) -> Result<ConfirmOutcome, SettlementError> {
        let order_id = order_id.clone();
        let commit = commit.clone();
        let res = self
            .db
            .transaction::<_, ConfirmOutcome, SettlementError>(|txn| {
                Box::pin(async move {
                    let mut payment = lock_payment_by_order_id(txn, &order_id).await?;
                    match payment.status {
                        // A concurrent attempt already won; observe and no-op.
                        PaymentStatus::Success => return Ok(ConfirmOutcome::AlreadyConfirmed),
                        PaymentStatus::Pending => {}
                        _ => return Err(SettlementError::AlreadyProcessed),
                    }
                    payment.confirm(&commit.provider_key, commit.method, commit.paid_at)?;

                    move_wallet_money(txn, payment.wallet_id, payment.amount, Direction::Credit)
                        .await?;
                    insert_ledger_entry(
                        txn,
                        &confirm_history_key(payment.id),
                        payment.wallet_id,
                        "deposit",
                        "money",
                        payment.amount,
                    )
                    .await?;
                    update_payment(txn, &payment).await?;
                    insert_outbox_event(txn, &commit.event).await?;
                    Ok(ConfirmOutcome::Applied)
                })
            })
            .await;
        lift(res)
    }

    async fn mark_canceled_after_auto_cancel(
        &self,
        order_id: &OrderId,
        reason: &str,
        failure_code: &str,
        failure_message: &str,
    ) -> Result<(), SettlementError> {
        let order_id = order_id.clone();
        let reason = reason.to_owned();
        let failure_code = failure_code.to_owned();
        let failure_message = failure_message.to_owned();
        let res = self
            .db
            .transaction::<_, (), SettlementError>(|txn| {
                Box::pin(async move {
                    let mut payment = lock_payment_by_order_id(txn, &order_id).await?;
                    if payment.status == PaymentStatus::Canceled {
                        return Ok(());
                    }
                    payment.cancel(&reason, Utc::now())?;
                    payment.failure_code = Some(failure_code);
                    payment.failure_message = Some(failure_message);
                    // No wallet movement: the charge was never credited.
                    update_payment(txn, &payment).await
                })
            })
            .await;
        lift(res)
    }

    async fn commit_cancellation(
        &self,
        order_id: &OrderId,
        commit: &CancelCommit,
    ) -> Result<CancelOutcome, SettlementError> {
        let order_id = order_id.clone();
        let commit = commit.clone();
        let res = self
            .db
            .transaction::<_, CancelOutcome, SettlementError>(|txn| {
                Box::pin(async move {
                    let mut payment = lock_payment_by_order_id(txn, &order_id).await?;
                    if payment.status == PaymentStatus::Canceled {
                        // A concurrent duplicate already settled the refund.
                        return Ok(CancelOutcome::AlreadyCanceled);
                    }
                    payment.cancel(&commit.reason, Utc::now())?;

                    move_wallet_money(txn, payment.wallet_id, payment.amount, Direction::Debit)
                        .await?;
                    insert_ledger_entry(
                        txn,
                        &cancel_history_key(payment.id),
                        payment.wallet_id,
                        "withdraw",
                        "money",
                        payment.amount,
                    )
                    .await?;
                    // The debit is settled in this transaction; a later
                    // compensation event for this payment must be a no-op.
                    payment.compensation_completed = true;
                    update_payment(txn, &payment).await?;
                    insert_outbox_event(txn, &commit.event).await?;
                    Ok(CancelOutcome::Applied)
                })
            })
            .await;
        lift(res)
    }

    async fn force_cancel_with_compensation(
        &self,
        payment_id: PaymentId,
        reason: &str,
        event: &DomainEvent,
    ) -> Result<(), SettlementError> {
        let reason = reason.to_owned();
        let event = event.clone();
        let res = self
            .db
            .transaction::<_, (), SettlementError>(|txn| {
                Box::pin(async move {
                    let mut payment = lock_payment_by_id(txn, payment_id).await?;
                    // Forced transition: the provider refund is irreversible,
                    // so the status guard does not apply here.
                    if payment.status != PaymentStatus::Canceled {
                        payment.status = PaymentStatus::Canceled;
                        payment.cancel_reason = Some(reason);
                        payment.updated_at = Utc::now();
                    }
                    payment.compensation_completed = false;
                    update_payment(txn, &payment).await?;
                    insert_outbox_event(txn, &event).await
                })
            })
            .await;
        lift(res)
    }

    async fn apply_compensation(
        &self,
        payment_id: PaymentId,
    ) -> Result<CompensationOutcome, SettlementError> {
        let res = self
            .db
            .transaction::<_, CompensationOutcome, SettlementError>(|txn| {
                Box::pin(async move {
                    let mut payment = lock_payment_by_id(txn, payment_id).await?;
                    if payment.compensation_completed {
                        return Ok(CompensationOutcome::AlreadyCompensated);
                    }
                    // The history insert decides: a duplicate key means the
                    // cancel path already debited this refund, so the event
                    // only needs the flag caught up.
                    let inserted = insert_ledger_entry(
                        txn,
                        &cancel_history_key(payment.id),
                        payment.wallet_id,
                        "withdraw",
                        "money",
                        payment.amount,
                    )
                    .await?;
                    if !inserted {
                        payment.compensation_completed = true;
                        payment.updated_at = Utc::now();
                        update_payment(txn, &payment).await?;
                        return Ok(CompensationOutcome::AlreadyCompensated);
                    }
                    move_wallet_money(txn, payment.wallet_id, payment.amount, Direction::Debit)
                        .await?;
                    payment.compensation_completed = true;
                    payment.updated_at = Utc::now();
                    update_payment(txn, &payment).await?;
                    Ok(CompensationOutcome::Applied)
                })
            })
            .await;
        lift(res)
    }

    async fn grant_bonus(
        &self,
        wallet_id: WalletId,
        amount: Money,
        grant_key: &str,
        event: &DomainEvent,
    ) -> Result<BonusOutcome, SettlementError> {
        let grant_key = grant_key.to_owned();
        let event = event.clone();
        let res = self
            .db
            .transaction::<_, BonusOutcome, SettlementError>(|txn| {
                Box::pin(async move {
                    // The history insert is the race decider: exactly one of
                    // the concurrent callers gets rows_affected = 1.
                    let inserted = insert_ledger_entry(
                        txn,
                        &bonus_history_key(&grant_key),
                        wallet_id,
                        "deposit",
                        "point",
                        amount,
                    )
                    .await?;
                    if !inserted {
                        return Ok(BonusOutcome::AlreadyGranted);
                    }
                    move_wallet_points(txn, wallet_id, amount).await?;
                    insert_outbox_event(txn, &event).await?;
                    Ok(BonusOutcome::Granted)
                })
            })
            .await;
        lift(res)
    }

    async fn find_stale_pending(
        &self,
        older_than: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<Payment>, SettlementError> {
        // CANCEL_REQUESTED rows are reconciliation's own in-flight refunds;
        // they must be revisited until the provider cancel goes through.
        let models = payments::Entity::find()
            .filter(payments::Column::Status.is_in([
                PaymentStatus::Pending.as_str(),
                PaymentStatus::CancelRequested.as_str(),
            ]))
            .filter(payments::Column::CreatedAt.lt(older_than))
            .order_by_asc(payments::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await
            .context("find stale pending payments")?;
        models.into_iter().map(payment_from_model).collect()
    }

    async fn mark_cancel_requested(&self, payment_id: PaymentId) -> Result<(), SettlementError> {
        // Compare-and-set; a payment no longer PENDING is simply left alone.
        payments::Entity::update_many()
            .col_expr(
                payments::Column::Status,
                Expr::value(PaymentStatus::CancelRequested.as_str()),
            )
            .col_expr(payments::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(payments::Column::Id.eq(payment_id.0))
            .filter(payments::Column::Status.eq(PaymentStatus::Pending.as_str()))
            .exec(&self.db)
            .await
            .context("mark payment cancel requested")?;
        Ok(())
    }

    async fn mark_reconciled_canceled(
        &self,
        payment_id: PaymentId,
        reason: &str,
        event: &DomainEvent,
    ) -> Result<(), SettlementError> {
        let reason = reason.to_owned();
        let event = event.clone();
        let res = self
            .db
            .transaction::<_, (), SettlementError>(|txn| {
                Box::pin(async move {
                    let mut payment = lock_payment_by_id(txn, payment_id).await?;
                    let now = Utc::now();
                    match payment.status {
                        PaymentStatus::Canceled => return Ok(()),
                        PaymentStatus::CancelRequested => {
                            payment.complete_requested_cancel(&reason, now)?;
                        }
                        PaymentStatus::Pending => payment.cancel(&reason, now)?,
                        // Confirmed in the meantime: reconciliation must not touch it.
                        PaymentStatus::Success => return Ok(()),
                    }
                    update_payment(txn, &payment).await?;
                    insert_outbox_event(txn, &event).await
                })
            })
            .await;
        lift(res)
    }
}

// ── Ledger reader ────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbLedgerReader {
    pub db: DatabaseConnection,
}

impl LedgerReader for DbLedgerReader {
    async fn money_balance(&self, wallet_id: WalletId) -> Result<Money, SettlementError> {
        let wallet = wallets::Entity::find_by_id(wallet_id.0)
            .one(&self.db)
            .await
            .context("find wallet")?
            .ok_or_else(|| {
                SettlementError::Internal(anyhow::anyhow!("wallet {wallet_id} not found"))
            })?;
        Ok(Money(wallet.money_balance))
    }
}

// ── Outbox store ─────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbOutboxStore {
    pub db: DatabaseConnection,
}

impl OutboxStore for DbOutboxStore {
    async fn find_publishable(
        &self,
        stale_before: DateTime<Utc>,
        retry_cap: i32,
        batch: u64,
    ) -> Result<Vec<OutboxRecord>, SettlementError> {
        let models = outbox_events::Entity::find()
            .filter(
                Condition::any()
                    .add(outbox_events::Column::Status.eq(OutboxStatus::SendFail.as_str()))
                    .add(
                        Condition::all()
                            .add(outbox_events::Column::Status.eq(OutboxStatus::Init.as_str()))
                            .add(outbox_events::Column::CreatedAt.lt(stale_before)),
                    ),
            )
            .filter(outbox_events::Column::RetryCount.lt(retry_cap))
            .order_by_asc(outbox_events::Column::CreatedAt)
            .limit(batch)
            .all(&self.db)
            .await
            .context("find publishable outbox rows")?;
        models.into_iter().map(outbox_record_from_model).collect()
    }

    async fn mark_published(&self, event_id: Uuid) -> Result<bool, SettlementError> {
        // The single idempotency primitive for publication: push and poll
        // race freely, the row reaches PUBLISHED exactly once.
        let res = outbox_events::Entity::update_many()
            .col_expr(
                outbox_events::Column::Status,
                Expr::value(OutboxStatus::Published.as_str()),
            )
            .col_expr(outbox_events::Column::PublishedAt, Expr::value(Utc::now()))
            .filter(outbox_events::Column::EventId.eq(event_id))
            .filter(outbox_events::Column::Status.ne(OutboxStatus::Published.as_str()))
            .exec(&self.db)
            .await
            .context("mark outbox row published")?;
        Ok(res.rows_affected > 0)
    }

    async fn mark_send_failed(&self, event_id: Uuid, error: &str) -> Result<(), SettlementError> {
        outbox_events::Entity::update_many()
            .col_expr(
                outbox_events::Column::Status,
                Expr::value(OutboxStatus::SendFail.as_str()),
            )
            .col_expr(
                outbox_events::Column::RetryCount,
                Expr::col(outbox_events::Column::RetryCount).add(1),
            )
            .col_expr(outbox_events::Column::LastError, Expr::value(error))
            .filter(outbox_events::Column::EventId.eq(event_id))
            // a failed push must not regress a row the poll path already published
            .filter(outbox_events::Column::Status.ne(OutboxStatus::Published.as_str()))
            .exec(&self.db)
            .await
            .context("mark outbox row send-failed")?;
        Ok(())
    }

    async fn delete_published_before(
        &self,
        cutoff: DateTime<Utc>,
        batch: u64,
    ) -> Result<u64, SettlementError> {
        // Postgres DELETE has no LIMIT; select one batch of ids first so each
        // batch commits independently and a mid-run failure loses nothing.
        let ids: Vec<Uuid> = outbox_events::Entity::find()
            .select_only()
            .column(outbox_events::Column::Id)
            .filter(outbox_events::Column::Status.eq(OutboxStatus::Published.as_str()))
            .filter(outbox_events::Column::CreatedAt.lt(cutoff))
            .order_by_asc(outbox_events::Column::CreatedAt)
            .limit(batch)
            .into_tuple()
            .all(&self.db)
            .await
            .context("select retention batch")?;
        if ids.is_empty() {
            return Ok(0);
        }
        let res = outbox_events::Entity::delete_many()
            .filter(outbox_events::Column::Id.is_in(ids))
            .exec(&self.db)
            .await
            .context("delete retention batch")?;
        Ok(res.rows_affected)
    }
}

// ── Row helpers ──────────────────────────────────────────────────────────────

async fn lock_payment_by_order_id(
    txn: &DatabaseTransaction,
    order_id: &OrderId,
) -> Result<Payment, SettlementError> {
    let model = payments::Entity::find()
        .filter(payments::Column::OrderId.eq(order_id.as_str()))
        .for_update()
        .one(txn)
        .await?
        .ok_or(SettlementError::PaymentNotFound)?;
    payment_from_model(model)
}

async fn lock_payment_by_id(
    txn: &DatabaseTransaction,
    payment_id: PaymentId,
) -> Result<Payment, SettlementError> {
    let model = payments::Entity::find_by_id(payment_id.0)
        .for_update()
        .one(txn)
        .await?
        .ok_or(SettlementError::PaymentNotFound)?;
    payment_from_model(model)
}

enum Direction {
    Credit,
    Debit,
}

async fn move_wallet_money(
    txn: &DatabaseTransaction,
    wallet_id: WalletId,
    amount: Money,
    direction: Direction,
) -> Result<(), SettlementError> {
    let wallet = wallets::Entity::find_by_id(wallet_id.0)
        .for_update()
        .one(txn)
        .await?
        .ok_or_else(|| SettlementError::Internal(anyhow::anyhow!("wallet {wallet_id} not found")))?;
    let balance = Money(wallet.money_balance);
    let new_balance = match direction {
        Direction::Credit => balance
            .checked_add(amount)
            .ok_or_else(|| SettlementError::Internal(anyhow::anyhow!("wallet balance overflow")))?,
        Direction::Debit => balance
            .checked_sub(amount)
            .ok_or(SettlementError::InsufficientBalance)?,
    };
    wallets::ActiveModel {
        id: Set(wallet_id.0),
        money_balance: Set(new_balance.0),
        updated_at: Set(Utc::now()),
        ..Default::default()
    }
    .update(txn)
    .await?;
    Ok(())
}

async fn move_wallet_points(
    txn: &DatabaseTransaction,
    wallet_id: WalletId,
    amount: Money,
) -> Result<(), SettlementError> {
    let wallet = wallets::Entity::find_by_id(wallet_id.0)
        .for_update()
        .one(txn)
        .await?
        .ok_or_else(|| SettlementError::Internal(anyhow::anyhow!("wallet {wallet_id} not found")))?;
    let new_balance = Money(wallet.point_balance)
        .checked_add(amount)
        .ok_or_else(|| SettlementError::Internal(anyhow::anyhow!("wallet point overflow")))?;
    wallets::ActiveModel {
        id: Set(wallet_id.0),
        point_balance: Set(new_balance.0),
        updated_at: Set(Utc::now()),
        ..Default::default()
    }
    .update(txn)
    .await?;
    Ok(())
}

/// Returns whether a row was inserted; `false` means the idempotency key
/// already existed and the duplicate effect was suppressed.
async fn insert_ledger_entry(
    txn: &DatabaseTransaction,
    idempotency_key: &str,
    wallet_id: WalletId,
    entry_kind: &str,
    asset: &str,
    amount: Money,
) -> Result<bool, SettlementError> {
    let res = ledger_entries::Entity::insert(ledger_entries::ActiveModel {
        id: Set(Uuid::new_v4()),
        idempotency_key: Set(idempotency_key.to_owned()),
        wallet_id: Set(wallet_id.0),
        entry_kind: Set(entry_kind.to_owned()),
        asset: Set(asset.to_owned()),
        amount: Set(amount.0),
        created_at: Set(Utc::now()),
    })
    .on_conflict(
        OnConflict::column(ledger_entries::Column::IdempotencyKey)
            .do_nothing()
            .to_owned(),
    )
    .exec(txn)
    .await;
    match res {
        Ok(_) => Ok(true),
        Err(DbErr::RecordNotInserted) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

async fn insert_outbox_event(
    txn: &DatabaseTransaction,
    event: &DomainEvent,
) -> Result<(), SettlementError> {
    outbox_events::ActiveModel {
        id: Set(Uuid::new_v4()),
        event_id: Set(event.event_id),
        event_type: Set(event.event_type.clone()),
        aggregate_type: Set(event.aggregate_type.clone()),
        aggregate_id: Set(event.aggregate_id.clone()),
        payload: Set(event.payload.clone()),
        status: Set(OutboxStatus::Init.as_str().to_owned()),
        retry_count: Set(0),
        last_error: Set(None),
        created_at: Set(Utc::now()),
        published_at: Set(None),
    }
    .insert(txn)
    .await?;
    Ok(())
}

async fn update_payment(
    txn: &DatabaseTransaction,
    payment: &Payment,
) -> Result<(), SettlementError> {
    let mut model = payment_active_model(payment);
    model.created_at = sea_orm::ActiveValue::NotSet;
    model.order_id = sea_orm::ActiveValue::NotSet;
    model.update(txn).await?;
    Ok(())
}

fn payment_active_model(payment: &Payment) -> payments::ActiveModel {
    payments::ActiveModel {
        id: Set(payment.id.0),
        wallet_id: Set(payment.wallet_id.0),
        order_id: Set(payment.order_id.as_str().to_owned()),
        amount: Set(payment.amount.0),
        status: Set(payment.status.as_str().to_owned()),
        provider_key: Set(payment.provider_key.clone()),
        method: Set(payment.method.map(|m| m.as_str().to_owned())),
        paid_at: Set(payment.paid_at),
        cancel_reason: Set(payment.cancel_reason.clone()),
        failure_code: Set(payment.failure_code.clone()),
        failure_message: Set(payment.failure_message.clone()),
        compensation_completed: Set(payment.compensation_completed),
        created_at: Set(payment.created_at),
        updated_at: Set(payment.updated_at),
    }
}

fn payment_from_model(model: payments::Model) -> Result<Payment, SettlementError> {
    let status = model
        .status
        .parse()
        .with_context(|| format!("payment {} status", model.id))?;
    let method = model
        .method
        .as_deref()
        .map(str::parse)
        .transpose()
        .with_context(|| format!("payment {} method", model.id))?;
    Ok(Payment {
        id: PaymentId(model.id),
        wallet_id: WalletId(model.wallet_id),
        order_id: OrderId(model.order_id),
        amount: Money(model.amount),
        status,
        provider_key: model.provider_key,
        method,
        paid_at: model.paid_at,
        cancel_reason: model.cancel_reason,
        failure_code: model.failure_code,
        failure_message: model.failure_message,
        compensation_completed: model.compensation_completed,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

fn outbox_record_from_model(model: outbox_events::Model) -> Result<OutboxRecord, SettlementError> {
    let status = match model.status.as_str() {
        "INIT" => OutboxStatus::Init,
        "SEND_FAIL" => OutboxStatus::SendFail,
        "PUBLISHED" => OutboxStatus::Published,
        other => {
            return Err(SettlementError::Internal(anyhow::anyhow!(
                "outbox row {} has unknown status {other}",
                model.id
            )));
        }
    };
    Ok(OutboxRecord {
        id: model.id,
        event_id: model.event_id,
        event_type: model.event_type,
        aggregate_type: model.aggregate_type,
        aggregate_id: model.aggregate_id,
        payload: model.payload,
        status,
        retry_count: model.retry_count,
        created_at: model.created_at,
    })
}

//! PostgreSQL ledger backend

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};

use crate::balance::{fits_ledger, Balance};
use crate::config::DatabaseConfig;
use crate::error::{LedgerError, Result};
use crate::store::LedgerStore;
use crate::types::{Order, OrderId, OrderStatus, PendingOrder, User, UserId, Withdrawal};

const STRING_TRUNCATION: &str = "22001";
const NUMERIC_OUT_OF_RANGE: &str = "22003";

const ORDER_COLUMNS: &str =
    "order_id, user_id, order_number, status, accrual, uploaded_at, processed_at";

#[derive(Debug, FromRow)]
struct UserRow {
    user_id: i64,
    login: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId(row.user_id),
            login: row.login,
            password_hash: row.password_hash,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct OrderRow {
    order_id: i64,
    user_id: i64,
    order_number: String,
    status: String,
    accrual: Option<Decimal>,
    uploaded_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

impl TryFrom<OrderRow> for Order {
    type Error = LedgerError;

    fn try_from(row: OrderRow) -> Result<Self> {
        Ok(Self {
            id: OrderId(row.order_id),
            user_id: UserId(row.user_id),
            number: row.order_number,
            status: row.status.parse()?,
            accrual: row.accrual,
            uploaded_at: row.uploaded_at,
            processed_at: row.processed_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct WithdrawalRow {
    withdrawal_id: i64,
    user_id: i64,
    order_number: String,
    amount: Decimal,
    processed_at: DateTime<Utc>,
}

impl From<WithdrawalRow> for Withdrawal {
    fn from(row: WithdrawalRow) -> Self {
        Self {
            id: row.withdrawal_id,
            user_id: UserId(row.user_id),
            order: row.order_number,
            sum: row.amount,
            processed_at: row.processed_at,
        }
    }
}

/// PostgreSQL ledger backend
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    /// Wrap an existing pool. The schema is assumed to be in place.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool from configuration and bring the schema up to date
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        config.validate().map_err(LedgerError::Corruption)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(&config.url)
            .await?;

        let store = Self::new(pool);
        if config.run_migrations {
            store.migrate().await?;
        }

        tracing::info!(max_connections = config.max_connections, "Ledger store connected");
        Ok(store)
    }

    /// Apply the embedded migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Lock an order row for the rest of the transaction and check it may move to `next`.
    ///
    /// Returns the owner and the status before the change.
    async fn lock_order_for(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        order_id: OrderId,
        next: OrderStatus,
    ) -> Result<(UserId, OrderStatus)> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT user_id, status FROM orders WHERE order_id = $1 FOR UPDATE")
                .bind(order_id.0)
                .fetch_optional(&mut **tx)
                .await?;

        let (owner, status) = row.ok_or(LedgerError::OrderNotFound(order_id))?;
        let current: OrderStatus = status.parse()?;
        if !current.can_advance_to(next) {
            return Err(LedgerError::InvalidTransition { order_id, from: current, to: next });
        }

        Ok((UserId(owner), current))
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

/// Message of a CHECK violation or an out-of-range value, if that is what `err` is
fn rejected_value(err: &sqlx::Error) -> Option<String> {
    let sqlx::Error::Database(db) = err else {
        return None;
    };
    let out_of_range =
        matches!(db.code().as_deref(), Some(STRING_TRUNCATION | NUMERIC_OUT_OF_RANGE));
    (db.is_check_violation() || out_of_range).then(|| db.message().to_string())
}

fn value_error(err: sqlx::Error) -> LedgerError {
    match rejected_value(&err) {
        Some(message) => LedgerError::ValueRejected(message),
        None => LedgerError::Database(err),
    }
}

/// A balance column would leave its range; report the amount that caused it
fn amount_error(err: sqlx::Error, amount: Decimal) -> LedgerError {
    if rejected_value(&err).is_some() {
        LedgerError::InvalidAmount(amount)
    } else {
        LedgerError::Database(err)
    }
}

#[async_trait::async_trait]
impl LedgerStore for PgLedgerStore {
    async fn create_user_with_balance(&self, login: &str, password_hash: &str) -> Result<UserId> {
        let mut tx = self.pool.begin().await?;

        // The unique index decides; a concurrent insert of the same login waits
        // for the other transaction and then returns no row.
        let user_id: Option<i64> = sqlx::query_scalar(
            "INSERT INTO users (login, password_hash) VALUES ($1, $2)
             ON CONFLICT (login) DO NOTHING
             RETURNING user_id",
        )
        .bind(login)
        .bind(password_hash)
        .fetch_optional(&mut *tx)
        .await
        .map_err(value_error)?;

        let Some(user_id) = user_id else {
            return Err(LedgerError::LoginTaken(login.to_string()));
        };

        sqlx::query(
            "INSERT INTO balances (user_id, current_balance, total_withdrawn) VALUES ($1, 0, 0)",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(user_id, login, "User registered");
        Ok(UserId(user_id))
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT user_id, login, password_hash, created_at FROM users WHERE login = $1",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn find_order_owner(&self, order_number: &str) -> Result<Option<UserId>> {
        let owner: Option<i64> =
            sqlx::query_scalar("SELECT user_id FROM orders WHERE order_number = $1")
                .bind(order_number)
                .fetch_optional(&self.pool)
                .await?;

        Ok(owner.map(UserId))
    }

    async fn admit_order(&self, user_id: UserId, order_number: &str) -> Result<Order> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "INSERT INTO orders (user_id, order_number, status) VALUES ($1, $2, 'NEW')
             ON CONFLICT (order_number) DO NOTHING
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(user_id.0)
        .bind(order_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                LedgerError::UserNotFound(user_id)
            } else {
                value_error(e)
            }
        })?;

        match row {
            Some(row) => row.try_into(),
            None => Err(LedgerError::OrderExists(order_number.to_string())),
        }
    }

    async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE user_id = $1
             ORDER BY uploaded_at DESC, order_id DESC"
        ))
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn get_balance(&self, user_id: UserId) -> Result<Balance> {
        let row: Option<(Decimal, Decimal)> = sqlx::query_as(
            "SELECT current_balance, total_withdrawn FROM balances WHERE user_id = $1",
        )
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(current, withdrawn)| Balance::new(current, withdrawn))
            .ok_or(LedgerError::BalanceNotFound(user_id))
    }

    async fn apply_credit(
        &self,
        order_id: OrderId,
        user_id: UserId,
        amount: Decimal,
    ) -> Result<()> {
        if !fits_ledger(amount) {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let mut tx = self.pool.begin().await?;

        let (owner, _) = Self::lock_order_for(&mut tx, order_id, OrderStatus::Processed).await?;
        if owner != user_id {
            return Err(LedgerError::OwnerMismatch { order_id, owner, claimed: user_id });
        }

        sqlx::query(
            "UPDATE orders SET status = 'PROCESSED', accrual = $2, processed_at = NOW()
             WHERE order_id = $1",
        )
        .bind(order_id.0)
        .bind(amount)
        .execute(&mut *tx)
        .await
        .map_err(|e| amount_error(e, amount))?;

        let credited = sqlx::query(
            "UPDATE balances SET current_balance = current_balance + $2, last_updated = NOW()
             WHERE user_id = $1",
        )
        .bind(user_id.0)
        .bind(amount)
        .execute(&mut *tx)
        .await
        .map_err(|e| amount_error(e, amount))?
        .rows_affected();

        if credited == 0 {
            return Err(LedgerError::BalanceNotFound(user_id));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn apply_status(&self, order_id: OrderId, status: OrderStatus) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let (_, current) = Self::lock_order_for(&mut tx, order_id, status).await?;

        let query = match status {
            OrderStatus::Registered | OrderStatus::Processing => {
                "UPDATE orders SET status = $2 WHERE order_id = $1"
            }
            OrderStatus::Invalid => {
                "UPDATE orders SET status = $2, processed_at = NOW() WHERE order_id = $1"
            }
            // PROCESSED carries an accrual and goes through apply_credit
            OrderStatus::New | OrderStatus::Processed => {
                return Err(LedgerError::InvalidTransition { order_id, from: current, to: status });
            }
        };

        sqlx::query(query).bind(order_id.0).bind(status.as_str()).execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn withdraw(&self, user_id: UserId, order_ref: &str, sum: Decimal) -> Result<Withdrawal> {
        // Columns keep two fractional digits; a finer sum would be rounded on write.
        if sum <= Decimal::ZERO || !fits_ledger(sum) {
            return Err(LedgerError::InvalidAmount(sum));
        }

        let mut tx = self.pool.begin().await?;

        // Check and debit in one statement; a concurrent withdrawal blocks on the
        // row lock and re-evaluates the predicate against the committed balance.
        let debited: Option<Decimal> = sqlx::query_scalar(
            "UPDATE balances
             SET current_balance = current_balance - $2,
                 total_withdrawn = total_withdrawn + $2,
                 last_updated = NOW()
             WHERE user_id = $1 AND current_balance >= $2
             RETURNING current_balance",
        )
        .bind(user_id.0)
        .bind(sum)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| amount_error(e, sum))?;

        if debited.is_none() {
            let available: Option<Decimal> =
                sqlx::query_scalar("SELECT current_balance FROM balances WHERE user_id = $1")
                    .bind(user_id.0)
                    .fetch_optional(&mut *tx)
                    .await?;

            return Err(match available {
                Some(available) => LedgerError::InsufficientFunds { requested: sum, available },
                None => LedgerError::BalanceNotFound(user_id),
            });
        }

        let row: WithdrawalRow = sqlx::query_as(
            "INSERT INTO withdrawals (user_id, order_number, amount) VALUES ($1, $2, $3)
             RETURNING withdrawal_id, user_id, order_number, amount, processed_at",
        )
        .bind(user_id.0)
        .bind(order_ref)
        .bind(sum)
        .fetch_one(&mut *tx)
        .await
        .map_err(value_error)?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn list_withdrawals(&self, user_id: UserId) -> Result<Vec<Withdrawal>> {
        let rows: Vec<WithdrawalRow> = sqlx::query_as(
            "SELECT withdrawal_id, user_id, order_number, amount, processed_at
             FROM withdrawals
             WHERE user_id = $1
             ORDER BY processed_at DESC, withdrawal_id DESC",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Withdrawal::from).collect())
    }

    async fn pending_orders(&self) -> Result<Vec<PendingOrder>> {
        let rows: Vec<(i64, String, i64, String)> = sqlx::query_as(
            "SELECT order_id, order_number, user_id, status FROM orders
             WHERE status IN ('NEW', 'REGISTERED', 'PROCESSING')
             ORDER BY uploaded_at, order_id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(order_id, order_number, user_id, status)| -> Result<PendingOrder> {
                Ok(PendingOrder {
                    order_id: OrderId(order_id),
                    order_number,
                    user_id: UserId(user_id),
                    status: status.parse()?,
                })
            })
            .collect()
    }
}

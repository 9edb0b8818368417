//! SQLite-backed subscription store.
//!
//! Three tables: `subscriptions` (mutable rows), `subscription_renewals`
//! (append-only audit trail, written only inside the renewal transaction),
//! and `settings` (key/value, e.g. notify hours and channel credentials).
//!
//! The renewal transition runs as an immediate transaction: SQLite takes the
//! write lock up front, so two renewal attempts on the same row serialize
//! and the second one sees the first's committed state.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, Row, TransactionBehavior};

use subtrack_core::error::{Result, SubtrackError};
use subtrack_core::model::{CycleUnit, RenewalRecord, Subscription};
use subtrack_core::store::{RenewalPlan, SubscriptionStore};

/// SQLite-backed persistent store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| SubtrackError::store(format!("DB open: {e}")))?;

        // WAL keeps readers unblocked while a renewal transaction commits
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory database. Useful for tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SubtrackError::store(format!("DB open: {e}")))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Run migrations to create tables.
    fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS subscriptions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                amount REAL NOT NULL DEFAULT 0,
                currency TEXT NOT NULL DEFAULT 'CNY',
                start_date TEXT NOT NULL,
                cycle_value INTEGER NOT NULL DEFAULT 1,
                cycle_unit TEXT NOT NULL DEFAULT 'month',
                expire_date TEXT NOT NULL,
                auto_renew INTEGER NOT NULL DEFAULT 0,
                renew_count INTEGER NOT NULL DEFAULT 0,
                remind_days INTEGER NOT NULL DEFAULT 3,
                remark TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Append-only: one row per committed renewal, never updated
            CREATE TABLE IF NOT EXISTS subscription_renewals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subscription_id INTEGER NOT NULL,
                renewed_at TEXT NOT NULL,
                old_expire_date TEXT NOT NULL,
                new_expire_date TEXT NOT NULL,
                renew_count INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_renewals_subscription
                ON subscription_renewals(subscription_id);

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL DEFAULT ''
            );
            ",
        )
        .map_err(|e| SubtrackError::store(format!("Migration: {e}")))?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SubtrackError::store(format!("Lock: {e}")))
    }

    // ─── Subscriptions ──────────────────────────────────────

    /// Insert a new subscription, returning its row id.
    pub fn insert_subscription(&self, sub: &Subscription) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO subscriptions
             (name, amount, currency, start_date, cycle_value, cycle_unit,
              expire_date, auto_renew, renew_count, remind_days, remark,
              created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                sub.name,
                sub.amount,
                sub.currency,
                sub.start_date,
                sub.cycle_value,
                sub.cycle_unit.as_str(),
                sub.expire_date,
                sub.auto_renew as i32,
                sub.renew_count,
                sub.remind_days,
                sub.remark,
                sub.created_at,
                sub.updated_at,
            ],
        )
        .map_err(|e| SubtrackError::store(format!("Insert subscription: {e}")))?;
        Ok(conn.last_insert_rowid())
    }

    /// Full-row update of an existing subscription. Bumps `updated_at`.
    pub fn update_subscription(&self, sub: &Subscription) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE subscriptions SET
                 name = ?1, amount = ?2, currency = ?3, start_date = ?4,
                 cycle_value = ?5, cycle_unit = ?6, expire_date = ?7,
                 auto_renew = ?8, renew_count = ?9, remind_days = ?10,
                 remark = ?11, updated_at = ?12
                 WHERE id = ?13",
                params![
                    sub.name,
                    sub.amount,
                    sub.currency,
                    sub.start_date,
                    sub.cycle_value,
                    sub.cycle_unit.as_str(),
                    sub.expire_date,
                    sub.auto_renew as i32,
                    sub.renew_count,
                    sub.remind_days,
                    sub.remark,
                    Utc::now(),
                    sub.id,
                ],
            )
            .map_err(|e| SubtrackError::store(format!("Update subscription: {e}")))?;
        if changed == 0 {
            return Err(SubtrackError::NotFound(sub.id));
        }
        Ok(())
    }

    /// Delete a subscription.
    pub fn delete_subscription(&self, id: i64) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM subscriptions WHERE id = ?1", [id])
            .map_err(|e| SubtrackError::store(format!("Delete subscription: {e}")))?;
        Ok(())
    }

    // ─── Renewal history ──────────────────────────────────────

    /// Renewal records for one subscription, oldest first.
    pub fn list_renewals(&self, subscription_id: i64) -> Result<Vec<RenewalRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, subscription_id, renewed_at, old_expire_date,
                        new_expire_date, renew_count
                 FROM subscription_renewals
                 WHERE subscription_id = ?1 ORDER BY id",
            )
            .map_err(|e| SubtrackError::store(format!("List renewals: {e}")))?;
        let rows = stmt
            .query_map([subscription_id], |row| {
                Ok(RenewalRecord {
                    id: row.get(0)?,
                    subscription_id: row.get(1)?,
                    renewed_at: row.get(2)?,
                    old_expire_date: row.get(3)?,
                    new_expire_date: row.get(4)?,
                    renew_count: row.get(5)?,
                })
            })
            .map_err(|e| SubtrackError::store(format!("List renewals: {e}")))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| SubtrackError::store(format!("List renewals: {e}")))
    }

    // ─── Settings ──────────────────────────────────────

    /// Set a settings value.
    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .map_err(|e| SubtrackError::store(format!("Set setting: {e}")))?;
        Ok(())
    }
}

const SUBSCRIPTION_COLUMNS: &str = "id, name, amount, currency, start_date, cycle_value, \
     cycle_unit, expire_date, auto_renew, renew_count, remind_days, remark, \
     created_at, updated_at";

fn row_to_subscription(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    let cycle_unit: String = row.get(6)?;
    Ok(Subscription {
        id: row.get(0)?,
        name: row.get(1)?,
        amount: row.get(2)?,
        currency: row.get(3)?,
        start_date: row.get(4)?,
        cycle_value: row.get(5)?,
        cycle_unit: CycleUnit::parse(&cycle_unit),
        expire_date: row.get(7)?,
        auto_renew: row.get::<_, i32>(8)? != 0,
        renew_count: row.get(9)?,
        remind_days: row.get(10)?,
        remark: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

impl SubscriptionStore for SqliteStore {
    fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions ORDER BY expire_date ASC"
            ))
            .map_err(|e| SubtrackError::store(format!("List subscriptions: {e}")))?;
        let rows = stmt
            .query_map([], row_to_subscription)
            .map_err(|e| SubtrackError::store(format!("List subscriptions: {e}")))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| SubtrackError::store(format!("List subscriptions: {e}")))
    }

    fn load_subscription(&self, id: i64) -> Result<Subscription> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = ?1"),
            [id],
            row_to_subscription,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => SubtrackError::NotFound(id),
            e => SubtrackError::store(format!("Load subscription: {e}")),
        })
    }

    fn get_setting(&self, key: &str, default: &str) -> String {
        let Ok(conn) = self.conn.lock() else {
            return default.to_string();
        };
        conn.query_row(
            "SELECT value FROM settings WHERE key = ?1",
            [key],
            |row| row.get::<_, String>(0),
        )
        .unwrap_or_else(|_| default.to_string())
    }

    fn renew_in_tx(
        &self,
        id: i64,
        decide: &dyn Fn(&Subscription) -> Option<RenewalPlan>,
    ) -> Result<Option<RenewalRecord>> {
        let mut conn = self.lock()?;
        // Immediate: take the write lock before reading, so the decision is
        // always made against the latest committed row.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| SubtrackError::store(format!("Renew begin: {e}")))?;

        let sub = tx
            .query_row(
                &format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = ?1"),
                [id],
                row_to_subscription,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => SubtrackError::NotFound(id),
                e => SubtrackError::store(format!("Renew load: {e}")),
            })?;

        let Some(plan) = decide(&sub) else {
            // Dropping the transaction rolls it back; the row is untouched.
            return Ok(None);
        };

        let renewed_at = Utc::now();
        tx.execute(
            "UPDATE subscriptions
             SET expire_date = ?1, renew_count = ?2, updated_at = ?3
             WHERE id = ?4",
            params![plan.new_expire_date, plan.new_renew_count, renewed_at, id],
        )
        .map_err(|e| SubtrackError::store(format!("Renew update: {e}")))?;

        tx.execute(
            "INSERT INTO subscription_renewals
             (subscription_id, renewed_at, old_expire_date, new_expire_date, renew_count)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                renewed_at,
                sub.expire_date,
                plan.new_expire_date,
                plan.new_renew_count
            ],
        )
        .map_err(|e| SubtrackError::store(format!("Renew record: {e}")))?;
        let record_id = tx.last_insert_rowid();

        tx.commit()
            .map_err(|e| SubtrackError::store(format!("Renew commit: {e}")))?;

        Ok(Some(RenewalRecord {
            id: record_id,
            subscription_id: id,
            renewed_at,
            old_expire_date: sub.expire_date,
            new_expire_date: plan.new_expire_date,
            renew_count: plan.new_renew_count,
        }))
    }
}

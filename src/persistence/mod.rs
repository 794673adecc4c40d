//! SQLite persistence for vault, harvest and bridge history.
//!
//! Records survive restarts so operators can audit what happened:
//! - Deposit/withdraw events
//! - Harvest cycles and emitted rebalance signals
//! - Bridge message snapshots (upserted as their state machine advances)
//!
//! Decimal values are stored as TEXT to keep full precision.

use crate::bridge::{BridgeMessage, MessageStatus};
use crate::vault::{DepositReceipt, WithdrawReceipt};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// A persisted harvest cycle.
#[derive(Debug, Clone)]
pub struct HarvestRecord {
    pub at: DateTime<Utc>,
    pub harvested: Decimal,
    pub total_harvested: Decimal,
    pub signal_count: u32,
}

/// SQLite-based persistence manager.
pub struct PersistenceManager {
    conn: Connection,
}

impl PersistenceManager {
    /// Open (and initialize if needed) the database at `db_path`.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        let manager = Self { conn };
        manager.init_schema()?;

        info!("Persistence manager initialized at {:?}", db_path.as_ref());
        Ok(manager)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            -- Deposit/withdraw history
            CREATE TABLE IF NOT EXISTS vault_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                kind TEXT NOT NULL,
                caller TEXT NOT NULL,
                receiver TEXT NOT NULL,
                asset TEXT NOT NULL,
                amount TEXT NOT NULL,
                shares TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_vault_events_asset ON vault_events(asset);

            -- Harvest cycles
            CREATE TABLE IF NOT EXISTS harvest_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                harvested TEXT NOT NULL,
                total_harvested TEXT NOT NULL,
                signal_count INTEGER NOT NULL
            );

            -- Bridge message snapshots, one row per message id. Chain
            -- selectors are u64 values above i64::MAX, so they are stored
            -- as TEXT to keep raw rows readable.
            CREATE TABLE IF NOT EXISTS bridge_messages (
                message_id TEXT PRIMARY KEY,
                source_chain TEXT NOT NULL,
                destination_chain TEXT NOT NULL,
                sender TEXT NOT NULL,
                receiver TEXT NOT NULL,
                amount TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .context("Failed to initialize database schema")?;
        Ok(())
    }

    /// Record a completed deposit.
    pub fn record_deposit(&self, receipt: &DepositReceipt) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO vault_events (timestamp, kind, caller, receiver, asset, amount, shares)
                 VALUES (?1, 'deposit', ?2, ?3, ?4, ?5, ?6)",
                params![
                    receipt.at.to_rfc3339(),
                    receipt.caller,
                    receipt.receiver,
                    receipt.asset,
                    receipt.amount.to_string(),
                    receipt.shares.to_string(),
                ],
            )
            .context("Failed to record deposit event")?;
        Ok(())
    }

    /// Record a completed withdrawal.
    pub fn record_withdrawal(&self, receipt: &WithdrawReceipt) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO vault_events (timestamp, kind, caller, receiver, asset, amount, shares)
                 VALUES (?1, 'withdraw', ?2, ?3, ?4, ?5, ?6)",
                params![
                    receipt.at.to_rfc3339(),
                    receipt.caller,
                    receipt.receiver,
                    receipt.asset,
                    receipt.amount.to_string(),
                    receipt.shares.to_string(),
                ],
            )
            .context("Failed to record withdraw event")?;
        Ok(())
    }

    /// Count vault events per asset, for status reporting.
    pub fn vault_event_count(&self, asset: &str) -> Result<u64> {
        let count: u64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM vault_events WHERE asset = ?1",
                params![asset],
                |row| row.get(0),
            )
            .context("Failed to count vault events")?;
        Ok(count)
    }

    /// Record one harvest cycle.
    pub fn record_harvest(&self, record: &HarvestRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO harvest_events (timestamp, harvested, total_harvested, signal_count)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.at.to_rfc3339(),
                    record.harvested.to_string(),
                    record.total_harvested.to_string(),
                    record.signal_count,
                ],
            )
            .context("Failed to record harvest event")?;
        Ok(())
    }

    /// Load harvest history, oldest first.
    pub fn load_harvests(&self) -> Result<Vec<HarvestRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT timestamp, harvested, total_harvested, signal_count
             FROM harvest_events ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let at: String = row.get(0)?;
            let harvested: String = row.get(1)?;
            let total: String = row.get(2)?;
            let signal_count: u32 = row.get(3)?;
            Ok((at, harvested, total, signal_count))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (at, harvested, total, signal_count) = row?;
            records.push(HarvestRecord {
                at: DateTime::parse_from_rfc3339(&at)
                    .context("Invalid harvest timestamp")?
                    .with_timezone(&Utc),
                harvested: Decimal::from_str(&harvested).context("Invalid harvested amount")?,
                total_harvested: Decimal::from_str(&total)
                    .context("Invalid total harvested amount")?,
                signal_count,
            });
        }
        Ok(records)
    }

    /// Insert or update a bridge message snapshot.
    pub fn upsert_message(&self, message: &BridgeMessage) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO bridge_messages
                   (message_id, source_chain, destination_chain, sender, receiver,
                    amount, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(message_id) DO UPDATE SET
                   status = excluded.status,
                   receiver = excluded.receiver,
                   updated_at = excluded.updated_at",
                params![
                    message.id,
                    message.source_chain.to_string(),
                    message.destination_chain.to_string(),
                    message.sender,
                    message.receiver,
                    message.amount.to_string(),
                    status_str(message.status),
                    message.created_at.to_rfc3339(),
                    message.updated_at.to_rfc3339(),
                ],
            )
            .context("Failed to upsert bridge message")?;
        Ok(())
    }

    /// Load all persisted bridge messages, oldest first.
    pub fn load_messages(&self) -> Result<Vec<BridgeMessage>> {
        let mut stmt = self.conn.prepare(
            "SELECT message_id, source_chain, destination_chain, sender, receiver,
                    amount, status, created_at, updated_at
             FROM bridge_messages ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
            ))
        })?;

        let mut messages = Vec::new();
        for row in rows {
            let (id, source, destination, sender, receiver, amount, status, created, updated) =
                row?;
            messages.push(BridgeMessage {
                id,
                source_chain: source.parse().context("Invalid source chain selector")?,
                destination_chain: destination
                    .parse()
                    .context("Invalid destination chain selector")?,
                sender,
                receiver,
                amount: Decimal::from_str(&amount).context("Invalid message amount")?,
                status: status_from_str(&status)?,
                created_at: DateTime::parse_from_rfc3339(&created)
                    .context("Invalid message created_at")?
                    .with_timezone(&Utc),
                updated_at: DateTime::parse_from_rfc3339(&updated)
                    .context("Invalid message updated_at")?
                    .with_timezone(&Utc),
            });
        }
        Ok(messages)
    }
}

fn status_str(status: MessageStatus) -> &'static str {
    match status {
        MessageStatus::Locked => "locked",
        MessageStatus::Minted => "minted",
        MessageStatus::Failed => "failed",
    }
}

fn status_from_str(value: &str) -> Result<MessageStatus> {
    match value {
        "locked" => Ok(MessageStatus::Locked),
        "minted" => Ok(MessageStatus::Minted),
        "failed" => Ok(MessageStatus::Failed),
        other => anyhow::bail!("unknown message status {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{FUJI_CHAIN_SELECTOR, SEPOLIA_CHAIN_SELECTOR};
    use rust_decimal_macros::dec;

    fn manager() -> PersistenceManager {
        PersistenceManager::new(":memory:").unwrap()
    }

    #[test]
    fn test_vault_event_history() {
        let manager = manager();
        manager
            .record_deposit(&DepositReceipt {
                caller: "alice".to_string(),
                receiver: "alice".to_string(),
                asset: "stETH".to_string(),
                amount: dec!(100),
                shares: dec!(100),
                at: Utc::now(),
            })
            .unwrap();
        manager
            .record_withdrawal(&WithdrawReceipt {
                caller: "alice".to_string(),
                receiver: "alice".to_string(),
                owner: "alice".to_string(),
                asset: "stETH".to_string(),
                amount: dec!(40),
                shares: dec!(40),
                at: Utc::now(),
            })
            .unwrap();

        assert_eq!(manager.vault_event_count("stETH").unwrap(), 2);
        assert_eq!(manager.vault_event_count("rETH").unwrap(), 0);
    }

    #[test]
    fn test_harvest_round_trip() {
        let manager = manager();
        manager
            .record_harvest(&HarvestRecord {
                at: Utc::now(),
                harvested: dec!(0.1),
                total_harvested: dec!(0.1),
                signal_count: 0,
            })
            .unwrap();
        manager
            .record_harvest(&HarvestRecord {
                at: Utc::now(),
                harvested: dec!(0.2),
                total_harvested: dec!(0.3),
                signal_count: 2,
            })
            .unwrap();

        let harvests = manager.load_harvests().unwrap();
        assert_eq!(harvests.len(), 2);
        assert_eq!(harvests[1].total_harvested, dec!(0.3));
        assert_eq!(harvests[1].signal_count, 2);
    }

    #[test]
    fn test_message_upsert_advances_status() {
        let manager = manager();
        let now = Utc::now();
        let mut message = BridgeMessage {
            id: "msg-1".to_string(),
            source_chain: 1,
            destination_chain: 2,
            sender: "alice".to_string(),
            receiver: "bob".to_string(),
            amount: dec!(100),
            status: MessageStatus::Locked,
            created_at: now,
            updated_at: now,
        };
        manager.upsert_message(&message).unwrap();

        message.status = MessageStatus::Minted;
        message.updated_at = Utc::now();
        manager.upsert_message(&message).unwrap();

        let loaded = manager.load_messages().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].status, MessageStatus::Minted);
        assert_eq!(loaded[0].amount, dec!(100));
    }

    // Testnet selectors exceed i64::MAX; they must survive storage intact.
    #[test]
    fn test_large_chain_selectors_round_trip() {
        let manager = manager();
        let now = Utc::now();
        manager
            .upsert_message(&BridgeMessage {
                id: "msg-selectors".to_string(),
                source_chain: SEPOLIA_CHAIN_SELECTOR,
                destination_chain: FUJI_CHAIN_SELECTOR,
                sender: "alice".to_string(),
                receiver: "bob".to_string(),
                amount: dec!(5),
                status: MessageStatus::Locked,
                created_at: now,
                updated_at: now,
            })
            .unwrap();

        let loaded = manager.load_messages().unwrap();
        assert_eq!(loaded[0].source_chain, SEPOLIA_CHAIN_SELECTOR);
        assert_eq!(loaded[0].destination_chain, FUJI_CHAIN_SELECTOR);
    }
}

//! Persistent cache for resolved signatures and contract ABIs

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;

use crate::info::ChainId;
use crate::repository::AbiRepository;

/// Cached function signature from a selector-database lookup
#[derive(Debug, Clone)]
pub struct CachedSignature {
    pub selector: String,  // hex with 0x prefix
    pub name: String,      // e.g., "transfer"
    pub signature: String, // e.g., "transfer(address,uint256)"
}

/// Cached contract ABI
#[derive(Debug, Clone)]
pub struct CachedAbi {
    pub chain_id: ChainId,
    pub address: String,
    pub abi_json: String,
    pub contract_name: Option<String>,
}

/// SQLite-backed ABI cache
///
/// `chain_id` is stored as decimal text so ids beyond 64 bits round-trip.
#[derive(Debug)]
pub struct AbiStore {
    conn: Connection,
}

impl AbiStore {
    /// Open or create the cache database
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).with_context(|| format!("open db {}", path.display()))?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    /// Initialize database schema
    fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            -- Function selector cache
            CREATE TABLE IF NOT EXISTS selectors (
                selector    TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                signature   TEXT NOT NULL,
                created_at  INTEGER DEFAULT (strftime('%s', 'now'))
            );

            -- Contract ABI cache
            CREATE TABLE IF NOT EXISTS abis (
                chain_id      TEXT NOT NULL,
                address       TEXT NOT NULL,
                abi_json      TEXT NOT NULL,
                contract_name TEXT,
                created_at    INTEGER DEFAULT (strftime('%s', 'now')),
                PRIMARY KEY (chain_id, address)
            );

            -- Index for faster lookups
            CREATE INDEX IF NOT EXISTS idx_selectors_created ON selectors(created_at);
            CREATE INDEX IF NOT EXISTS idx_abis_created ON abis(created_at);
            ",
        )?;
        Ok(())
    }

    /// Save a resolved function signature
    pub fn save_signature(&self, selector: &str, name: &str, signature: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO selectors(selector, name, signature) VALUES (?1, ?2, ?3)
             ON CONFLICT(selector) DO UPDATE SET name=excluded.name, signature=excluded.signature",
            params![selector, name, signature],
        )?;
        Ok(())
    }

    /// Get a cached function signature by selector
    pub fn get_signature(&self, selector: &str) -> Result<Option<CachedSignature>> {
        let mut stmt = self
            .conn
            .prepare("SELECT selector, name, signature FROM selectors WHERE selector = ?1")?;

        let mut rows = stmt.query(params![selector])?;
        if let Some(row) = rows.next()? {
            Ok(Some(CachedSignature {
                selector: row.get(0)?,
                name: row.get(1)?,
                signature: row.get(2)?,
            }))
        } else {
            Ok(None)
        }
    }

    /// Check if a selector is cached
    pub fn has_signature(&self, selector: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM selectors WHERE selector = ?1",
            params![selector],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Save a resolved contract ABI
    pub fn save_abi(
        &self,
        chain_id: ChainId,
        address: &str,
        abi_json: &str,
        contract_name: Option<&str>,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO abis(chain_id, address, abi_json, contract_name) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(chain_id, address) DO UPDATE SET
                abi_json=excluded.abi_json,
                contract_name=excluded.contract_name",
            params![chain_id.to_string(), address.to_lowercase(), abi_json, contract_name],
        )?;
        Ok(())
    }

    /// Get a cached contract ABI
    pub fn get_abi(&self, chain_id: ChainId, address: &str) -> Result<Option<CachedAbi>> {
        let mut stmt = self.conn.prepare(
            "SELECT chain_id, address, abi_json, contract_name FROM abis
             WHERE chain_id = ?1 AND address = ?2",
        )?;

        let mut rows = stmt.query(params![chain_id.to_string(), address.to_lowercase()])?;
        if let Some(row) = rows.next()? {
            Ok(Some(row_to_cached_abi(row)?))
        } else {
            Ok(None)
        }
    }

    /// Get all cached ABIs
    pub fn get_all_abis(&self) -> Result<Vec<CachedAbi>> {
        let mut stmt = self.conn.prepare(
            "SELECT chain_id, address, abi_json, contract_name FROM abis ORDER BY chain_id, address",
        )?;

        let mut rows = stmt.query([])?;
        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            results.push(row_to_cached_abi(row)?);
        }
        Ok(results)
    }

    /// Get all cached signatures (for preloading)
    pub fn get_all_signatures(&self) -> Result<Vec<CachedSignature>> {
        let mut stmt = self
            .conn
            .prepare("SELECT selector, name, signature FROM selectors ORDER BY selector")?;

        let mut rows = stmt.query([])?;
        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            results.push(CachedSignature {
                selector: row.get(0)?,
                name: row.get(1)?,
                signature: row.get(2)?,
            });
        }
        Ok(results)
    }

    /// Register every cached ABI with the repository. Returns how many
    /// contracts were registered.
    pub fn load_into(&self, repository: &AbiRepository) -> Result<usize> {
        let mut loaded = 0;
        for cached in self.get_all_abis()? {
            repository
                .add_abi_with_identity(
                    &cached.abi_json,
                    Some(&cached.address),
                    cached.contract_name.as_deref(),
                    Some("cache"),
                    Some(cached.chain_id),
                )
                .with_context(|| {
                    format!("register cached ABI {}:{}", cached.chain_id, cached.address)
                })?;
            loaded += 1;
        }
        tracing::debug!(loaded, "hydrated repository from ABI store");
        Ok(loaded)
    }

    /// Get cache statistics
    pub fn stats(&self) -> Result<(usize, usize)> {
        let sig_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM selectors", [], |row| row.get(0))?;
        let abi_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM abis", [], |row| row.get(0))?;
        Ok((sig_count as usize, abi_count as usize))
    }

    /// Clean entries older than the given age
    pub fn cleanup_old_entries(&self, max_age_days: u32) -> Result<usize> {
        let cutoff = max_age_days as i64 * 24 * 60 * 60;
        let deleted: usize = self.conn.execute(
            "DELETE FROM selectors WHERE created_at < (strftime('%s', 'now') - ?1)",
            params![cutoff],
        )?;
        let deleted_abis: usize = self.conn.execute(
            "DELETE FROM abis WHERE created_at < (strftime('%s', 'now') - ?1)",
            params![cutoff],
        )?;
        Ok(deleted + deleted_abis)
    }
}

fn row_to_cached_abi(row: &rusqlite::Row<'_>) -> Result<CachedAbi> {
    let chain_text: String = row.get(0)?;
    let chain_id = chain_text
        .parse::<ChainId>()
        .map_err(|e| anyhow!("invalid chain_id '{}' in store: {}", chain_text, e))?;
    Ok(CachedAbi {
        chain_id,
        address: row.get(1)?,
        abi_json: row.get(2)?,
        contract_name: row.get(3)?,
    })
}

//! Cookie store access
//!
//! Reads the on-disk cookie database the managed browser profile wrote
//! during the login run and maps its rows into portable [`Cookie`] records.
//! The database is only ever opened read-only, after the browser process
//! has stopped.

pub mod decrypt;
pub mod epoch;

use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};

use crate::cookie::{Cookie, SameSite};
use crate::error::{CookieFerryError, Result};
use decrypt::CookieDecryptor;

/// One row of the on-disk `cookies` table. Owned by the repository for the
/// duration of a single query.
#[derive(Debug, Clone)]
pub struct RawCookieRecord {
    pub creation_utc: i64,
    pub host_key: String,
    pub name: String,
    pub value: String,
    pub encrypted_value: Vec<u8>,
    pub path: String,
    pub expires_utc: i64,
    pub is_secure: i64,
    pub is_httponly: i64,
    pub is_persistent: i64,
    pub samesite: i64,
}

/// Narrow seam over the cookie table, so the reader can be exercised
/// against an in-memory store.
pub trait CookieRepository {
    /// Count rows whose host key contains `host` and whose store-native
    /// expiry is at or past `min_expires_utc`.
    fn count_live_for_host(&self, host: &str, min_expires_utc: i64) -> Result<i64>;

    /// All rows whose host key contains `host`, in store iteration order.
    fn all_for_host(&self, host: &str) -> Result<Vec<RawCookieRecord>>;
}

/// `rusqlite` binding over the browser's cookie database.
pub struct SqliteCookieRepository {
    conn: Connection,
}

impl SqliteCookieRepository {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| {
                CookieFerryError::Store(format!("failed to open cookie store {:?}: {}", path, e))
            })?;
        Ok(Self { conn })
    }
}

impl CookieRepository for SqliteCookieRepository {
    fn count_live_for_host(&self, host: &str, min_expires_utc: i64) -> Result<i64> {
        let pattern = format!("%{}%", host);
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM cookies WHERE host_key LIKE ?1 AND expires_utc >= ?2",
                rusqlite::params![pattern, min_expires_utc],
                |row| row.get(0),
            )
            .map_err(|e| CookieFerryError::Store(format!("failed to count cookies: {}", e)))
    }

    fn all_for_host(&self, host: &str) -> Result<Vec<RawCookieRecord>> {
        let pattern = format!("%{}%", host);
        let mut stmt = self
            .conn
            .prepare(
                "SELECT creation_utc, host_key, name, value, encrypted_value, path, \
                 expires_utc, is_secure, is_httponly, is_persistent, samesite \
                 FROM cookies WHERE host_key LIKE ?1",
            )
            .map_err(|e| {
                CookieFerryError::Store(format!("failed to prepare cookie query: {}", e))
            })?;

        let rows = stmt
            .query_map([pattern], |row| {
                Ok(RawCookieRecord {
                    creation_utc: row.get(0)?,
                    host_key: row.get(1)?,
                    name: row.get(2)?,
                    value: row.get(3)?,
                    encrypted_value: read_encrypted_column(row, 4)?,
                    path: row.get(5)?,
                    expires_utc: row.get(6)?,
                    is_secure: row.get(7)?,
                    is_httponly: row.get(8)?,
                    is_persistent: row.get(9)?,
                    samesite: row.get(10)?,
                })
            })
            .map_err(|e| CookieFerryError::Store(format!("failed to query cookies: {}", e)))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| CookieFerryError::Store(format!("failed to read cookie row: {}", e)))
    }
}

fn read_encrypted_column(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<Vec<u8>> {
    match row.get_ref(index)? {
        ValueRef::Blob(bytes) => Ok(bytes.to_vec()),
        ValueRef::Text(text) => Ok(text.to_vec()),
        ValueRef::Null => Ok(Vec::new()),
        other => Err(rusqlite::Error::InvalidColumnType(
            index,
            "encrypted_value".to_string(),
            other.data_type(),
        )),
    }
}

/// Maps store rows into portable cookies, guarding the read behind the
/// live-cookie precondition.
pub struct CookieStoreReader<R: CookieRepository> {
    repository: R,
    decryptor: CookieDecryptor,
}

impl<R: CookieRepository> CookieStoreReader<R> {
    pub fn new(repository: R, decryptor: CookieDecryptor) -> Self {
        Self {
            repository,
            decryptor,
        }
    }

    /// Read every cookie whose host key contains `host`.
    ///
    /// Fails with [`CookieFerryError::StoreEmpty`] unless at least one
    /// matching cookie expires in the future; a store the browser never
    /// wrote post-login cookies into must not produce a response. The
    /// substring match is intentional so parent-domain cookies
    /// (`.example.com`) come back when querying `login.example.com`.
    pub fn read_cookies(&self, host: &str, now_unix_seconds: i64) -> Result<Vec<Cookie>> {
        let min_expires = epoch::to_store_epoch_micros(now_unix_seconds);
        let live = self.repository.count_live_for_host(host, min_expires)?;
        if live == 0 {
            return Err(CookieFerryError::StoreEmpty(host.to_string()));
        }

        self.repository
            .all_for_host(host)?
            .into_iter()
            .map(|record| self.map_record(record))
            .collect()
    }

    fn map_record(&self, record: RawCookieRecord) -> Result<Cookie> {
        let value = if !record.encrypted_value.is_empty() {
            let plaintext = self.decryptor.decrypt(&record.encrypted_value)?;
            String::from_utf8(plaintext).map_err(|e| {
                CookieFerryError::Decryption(format!("decrypted value is not UTF-8: {}", e))
            })?
        } else {
            // legacy rows carry their value unencrypted
            record.value
        };

        Ok(Cookie {
            host_only: !record.host_key.starts_with('.'),
            session: record.is_persistent == 0,
            domain: record.host_key,
            name: record.name,
            value,
            path: record.path,
            secure: record.is_secure != 0,
            http_only: record.is_httponly != 0,
            expiration_date: epoch::to_unix_seconds(record.expires_utc),
            same_site: SameSite::from_store(record.samesite),
            store_id: "0".to_string(),
            url: None,
        })
    }
}

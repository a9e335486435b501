//! Named cache and entry operations on the SQLite database.

use super::connection::CacheDb;
use crate::Error;
use crate::http::{Request, Response};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};

/// A request/response pair ready to be written.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub key_hash: String,
    pub method: String,
    pub url: String,
    pub response: Response,
}

impl StoredEntry {
    pub fn new(request: &Request, response: &Response) -> Self {
        Self {
            key_hash: request.cache_key(),
            method: request.method().to_string(),
            url: request.url().to_string(),
            response: response.clone(),
        }
    }
}

fn cache_id(conn: &rusqlite::Connection, name: &str) -> Result<Option<i64>, Error> {
    let id = conn
        .query_row("SELECT id FROM caches WHERE name = ?1", params![name], |row| row.get(0))
        .optional()?;
    Ok(id)
}

impl CacheDb {
    /// Create a named cache if it does not exist.
    ///
    /// Returns true when the cache was created by this call.
    pub async fn create_cache(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let inserted = conn.execute(
                    "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
                    params![name, created_at],
                )?;
                Ok(inserted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of all caches in creation order.
    pub async fn cache_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY id")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a cache and every entry in it.
    ///
    /// Returns false if no cache had that name.
    pub async fn delete_cache(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM caches WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Look up an entry by key hash.
    ///
    /// With `cache = None` every cache is searched and the oldest cache holding
    /// the key wins. A missing named cache is a miss, not an error.
    pub async fn match_entry(&self, cache: Option<&str>, key_hash: &str) -> Result<Option<Response>, Error> {
        let cache = cache.map(str::to_string);
        let key_hash = key_hash.to_string();
        self.conn
            .call(move |conn| -> Result<Option<(u16, String, String, String, Vec<u8>)>, Error> {
                let row = conn
                    .query_row(
                        "SELECT e.status, e.status_text, e.response_url, e.headers_json, e.body
                         FROM entries e JOIN caches c ON c.id = e.cache_id
                         WHERE e.key_hash = ?1 AND (?2 IS NULL OR c.name = ?2)
                         ORDER BY c.id
                         LIMIT 1",
                        params![key_hash, cache],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
                    )
                    .optional()?;
                Ok(row)
            })
            .await
            .map_err(Error::from)?
            .map(|(status, status_text, url, headers_json, body)| -> Result<Response, Error> {
                let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)?;
                Ok(Response { url, status, status_text, headers, body: body.into() })
            })
            .transpose()
    }

    /// Write entries into a cache in one transaction.
    ///
    /// Either every entry is stored or none is. Existing entries with the same
    /// key are replaced.
    pub async fn put_entries(&self, cache: &str, entries: Vec<StoredEntry>) -> Result<(), Error> {
        let cache = cache.to_string();
        let stored_at = chrono::Utc::now().to_rfc3339();
        let rows = entries
            .into_iter()
            .map(|e| -> Result<_, Error> { Ok((serde_json::to_string(&e.response.headers)?, e)) })
            .collect::<Result<Vec<_>, Error>>()?;

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                let id = cache_id(&tx, &cache)?.ok_or_else(|| Error::CacheNotFound(cache.clone()))?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO entries (
                            cache_id, key_hash, method, url, status, status_text,
                            response_url, headers_json, body, stored_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                        ON CONFLICT(cache_id, key_hash) DO UPDATE SET
                            method = excluded.method,
                            url = excluded.url,
                            status = excluded.status,
                            status_text = excluded.status_text,
                            response_url = excluded.response_url,
                            headers_json = excluded.headers_json,
                            body = excluded.body,
                            stored_at = excluded.stored_at",
                    )?;
                    for (headers_json, entry) in &rows {
                        stmt.execute(params![
                            id,
                            &entry.key_hash,
                            &entry.method,
                            &entry.url,
                            entry.response.status,
                            &entry.response.status_text,
                            &entry.response.url,
                            headers_json,
                            entry.response.body.as_ref(),
                            &stored_at,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Record that the worker owning `cache` finished activating.
    pub async fn record_activation(&self, cache: &str) -> Result<(), Error> {
        let cache = cache.to_string();
        let activated_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let id = cache_id(conn, &cache)?.ok_or_else(|| Error::CacheNotFound(cache.clone()))?;
                conn.execute(
                    "INSERT OR REPLACE INTO activations (cache_id, activated_at) VALUES (?1, ?2)",
                    params![id, activated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Whether an activation was recorded for `cache`. A missing cache has none.
    pub async fn activation_recorded(&self, cache: &str) -> Result<bool, Error> {
        let cache = cache.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let found = conn.query_row(
                    "SELECT EXISTS(
                         SELECT 1 FROM activations a JOIN caches c ON c.id = a.cache_id WHERE c.name = ?1
                     )",
                    params![cache],
                    |row| row.get(0),
                )?;
                Ok(found)
            })
            .await
            .map_err(Error::from)
    }

    /// Request URLs stored in a cache, oldest write first.
    pub async fn entry_urls(&self, cache: &str) -> Result<Vec<String>, Error> {
        let cache = cache.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let id = cache_id(conn, &cache)?.ok_or_else(|| Error::CacheNotFound(cache.clone()))?;
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE cache_id = ?1 ORDER BY stored_at, rowid")?;
                let urls = stmt
                    .query_map(params![id], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}

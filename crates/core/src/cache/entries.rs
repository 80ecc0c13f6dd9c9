//! Entry operations: match and put within namespaces.
//!
//! Writes are UPSERTs, so concurrent puts for the same request are
//! last-write-wins. Putting into a namespace opens it first.

use super::connection::CacheDb;
use super::hash::compute_entry_key;
use crate::{Error, RequestDescriptor, ResponseKind, ResponseSnapshot};
use tokio_rusqlite::{params, rusqlite};

/// A stored response together with where and when it was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    pub namespace: String,
    pub method: String,
    pub url: String,
    pub response: ResponseSnapshot,
    pub stored_at: String,
}

/// Column order shared by every entry SELECT below.
const ENTRY_COLUMNS: &str =
    "e.namespace, e.method, e.url, e.status, e.status_text, e.kind, e.headers_json, e.body, e.stored_at";

struct EntryRow {
    namespace: String,
    method: String,
    url: String,
    status: i64,
    status_text: String,
    kind: String,
    headers_json: String,
    body: Vec<u8>,
    stored_at: String,
}

impl EntryRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            namespace: row.get(0)?,
            method: row.get(1)?,
            url: row.get(2)?,
            status: row.get(3)?,
            status_text: row.get(4)?,
            kind: row.get(5)?,
            headers_json: row.get(6)?,
            body: row.get(7)?,
            stored_at: row.get(8)?,
        })
    }

    fn into_entry(self) -> Result<CachedEntry, Error> {
        let status = u16::try_from(self.status)
            .map_err(|_| Error::CorruptEntry(format!("status {} out of range", self.status)))?;
        let kind = ResponseKind::parse(&self.kind)
            .ok_or_else(|| Error::CorruptEntry(format!("unknown response kind {}", self.kind)))?;
        let headers: Vec<(String, String)> = serde_json::from_str(&self.headers_json)?;

        Ok(CachedEntry {
            namespace: self.namespace,
            method: self.method,
            response: ResponseSnapshot {
                url: self.url.clone(),
                status,
                status_text: self.status_text,
                kind,
                headers,
                body: self.body,
            },
            url: self.url,
            stored_at: self.stored_at,
        })
    }
}

fn upsert(
    conn: &rusqlite::Connection, namespace: &str, request: &RequestDescriptor, response: &ResponseSnapshot,
    now: &str,
) -> Result<(), Error> {
    let url = request.cache_url();
    let key = compute_entry_key(request.method(), &url);
    let headers_json = serde_json::to_string(&response.headers)?;

    conn.execute(
        "INSERT OR IGNORE INTO namespaces (name, created_at) VALUES (?1, ?2)",
        params![namespace, now],
    )?;
    conn.execute(
        "INSERT INTO entries (
            namespace, key, method, url, status, status_text, kind, headers_json, body, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(namespace, key) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            status = excluded.status,
            status_text = excluded.status_text,
            kind = excluded.kind,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            namespace,
            key,
            request.method(),
            url,
            response.status as i64,
            &response.status_text,
            response.kind.as_str(),
            headers_json,
            &response.body,
            now,
        ],
    )?;
    Ok(())
}

impl CacheDb {
    /// Store a response for a request in the given namespace.
    pub async fn put(
        &self, namespace: &str, request: &RequestDescriptor, response: &ResponseSnapshot,
    ) -> Result<(), Error> {
        let namespace = namespace.to_string();
        let request = request.clone();
        let response = response.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                upsert(conn, &namespace, &request, &response, &chrono::Utc::now().to_rfc3339())
            })
            .await
            .map_err(Error::from)
    }

    /// Store every pair in one transaction: either all are written or none are.
    pub async fn put_all(
        &self, namespace: &str, pairs: Vec<(RequestDescriptor, ResponseSnapshot)>,
    ) -> Result<(), Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let now = chrono::Utc::now().to_rfc3339();
                let tx = conn.transaction()?;
                for (request, response) in &pairs {
                    upsert(&tx, &namespace, request, response, &now)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up a request within one namespace.
    pub async fn match_in(&self, namespace: &str, request: &RequestDescriptor) -> Result<Option<CachedEntry>, Error> {
        let namespace = namespace.to_string();
        let key = compute_entry_key(request.method(), &request.cache_url());
        self.conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries e WHERE e.namespace = ?1 AND e.key = ?2");
                let result = conn.query_row(&sql, params![namespace, key], EntryRow::from_row);
                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?
            .map(EntryRow::into_entry)
            .transpose()
    }

    /// Look up a request across all namespaces, oldest namespace first.
    pub async fn match_any(&self, request: &RequestDescriptor) -> Result<Option<CachedEntry>, Error> {
        let key = compute_entry_key(request.method(), &request.cache_url());
        self.conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let sql = format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries e
                     JOIN namespaces n ON n.name = e.namespace
                     WHERE e.key = ?1
                     ORDER BY n.rowid ASC LIMIT 1"
                );
                let result = conn.query_row(&sql, params![key], EntryRow::from_row);
                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?
            .map(EntryRow::into_entry)
            .transpose()
    }

    /// All entries in a namespace, ordered by URL.
    pub async fn entries(&self, namespace: &str) -> Result<Vec<CachedEntry>, Error> {
        let namespace = namespace.to_string();
        let rows = self
            .conn
            .call(move |conn| -> Result<Vec<EntryRow>, Error> {
                let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries e WHERE e.namespace = ?1 ORDER BY e.url ASC");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![namespace], EntryRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        rows.into_iter().map(EntryRow::into_entry).collect()
    }

    /// Number of entries in a namespace.
    pub async fn entry_count(&self, namespace: &str) -> Result<u64, Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE namespace = ?1", params![namespace], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

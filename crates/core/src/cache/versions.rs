//! Controller lifecycle records.
//!
//! Each controller version moves through installing, installed, activating,
//! activated, and ends redundant once superseded or after a failed install.
//! A controller is identified by its shell namespace, which carries both
//! profile and version tag. At most one controller is recorded as activated.

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::{params, rusqlite};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum VersionState {
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl VersionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionState::Installing => "installing",
            VersionState::Installed => "installed",
            VersionState::Activating => "activating",
            VersionState::Activated => "activated",
            VersionState::Redundant => "redundant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "installing" => Some(VersionState::Installing),
            "installed" => Some(VersionState::Installed),
            "activating" => Some(VersionState::Activating),
            "activated" => Some(VersionState::Activated),
            "redundant" => Some(VersionState::Redundant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct VersionRecord {
    /// Controller identity (its shell namespace). Distinct profiles may share a version tag.
    pub controller: String,
    pub version: String,
    pub state: VersionState,
    pub updated_at: String,
}

type RecordRow = (String, String, String, String);

impl CacheDb {
    /// Record a state transition for a controller.
    ///
    /// Recording `Activated` demotes any other activated controller to redundant.
    pub async fn set_version_state(&self, controller: &str, version: &str, state: VersionState) -> Result<(), Error> {
        let controller = controller.to_string();
        let version = version.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let now = chrono::Utc::now().to_rfc3339();
                let tx = conn.transaction()?;
                if state == VersionState::Activated {
                    tx.execute(
                        "UPDATE versions SET state = 'redundant', updated_at = ?2
                         WHERE state = 'activated' AND controller != ?1",
                        params![controller, now],
                    )?;
                }
                tx.execute(
                    "INSERT INTO versions (controller, version, state, updated_at) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(controller) DO UPDATE SET
                        version = excluded.version, state = excluded.state, updated_at = excluded.updated_at",
                    params![controller, version, state.as_str(), now],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the record for one controller.
    pub async fn version_record(&self, controller: &str) -> Result<Option<VersionRecord>, Error> {
        let controller = controller.to_string();
        self.record_where("controller = ?1", controller).await
    }

    /// The controller currently recorded as activated, if any.
    pub async fn active_record(&self) -> Result<Option<VersionRecord>, Error> {
        let state = VersionState::Activated.as_str().to_string();
        self.record_where("state = ?1", state).await
    }

    async fn record_where(&self, filter: &'static str, arg: String) -> Result<Option<VersionRecord>, Error> {
        let row = self
            .conn
            .call(move |conn| -> Result<Option<RecordRow>, Error> {
                let sql = format!(
                    "SELECT controller, version, state, updated_at FROM versions
                     WHERE {filter} ORDER BY updated_at DESC LIMIT 1"
                );
                let result = conn.query_row(&sql, params![arg], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                });
                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(into_record).transpose()
    }

    /// Every recorded controller, most recently updated first.
    pub async fn versions(&self) -> Result<Vec<VersionRecord>, Error> {
        let rows = self
            .conn
            .call(|conn| -> Result<Vec<RecordRow>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT controller, version, state, updated_at FROM versions
                     ORDER BY updated_at DESC, rowid DESC",
                )?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        rows.into_iter().map(into_record).collect()
    }
}

fn into_record((controller, version, state, updated_at): RecordRow) -> Result<VersionRecord, Error> {
    let state =
        VersionState::parse(&state).ok_or_else(|| Error::CorruptEntry(format!("unknown version state {state}")))?;
    Ok(VersionRecord { controller, version, state, updated_at })
}

//! Tabular snapshot of the published aggregate.
//!
//! The exported CSV is a compatibility contract with downstream consumers:
//! the header text and column order never change.

use {
    crate::model::{UserRecord, Users},
    crate::store::{ObjectStore, StoreError},
    chrono::{DateTime, NaiveDateTime, Utc},
};

/// Fixed header of the exported snapshot. Do not reorder.
pub const SNAPSHOT_HEADER: [&str; 5] = ["user_id", "first_name", "last_name", "births", "img_path"];
pub const SNAPSHOT_CONTENT_TYPE: &str = "application/csv";

#[derive(Debug)]
pub enum SnapshotError {
    Csv(csv::Error),
    Store(StoreError),
}

impl From<csv::Error> for SnapshotError {
    fn from(err: csv::Error) -> Self {
        SnapshotError::Csv(err)
    }
}

impl From<StoreError> for SnapshotError {
    fn from(err: StoreError) -> Self {
        SnapshotError::Store(err)
    }
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::Csv(e) => write!(f, "snapshot csv error: {}", e),
            SnapshotError::Store(e) => write!(f, "snapshot store error: {}", e),
        }
    }
}

impl std::error::Error for SnapshotError {}

/// Render the aggregate as the fixed-header CSV. The `births` column is the
/// birth instant's default textual rendering, empty when absent; `img_path`
/// is empty when absent.
pub fn write_snapshot(users: &Users) -> Result<Vec<u8>, SnapshotError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(SNAPSHOT_HEADER)?;
    for user in users.values() {
        let births = user.birthday.map(|b| b.to_string()).unwrap_or_default();
        writer.write_record([
            user.id.as_str(),
            user.first_name.as_str(),
            user.last_name.as_str(),
            births.as_str(),
            user.picture_path.as_str(),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|e| SnapshotError::Csv(csv::Error::from(e.into_error())))
}

/// Parse a previously exported snapshot back into an aggregate. Unparsable
/// birth instants degrade to the absent instant.
pub fn read_snapshot(body: &[u8]) -> Result<Users, SnapshotError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body);

    let mut users = Users::new();
    for result in reader.records() {
        let row = result?;
        if row.len() < 5 {
            log::warn!("snapshot row with {} columns skipped", row.len());
            continue;
        }
        let record = UserRecord {
            id: row[0].to_string(),
            first_name: row[1].to_string(),
            last_name: row[2].to_string(),
            birthday: parse_births(&row[3]),
            picture_path: row[4].to_string(),
        };
        users.insert(record.id.clone(), record);
    }
    Ok(users)
}

fn parse_births(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let stripped = trimmed.strip_suffix(" UTC").unwrap_or(trimmed);
    NaiveDateTime::parse_from_str(stripped, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Upload the rendered snapshot to the result bucket.
pub async fn export_snapshot(
    store: &dyn ObjectStore,
    bucket: &str,
    object: &str,
    users: &Users,
) -> Result<(), SnapshotError> {
    let body = write_snapshot(users)?;
    store
        .put_object(bucket, object, body, SNAPSHOT_CONTENT_TYPE)
        .await?;
    log::debug!("exported snapshot of {} users to {}/{}", users.len(), bucket, object);
    Ok(())
}

//! Per-object partial record extraction.
//!
//! Each storage object contributes at most a partial user record; anything
//! unusable (unknown extension, malformed content, too few rows or columns)
//! contributes nothing and never aborts the caller.

use {
    crate::model::{ObjectName, UserRecord},
    crate::store::ObjectStore,
    chrono::{DateTime, TimeZone, Utc},
};

/// Parse one storage object into the partial record it contributes.
///
/// Picture objects are recognized by name alone; demographic objects are
/// read through the store and parsed as CSV. `None` means "no contribution",
/// not an error: the anomaly is logged and the caller proceeds.
pub async fn parse_object(
    store: &dyn ObjectStore,
    bucket: &str,
    object: &ObjectName,
) -> Option<UserRecord> {
    if object.is_image() {
        return Some(UserRecord {
            id: object.stem.clone(),
            picture_path: object.key.clone(),
            ..Default::default()
        });
    }
    if !object.is_tabular() {
        log::debug!("skipping object with unsupported type: {}", object.key);
        return None;
    }
    let body = match store.get_object(bucket, &object.key).await {
        Ok(body) => body,
        Err(e) => {
            log::warn!("failed to read object {}: {}", object.key, e);
            return None;
        }
    };
    parse_demographic(object, &body)
}

/// Parse a demographic CSV body: a header row plus at least one data row
/// with at least three columns (first name, last name, birth millis).
pub fn parse_demographic(object: &ObjectName, body: &[u8]) -> Option<UserRecord> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body);

    let mut rows = Vec::new();
    for result in reader.records() {
        match result {
            Ok(record) => rows.push(record),
            Err(e) => {
                log::warn!("malformed csv content in {}: {}", object.key, e);
                return None;
            }
        }
    }

    if rows.len() < 2 {
        log::warn!("wrong csv format in {}: expected header plus data row", object.key);
        return None;
    }
    let data = &rows[1];
    if data.len() < 3 {
        log::warn!(
            "wrong user row in {}: expected at least 3 columns, got {}",
            object.key,
            data.len()
        );
        return None;
    }

    Some(UserRecord {
        id: object.stem.clone(),
        first_name: data[0].trim().to_string(),
        last_name: data[1].trim().to_string(),
        birthday: birthday_from_millis(&data[2], &object.key),
        picture_path: String::new(),
    })
}

/// Parse a birth instant from milliseconds since the epoch. An unparsable
/// value degrades to the absent instant; the record itself is kept.
fn birthday_from_millis(raw: &str, key: &str) -> Option<DateTime<Utc>> {
    let millis: i64 = match raw.trim().parse() {
        Ok(millis) => millis,
        Err(e) => {
            log::warn!("unparsable birth timestamp {:?} in {}: {}", raw, key, e);
            return None;
        }
    };
    Utc.timestamp_millis_opt(millis).single()
}

//! Core data model: entity keys, aggregate user records, field-wise merge,
//! and age derivation.

use {
    chrono::{DateTime, Datelike, Utc},
    serde::{Deserialize, Serialize},
    std::collections::HashMap,
};

/// Extension of demographic (tabular) objects, matched case-insensitively.
pub const CSV_EXTENSION: &str = ".csv";
/// Extension of picture objects, matched case-insensitively.
pub const IMAGE_EXTENSION: &str = ".png";

/// A storage object's name split into the parts the pipeline cares about.
///
/// All objects describing one logical user share a `stem` (the entity key);
/// the extension selects which parser handles the object. Any raw name is
/// valid, including one without an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectName {
    /// Full object key as stored in the bucket.
    pub key: String,
    /// Entity key: the object key with its extension removed.
    pub stem: String,
    /// Extension including the leading dot, empty when the key has none.
    pub extension: String,
}

impl ObjectName {
    pub fn new(key: &str) -> Self {
        let basename_start = key.rfind('/').map(|i| i + 1).unwrap_or(0);
        let extension = match key[basename_start..].rfind('.') {
            Some(dot) => key[basename_start + dot..].to_string(),
            None => String::new(),
        };
        let stem = key[..key.len() - extension.len()].to_string();
        Self {
            key: key.to_string(),
            stem,
            extension,
        }
    }

    pub fn is_image(&self) -> bool {
        self.extension.eq_ignore_ascii_case(IMAGE_EXTENSION)
    }

    pub fn is_tabular(&self) -> bool {
        self.extension.eq_ignore_ascii_case(CSV_EXTENSION)
    }
}

/// Canonical user record aggregated from all objects sharing one entity key.
///
/// Every field is independently optional: string fields use the empty string
/// for "absent", the birth instant uses `None`. An all-empty record is a
/// valid placeholder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub birthday: Option<DateTime<Utc>>,
    pub picture_path: String,
}

/// The published aggregate: entity key to merged user record.
pub type Users = HashMap<String, UserRecord>;

impl UserRecord {
    pub fn has_picture(&self) -> bool {
        !self.picture_path.is_empty()
    }

    /// Whole calendar years between the birth instant and `now`, minus one
    /// when the birthday has not come up yet this year.
    ///
    /// Records without a birth instant are aged from the Unix epoch, so they
    /// surface in filters and statistics at roughly (current year - 1970).
    /// A birth instant in the future yields a negative age instead of
    /// clamping to zero. Both behaviors are questionable but intentional;
    /// downstream consumers rely on them today.
    pub fn age_at(&self, now: DateTime<Utc>) -> i64 {
        let birthday = self.birthday.unwrap_or(DateTime::UNIX_EPOCH);
        let mut years = i64::from(now.year() - birthday.year());
        if now.ordinal() < birthday.ordinal() {
            years -= 1;
        }
        years
    }

    pub fn age(&self) -> i64 {
        self.age_at(Utc::now())
    }
}

/// Field-wise merge of two partial records for the same entity key: each
/// field takes the primary's value when non-empty, otherwise the secondary's.
///
/// A single absent operand returns the other unchanged; two absent operands
/// return an all-empty record, never a missing result.
///
/// The two call sites deliberately pass arguments in opposite orders:
///
/// * initial build folds `merge(accumulated, parsed)`, so the first listed
///   object to supply a field keeps it and later objects only fill gaps;
/// * live sync folds `merge(incoming, staged)`, so the most recent event
///   overrides any pending value per field.
///
/// Collapsing these into one "newest wins" rule would silently change the
/// build semantics; keep both orders.
pub fn merge(primary: Option<&UserRecord>, secondary: Option<&UserRecord>) -> UserRecord {
    match (primary, secondary) {
        (None, None) => UserRecord::default(),
        (Some(a), None) => a.clone(),
        (None, Some(b)) => b.clone(),
        (Some(a), Some(b)) => UserRecord {
            id: first_non_empty(&a.id, &b.id),
            first_name: first_non_empty(&a.first_name, &b.first_name),
            last_name: first_non_empty(&a.last_name, &b.last_name),
            birthday: a.birthday.or(b.birthday),
            picture_path: first_non_empty(&a.picture_path, &b.picture_path),
        },
    }
}

fn first_non_empty(primary: &str, secondary: &str) -> String {
    if !primary.is_empty() {
        primary.to_string()
    } else {
        secondary.to_string()
    }
}

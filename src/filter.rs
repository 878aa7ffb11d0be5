//! Read-side predicate evaluation and summary statistics over the published
//! aggregate.

use {
    crate::model::{UserRecord, Users},
    chrono::{DateTime, Utc},
    serde::Serialize,
    std::collections::HashMap,
};

pub const MIN_AGE_PARAM: &str = "min_age";
pub const MAX_AGE_PARAM: &str = "max_age";
pub const HAS_PICTURE_PARAM: &str = "is_image_exists";

/// Malformed filter parameter. The whole query fails; no partial filtering
/// is ever applied.
#[derive(Debug)]
pub enum FilterError {
    InvalidAge { param: &'static str, value: String },
    InvalidFlag { param: &'static str, value: String },
}

impl std::fmt::Display for FilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterError::InvalidAge { param, value } => {
                write!(f, "{} must be an integer, got {:?}", param, value)
            }
            FilterError::InvalidFlag { param, value } => {
                write!(f, "{} must be a boolean, got {:?}", param, value)
            }
        }
    }
}

impl std::error::Error for FilterError {}

/// Predicate set over the aggregate. Every predicate is optional; all
/// present predicates are ANDed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserFilter {
    min_age: Option<i64>,
    max_age: Option<i64>,
    has_picture: Option<bool>,
}

impl UserFilter {
    /// Build a filter from raw query parameters. Unrecognized keys are
    /// ignored; recognized keys with malformed values reject the query.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, FilterError> {
        let mut filter = Self::default();
        if let Some(value) = params.get(MIN_AGE_PARAM) {
            filter.min_age = Some(parse_age(MIN_AGE_PARAM, value)?);
        }
        if let Some(value) = params.get(MAX_AGE_PARAM) {
            filter.max_age = Some(parse_age(MAX_AGE_PARAM, value)?);
        }
        if let Some(value) = params.get(HAS_PICTURE_PARAM) {
            filter.has_picture = Some(parse_flag(HAS_PICTURE_PARAM, value)?);
        }
        Ok(filter)
    }

    /// Keep the records matching every present predicate.
    pub fn apply(&self, users: &Users) -> Users {
        let now = Utc::now();
        users
            .iter()
            .filter(|(_, user)| self.matches_at(user, now))
            .map(|(key, user)| (key.clone(), user.clone()))
            .collect()
    }

    fn matches_at(&self, user: &UserRecord, now: DateTime<Utc>) -> bool {
        let age = user.age_at(now);
        if let Some(min) = self.min_age {
            if age < min {
                return false;
            }
        }
        if let Some(max) = self.max_age {
            if age > max {
                return false;
            }
        }
        if let Some(wanted) = self.has_picture {
            if user.has_picture() != wanted {
                return false;
            }
        }
        true
    }
}

fn parse_age(param: &'static str, value: &str) -> Result<i64, FilterError> {
    value.trim().parse().map_err(|_| FilterError::InvalidAge {
        param,
        value: value.to_string(),
    })
}

fn parse_flag(param: &'static str, value: &str) -> Result<bool, FilterError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" => Ok(true),
        "false" | "f" | "0" => Ok(false),
        _ => Err(FilterError::InvalidFlag {
            param,
            value: value.to_string(),
        }),
    }
}

/// Mean-age summary; `age` is `None` when the set was empty (the explicit
/// "no data" answer, never a division by zero).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AverageAge {
    pub age: Option<f64>,
}

/// Arithmetic mean of derived ages over a (usually pre-filtered) set.
pub fn average_age(users: &Users) -> AverageAge {
    mean_age_at(users, Utc::now())
}

fn mean_age_at(users: &Users, now: DateTime<Utc>) -> AverageAge {
    if users.is_empty() {
        return AverageAge { age: None };
    }
    let total: i64 = users.values().map(|user| user.age_at(now)).sum();
    AverageAge {
        age: Some(total as f64 / users.len() as f64),
    }
}

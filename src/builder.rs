//! Initial full aggregation over a bucket listing.

use {
    crate::model::{merge, Users},
    crate::parser::parse_object,
    crate::store::{ObjectStore, StoreError},
};

/// Build the published aggregate from a full object listing.
///
/// Objects are folded in listing order with the accumulated record taking
/// precedence, so the first listed object to supply a field keeps it and
/// later objects only fill gaps. The upstream store does not guarantee a
/// stable listing order; when two objects for one key conflict on the same
/// field, cross-run results can differ. That non-determinism is inherited
/// from the store, not resolved here.
///
/// A listing failure aborts the build. Failures parsing an individual
/// object only drop that object's contribution.
pub async fn build_users(store: &dyn ObjectStore, bucket: &str) -> Result<Users, StoreError> {
    let objects = store.list_objects(bucket).await?;
    log::info!("aggregating {} objects from bucket {}", objects.len(), bucket);

    let mut users = Users::new();
    for object in &objects {
        let parsed = parse_object(store, bucket, object).await;
        let merged = merge(users.get(&object.stem), parsed.as_ref());
        users.insert(object.stem.clone(), merged);
    }

    log::info!("initial aggregate holds {} users", users.len());
    Ok(users)
}

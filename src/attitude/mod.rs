pub mod directory;
pub mod error;
pub mod manage;
pub mod reconcile;
pub mod repair;
pub mod startup;
pub mod store;
pub mod types;
pub mod validate;

use error::AttitudeError;
use store::KvStore;
use types::AttitudeRecord;

/// Decode a stored payload into its full record shape.
pub fn decode<R: AttitudeRecord>(key: &str, raw: &str) -> Result<R, AttitudeError> {
    serde_json::from_str(raw).map_err(|source| AttitudeError::Corrupt {
        kind: R::KIND,
        key: key.to_string(),
        source,
    })
}

/// Encode a record as the stored JSON value.
pub fn encode<R: AttitudeRecord>(record: &R) -> Result<String, AttitudeError> {
    serde_json::to_string(record).map_err(|source| AttitudeError::Encode {
        kind: R::KIND,
        key: record.key().to_string(),
        source,
    })
}

/// Read and decode one record. `Ok(None)` when the key is absent.
pub async fn load<R: AttitudeRecord>(
    store: &dyn KvStore,
    key: &str,
) -> Result<Option<R>, AttitudeError> {
    match store.get(key, R::PARTITION).await? {
        Some(raw) => decode(key, &raw).map(Some),
        None => Ok(None),
    }
}

/// Encode and write one record under its own key.
pub async fn save<R: AttitudeRecord>(store: &dyn KvStore, record: &R) -> Result<(), AttitudeError> {
    let value = encode(record)?;
    store.set(record.key(), R::PARTITION, &value).await?;
    Ok(())
}

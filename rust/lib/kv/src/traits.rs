use serde::de::DeserializeOwned;

use crate::error::KVError;

/// KVStore provides a byte-oriented key-value storage interface.
///
/// Keys are slash-namespaced: `payment/orders/order_Nq2x`, `payment/by-submission/<id>`.
pub trait KVStore: Send + Sync {
    /// Get the value for a key. Returns None if the key does not exist.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError>;

    /// Set several pairs in one transaction, overwriting previous values.
    fn batch_set(&self, entries: &[(&str, &[u8])]) -> Result<(), KVError>;
}

/// JSON convenience layer over any [`KVStore`].
pub trait KVStoreExt {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, KVError>;
}

impl<S: KVStore + ?Sized> KVStoreExt for S {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, KVError> {
        match self.get(key)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| KVError::Serialization(format!("{key}: {e}"))),
            None => Ok(None),
        }
    }
}

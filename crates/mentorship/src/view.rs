//! Helpers shared by the views

use crate::error::{MentorshipError, Result};
use livesync::{
    Direction, Entity, Fields, Mutated, OrderBy, RemoteCollectionSync, RemoteStore, CREATED_AT,
};
use serde_json::Value;

/// Typed rows of a sync instance's collection, empty before activation.
pub(crate) fn rows<S, E>(sync: &RemoteCollectionSync<S>) -> Result<Vec<E>>
where
    S: RemoteStore + 'static,
    E: Entity,
{
    match sync.collection() {
        Some(handle) => Ok(handle.typed()?),
        None => Ok(Vec::new()),
    }
}

/// Most recently created first. Updates leave a row's place unchanged.
pub(crate) fn newest_created() -> OrderBy {
    OrderBy::field(CREATED_AT, Direction::Desc)
}

/// Build a column map from name/value pairs.
pub(crate) fn columns<const N: usize>(pairs: [(&str, Value); N]) -> Fields {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// Decode the row returned by an insert or update.
pub(crate) fn written<E: Entity>(mutated: Mutated) -> Result<E> {
    match mutated.record() {
        Some(record) => Ok(E::from_record(record)?),
        None => Err(MentorshipError::InvalidInput(format!(
            "write to {} returned no row",
            E::TABLE
        ))),
    }
}

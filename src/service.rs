//! Reads shared by the goal, ledger and task services.

use crate::context::AppContext;
use crate::error::{Error, ErrorType, Result};
use crate::model::Record;
use crate::store::{DocPath, Operation, Query};
use tracing::warn;

/// The query for every record of type `T` owned by the signed-in user.
pub(crate) fn owned<T: Record>(ctx: &AppContext) -> Query {
    Query::collection(T::COLLECTION).owned_by(ctx.user_id())
}

/// The path of record `id` of type `T`. Ids are single path segments.
pub(crate) fn path_of<T: Record>(id: &str) -> Result<DocPath> {
    let id = id.trim();
    if id.is_empty() || id.contains('/') {
        return Err(Error::validation(format!("'{id}' is not a valid id")));
    }
    Ok(DocPath::new(T::COLLECTION, id))
}

pub(crate) fn not_found(path: &DocPath) -> Error {
    Error::msg(ErrorType::NotFound, format!("'{path}' does not exist"))
        .with_context(path.to_string(), Operation::Get)
}

/// Reads one record and the version it was read at. A record owned by someone else is reported
/// as missing.
pub(crate) async fn load_owned<T: Record>(ctx: &AppContext, id: &str) -> Result<(T, u64)> {
    let path = path_of::<T>(id)?;
    let doc = ctx
        .store()
        .get(&path)
        .await
        .map_err(|e| ctx.report(e))?
        .ok_or_else(|| not_found(&path))?;
    let record = T::from_document(&doc).map_err(|e| {
        Error::new(ErrorType::Database, e).with_context(path.to_string(), Operation::Get)
    })?;
    if record.owner_id() != ctx.user_id() {
        return Err(not_found(&path));
    }
    Ok((record, doc.version()))
}

/// Runs `query` once. Documents that fail their schema check are skipped with a warning, the
/// same way a subscription drops them.
pub(crate) async fn list<T: Record>(ctx: &AppContext, query: &Query) -> Result<Vec<T>> {
    let docs = ctx.store().query(query).await.map_err(|e| ctx.report(e))?;
    Ok(docs
        .iter()
        .filter_map(|doc| match T::from_document(doc) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping document: {e}");
                None
            }
        })
        .collect())
}

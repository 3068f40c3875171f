//! Per-handle database binding.
//!
//! Every request names a target database; before a statement runs, the
//! borrowed handle must be switched to it. Binding is idempotent: a handle
//! already bound to the target is left alone, so consecutive requests for
//! the same database on the same handle pay for one switch, not N.

use tracing::debug;

use crate::db::pool::Handle;
use crate::db::session::SqlSession;
use crate::error::{GatewayError, GatewayResult};

/// Bind `handle` to `database`, switching the session if needed.
///
/// The existence check runs before the switch so an unknown database comes
/// back as `DatabaseNotFound` instead of a server error. The check is
/// advisory: if the database is dropped between check and switch, the switch
/// itself fails and is surfaced as a `Connection` error. In every failure
/// case the handle's recorded binding is left unchanged.
pub async fn bind<S: SqlSession>(handle: &mut Handle<S>, database: &str) -> GatewayResult<()> {
    if handle.bound_database() == Some(database) {
        return Ok(());
    }

    if !handle.session().database_exists(database).await? {
        return Err(GatewayError::database_not_found(database));
    }

    handle
        .session()
        .switch_database(database)
        .await
        .map_err(|e| match e {
            // The database passed the existence check moments ago; a failing
            // switch means the session or server is in trouble, not the request
            GatewayError::Statement { message, .. } => GatewayError::connection(format!(
                "Failed to switch to database '{}': {}",
                database, message
            )),
            other => other,
        })?;

    handle.set_bound_database(database);
    debug!(database = %database, "Handle bound to database");
    Ok(())
}

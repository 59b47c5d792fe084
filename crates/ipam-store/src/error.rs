//! Mapping of database failures onto IPAM errors

use ipam_core::IpamError;

// SQLSTATE codes
const LOCK_NOT_AVAILABLE: &str = "55P03";
const QUERY_CANCELED: &str = "57014";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Convert a sqlx error, naming the operation that failed.
pub(crate) fn store_error(operation: &str, err: sqlx::Error) -> IpamError {
    match &err {
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some(LOCK_NOT_AVAILABLE) | Some(QUERY_CANCELED) => {
                IpamError::Repository(format!("{operation}: lock timeout: {db}"))
            }
            Some(FOREIGN_KEY_VIOLATION) => {
                IpamError::InUse(format!("{operation}: {}", db.message()))
            }
            _ => IpamError::Repository(format!("{operation}: {err}")),
        },
        sqlx::Error::PoolTimedOut => {
            IpamError::Repository(format!("{operation}: no database connection available"))
        }
        _ => IpamError::Repository(format!("{operation}: {err}")),
    }
}

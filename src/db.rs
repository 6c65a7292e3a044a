pub mod awards;
pub mod cleanups;
pub mod events;
pub mod hazards;
pub mod leaderboard;
pub mod plants;
pub mod profiles;
pub mod schema;

use itertools::Itertools;
use rusqlite::Connection;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

use std::path::Path;

use crate::models::{EventType, HazardSeverity, HazardStatus, HazardType};

pub type DBResult<T> = Result<T, rusqlite::Error>;

/// Opens the store at `path` with foreign keys enforced.
pub fn connect(path: impl AsRef<Path>) -> DBResult<Connection> {
    let connection = Connection::open(path)?;
    connection.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(connection)
}

pub fn connect_in_memory() -> DBResult<Connection> {
    let connection = Connection::open_in_memory()?;
    connection.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(connection)
}

/// Creates every table and view that doesn't exist yet.
pub fn initialize_db(connection: &Connection) -> DBResult<()> {
    for (name, ddl) in schema::ALL {
        log::debug!("[initialize_db] creating {name}...");
        connection.execute(ddl, [])?;
    }

    Ok(())
}

/// Turns a UNIQUE/PRIMARY KEY violation into `Ok(false)` ("nothing new was inserted"), so that
/// inserting into a set twice is not an error. Any other error is passed through.
pub fn swallow_constraint_violation(err: rusqlite::Error) -> DBResult<bool> {
    match err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            log::trace!("[swallow_constraint_violation] Row already present.");
            Ok(false)
        }
        err => Err(err),
    }
}

/// Collapses the rows of a `parent LEFT JOIN child` query back into parents.
///
/// Rows belonging to one parent must be adjacent, which every caller guarantees by ordering
/// on the parent's id before the child's. Parents keep the order in which they first appear.
pub(crate) fn fold_children<P, C>(
    rows: Vec<(P, Option<C>)>,
    key: impl Fn(&P) -> i64,
    mut attach: impl FnMut(&mut P, C),
) -> Vec<P> {
    let chunks = rows.into_iter().chunk_by(|(parent, _)| key(parent));
    let parents: Vec<P> = chunks
        .into_iter()
        .filter_map(|(_, mut group)| {
            let (mut parent, first) = group.next()?;
            first
                .into_iter()
                .chain(group.filter_map(|(_, child)| child))
                .for_each(|child| attach(&mut parent, child));
            Some(parent)
        })
        .collect();

    parents
}

/// Stores the enum as its text form.
macro_rules! sql_text {
    ($($name:ty),+ $(,)?) => {$(
        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|err| FromSqlError::Other(Box::new(err)))
            }
        }
    )+};
}

sql_text!(HazardType, HazardSeverity, HazardStatus, EventType);

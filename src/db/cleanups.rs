use rusqlite::Connection;

use crate::{
    db::{self, DBResult, awards},
    models,
    points::{self, Activity},
};

/////*============== CLEANUP QUERIES ==============*/
impl<'a> TryFrom<&'a rusqlite::Row<'a>> for models::CleanupLog {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            user_name: row.get("user_name")?,
            date: row.get("date")?,
            location: row.get("location")?,
            duration_minutes: row.get("duration")?,
            trash_bags: row.get("trash_bags")?,
            points: row.get("points")?,
            notes: row.get("notes")?,
            before_photo: row.get("before_photo_url")?,
            after_photo: row.get("after_photo_url")?,
            photos: Vec::new(),
        })
    }
}

/// Cleanups newest first, with the poster's name and photos. One row per photo.
const SELECT_CLEANUPS: &str =
    "SELECT c.*, p.name AS user_name, ph.photo_url
     FROM cleanup_logs c
     LEFT JOIN profiles p        ON p.id = c.user_id
     LEFT JOIN cleanup_photos ph ON ph.cleanup_log_id = c.id
     WHERE (:id IS NULL OR c.id = :id)
     ORDER BY c.date DESC, c.id DESC, ph.id ASC";

fn select_cleanups(connection: &Connection, id: Option<i64>) -> DBResult<Vec<models::CleanupLog>> {
    let rows = connection
        .prepare(SELECT_CLEANUPS)?
        .query_map(rusqlite::named_params! { ":id": id }, |row| {
            Ok((models::CleanupLog::try_from(row)?, row.get::<_, Option<String>>("photo_url")?))
        })?
        .collect::<DBResult<Vec<_>>>()
        .inspect_err(|err| log::error!("[select_cleanups] Could not convert row into cleanup: {err}"))?;

    Ok(db::fold_children(rows, |log| log.id, |log, photo| log.photos.push(photo)))
}

/// Gathers every cleanup log, newest first.
pub fn query_cleanups(connection: &Connection) -> DBResult<Vec<models::CleanupLog>> {
    log::trace!("[query_cleanups] Querying all cleanup logs.");
    select_cleanups(connection, None)
}

pub fn query_cleanup(connection: &Connection, id: i64) -> DBResult<Option<models::CleanupLog>> {
    log::trace!("[query_cleanup] Querying cleanup log {id}.");
    Ok(select_cleanups(connection, Some(id))?.into_iter().next())
}

/// Logs a cleanup for `user_id` together with its photos and awards its points, all or nothing.
///
/// The stored points are fixed here to 50 per bag. Returns the new log's id.
pub fn insert_cleanup(
    connection: &Connection,
    user_id: i64,
    cleanup: &models::NewCleanup,
) -> DBResult<i64> {
    log::trace!("[insert_cleanup] Inserting cleanup at {} for user {user_id}...", cleanup.location);
    let transaction = connection.unchecked_transaction()?;

    let query_params = rusqlite::named_params! {
            ":user_id":          user_id,
            ":date":             cleanup.date,
            ":location":         cleanup.location,
            ":duration":         cleanup.duration_minutes,
            ":trash_bags":       cleanup.trash_bags,
            ":points":           points::cleanup_points(cleanup.trash_bags),
            ":notes":            cleanup.notes,
            ":before_photo_url": cleanup.before_photo,
            ":after_photo_url":  cleanup.after_photo,
    };

    transaction
        .prepare(
            "INSERT INTO cleanup_logs
                ( user_id,  date,  location,  duration,  trash_bags,  points,  notes,
                  before_photo_url,  after_photo_url)
             VALUES
                (:user_id, :date, :location, :duration, :trash_bags, :points, :notes,
                 :before_photo_url, :after_photo_url)",
        )?
        .execute(query_params)?;
    let id = transaction.last_insert_rowid();

    {
        let mut stmt = transaction.prepare(
            "INSERT INTO cleanup_photos (cleanup_log_id, photo_url) VALUES (:id, :photo_url)",
        )?;
        for photo in &cleanup.photos {
            stmt.execute(rusqlite::named_params! { ":id": id, ":photo_url": photo })?;
        }
    }

    awards::award_points(&transaction, user_id, Activity::Cleanup { trash_bags: cleanup.trash_bags }, id)?;
    transaction.commit()?;

    log::info!("Cleanup {id} logged for user {user_id} ({} bags).", cleanup.trash_bags);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{connect_in_memory, initialize_db, profiles};
    use chrono::{Duration, Utc};

    fn new_cleanup(location: &str, trash_bags: u32, photos: &[&str]) -> models::NewCleanup {
        models::NewCleanup {
            date: Utc::now(),
            location: location.to_string(),
            duration_minutes: 30,
            trash_bags,
            notes: None,
            before_photo: None,
            after_photo: None,
            photos: photos.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn cleanup_is_stored_with_photos_in_order() {
        let connection = connect_in_memory().unwrap();
        initialize_db(&connection).unwrap();
        let user = profiles::insert_profile(&connection, "Ada", "ada@example.com").unwrap();

        let id = insert_cleanup(&connection, user, &new_cleanup("Elm St", 3, &["a.jpg", "b.jpg"])).unwrap();
        let log = query_cleanup(&connection, id).unwrap().unwrap();

        assert_eq!(log.points, 150);
        assert_eq!(log.user_name.as_deref(), Some("Ada"));
        assert_eq!(log.photos, vec!["a.jpg", "b.jpg"]);
        assert_eq!(awards::query_total_points(&connection, user).unwrap(), 150);
    }

    #[test]
    fn cleanups_are_newest_first() {
        let connection = connect_in_memory().unwrap();
        initialize_db(&connection).unwrap();
        let user = profiles::insert_profile(&connection, "Ada", "ada@example.com").unwrap();

        let mut older = new_cleanup("Old Rd", 1, &[]);
        older.date = Utc::now() - Duration::days(2);
        insert_cleanup(&connection, user, &older).unwrap();
        insert_cleanup(&connection, user, &new_cleanup("New Rd", 1, &["x.jpg"])).unwrap();

        let locations = query_cleanups(&connection)
            .unwrap()
            .into_iter()
            .map(|log| log.location)
            .collect::<Vec<_>>();
        assert_eq!(locations, vec!["New Rd", "Old Rd"]);
    }

    #[test]
    fn failed_insert_leaves_nothing_behind() {
        let connection = connect_in_memory().unwrap();
        initialize_db(&connection).unwrap();

        // No such profile: the foreign key rejects the log.
        assert!(insert_cleanup(&connection, 42, &new_cleanup("Elm St", 2, &["a.jpg"])).is_err());
        assert!(query_cleanups(&connection).unwrap().is_empty());
    }

    fn count_rows(connection: &Connection, table: &str) -> i64 {
        connection
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn failed_photo_rolls_back_the_log() {
        let connection = connect_in_memory().unwrap();
        initialize_db(&connection).unwrap();
        let user = profiles::insert_profile(&connection, "Ada", "ada@example.com").unwrap();
        connection
            .execute_batch(
                "CREATE TRIGGER reject_broken_photo BEFORE INSERT ON cleanup_photos
                 WHEN NEW.photo_url = 'broken.jpg'
                 BEGIN SELECT RAISE(ABORT, 'broken photo'); END;",
            )
            .unwrap();

        let result = insert_cleanup(&connection, user, &new_cleanup("Elm St", 2, &["a.jpg", "broken.jpg"]));

        assert!(result.is_err());
        assert_eq!(count_rows(&connection, "cleanup_logs"), 0);
        assert_eq!(count_rows(&connection, "cleanup_photos"), 0);
        assert_eq!(awards::query_total_points(&connection, user).unwrap(), 0);
    }

    #[test]
    fn failed_award_rolls_back_log_and_photos() {
        let connection = connect_in_memory().unwrap();
        initialize_db(&connection).unwrap();
        let user = profiles::insert_profile(&connection, "Ada", "ada@example.com").unwrap();
        connection
            .execute_batch(
                "CREATE TRIGGER close_ledger BEFORE INSERT ON point_awards
                 BEGIN SELECT RAISE(ABORT, 'ledger closed'); END;",
            )
            .unwrap();

        assert!(insert_cleanup(&connection, user, &new_cleanup("Elm St", 2, &["a.jpg"])).is_err());

        assert_eq!(count_rows(&connection, "cleanup_logs"), 0);
        assert_eq!(count_rows(&connection, "cleanup_photos"), 0);
        assert_eq!(count_rows(&connection, "point_awards"), 0);
        assert_eq!(awards::query_total_points(&connection, user).unwrap(), 0);
    }
}

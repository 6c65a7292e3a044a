use chrono::Utc;
use rusqlite::Connection;

use crate::{
    db::{self, DBResult, awards},
    models::{self, HazardStatus},
    points::Activity,
};

/////*============== HAZARD QUERIES ==============*/
impl<'a> TryFrom<&'a rusqlite::Row<'a>> for models::HazardReport {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            user_name: row.get("user_name")?,
            kind: row.get("type")?,
            severity: row.get("severity")?,
            status: row.get("status")?,
            location: row.get("location")?,
            description: row.get("description")?,
            reported_date: row.get("reported_date")?,
            photos: Vec::new(),
        })
    }
}

const SELECT_HAZARDS: &str =
    "SELECT h.*, p.name AS user_name, ph.photo_url
     FROM hazard_reports h
     LEFT JOIN profiles p       ON p.id = h.user_id
     LEFT JOIN hazard_photos ph ON ph.hazard_report_id = h.id
     WHERE (:id IS NULL OR h.id = :id)
     ORDER BY h.reported_date DESC, h.id DESC, ph.id ASC";

fn select_hazards(connection: &Connection, id: Option<i64>) -> DBResult<Vec<models::HazardReport>> {
    let rows = connection
        .prepare(SELECT_HAZARDS)?
        .query_map(rusqlite::named_params! { ":id": id }, |row| {
            Ok((models::HazardReport::try_from(row)?, row.get::<_, Option<String>>("photo_url")?))
        })?
        .collect::<DBResult<Vec<_>>>()
        .inspect_err(|err| log::error!("[select_hazards] Could not convert row into hazard: {err}"))?;

    Ok(db::fold_children(rows, |hazard| hazard.id, |hazard, photo| hazard.photos.push(photo)))
}

/// Gathers every hazard report, most recently reported first.
pub fn query_hazards(connection: &Connection) -> DBResult<Vec<models::HazardReport>> {
    log::trace!("[query_hazards] Querying all hazard reports.");
    select_hazards(connection, None)
}

pub fn query_hazard(connection: &Connection, id: i64) -> DBResult<Option<models::HazardReport>> {
    log::trace!("[query_hazard] Querying hazard report {id}.");
    Ok(select_hazards(connection, Some(id))?.into_iter().next())
}

/// Files a hazard report as `reported`, stores its photos and awards the reporter.
/// Returns the new report's id.
pub fn insert_hazard(
    connection: &Connection,
    user_id: i64,
    hazard: &models::NewHazard,
) -> DBResult<i64> {
    log::trace!("[insert_hazard] Inserting {} hazard at {}...", hazard.kind, hazard.location);
    let transaction = connection.unchecked_transaction()?;

    let query_params = rusqlite::named_params! {
            ":user_id":       user_id,
            ":type":          hazard.kind,
            ":severity":      hazard.severity,
            ":status":        HazardStatus::Reported,
            ":location":      hazard.location,
            ":description":   hazard.description,
            ":reported_date": Utc::now(),
    };

    transaction
        .prepare(
            "INSERT INTO hazard_reports
                ( user_id,  type,  severity,  status,  location,  description,  reported_date)
             VALUES
                (:user_id, :type, :severity, :status, :location, :description, :reported_date)",
        )?
        .execute(query_params)?;
    let id = transaction.last_insert_rowid();

    {
        let mut stmt = transaction.prepare(
            "INSERT INTO hazard_photos (hazard_report_id, photo_url) VALUES (:id, :photo_url)",
        )?;
        for photo in &hazard.photos {
            stmt.execute(rusqlite::named_params! { ":id": id, ":photo_url": photo })?;
        }
    }

    awards::award_points(&transaction, user_id, Activity::HazardReport, id)?;
    transaction.commit()?;

    log::info!("Hazard {id} reported by user {user_id}.");
    Ok(id)
}

/// Moves a report to `status`. Returns whether the report exists.
pub fn update_hazard_status(connection: &Connection, id: i64, status: HazardStatus) -> DBResult<bool> {
    log::trace!("[update_hazard_status] Setting hazard {id} to {status}");

    let changed = connection
        .prepare("UPDATE hazard_reports SET status = :status WHERE id = :id")?
        .execute(rusqlite::named_params! { ":status": status, ":id": id })
        .inspect_err(|err| log::error!("[update_hazard_status] Could not update hazard {id}: {err}"))?;

    Ok(changed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{connect_in_memory, initialize_db, profiles};
    use crate::models::{HazardSeverity, HazardType};

    #[test]
    fn reports_start_reported_and_can_advance() {
        let connection = connect_in_memory().unwrap();
        initialize_db(&connection).unwrap();
        let user = profiles::insert_profile(&connection, "Ada", "ada@example.com").unwrap();

        let hazard = models::NewHazard {
            kind: HazardType::LargeTrash,
            severity: HazardSeverity::High,
            location: String::from("5th & Main"),
            description: String::from("Abandoned couch"),
            photos: vec![String::from("couch.jpg")],
        };
        let id = insert_hazard(&connection, user, &hazard).unwrap();

        let stored = query_hazard(&connection, id).unwrap().unwrap();
        assert_eq!(stored.status, HazardStatus::Reported);
        assert_eq!(stored.kind, HazardType::LargeTrash);
        assert_eq!(stored.photos, vec!["couch.jpg"]);
        assert_eq!(awards::query_total_points(&connection, user).unwrap(), 25);

        assert!(update_hazard_status(&connection, id, HazardStatus::Resolved).unwrap());
        assert_eq!(query_hazard(&connection, id).unwrap().unwrap().status, HazardStatus::Resolved);
        assert!(!update_hazard_status(&connection, id + 1, HazardStatus::Resolved).unwrap());
    }
}

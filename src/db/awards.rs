use chrono::Utc;
use rusqlite::Connection;

use crate::{db::{self, DBResult}, points::Activity};

/// Awards `user_id` the points for `activity`, earned through the record `source_id`.
///
/// Each (user, activity, record) is awarded at most once. Returns `true` if points were
/// granted, `false` if this award had already been made.
pub fn award_points(
    connection: &Connection,
    user_id: i64,
    activity: Activity,
    source_id: i64,
) -> DBResult<bool> {
    let points = activity.points();
    log::trace!(
        "[award_points] Awarding {points} to user {user_id} for {} #{source_id}",
        activity.ledger_name()
    );

    let query_params = rusqlite::named_params! {
            ":user_id":    user_id,
            ":activity":   activity.ledger_name(),
            ":source_id":  source_id,
            ":points":     points,
            ":awarded_at": Utc::now(),
    };

    let newly_awarded = connection
        .prepare(
            "INSERT INTO point_awards ( user_id,  activity,  source_id,  points,  awarded_at)
             VALUES                   (:user_id, :activity, :source_id, :points, :awarded_at)",
        )?
        .execute(query_params)
        .map_or_else(db::swallow_constraint_violation, |_| Ok(true))?;

    if !newly_awarded {
        log::debug!(
            "[award_points] User {user_id} was already awarded for {} #{source_id}",
            activity.ledger_name()
        );
        return Ok(false);
    }

    connection
        .prepare("UPDATE profiles SET total_points = total_points + :points WHERE id = :user_id")?
        .execute(rusqlite::named_params! { ":points": points, ":user_id": user_id })?;

    log::info!("[award_points] User {user_id} earned {points} points ({})", activity.ledger_name());
    Ok(true)
}

/// Queries the total points for `user_id`.
pub fn query_total_points(connection: &Connection, user_id: i64) -> DBResult<u64> {
    log::trace!("[query_total_points] Querying points for user {user_id}");

    connection
        .prepare("SELECT total_points FROM profiles WHERE id = :user_id")?
        .query_row(rusqlite::named_params! { ":user_id": user_id }, |row| row.get("total_points"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{connect_in_memory, initialize_db, profiles};

    #[test]
    fn each_award_is_granted_once() {
        let connection = connect_in_memory().unwrap();
        initialize_db(&connection).unwrap();
        let user = profiles::insert_profile(&connection, "Ada", "ada@example.com").unwrap();

        assert!(award_points(&connection, user, Activity::EventAttendance, 9).unwrap());
        assert!(!award_points(&connection, user, Activity::EventAttendance, 9).unwrap());
        assert_eq!(query_total_points(&connection, user).unwrap(), 100);

        assert!(award_points(&connection, user, Activity::EventOrganization, 9).unwrap());
        assert!(award_points(&connection, user, Activity::Cleanup { trash_bags: 2 }, 1).unwrap());
        assert_eq!(query_total_points(&connection, user).unwrap(), 400);
    }
}

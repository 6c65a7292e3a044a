use rusqlite::Connection;

use crate::{
    db::{self, DBResult, awards},
    models,
    points::Activity,
};

/////*============== EVENT QUERIES ==============*/
impl<'a> TryFrom<&'a rusqlite::Row<'a>> for models::CommunityEvent {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            organizer_id: row.get("organizer_id")?,
            organizer_name: row.get("organizer_name")?,
            title: row.get("title")?,
            description: row.get("description")?,
            kind: row.get("type")?,
            location: row.get("location")?,
            date: row.get("date")?,
            start_time: row.get("start_time")?,
            end_time: row.get("end_time")?,
            max_attendees: row.get("max_attendees")?,
            attendees: Vec::new(),
            viewer_is_attending: row.get("viewer_is_attending")?,
        })
    }
}

/// Events soonest first, one row per attendee in the order they joined.
const SELECT_EVENTS: &str =
    "SELECT e.*, p.name AS organizer_name, a.user_id AS attendee_id,
            EXISTS (
              SELECT 1
              FROM event_attendees v
              WHERE v.event_id = e.id
                AND v.user_id = :viewer
            ) AS viewer_is_attending
     FROM community_events e
     LEFT JOIN profiles p        ON p.id = e.organizer_id
     LEFT JOIN event_attendees a ON a.event_id = e.id
     WHERE (:id IS NULL OR e.id = :id)
     ORDER BY e.date ASC, e.start_time ASC, e.id ASC, a.id ASC";

fn select_events(
    connection: &Connection,
    id: Option<i64>,
    viewer: Option<i64>,
) -> DBResult<Vec<models::CommunityEvent>> {
    let rows = connection
        .prepare(SELECT_EVENTS)?
        .query_map(rusqlite::named_params! { ":id": id, ":viewer": viewer }, |row| {
            Ok((models::CommunityEvent::try_from(row)?, row.get::<_, Option<i64>>("attendee_id")?))
        })?
        .collect::<DBResult<Vec<_>>>()
        .inspect_err(|err| log::error!("[select_events] Could not convert row into event: {err}"))?;

    Ok(db::fold_children(rows, |event| event.id, |event, attendee| event.attendees.push(attendee)))
}

/// Gathers every community event, soonest first, as seen by `viewer`.
pub fn query_events(connection: &Connection, viewer: Option<i64>) -> DBResult<Vec<models::CommunityEvent>> {
    log::trace!("[query_events] Querying all community events.");
    select_events(connection, None, viewer)
}

pub fn query_event(
    connection: &Connection,
    id: i64,
    viewer: Option<i64>,
) -> DBResult<Option<models::CommunityEvent>> {
    log::trace!("[query_event] Querying community event {id}.");
    Ok(select_events(connection, Some(id), viewer)?.into_iter().next())
}

/// Creates an event organized by `organizer_id`, signs the organizer up as its first attendee
/// and awards the organization points. Returns the new event's id.
pub fn insert_event(
    connection: &Connection,
    organizer_id: i64,
    event: &models::NewEvent,
) -> DBResult<i64> {
    log::trace!("[insert_event] Inserting event {}...", event.title);
    let transaction = connection.unchecked_transaction()?;

    let query_params = rusqlite::named_params! {
            ":organizer_id":  organizer_id,
            ":title":         event.title,
            ":description":   event.description,
            ":type":          event.kind,
            ":location":      event.location,
            ":date":          event.date,
            ":start_time":    event.start_time,
            ":end_time":      event.end_time,
            ":max_attendees": event.max_attendees,
    };

    transaction
        .prepare(
            "INSERT INTO community_events
                ( organizer_id,  title,  description,  type,  location,  date,
                  start_time,  end_time,  max_attendees)
             VALUES
                (:organizer_id, :title, :description, :type, :location, :date,
                 :start_time, :end_time, :max_attendees)",
        )?
        .execute(query_params)?;
    let id = transaction.last_insert_rowid();

    insert_attendee(&transaction, id, organizer_id)?;
    awards::award_points(&transaction, organizer_id, Activity::EventOrganization, id)?;
    transaction.commit()?;

    log::info!("Event {id} created by user {organizer_id}.");
    Ok(id)
}

/// Returns whether `user_id` is attending the event.
pub fn is_attending(connection: &Connection, event_id: i64, user_id: i64) -> DBResult<bool> {
    connection
        .prepare("SELECT 1 FROM event_attendees WHERE event_id = :event_id AND user_id = :user_id")?
        .exists(rusqlite::named_params! { ":event_id": event_id, ":user_id": user_id })
}

/// Adds `user_id` to the attendees. Returns `true` if they weren't already attending.
fn insert_attendee(connection: &Connection, event_id: i64, user_id: i64) -> DBResult<bool> {
    connection
        .prepare(
            "INSERT INTO event_attendees ( event_id,  user_id)
             VALUES                      (:event_id, :user_id)",
        )?
        .execute(rusqlite::named_params! { ":event_id": event_id, ":user_id": user_id })
        .map_or_else(db::swallow_constraint_violation, |_| Ok(true))
}

/// Returns whether `user_id` organizes the event.
fn is_organizer(connection: &Connection, event_id: i64, user_id: i64) -> DBResult<bool> {
    connection
        .prepare("SELECT 1 FROM community_events WHERE id = :event_id AND organizer_id = :user_id")?
        .exists(rusqlite::named_params! { ":event_id": event_id, ":user_id": user_id })
}

/// Signs `user_id` up for the event and awards attendance the first time they join it.
/// The organizer is only ever paid for organizing. Returns `true` if they weren't already
/// attending.
pub fn join_event(connection: &Connection, event_id: i64, user_id: i64) -> DBResult<bool> {
    log::trace!("[join_event] User {user_id} joining event {event_id}");
    let transaction = connection.unchecked_transaction()?;

    let joined = insert_attendee(&transaction, event_id, user_id)?;
    if joined && !is_organizer(&transaction, event_id, user_id)? {
        awards::award_points(&transaction, user_id, Activity::EventAttendance, event_id)?;
    }
    transaction.commit()?;

    Ok(joined)
}

/// Removes `user_id` from the attendees. Points already earned are kept.
/// Returns `true` if they were attending.
pub fn leave_event(connection: &Connection, event_id: i64, user_id: i64) -> DBResult<bool> {
    log::trace!("[leave_event] User {user_id} leaving event {event_id}");

    let removed = connection
        .prepare("DELETE FROM event_attendees WHERE event_id = :event_id AND user_id = :user_id")?
        .execute(rusqlite::named_params! { ":event_id": event_id, ":user_id": user_id })?;

    Ok(removed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{connect_in_memory, initialize_db, profiles};
    use crate::models::EventType;
    use chrono::{NaiveDate, NaiveTime};

    fn new_event(title: &str, day: u32) -> models::NewEvent {
        models::NewEvent {
            title: title.to_string(),
            description: String::from("Bring gloves"),
            kind: EventType::Cleanup,
            location: String::from("Elm Park"),
            date: NaiveDate::from_ymd_opt(2026, 6, day).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(11, 30, 0).unwrap(),
            max_attendees: Some(10),
        }
    }

    #[test]
    fn organizer_attends_and_is_awarded() {
        let connection = connect_in_memory().unwrap();
        initialize_db(&connection).unwrap();
        let organizer = profiles::insert_profile(&connection, "Ada", "ada@example.com").unwrap();

        let id = insert_event(&connection, organizer, &new_event("Park sweep", 1)).unwrap();
        let event = query_event(&connection, id, Some(organizer)).unwrap().unwrap();

        assert_eq!(event.attendees, vec![organizer]);
        assert!(event.viewer_is_attending);
        assert_eq!(event.organizer_name.as_deref(), Some("Ada"));
        assert_eq!(event.start_time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(awards::query_total_points(&connection, organizer).unwrap(), 200);
    }

    #[test]
    fn rejoining_does_not_award_twice() {
        let connection = connect_in_memory().unwrap();
        initialize_db(&connection).unwrap();
        let organizer = profiles::insert_profile(&connection, "Ada", "ada@example.com").unwrap();
        let guest = profiles::insert_profile(&connection, "Bo", "bo@example.com").unwrap();
        let id = insert_event(&connection, organizer, &new_event("Park sweep", 1)).unwrap();

        assert!(join_event(&connection, id, guest).unwrap());
        assert!(!join_event(&connection, id, guest).unwrap());
        assert!(leave_event(&connection, id, guest).unwrap());
        assert!(!is_attending(&connection, id, guest).unwrap());
        assert!(join_event(&connection, id, guest).unwrap());

        assert_eq!(awards::query_total_points(&connection, guest).unwrap(), 100);
    }

    #[test]
    fn organizer_rejoining_earns_no_attendance() {
        let connection = connect_in_memory().unwrap();
        initialize_db(&connection).unwrap();
        let organizer = profiles::insert_profile(&connection, "Ada", "ada@example.com").unwrap();
        let id = insert_event(&connection, organizer, &new_event("Park sweep", 1)).unwrap();

        assert!(leave_event(&connection, id, organizer).unwrap());
        assert!(join_event(&connection, id, organizer).unwrap());

        assert!(is_attending(&connection, id, organizer).unwrap());
        assert_eq!(awards::query_total_points(&connection, organizer).unwrap(), 200);
    }

    #[test]
    fn events_are_soonest_first() {
        let connection = connect_in_memory().unwrap();
        initialize_db(&connection).unwrap();
        let organizer = profiles::insert_profile(&connection, "Ada", "ada@example.com").unwrap();
        insert_event(&connection, organizer, &new_event("Later", 20)).unwrap();
        insert_event(&connection, organizer, &new_event("Sooner", 3)).unwrap();

        let titles = query_events(&connection, None)
            .unwrap()
            .into_iter()
            .map(|event| event.title)
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["Sooner", "Later"]);
    }
}

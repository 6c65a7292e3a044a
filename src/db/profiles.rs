use chrono::Utc;
use rusqlite::Connection;

use std::collections::BTreeSet;

use crate::{db::{self, DBResult}, models};

/////*============== PROFILE QUERIES ==============*/
impl<'a> TryFrom<&'a rusqlite::Row<'a>> for models::Profile {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            avatar_url: row.get("avatar_url")?,
            bio: row.get("bio")?,
            total_points: row.get("total_points")?,
            joined_date: row.get("joined_date")?,
            adopted_streets: BTreeSet::new(),
        })
    }
}

/// Creates a profile with no points, joined now. Returns its id.
pub fn insert_profile(connection: &Connection, name: &str, email: &str) -> DBResult<i64> {
    log::trace!("[insert_profile] Inserting profile for {email}...");

    let query_params = rusqlite::named_params! {
            ":name":        name,
            ":email":       email,
            ":joined_date": Utc::now(),
    };

    connection
        .prepare(
            "INSERT INTO profiles ( name,  email,  joined_date)
             VALUES               (:name, :email, :joined_date)",
        )?
        .execute(query_params)?;

    let id = connection.last_insert_rowid();
    log::info!("Profile {id} ({name}) has been added to the database.");
    Ok(id)
}

/// Returns the profile with `id`, adopted streets included, if it exists.
pub fn query_profile(connection: &Connection, id: i64) -> DBResult<Option<models::Profile>> {
    log::trace!("[query_profile] Querying profile {id}");

    let rows = connection
        .prepare(
            "SELECT p.*, s.street_name
             FROM profiles p
             LEFT JOIN adopted_streets s ON s.user_id = p.id
             WHERE p.id = :id",
        )?
        .query_map(rusqlite::named_params! { ":id": id }, |row| {
            Ok((models::Profile::try_from(row)?, row.get::<_, Option<String>>("street_name")?))
        })?
        .collect::<DBResult<Vec<_>>>()?;

    let profile = db::fold_children(rows, |profile| profile.id, |profile, street| {
        profile.adopted_streets.insert(street);
    })
    .into_iter()
    .next();

    Ok(profile)
}

/// Applies the non-empty fields of `update`. Returns whether a profile was changed.
pub fn update_profile(
    connection: &Connection,
    id: i64,
    update: &models::ProfileUpdate,
) -> DBResult<bool> {
    let query_params = rusqlite::named_params! {
            ":id":         id,
            ":name":       update.name,
            ":bio":        update.bio,
            ":avatar_url": update.avatar_url,
    };

    let changed = connection
        .prepare(
            "UPDATE profiles SET
                name       = COALESCE(:name, name),
                bio        = COALESCE(:bio, bio),
                avatar_url = COALESCE(:avatar_url, avatar_url)
             WHERE id = :id",
        )?
        .execute(query_params)
        .inspect_err(|err| log::error!("[update_profile] Could not update profile {id}: {err}"))?;

    Ok(changed > 0)
}

/// Adds `street` to the user's adopted streets. Returns `true` if it was newly adopted.
pub fn insert_adopted_street(connection: &Connection, user_id: i64, street: &str) -> DBResult<bool> {
    log::trace!("[insert_adopted_street] User {user_id} adopting {street}");

    connection
        .prepare(
            "INSERT INTO adopted_streets ( user_id,  street_name)
             VALUES                      (:user_id, :street_name)",
        )?
        .execute(rusqlite::named_params! { ":user_id": user_id, ":street_name": street })
        .map_or_else(db::swallow_constraint_violation, |_| Ok(true))
}

/// Removes `street` from the user's adopted streets. Returns `true` if it had been adopted.
pub fn delete_adopted_street(connection: &Connection, user_id: i64, street: &str) -> DBResult<bool> {
    log::trace!("[delete_adopted_street] User {user_id} releasing {street}");

    let removed = connection
        .prepare("DELETE FROM adopted_streets WHERE user_id = :user_id AND street_name = :street_name")?
        .execute(rusqlite::named_params! { ":user_id": user_id, ":street_name": street })?;

    Ok(removed > 0)
}

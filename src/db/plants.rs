use chrono::Utc;
use rusqlite::Connection;

use crate::{
    db::{self, DBResult, awards},
    models,
    points::Activity,
};

/////*============== PLANT QUERIES ==============*/
impl<'a> TryFrom<&'a rusqlite::Row<'a>> for models::PlantPost {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            user_name: row.get("user_name")?,
            plant_name: row.get("plant_name")?,
            scientific_name: row.get("scientific_name")?,
            location: row.get("location")?,
            description: row.get("description")?,
            pollinator_friendly: row.get("is_pollinator_friendly")?,
            care_instructions: row.get("care_instructions")?,
            posted_date: row.get("posted_date")?,
            likes: row.get("likes")?,
            viewer_has_liked: row.get("viewer_has_liked")?,
            photos: Vec::new(),
        })
    }
}

/// Like counts and the viewer's own like come from the like set; `:viewer` may be NULL.
const SELECT_PLANTS: &str =
    "SELECT pp.*, p.name AS user_name, ph.photo_url,
            (SELECT COUNT(*) FROM plant_likes l WHERE l.plant_post_id = pp.id) AS likes,
            EXISTS (
              SELECT 1
              FROM plant_likes l
              WHERE l.plant_post_id = pp.id
                AND l.user_id = :viewer
            ) AS viewer_has_liked
     FROM plant_posts pp
     LEFT JOIN profiles p      ON p.id = pp.user_id
     LEFT JOIN plant_photos ph ON ph.plant_post_id = pp.id
     WHERE (:id IS NULL OR pp.id = :id)
     ORDER BY pp.posted_date DESC, pp.id DESC, ph.id ASC";

fn select_plants(
    connection: &Connection,
    id: Option<i64>,
    viewer: Option<i64>,
) -> DBResult<Vec<models::PlantPost>> {
    let rows = connection
        .prepare(SELECT_PLANTS)?
        .query_map(rusqlite::named_params! { ":id": id, ":viewer": viewer }, |row| {
            Ok((models::PlantPost::try_from(row)?, row.get::<_, Option<String>>("photo_url")?))
        })?
        .collect::<DBResult<Vec<_>>>()
        .inspect_err(|err| log::error!("[select_plants] Could not convert row into plant post: {err}"))?;

    Ok(db::fold_children(rows, |plant| plant.id, |plant, photo| plant.photos.push(photo)))
}

/// Gathers every plant post, newest first, as seen by `viewer`.
pub fn query_plants(connection: &Connection, viewer: Option<i64>) -> DBResult<Vec<models::PlantPost>> {
    log::trace!("[query_plants] Querying all plant posts.");
    select_plants(connection, None, viewer)
}

pub fn query_plant(
    connection: &Connection,
    id: i64,
    viewer: Option<i64>,
) -> DBResult<Option<models::PlantPost>> {
    log::trace!("[query_plant] Querying plant post {id}.");
    Ok(select_plants(connection, Some(id), viewer)?.into_iter().next())
}

/// Shares a plant sighting with its photos and awards the poster. Returns the new post's id.
pub fn insert_plant(connection: &Connection, user_id: i64, plant: &models::NewPlant) -> DBResult<i64> {
    log::trace!("[insert_plant] Inserting plant post {}...", plant.plant_name);
    let transaction = connection.unchecked_transaction()?;

    let query_params = rusqlite::named_params! {
            ":user_id":                user_id,
            ":plant_name":             plant.plant_name,
            ":scientific_name":        plant.scientific_name,
            ":location":               plant.location,
            ":description":            plant.description,
            ":is_pollinator_friendly": plant.pollinator_friendly,
            ":care_instructions":      plant.care_instructions,
            ":posted_date":            Utc::now(),
    };

    transaction
        .prepare(
            "INSERT INTO plant_posts
                ( user_id,  plant_name,  scientific_name,  location,  description,
                  is_pollinator_friendly,  care_instructions,  posted_date)
             VALUES
                (:user_id, :plant_name, :scientific_name, :location, :description,
                 :is_pollinator_friendly, :care_instructions, :posted_date)",
        )?
        .execute(query_params)?;
    let id = transaction.last_insert_rowid();

    {
        let mut stmt = transaction.prepare(
            "INSERT INTO plant_photos (plant_post_id, photo_url) VALUES (:id, :photo_url)",
        )?;
        for photo in &plant.photos {
            stmt.execute(rusqlite::named_params! { ":id": id, ":photo_url": photo })?;
        }
    }

    awards::award_points(&transaction, user_id, Activity::PlantPost, id)?;
    transaction.commit()?;

    log::info!("Plant post {id} shared by user {user_id}.");
    Ok(id)
}

/// Returns whether `user_id` likes the post.
pub fn has_liked(connection: &Connection, plant_id: i64, user_id: i64) -> DBResult<bool> {
    connection
        .prepare("SELECT 1 FROM plant_likes WHERE plant_post_id = :plant_id AND user_id = :user_id")?
        .exists(rusqlite::named_params! { ":plant_id": plant_id, ":user_id": user_id })
}

/// Adds a like. Returns `true` if it wasn't already there.
pub fn insert_like(connection: &Connection, plant_id: i64, user_id: i64) -> DBResult<bool> {
    log::trace!("[insert_like] User {user_id} likes plant {plant_id}");

    connection
        .prepare(
            "INSERT INTO plant_likes ( plant_post_id,  user_id)
             VALUES                  (:plant_id,      :user_id)",
        )?
        .execute(rusqlite::named_params! { ":plant_id": plant_id, ":user_id": user_id })
        .map_or_else(db::swallow_constraint_violation, |_| Ok(true))
}

/// Removes a like. Returns `true` if there was one.
pub fn delete_like(connection: &Connection, plant_id: i64, user_id: i64) -> DBResult<bool> {
    log::trace!("[delete_like] User {user_id} unlikes plant {plant_id}");

    let removed = connection
        .prepare("DELETE FROM plant_likes WHERE plant_post_id = :plant_id AND user_id = :user_id")?
        .execute(rusqlite::named_params! { ":plant_id": plant_id, ":user_id": user_id })?;

    Ok(removed > 0)
}

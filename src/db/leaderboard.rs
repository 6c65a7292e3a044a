use rusqlite::Connection;

use crate::{db::DBResult, models};

/////*============== LEADERBOARD QUERIES ==============*/
impl<'a> TryFrom<&'a rusqlite::Row<'a>> for models::LeaderboardEntry {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            user_id: row.get("user_id")?,
            user_name: row.get("user_name")?,
            avatar_url: row.get("avatar_url")?,
            total_points: row.get("total_points")?,
            cleanup_count: row.get("cleanup_count")?,
            rank: row.get("rank")?,
        })
    }
}

/// The top `limit` stewards by total points. Ties share a rank and are listed oldest member
/// first.
pub fn query_leaderboard(connection: &Connection, limit: usize) -> DBResult<Vec<models::LeaderboardEntry>> {
    log::trace!("[query_leaderboard] Querying the top {limit} stewards.");

    connection
        .prepare(
            "SELECT *
             FROM leaderboard
             ORDER BY total_points DESC, joined_date ASC, user_id ASC
             LIMIT :limit",
        )?
        .query_map(rusqlite::named_params! { ":limit": limit }, |row| {
            models::LeaderboardEntry::try_from(row)
                .inspect_err(|err| log::error!("[query_leaderboard] Could not convert row into \
                                                leaderboard entry: {err}"))
        })?
        .collect()
}

use chrono::NaiveDate;
use diesel::pg::PgConnection;
use diesel::prelude::*;

use crate::models::{Rally, RallyConfig};
use crate::schema::{configuration, rallies};

/// The rally whose date range contains `today`. Overlapping ranges resolve to
/// the most recently started rally, then the highest id.
pub fn find_active_rally(conn: &mut PgConnection, today: NaiveDate) -> QueryResult<Option<Rally>> {
    rallies::table
        .filter(rallies::start_date.le(today))
        .filter(rallies::end_date.ge(today))
        .order((rallies::start_date.desc(), rallies::id_rally.desc()))
        .first::<Rally>(conn)
        .optional()
}

pub fn find_config(conn: &mut PgConnection, id_rally: i32) -> QueryResult<Option<RallyConfig>> {
    configuration::table
        .filter(configuration::id_rally.eq(id_rally))
        .first::<RallyConfig>(conn)
        .optional()
}

/// Active rally together with its configuration, if both exist.
pub fn find_active_config(
    conn: &mut PgConnection,
    today: NaiveDate,
) -> QueryResult<Option<(Rally, RallyConfig)>> {
    let Some(rally) = find_active_rally(conn, today)? else {
        return Ok(None);
    };
    Ok(find_config(conn, rally.id_rally)?.map(|config| (rally, config)))
}

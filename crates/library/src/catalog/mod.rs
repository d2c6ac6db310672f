//! Read side of the catalog, plus the few row-level writes the reconciler builds on.
//!
//! Every function takes a `&Connection`, so the same code runs against a plain
//! connection (`Store::read`) or inside a write transaction (`Store::write`).

pub mod albums;
pub mod artists;
pub mod query;
pub mod tracks;

pub use albums::AlbumField;
pub use artists::ArtistField;
pub use query::{Condition, Direction, Field, FieldValue, Filter, Join, Operator, Page};
pub use tracks::TrackField;

use rusqlite::{Connection, OptionalExtension, Params, Row};

use crate::error::LibraryError;

type RowMap<T> = fn(&Row<'_>) -> rusqlite::Result<T>;

fn query_all<T, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    map: RowMap<T>,
) -> Result<Vec<T>, LibraryError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, map)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn query_one<T, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    map: RowMap<T>,
) -> Result<Option<T>, LibraryError> {
    Ok(conn.query_row(sql, params, map).optional()?)
}

fn query_ids<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<i64>, LibraryError> {
    query_all(conn, sql, params, |row| row.get(0))
}

fn count_table(conn: &Connection, table: &str) -> Result<usize, LibraryError> {
    let sql = format!("SELECT COUNT(*) FROM {}", table);
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count.max(0) as usize)
}

fn search_table<T, F: Field>(
    conn: &Connection,
    columns: &str,
    table: &str,
    filter: &Filter<F>,
    map: RowMap<T>,
) -> Result<Vec<T>, LibraryError> {
    let (clause, values) = filter.where_clause();
    let sql = format!("SELECT {} FROM {} {} ORDER BY id", columns, table, clause);
    query_all(conn, &sql, query::as_params(&values).as_slice(), map)
}

fn page_table<T, F: Field>(
    conn: &Connection,
    columns: &str,
    table: &str,
    page: &Page<F>,
    map: RowMap<T>,
) -> Result<Vec<T>, LibraryError> {
    let sql = format!("SELECT {} FROM {} {}", columns, table, page.tail());
    query_all(conn, &sql, [], map)
}

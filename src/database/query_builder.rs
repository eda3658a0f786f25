use std::time::Instant;

use sqlx::{postgres::{PgArguments, PgRow}, FromRow, PgPool, Postgres, Row};

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::filter::{Filter, Page, SqlParam, SqlResult};

/// Run a list request: the data query and its count query execute concurrently and
/// are combined with the pagination envelope.
pub async fn fetch_page<T>(db: &DatabaseManager, filter: &Filter) -> Result<Page<T>, DatabaseError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let data = filter.to_sql();
    let count = filter.to_count_sql();
    let started = Instant::now();

    let (items, total_count) = tokio::try_join!(
        fetch_all::<T>(db.pool(), &data),
        fetch_count(db.pool(), &count),
    )?;

    log_timing(db, &data, started);
    Ok(Page { items, pagination: filter.pagination(total_count) })
}

/// All rows matching the filter, up to `max_rows`, ignoring paging.
pub async fn fetch_export<T>(db: &DatabaseManager, filter: &Filter, max_rows: u32) -> Result<Vec<T>, DatabaseError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let sql = filter.to_export_sql(max_rows);
    let started = Instant::now();
    let rows = fetch_all::<T>(db.pool(), &sql).await?;
    log_timing(db, &sql, started);
    Ok(rows)
}

pub async fn fetch_all<T>(pool: &PgPool, sql: &SqlResult) -> Result<Vec<T>, DatabaseError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let mut q = sqlx::query_as::<_, T>(&sql.query);
    for p in sql.params.iter() {
        q = bind_param_query_as(q, p);
    }
    Ok(q.fetch_all(pool).await?)
}

pub async fn fetch_count(pool: &PgPool, sql: &SqlResult) -> Result<i64, DatabaseError> {
    let mut q = sqlx::query(&sql.query);
    for p in sql.params.iter() {
        q = bind_param_query(q, p);
    }
    let row = q.fetch_one(pool).await?;
    let count: i64 = row.try_get("count")?;
    Ok(count)
}

fn log_timing(db: &DatabaseManager, sql: &SqlResult, started: Instant) {
    let config = db.config();
    let elapsed = started.elapsed();
    if elapsed.as_millis() as u64 >= config.slow_query_threshold_ms {
        tracing::warn!(elapsed_ms = elapsed.as_millis() as u64, query = %sql.query, "slow list query");
    } else if config.enable_query_logging {
        tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, query = %sql.query, "list query");
    }
}

pub fn bind_param_query<'q>(
    q: sqlx::query::Query<'q, Postgres, PgArguments>,
    v: &SqlParam,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match v {
        SqlParam::Text(s) => q.bind(s.clone()),
        SqlParam::Int(i) => q.bind(*i),
        SqlParam::Decimal(d) => q.bind(*d),
        SqlParam::Bool(b) => q.bind(*b),
        SqlParam::Uuid(u) => q.bind(*u),
        SqlParam::Timestamp(t) => q.bind(*t),
    }
}

pub fn bind_param_query_as<'q, O>(
    q: sqlx::query::QueryAs<'q, Postgres, O, PgArguments>,
    v: &SqlParam,
) -> sqlx::query::QueryAs<'q, Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, PgRow>,
{
    match v {
        SqlParam::Text(s) => q.bind(s.clone()),
        SqlParam::Int(i) => q.bind(*i),
        SqlParam::Decimal(d) => q.bind(*d),
        SqlParam::Bool(b) => q.bind(*b),
        SqlParam::Uuid(u) => q.bind(*u),
        SqlParam::Timestamp(t) => q.bind(*t),
    }
}

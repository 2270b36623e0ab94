use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{NewPortfolio, Portfolio};
use crate::store::PortfolioFilter;

pub async fn fetch_one(pool: &PgPool, id: Uuid) -> Result<Option<Portfolio>, sqlx::Error> {
    sqlx::query_as::<_, Portfolio>("SELECT id, name, date_created, version
                      FROM portfolios
                      WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn insert(pool: &PgPool, input: NewPortfolio) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO portfolios (id, name, date_created, version)
                  VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(input.name)
        .bind(input.date_created)
        .bind(input.version)
        .execute(pool)
        .await?;
    Ok(id)
}

/// Single-statement multi-row insert; Postgres applies it atomically.
pub async fn insert_many(pool: &PgPool, inputs: &[NewPortfolio])
    -> Result<(Vec<Uuid>, u64), sqlx::Error> {
    let ids: Vec<Uuid> = inputs.iter().map(|_| Uuid::new_v4()).collect();
    let names: Vec<String> = inputs.iter().map(|p| p.name.clone()).collect();
    let dates: Vec<DateTime<Utc>> = inputs.iter().map(|p| p.date_created).collect();
    let versions: Vec<i32> = inputs.iter().map(|p| p.version).collect();

    let result = sqlx::query("INSERT INTO portfolios (id, name, date_created, version)
                  SELECT * FROM UNNEST($1::uuid[], $2::text[], $3::timestamptz[], $4::int4[])")
        .bind(&ids)
        .bind(&names)
        .bind(&dates)
        .bind(&versions)
        .execute(pool)
        .await?;
    Ok((ids, result.rows_affected()))
}

pub async fn search(pool: &PgPool, filter: &PortfolioFilter, offset: i64, limit: i64)
    -> Result<Vec<Portfolio>, sqlx::Error> {
    match filter {
        PortfolioFilter::All => {
            sqlx::query_as::<_, Portfolio>("SELECT id, name, date_created, version
                      FROM portfolios
                      ORDER BY date_created DESC, id DESC
                      OFFSET $1 LIMIT $2")
                .bind(offset)
                .bind(limit)
                .fetch_all(pool)
                .await
        }
        PortfolioFilter::ExactName(name) => {
            sqlx::query_as::<_, Portfolio>("SELECT id, name, date_created, version
                      FROM portfolios
                      WHERE lower(name) = lower($1)
                      ORDER BY date_created DESC, id DESC
                      OFFSET $2 LIMIT $3")
                .bind(name)
                .bind(offset)
                .bind(limit)
                .fetch_all(pool)
                .await
        }
        PortfolioFilter::NameContains(fragment) => {
            // strpos keeps '_' and '%' literal, unlike LIKE.
            sqlx::query_as::<_, Portfolio>("SELECT id, name, date_created, version
                      FROM portfolios
                      WHERE strpos(lower(name), lower($1)) > 0
                      ORDER BY date_created DESC, id DESC
                      OFFSET $2 LIMIT $3")
                .bind(fragment)
                .bind(offset)
                .bind(limit)
                .fetch_all(pool)
                .await
        }
    }
}

pub async fn count(pool: &PgPool, filter: &PortfolioFilter) -> Result<i64, sqlx::Error> {
    match filter {
        PortfolioFilter::All => {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM portfolios")
                .fetch_one(pool)
                .await
        }
        PortfolioFilter::ExactName(name) => {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM portfolios
                      WHERE lower(name) = lower($1)")
                .bind(name)
                .fetch_one(pool)
                .await
        }
        PortfolioFilter::NameContains(fragment) => {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM portfolios
                      WHERE strpos(lower(name), lower($1)) > 0")
                .bind(fragment)
                .fetch_one(pool)
                .await
        }
    }
}

pub async fn update(pool: &PgPool, input: &Portfolio) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE portfolios
        SET name = $1, date_created = $2, version = $3
        WHERE id = $4")
        .bind(&input.name)
        .bind(input.date_created)
        .bind(input.version)
        .bind(input.id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM portfolios WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

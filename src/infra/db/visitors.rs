use std::net::IpAddr;

use async_trait::async_trait;
use time::Date;

use crate::{
    application::repos::{RepoError, VisitTotals, VisitorsRepo},
    domain::entities::VisitRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct VisitRow {
    ip_address: String,
    visit_count: i64,
    first_seen_date: Date,
}

impl From<VisitRow> for VisitRecord {
    fn from(row: VisitRow) -> Self {
        Self {
            ip_address: row.ip_address,
            visit_count: row.visit_count,
            first_seen_date: row.first_seen_date,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TotalsRow {
    unique_visitors: i64,
    total_visits: i64,
}

#[async_trait]
impl VisitorsRepo for PostgresRepositories {
    async fn record_visit(&self, ip: IpAddr, today: Date) -> Result<VisitRecord, RepoError> {
        // Concurrent first visits from one address collapse into increments.
        let row = sqlx::query_as::<_, VisitRow>(
            r#"
            INSERT INTO visit_records (ip_address, visit_count, first_seen_date)
            VALUES ($1, 1, $2)
            ON CONFLICT (ip_address)
            DO UPDATE SET visit_count = visit_records.visit_count + 1
            RETURNING ip_address, visit_count, first_seen_date
            "#,
        )
        .bind(ip.to_string())
        .bind(today)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn find_visit(&self, ip: IpAddr) -> Result<Option<VisitRecord>, RepoError> {
        let row = sqlx::query_as::<_, VisitRow>(
            r#"
            SELECT ip_address, visit_count, first_seen_date
            FROM visit_records
            WHERE ip_address = $1
            "#,
        )
        .bind(ip.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(VisitRecord::from))
    }

    async fn visit_totals(&self) -> Result<VisitTotals, RepoError> {
        let row = sqlx::query_as::<_, TotalsRow>(
            r#"
            SELECT
                COUNT(*)::BIGINT AS unique_visitors,
                COALESCE(SUM(visit_count), 0)::BIGINT AS total_visits
            FROM visit_records
            "#,
        )
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(VisitTotals {
            unique_visitors: row.unique_visitors,
            total_visits: row.total_visits,
        })
    }
}

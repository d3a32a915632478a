use async_trait::async_trait;
use uuid::Uuid;

use super::PgNetworkTx;
use crate::models::Association;
use crate::repositories::AssociationRepository;
use crate::utils::errors::{already_exists_error, AppError, AppResult, Entity};

#[derive(Debug, sqlx::FromRow)]
struct AssociationRow {
    id: Uuid,
    stop_id: Uuid,
    line_id: Uuid,
    enabled: bool,
}

impl From<AssociationRow> for Association {
    fn from(row: AssociationRow) -> Self {
        Association {
            id: row.id,
            stop_id: row.stop_id,
            line_id: row.line_id,
            enabled: row.enabled,
        }
    }
}

#[async_trait]
impl AssociationRepository for PgNetworkTx {
    async fn find_association(&mut self, id: Uuid) -> AppResult<Option<Association>> {
        let row = sqlx::query_as::<_, AssociationRow>(
            "SELECT id, stop_id, line_id, enabled FROM stop_lines WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.conn()?)
        .await?;

        Ok(row.map(Association::from))
    }

    async fn find_association_by_pair(&mut self, stop_id: Uuid, line_id: Uuid) -> AppResult<Option<Association>> {
        let row = sqlx::query_as::<_, AssociationRow>(
            "SELECT id, stop_id, line_id, enabled FROM stop_lines WHERE stop_id = $1 AND line_id = $2",
        )
        .bind(stop_id)
        .bind(line_id)
        .fetch_optional(self.conn()?)
        .await?;

        Ok(row.map(Association::from))
    }

    async fn list_associations(&mut self) -> AppResult<Vec<Association>> {
        let rows = sqlx::query_as::<_, AssociationRow>(
            "SELECT id, stop_id, line_id, enabled FROM stop_lines ORDER BY line_id, stop_id",
        )
        .fetch_all(self.conn()?)
        .await?;

        Ok(rows.into_iter().map(Association::from).collect())
    }

    async fn associations_for_line(&mut self, line_id: Uuid) -> AppResult<Vec<Association>> {
        let rows = sqlx::query_as::<_, AssociationRow>(
            "SELECT id, stop_id, line_id, enabled FROM stop_lines WHERE line_id = $1 ORDER BY stop_id",
        )
        .bind(line_id)
        .fetch_all(self.conn()?)
        .await?;

        Ok(rows.into_iter().map(Association::from).collect())
    }

    async fn associations_for_stop(&mut self, stop_id: Uuid) -> AppResult<Vec<Association>> {
        let rows = sqlx::query_as::<_, AssociationRow>(
            "SELECT id, stop_id, line_id, enabled FROM stop_lines WHERE stop_id = $1 ORDER BY line_id",
        )
        .bind(stop_id)
        .fetch_all(self.conn()?)
        .await?;

        Ok(rows.into_iter().map(Association::from).collect())
    }

    async fn insert_association(&mut self, stop_id: Uuid, line_id: Uuid, enabled: bool) -> AppResult<Association> {
        let row = sqlx::query_as::<_, AssociationRow>(
            r#"
            INSERT INTO stop_lines (id, stop_id, line_id, enabled)
            VALUES ($1, $2, $3, $4)
            RETURNING id, stop_id, line_id, enabled
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(stop_id)
        .bind(line_id)
        .bind(enabled)
        .fetch_one(self.conn()?)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.constraint() == Some("stop_lines_stop_line_key") => already_exists_error(
                Entity::Association,
                format!("stop {} is already associated with line {}", stop_id, line_id),
            ),
            _ => AppError::from(e),
        })?;

        Ok(row.into())
    }

    async fn set_association_enabled(&mut self, id: Uuid, enabled: bool) -> AppResult<()> {
        sqlx::query("UPDATE stop_lines SET enabled = $2 WHERE id = $1")
            .bind(id)
            .bind(enabled)
            .execute(self.conn()?)
            .await?;
        Ok(())
    }

    async fn delete_association(&mut self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM stop_lines WHERE id = $1")
            .bind(id)
            .execute(self.conn()?)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_valid_associations_for_line(&mut self, line_id: Uuid) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM stop_lines sl
            JOIN stops s ON s.id = sl.stop_id
            WHERE sl.line_id = $1 AND sl.enabled AND s.enabled
            "#,
        )
        .bind(line_id)
        .fetch_one(self.conn()?)
        .await?;

        Ok(count)
    }

    async fn count_enabled_associations_for_stop(&mut self, stop_id: Uuid) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM stop_lines WHERE stop_id = $1 AND enabled",
        )
        .bind(stop_id)
        .fetch_one(self.conn()?)
        .await?;

        Ok(count)
    }
}

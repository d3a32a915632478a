use async_trait::async_trait;
use chrono::NaiveTime;
use uuid::Uuid;

use super::PgNetworkTx;
use crate::models::Schedule;
use crate::repositories::ScheduleRepository;
use crate::utils::errors::AppResult;

#[derive(Debug, sqlx::FromRow)]
struct ScheduleRow {
    id: Uuid,
    stop_line_id: Uuid,
    time: NaiveTime,
}

impl From<ScheduleRow> for Schedule {
    fn from(row: ScheduleRow) -> Self {
        Schedule {
            id: row.id,
            association_id: row.stop_line_id,
            time: row.time,
        }
    }
}

#[async_trait]
impl ScheduleRepository for PgNetworkTx {
    async fn schedules_for_association(&mut self, association_id: Uuid) -> AppResult<Vec<Schedule>> {
        let rows = sqlx::query_as::<_, ScheduleRow>(
            "SELECT id, stop_line_id, time FROM stop_line_schedules WHERE stop_line_id = $1 ORDER BY time, id",
        )
        .bind(association_id)
        .fetch_all(self.conn()?)
        .await?;

        Ok(rows.into_iter().map(Schedule::from).collect())
    }

    async fn insert_schedules(&mut self, association_id: Uuid, times: &[NaiveTime]) -> AppResult<Vec<Schedule>> {
        let ids: Vec<Uuid> = times.iter().map(|_| Uuid::new_v4()).collect();

        let mut rows = sqlx::query_as::<_, ScheduleRow>(
            r#"
            INSERT INTO stop_line_schedules (id, stop_line_id, time)
            SELECT t.id, $1, t.time
            FROM unnest($2::uuid[], $3::time[]) AS t(id, time)
            RETURNING id, stop_line_id, time
            "#,
        )
        .bind(association_id)
        .bind(ids)
        .bind(times.to_vec())
        .fetch_all(self.conn()?)
        .await?;

        rows.sort_by_key(|r| r.time);
        Ok(rows.into_iter().map(Schedule::from).collect())
    }

    async fn delete_schedule(&mut self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM stop_line_schedules WHERE id = $1")
            .bind(id)
            .execute(self.conn()?)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::coordinator::{AuditStore, CandidateSource};
use crate::error::StoreError;
use crate::models::{AuditRecord, NotificationCandidate, NotificationStat, ReminderKind};
use crate::window::TimeWindow;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO reminders.classes (class_id, name)
        VALUES (1, 'XI IPA 2')
        ON CONFLICT (class_id) DO UPDATE SET name = EXCLUDED.name
        "#,
    )
    .execute(pool)
    .await?;

    for (id, name) in [(1_i64, "Biologi"), (2, "Matematika")] {
        sqlx::query(
            r#"
            INSERT INTO reminders.subjects (subject_id, name)
            VALUES ($1, $2)
            ON CONFLICT (subject_id) DO UPDATE SET name = EXCLUDED.name
            "#,
        )
        .bind(id)
        .bind(name)
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO reminders.lesson_schedules (schedule_id, class_id, subject_id)
            VALUES ($1, 1, $1)
            ON CONFLICT (schedule_id) DO NOTHING
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;
    }

    let students = [
        (1_i64, "Rina Kartika", Some("+62 812-3456-7890")),
        (2, "Budi Santoso", Some("0813 9876 5432")),
        (3, "Dewi Lestari", Some("")),
        (4, "Agus Pratama", None),
    ];
    for (id, name, phone) in students {
        sqlx::query(
            r#"
            INSERT INTO reminders.students (student_id, class_id, full_name, phone)
            VALUES ($1, 1, $2, $3)
            ON CONFLICT (student_id) DO UPDATE
            SET full_name = EXCLUDED.full_name, phone = EXCLUDED.phone
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(phone)
        .execute(pool)
        .await?;
    }

    let now = Utc::now();
    let tasks = [
        (1_i64, 1_i64, "Laporan Praktikum Fotosintesis", now + Duration::days(1), 100),
        (2, 2, "Latihan Soal Integral", now - Duration::days(2), 50),
        (3, 2, "Proyek Statistika Kelas", now + Duration::days(3), 100),
    ];
    for (id, schedule_id, title, deadline, max_score) in tasks {
        sqlx::query(
            r#"
            INSERT INTO reminders.tasks (task_id, schedule_id, title, deadline, max_score)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (task_id) DO UPDATE
            SET title = EXCLUDED.title, deadline = EXCLUDED.deadline, max_score = EXCLUDED.max_score
            "#,
        )
        .bind(id)
        .bind(schedule_id)
        .bind(title)
        .bind(deadline)
        .bind(max_score)
        .execute(pool)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO reminders.submissions (task_id, student_id)
        VALUES (1, 2)
        ON CONFLICT (task_id, student_id) DO NOTHING
        "#,
    )
    .execute(pool)
    .await
    .context("failed to seed submission")?;

    Ok(())
}

pub async fn fetch_stats(pool: &PgPool, since: DateTime<Utc>) -> anyhow::Result<Vec<NotificationStat>> {
    let rows = sqlx::query(
        r#"
        SELECT kind, status, COUNT(*) AS total, MAX(sent_at) AS last_sent_at
        FROM reminders.task_notifications
        WHERE sent_at >= $1
        GROUP BY kind, status
        ORDER BY kind, status
        "#,
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    let mut stats = Vec::with_capacity(rows.len());
    for row in rows {
        stats.push(NotificationStat {
            kind: row.try_get("kind")?,
            status: row.try_get("status")?,
            total: row.try_get("total")?,
            last_sent_at: row.try_get("last_sent_at")?,
        });
    }

    Ok(stats)
}

/// Postgres-backed candidate query and audit writer.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CandidateSource for PgStore {
    async fn pending_candidates(
        &self,
        kind: ReminderKind,
        window: &TimeWindow,
    ) -> Result<Vec<NotificationCandidate>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                t.task_id,
                t.title,
                t.deadline,
                t.max_score,
                sub.name AS subject_name,
                c.name AS class_name,
                s.student_id,
                s.full_name,
                s.phone,
                (ps.submission_id IS NOT NULL) AS has_submitted
            FROM reminders.tasks t
            JOIN reminders.lesson_schedules ls ON ls.schedule_id = t.schedule_id
            JOIN reminders.subjects sub ON sub.subject_id = ls.subject_id
            JOIN reminders.classes c ON c.class_id = ls.class_id
            JOIN reminders.students s ON s.class_id = c.class_id
            LEFT JOIN reminders.submissions ps
                ON ps.task_id = t.task_id AND ps.student_id = s.student_id
            WHERE t.deadline >= $2
              AND t.deadline < $3
              AND s.phone IS NOT NULL
              AND s.phone <> ''
              AND ps.submission_id IS NULL
              AND NOT EXISTS (
                  SELECT 1
                  FROM reminders.task_notifications n
                  WHERE n.task_id = t.task_id
                    AND n.student_id = s.student_id
                    AND n.kind = $1
                    AND ($4::timestamptz IS NULL OR n.sent_at >= $4)
              )
            ORDER BY t.deadline ASC, s.student_id ASC
            "#,
        )
        .bind(kind.code())
        .bind(window.start)
        .bind(window.end)
        .bind(window.notified_since)
        .fetch_all(&self.pool)
        .await?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in rows {
            candidates.push(NotificationCandidate {
                task_id: row.try_get("task_id")?,
                task_title: row.try_get("title")?,
                deadline: row.try_get("deadline")?,
                max_score: row.try_get("max_score")?,
                subject_name: row.try_get("subject_name")?,
                class_name: row.try_get("class_name")?,
                student_id: row.try_get("student_id")?,
                student_name: row.try_get("full_name")?,
                phone: row.try_get("phone")?,
                has_submitted: row.try_get("has_submitted")?,
            });
        }

        Ok(candidates)
    }
}

#[async_trait]
impl AuditStore for PgStore {
    async fn record(&self, record: &AuditRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO reminders.task_notifications
            (id, task_id, student_id, kind, sent_at, status, response)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.task_id)
        .bind(record.student_id)
        .bind(record.kind.code())
        .bind(record.sent_at)
        .bind(record.status.as_str())
        .bind(record.raw_response.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

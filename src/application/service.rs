//! Distributor Application Service
//!
//! Manual path into the distributor tree. Approval enrolls the user through
//! the same building block as auto-upgrade, inside the review transaction.

use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgExecutor, Row};
use std::sync::Arc;

use super::models::{ApplicationRequest, ApplicationStatus, DistributorApplication};
use crate::config::CommissionConfig;
use crate::core_types::{AdminId, ApplicationId};
use crate::db::Database;
use crate::db::schema::PENDING_APPLICATION_INDEX;
use crate::distributor::{Distributor, DistributorDirectory, NewDistributor};
use crate::error::{CommissionError, CommissionResult, is_unique_violation};

const APPLICATION_COLUMNS: &str = "id, user_id, brand_id, referrer_id, reason, status, \
     reviewed_by, reviewed_at, rejected_reason, created_at";

#[derive(Clone)]
pub struct ApplicationService {
    db: Database,
    config: Arc<CommissionConfig>,
}

impl ApplicationService {
    pub fn new(db: Database, config: Arc<CommissionConfig>) -> Self {
        Self { db, config }
    }

    pub async fn apply(&self, req: ApplicationRequest) -> CommissionResult<DistributorApplication> {
        let req = req.normalized()?;

        let application = self
            .db
            .transaction(move |conn| Box::pin(async move { Self::apply_in(conn, req).await }))
            .await?;

        tracing::info!(
            application_id = application.id,
            user_id = application.user_id,
            brand_id = application.brand_id,
            "Distributor application submitted"
        );
        Ok(application)
    }

    /// Approve and enroll. If the user became a distributor in the meantime
    /// (auto-upgrade), the existing record is returned.
    pub async fn approve(
        &self,
        application_id: ApplicationId,
        admin_id: AdminId,
    ) -> CommissionResult<(DistributorApplication, Distributor)> {
        let entry_level = self.config.entry_level;

        let (application, distributor) = self
            .db
            .transaction(move |conn| {
                Box::pin(async move {
                    let pending = Self::lock_pending_in(conn, application_id).await?;
                    let (distributor, _) = DistributorDirectory::enroll_in(
                        conn,
                        NewDistributor {
                            user_id: pending.user_id,
                            brand_id: pending.brand_id,
                            referrer_id: pending.referrer_id,
                            level: entry_level,
                        },
                    )
                    .await?;
                    let approved = Self::review_in(
                        conn,
                        application_id,
                        ApplicationStatus::Approved,
                        admin_id,
                        None,
                    )
                    .await?;
                    Ok((approved, distributor))
                })
            })
            .await?;

        tracing::info!(
            application_id = application_id,
            admin_id = admin_id,
            distributor_id = distributor.id,
            "Distributor application approved"
        );
        Ok((application, distributor))
    }

    pub async fn reject(
        &self,
        application_id: ApplicationId,
        admin_id: AdminId,
        reason: &str,
    ) -> CommissionResult<DistributorApplication> {
        let reason = reason.trim().to_string();
        if reason.is_empty() {
            return Err(CommissionError::invalid("rejection reason must not be empty"));
        }

        let application = self
            .db
            .transaction(move |conn| {
                Box::pin(async move {
                    Self::lock_pending_in(conn, application_id).await?;
                    Self::review_in(
                        conn,
                        application_id,
                        ApplicationStatus::Rejected,
                        admin_id,
                        Some(reason),
                    )
                    .await
                })
            })
            .await?;

        tracing::info!(
            application_id = application_id,
            admin_id = admin_id,
            "Distributor application rejected"
        );
        Ok(application)
    }

    pub async fn get(&self, application_id: ApplicationId) -> CommissionResult<DistributorApplication> {
        Self::fetch(self.db.pool(), application_id)
            .await?
            .ok_or_else(|| CommissionError::not_found(format!("application {}", application_id)))
    }

    async fn apply_in(
        conn: &mut PgConnection,
        req: ApplicationRequest,
    ) -> CommissionResult<DistributorApplication> {
        if DistributorDirectory::fetch_by_user(&mut *conn, req.user_id, req.brand_id)
            .await?
            .is_some()
        {
            return Err(CommissionError::conflict(format!(
                "user {} is already a distributor of brand {}",
                req.user_id, req.brand_id
            )));
        }

        if let Some(referrer_id) = req.referrer_id
            && DistributorDirectory::fetch_by_id(&mut *conn, referrer_id)
                .await?
                .is_none()
        {
            return Err(CommissionError::invalid(format!(
                "referrer {} does not exist",
                referrer_id
            )));
        }

        let row = sqlx::query(&format!(
            r#"INSERT INTO distributor_applications (user_id, brand_id, referrer_id, reason, status)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING {}"#,
            APPLICATION_COLUMNS
        ))
        .bind(req.user_id)
        .bind(req.brand_id)
        .bind(req.referrer_id)
        .bind(&req.reason)
        .bind(ApplicationStatus::Pending.id())
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, Some(PENDING_APPLICATION_INDEX)) {
                CommissionError::conflict(format!(
                    "user {} already has a pending application for brand {}",
                    req.user_id, req.brand_id
                ))
            } else {
                CommissionError::from(e)
            }
        })?;

        row_to_application(&row)
    }

    async fn lock_pending_in(
        conn: &mut PgConnection,
        application_id: ApplicationId,
    ) -> CommissionResult<DistributorApplication> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM distributor_applications WHERE id = $1 FOR UPDATE",
            APPLICATION_COLUMNS
        ))
        .bind(application_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| CommissionError::not_found(format!("application {}", application_id)))?;
        let application = row_to_application(&row)?;

        if application.status.is_terminal() {
            return Err(CommissionError::conflict(format!(
                "application {} is already {}",
                application_id, application.status
            )));
        }
        Ok(application)
    }

    async fn review_in(
        conn: &mut PgConnection,
        application_id: ApplicationId,
        next: ApplicationStatus,
        admin_id: AdminId,
        rejected_reason: Option<String>,
    ) -> CommissionResult<DistributorApplication> {
        let row = sqlx::query(&format!(
            r#"UPDATE distributor_applications
               SET status = $2, reviewed_by = $3, reviewed_at = NOW(), rejected_reason = $4
               WHERE id = $1 AND status = $5
               RETURNING {}"#,
            APPLICATION_COLUMNS
        ))
        .bind(application_id)
        .bind(next.id())
        .bind(admin_id)
        .bind(rejected_reason)
        .bind(ApplicationStatus::Pending.id())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| {
            CommissionError::conflict(format!("application {} changed concurrently", application_id))
        })?;

        row_to_application(&row)
    }

    async fn fetch<'e, E>(
        executor: E,
        application_id: ApplicationId,
    ) -> CommissionResult<Option<DistributorApplication>>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query(&format!(
            "SELECT {} FROM distributor_applications WHERE id = $1",
            APPLICATION_COLUMNS
        ))
        .bind(application_id)
        .fetch_optional(executor)
        .await?;

        row.as_ref().map(row_to_application).transpose()
    }
}

fn row_to_application(row: &PgRow) -> CommissionResult<DistributorApplication> {
    let status_id: i16 = row.try_get("status")?;
    let status = ApplicationStatus::from_id(status_id).ok_or_else(|| {
        CommissionError::Storage(format!("Invalid application status: {}", status_id))
    })?;

    Ok(DistributorApplication {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        brand_id: row.try_get("brand_id")?,
        referrer_id: row.try_get("referrer_id")?,
        reason: row.try_get("reason")?,
        status,
        reviewed_by: row.try_get("reviewed_by")?,
        reviewed_at: row.try_get("reviewed_at")?,
        rejected_reason: row.try_get("rejected_reason")?,
        created_at: row.try_get("created_at")?,
    })
}

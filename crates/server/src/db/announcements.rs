//! Announcement repository.

use merchkins_core::{AnnouncementId, Audience, MemberRole, OrgId, UserId};
use sqlx::PgPool;

use super::RepositoryError;
use crate::models::announcement::Announcement;

const SELECT_ANNOUNCEMENT: &str = r"
    SELECT id, org_id, org_name, author_id, title, body, audience, is_pinned,
           is_deleted, created_at, updated_at
    FROM announcements
";

/// Repository for organization announcements.
pub struct AnnouncementRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AnnouncementRepository<'a> {
    /// Create a new announcement repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Publish an announcement, snapshotting the organization name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(
        &self,
        org_id: OrgId,
        org_name: &str,
        author_id: UserId,
        title: &str,
        body: &str,
        audience: Audience,
        is_pinned: bool,
    ) -> Result<Announcement, RepositoryError> {
        let announcement = sqlx::query_as::<_, Announcement>(
            r"
            INSERT INTO announcements (org_id, org_name, author_id, title,
                                       body, audience, is_pinned)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, org_id, org_name, author_id, title, body, audience,
                      is_pinned, is_deleted, created_at, updated_at
            ",
        )
        .bind(org_id)
        .bind(org_name)
        .bind(author_id)
        .bind(title)
        .bind(body)
        .bind(audience)
        .bind(is_pinned)
        .fetch_one(self.pool)
        .await?;

        Ok(announcement)
    }

    /// Get a live announcement scoped to an organization.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        org_id: OrgId,
        id: AnnouncementId,
    ) -> Result<Option<Announcement>, RepositoryError> {
        let announcement = sqlx::query_as::<_, Announcement>(&format!(
            "{SELECT_ANNOUNCEMENT} WHERE id = $1 AND org_id = $2 AND NOT is_deleted"
        ))
        .bind(id)
        .bind(org_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(announcement)
    }

    /// Edit an announcement. `None` leaves a field untouched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the announcement doesn't
    /// exist in this organization.
    pub async fn update(
        &self,
        org_id: OrgId,
        id: AnnouncementId,
        title: Option<&str>,
        body: Option<&str>,
        audience: Option<Audience>,
        is_pinned: Option<bool>,
    ) -> Result<Announcement, RepositoryError> {
        let announcement = sqlx::query_as::<_, Announcement>(
            r"
            UPDATE announcements
            SET title = COALESCE($1, title),
                body = COALESCE($2, body),
                audience = COALESCE($3, audience),
                is_pinned = COALESCE($4, is_pinned),
                updated_at = now()
            WHERE id = $5 AND org_id = $6 AND NOT is_deleted
            RETURNING id, org_id, org_name, author_id, title, body, audience,
                      is_pinned, is_deleted, created_at, updated_at
            ",
        )
        .bind(title)
        .bind(body)
        .bind(audience)
        .bind(is_pinned)
        .bind(id)
        .bind(org_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(announcement)
    }

    /// Soft-delete an announcement.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the announcement doesn't
    /// exist in this organization.
    pub async fn soft_delete(
        &self,
        org_id: OrgId,
        id: AnnouncementId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE announcements
            SET is_deleted = TRUE, updated_at = now()
            WHERE id = $1 AND org_id = $2 AND NOT is_deleted
            ",
        )
        .bind(id)
        .bind(org_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// List announcements the viewer may see, pinned first then newest.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_visible(
        &self,
        org_id: OrgId,
        viewer_role: Option<MemberRole>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Announcement>, RepositoryError> {
        let audiences: Vec<Audience> = [Audience::Public, Audience::Members, Audience::Staff]
            .into_iter()
            .filter(|a| a.visible_to(viewer_role))
            .collect();

        let announcements = sqlx::query_as::<_, Announcement>(&format!(
            "{SELECT_ANNOUNCEMENT}
             WHERE org_id = $1 AND NOT is_deleted AND audience = ANY($2)
             ORDER BY is_pinned DESC, created_at DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(org_id)
        .bind(audiences)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(announcements)
    }

    /// Page through all live announcements by ascending ID (index rebuild).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_live_after(
        &self,
        after: AnnouncementId,
        limit: i64,
    ) -> Result<Vec<Announcement>, RepositoryError> {
        let announcements = sqlx::query_as::<_, Announcement>(&format!(
            "{SELECT_ANNOUNCEMENT}
             WHERE id > $1 AND NOT is_deleted
             ORDER BY id
             LIMIT $2"
        ))
        .bind(after)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(announcements)
    }
}

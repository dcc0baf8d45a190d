use crate::{models::SqlComment, Db};
use anyhow::{anyhow, Context};
use domain::{Comment, CommentId, CommentStatus, PostId, Transition};
use sqlx::{Sqlite, Transaction};
use tracing::debug;

/// Status a comment had before it was trashed / spammed.
const TRASH_STATUS_KEY: &str = "_trash_meta_status";
const SPAM_STATUS_KEY: &str = "_spam_meta_status";

const SELECT_COMMENT: &str = r#"
    SELECT
        id, post_id, parent_id,
        author_name, author_email, author_url, author_ip,
        created_at, created_at_gmt,
        content, karma, status, agent, comment_type
    FROM comments
"#;

impl Db {
    /// Inserts a new row; `c.id` is ignored and the assigned id returned.
    pub async fn insert_comment(&self, c: &Comment) -> anyhow::Result<CommentId> {
        let id = sqlx::query(
            r#"
            INSERT INTO comments (
                post_id, parent_id,
                author_name, author_email, author_url, author_ip,
                created_at, created_at_gmt,
                content, karma, status, agent, comment_type
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(c.post_id.get())
        .bind(c.parent.get())
        .bind(&c.author_name)
        .bind(&c.author_email)
        .bind(&c.author_url)
        .bind(&c.author_ip)
        .bind(c.created_at)
        .bind(c.created_at_gmt)
        .bind(&c.content)
        .bind(c.karma)
        .bind(c.status.as_str())
        .bind(&c.agent)
        .bind(&c.comment_type)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(CommentId::new(id))
    }

    /// Overwrites every column of the row `c.id`. Returns false if it does not exist.
    pub async fn update_comment(&self, c: &Comment) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE comments SET
                post_id = ?, parent_id = ?,
                author_name = ?, author_email = ?, author_url = ?, author_ip = ?,
                created_at = ?, created_at_gmt = ?,
                content = ?, karma = ?, status = ?, agent = ?, comment_type = ?
            WHERE id = ?
            "#,
        )
        .bind(c.post_id.get())
        .bind(c.parent.get())
        .bind(&c.author_name)
        .bind(&c.author_email)
        .bind(&c.author_url)
        .bind(&c.author_ip)
        .bind(c.created_at)
        .bind(c.created_at_gmt)
        .bind(&c.content)
        .bind(c.karma)
        .bind(c.status.as_str())
        .bind(&c.agent)
        .bind(&c.comment_type)
        .bind(c.id.get())
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn get_comment(&self, id: CommentId) -> anyhow::Result<Option<Comment>> {
        let row = sqlx::query_as::<_, SqlComment>(&format!("{SELECT_COMMENT} WHERE id = ?"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Comment::try_from).transpose()
    }

    /// Comments of a post whose status is in `statuses`, oldest first.
    pub async fn list_comments(
        &self,
        post_id: PostId,
        statuses: &[CommentStatus],
    ) -> anyhow::Result<Vec<Comment>> {
        let rows = sqlx::query_as::<_, SqlComment>(&format!(
            "{SELECT_COMMENT} WHERE post_id = ? ORDER BY created_at_gmt ASC, id ASC"
        ))
        .bind(post_id.get())
        .fetch_all(&self.pool)
        .await?;

        let mut comments = Vec::with_capacity(rows.len());
        for row in rows {
            let c = Comment::try_from(row)?;
            if statuses.contains(&c.status) {
                comments.push(c);
            }
        }
        Ok(comments)
    }

    /// Moves a comment through a platform transition and returns its new status.
    ///
    /// Trash and spam remember the previous status; untrash and unspam restore
    /// it (falling back to `hold`). `Transition::Set` ignores the remembered one.
    pub async fn transition_comment(
        &self,
        id: CommentId,
        transition: Transition,
    ) -> anyhow::Result<CommentStatus> {
        let mut tx = self.pool.begin().await?;

        let current: Option<String> = sqlx::query_scalar("SELECT status FROM comments WHERE id = ?")
            .bind(id.get())
            .fetch_optional(&mut *tx)
            .await?;
        let current: CommentStatus = current
            .ok_or_else(|| anyhow!("comment {} not found", id))?
            .parse()?;
        current.check(transition)?;

        let next = match transition {
            Transition::Trash => {
                remember_status(&mut tx, id, TRASH_STATUS_KEY, current).await?;
                CommentStatus::Trash
            }
            Transition::Spam => {
                remember_status(&mut tx, id, SPAM_STATUS_KEY, current).await?;
                CommentStatus::Spam
            }
            Transition::Untrash => restore_status(&mut tx, id, TRASH_STATUS_KEY).await?,
            Transition::Unspam => restore_status(&mut tx, id, SPAM_STATUS_KEY).await?,
            Transition::Set(status) => status,
        };

        sqlx::query("UPDATE comments SET status = ? WHERE id = ?")
            .bind(next.as_str())
            .bind(id.get())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(next)
    }

    /// Hard delete. Direct replies move up to the deleted comment's parent.
    pub async fn delete_comment(&self, id: CommentId) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;

        let parent: Option<i64> = sqlx::query_scalar("SELECT parent_id FROM comments WHERE id = ?")
            .bind(id.get())
            .fetch_optional(&mut *tx)
            .await?;
        let Some(parent) = parent else {
            return Ok(false);
        };

        let moved = sqlx::query("UPDATE comments SET parent_id = ? WHERE parent_id = ?")
            .bind(parent)
            .bind(id.get())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if moved > 0 {
            debug!(comment_id = %id, parent, moved, "re-parented replies of deleted comment");
        }
        sqlx::query("DELETE FROM comment_meta WHERE comment_id = ?")
            .bind(id.get())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id.get())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}

async fn remember_status(
    tx: &mut Transaction<'_, Sqlite>,
    id: CommentId,
    key: &str,
    status: CommentStatus,
) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM comment_meta WHERE comment_id = ? AND meta_key = ?")
        .bind(id.get())
        .bind(key)
        .execute(&mut **tx)
        .await?;
    sqlx::query("INSERT INTO comment_meta (comment_id, meta_key, meta_value) VALUES (?, ?, ?)")
        .bind(id.get())
        .bind(key)
        .bind(serde_json::to_string(status.as_str())?)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn restore_status(
    tx: &mut Transaction<'_, Sqlite>,
    id: CommentId,
    key: &str,
) -> anyhow::Result<CommentStatus> {
    let saved: Option<String> = sqlx::query_scalar(
        "SELECT meta_value FROM comment_meta WHERE comment_id = ? AND meta_key = ? ORDER BY meta_id DESC LIMIT 1",
    )
    .bind(id.get())
    .bind(key)
    .fetch_optional(&mut **tx)
    .await?;

    sqlx::query("DELETE FROM comment_meta WHERE comment_id = ? AND meta_key = ?")
        .bind(id.get())
        .bind(key)
        .execute(&mut **tx)
        .await?;

    let status = match saved {
        Some(raw) => serde_json::from_str::<String>(&raw)
            .context("stored status is not a string")?
            .parse()?,
        None => CommentStatus::Hold,
    };
    Ok(status)
}

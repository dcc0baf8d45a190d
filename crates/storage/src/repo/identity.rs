//! Maps comments mirrored from a hub back to their local rows.
//!
//! Every mirrored comment carries two metadata keys naming the hub post and
//! hub comment it came from.

use crate::Db;
use domain::{CommentId, PostId};
use serde_json::Value;

pub const ORIGINAL_COMMENT_ID_KEY: &str = "dt_original_comment_id";
pub const ORIGINAL_POST_ID_KEY: &str = "dt_original_post_id";

fn encoded(id: i64) -> String {
    Value::from(id).to_string()
}

impl Db {
    /// Local comment recorded for `origin_comment_id`, whatever hub post it came from.
    pub async fn find_local(&self, origin_comment_id: CommentId) -> anyhow::Result<Option<CommentId>> {
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT comment_id
            FROM comment_meta
            WHERE meta_key = ? AND meta_value = ?
            ORDER BY comment_id ASC
            LIMIT 1
            "#,
        )
        .bind(ORIGINAL_COMMENT_ID_KEY)
        .bind(encoded(origin_comment_id.get()))
        .fetch_optional(&self.pool)
        .await?;
        Ok(id.map(CommentId::new))
    }

    /// Like [`Db::find_local`] but only matches a mirror of `origin_post_id`.
    pub async fn find_local_confirmed(
        &self,
        origin_comment_id: CommentId,
        origin_post_id: PostId,
    ) -> anyhow::Result<Option<CommentId>> {
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT c.comment_id
            FROM comment_meta c
            JOIN comment_meta p
              ON p.comment_id = c.comment_id
             AND p.meta_key = ?
             AND p.meta_value = ?
            WHERE c.meta_key = ? AND c.meta_value = ?
            ORDER BY c.comment_id ASC
            LIMIT 1
            "#,
        )
        .bind(ORIGINAL_POST_ID_KEY)
        .bind(encoded(origin_post_id.get()))
        .bind(ORIGINAL_COMMENT_ID_KEY)
        .bind(encoded(origin_comment_id.get()))
        .fetch_optional(&self.pool)
        .await?;
        Ok(id.map(CommentId::new))
    }

    /// Mirror of `origin_comment_id` that lives under the local post `post_id`.
    pub async fn find_local_in_post(
        &self,
        origin_comment_id: CommentId,
        post_id: PostId,
    ) -> anyhow::Result<Option<CommentId>> {
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT m.comment_id
            FROM comment_meta m
            JOIN comments c ON c.id = m.comment_id
            WHERE m.meta_key = ? AND m.meta_value = ? AND c.post_id = ?
            ORDER BY m.comment_id ASC
            LIMIT 1
            "#,
        )
        .bind(ORIGINAL_COMMENT_ID_KEY)
        .bind(encoded(origin_comment_id.get()))
        .bind(post_id.get())
        .fetch_optional(&self.pool)
        .await?;
        Ok(id.map(CommentId::new))
    }

    pub async fn record_identity(
        &self,
        local_comment_id: CommentId,
        origin_post_id: PostId,
        origin_comment_id: CommentId,
    ) -> anyhow::Result<()> {
        self.set_single_meta(
            local_comment_id,
            ORIGINAL_POST_ID_KEY,
            &Value::from(origin_post_id.get()),
        )
        .await?;
        self.set_single_meta(
            local_comment_id,
            ORIGINAL_COMMENT_ID_KEY,
            &Value::from(origin_comment_id.get()),
        )
        .await?;
        Ok(())
    }
}

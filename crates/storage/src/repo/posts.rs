use crate::{models::SqlPost, Db};
use domain::{CommentStatus, Post, PostId};

impl Db {
    pub async fn create_post(
        &self,
        title: &str,
        subscription_signature: Option<&str>,
    ) -> anyhow::Result<PostId> {
        let id = sqlx::query(
            r#"
            INSERT INTO posts (title, subscription_signature, comment_count, created_at)
            VALUES (?, ?, 0, ?)
            "#,
        )
        .bind(title)
        .bind(subscription_signature)
        .bind(chrono::Utc::now().naive_utc())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(PostId::new(id))
    }

    pub async fn get_post(&self, post_id: PostId) -> anyhow::Result<Option<Post>> {
        let row = sqlx::query_as::<_, SqlPost>(
            r#"
            SELECT id, title, subscription_signature, comment_count, created_at
            FROM posts
            WHERE id = ?
            "#,
        )
        .bind(post_id.get())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    pub async fn set_subscription_signature(
        &self,
        post_id: PostId,
        signature: &str,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query("UPDATE posts SET subscription_signature = ? WHERE id = ?")
            .bind(signature)
            .bind(post_id.get())
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Recomputes the cached number of approved comments of a post.
    pub async fn update_comment_count(&self, post_id: PostId) -> anyhow::Result<i64> {
        sqlx::query(
            r#"
            UPDATE posts
            SET comment_count = (
                SELECT COUNT(*) FROM comments WHERE post_id = ? AND status = ?
            )
            WHERE id = ?
            "#,
        )
        .bind(post_id.get())
        .bind(CommentStatus::Approved.as_str())
        .bind(post_id.get())
        .execute(&self.pool)
        .await?;

        let count: Option<i64> =
            sqlx::query_scalar("SELECT comment_count FROM posts WHERE id = ?")
                .bind(post_id.get())
                .fetch_optional(&self.pool)
                .await?;
        Ok(count.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use crate::testing;
    use domain::{CommentId, CommentStatus, PostId};

    #[tokio::test]
    async fn signature_round_trip() {
        let db = testing::db().await;
        let id = db.create_post("hello", Some("sig")).await.unwrap();
        let post = db.get_post(id).await.unwrap().unwrap();
        assert_eq!(post.subscription_signature.as_deref(), Some("sig"));

        assert!(db.set_subscription_signature(id, "other").await.unwrap());
        let post = db.get_post(id).await.unwrap().unwrap();
        assert_eq!(post.subscription_signature.as_deref(), Some("other"));

        assert!(db.get_post(PostId::new(999)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn count_only_includes_approved() {
        let db = testing::db().await;
        let post = db.create_post("p", None).await.unwrap();
        db.insert_comment(&testing::comment(post, CommentId::ROOT, "a"))
            .await
            .unwrap();
        let mut held = testing::comment(post, CommentId::ROOT, "b");
        held.status = CommentStatus::Hold;
        db.insert_comment(&held).await.unwrap();

        // inserts never touch the cached count
        assert_eq!(db.get_post(post).await.unwrap().unwrap().comment_count, 0);
        assert_eq!(db.update_comment_count(post).await.unwrap(), 1);
    }
}

use crate::{models::SqlSubscription, Db};
use domain::{PostId, Subscription, SubscriptionId};

impl Db {
    pub async fn create_subscription(
        &self,
        post_id: PostId,
        target_url: &str,
        remote_post_id: PostId,
        signature: &str,
    ) -> anyhow::Result<SubscriptionId> {
        let id = sqlx::query(
            r#"
            INSERT INTO subscriptions (post_id, target_url, remote_post_id, signature, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(post_id.get())
        .bind(target_url)
        .bind(remote_post_id.get())
        .bind(signature)
        .bind(chrono::Utc::now().naive_utc())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(SubscriptionId::new(id))
    }

    pub async fn get_subscription(
        &self,
        id: SubscriptionId,
    ) -> anyhow::Result<Option<Subscription>> {
        let row = sqlx::query_as::<_, SqlSubscription>(
            r#"
            SELECT id, post_id, target_url, remote_post_id, signature
            FROM subscriptions
            WHERE id = ?
            "#,
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Subscriptions of a post in creation order.
    pub async fn list_subscriptions(&self, post_id: PostId) -> anyhow::Result<Vec<Subscription>> {
        let rows = sqlx::query_as::<_, SqlSubscription>(
            r#"
            SELECT id, post_id, target_url, remote_post_id, signature
            FROM subscriptions
            WHERE post_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(post_id.get())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

use crate::Db;
use domain::{CommentId, CommentMeta};
use serde_json::Value;
use sqlx::Row;

/// One stored metadata value. Rows sharing a key are ordered by `meta_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaRow {
    pub meta_id: i64,
    pub key: String,
    pub value: Value,
}

fn decode(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}

impl Db {
    pub async fn comment_meta_rows(&self, comment_id: CommentId) -> anyhow::Result<Vec<MetaRow>> {
        let rows = sqlx::query(
            r#"
            SELECT meta_id, meta_key, meta_value
            FROM comment_meta
            WHERE comment_id = ?
            ORDER BY meta_id ASC
            "#,
        )
        .bind(comment_id.get())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| MetaRow {
                meta_id: r.get(0),
                key: r.get(1),
                value: decode(r.get(2)),
            })
            .collect())
    }

    /// All metadata of a comment grouped by key.
    pub async fn get_comment_meta(&self, comment_id: CommentId) -> anyhow::Result<CommentMeta> {
        let mut meta = CommentMeta::new();
        for row in self.comment_meta_rows(comment_id).await? {
            meta.entry(row.key).or_default().push(row.value);
        }
        Ok(meta)
    }

    pub async fn add_comment_meta(
        &self,
        comment_id: CommentId,
        key: &str,
        value: &Value,
    ) -> anyhow::Result<i64> {
        let id = sqlx::query(
            "INSERT INTO comment_meta (comment_id, meta_key, meta_value) VALUES (?, ?, ?)",
        )
        .bind(comment_id.get())
        .bind(key)
        .bind(serde_json::to_string(value)?)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn update_meta_value(&self, meta_id: i64, value: &Value) -> anyhow::Result<()> {
        sqlx::query("UPDATE comment_meta SET meta_value = ? WHERE meta_id = ?")
            .bind(serde_json::to_string(value)?)
            .bind(meta_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Replaces every value of `key` with the single `value`.
    pub async fn set_single_meta(
        &self,
        comment_id: CommentId,
        key: &str,
        value: &Value,
    ) -> anyhow::Result<()> {
        self.delete_comment_meta(comment_id, key).await?;
        self.add_comment_meta(comment_id, key, value).await?;
        Ok(())
    }

    pub async fn delete_comment_meta(&self, comment_id: CommentId, key: &str) -> anyhow::Result<u64> {
        let res = sqlx::query("DELETE FROM comment_meta WHERE comment_id = ? AND meta_key = ?")
            .bind(comment_id.get())
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }
}

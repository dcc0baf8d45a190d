use chrono::NaiveDateTime;
use domain::{Comment, CommentId, Post, PostId, Subscription, SubscriptionId};
use sqlx::FromRow;

#[derive(FromRow)]
pub struct SqlComment {
    pub id: i64,
    pub post_id: i64,
    pub parent_id: i64,
    pub author_name: String,
    pub author_email: String,
    pub author_url: String,
    pub author_ip: String,
    pub created_at: NaiveDateTime,
    pub created_at_gmt: NaiveDateTime,
    pub content: String,
    pub karma: i64,
    pub status: String,
    pub agent: String,
    pub comment_type: String,
}

impl TryFrom<SqlComment> for Comment {
    type Error = anyhow::Error;

    fn try_from(sql: SqlComment) -> Result<Self, Self::Error> {
        Ok(Comment {
            id: CommentId::new(sql.id),
            post_id: PostId::new(sql.post_id),
            parent: CommentId::new(sql.parent_id),
            author_name: sql.author_name,
            author_email: sql.author_email,
            author_url: sql.author_url,
            author_ip: sql.author_ip,
            created_at: sql.created_at,
            created_at_gmt: sql.created_at_gmt,
            content: sql.content,
            karma: sql.karma,
            status: sql.status.parse()?,
            agent: sql.agent,
            comment_type: sql.comment_type,
        })
    }
}

#[derive(FromRow)]
pub struct SqlPost {
    pub id: i64,
    pub title: String,
    pub subscription_signature: Option<String>,
    pub comment_count: i64,
    pub created_at: NaiveDateTime,
}

impl From<SqlPost> for Post {
    fn from(sql: SqlPost) -> Self {
        Post {
            id: PostId::new(sql.id),
            title: sql.title,
            subscription_signature: sql.subscription_signature,
            comment_count: sql.comment_count,
            created_at: sql.created_at,
        }
    }
}

#[derive(FromRow)]
pub struct SqlSubscription {
    pub id: i64,
    pub post_id: i64,
    pub target_url: String,
    pub remote_post_id: i64,
    pub signature: String,
}

impl From<SqlSubscription> for Subscription {
    fn from(sql: SqlSubscription) -> Self {
        Subscription {
            id: SubscriptionId::new(sql.id),
            post_id: PostId::new(sql.post_id),
            target_url: sql.target_url,
            remote_post_id: PostId::new(sql.remote_post_id),
            signature: sql.signature,
        }
    }
}

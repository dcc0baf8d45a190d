use domain::protocol::decode_meta_value;
use domain::{CommentId, CommentMeta};
use std::collections::{HashMap, HashSet};
use storage::{Db, MetaRow};

/// Copies hub metadata onto a local comment.
///
/// A value at position `i` of a key overwrites the stored value at the same
/// position; positions beyond what is stored are appended. Stored values at
/// positions the hub did not send are left alone.
pub(crate) async fn merge_comment_meta(
    db: &Db,
    comment_id: CommentId,
    incoming: CommentMeta,
    denylist: &HashSet<String>,
) -> anyhow::Result<()> {
    let mut stored: HashMap<String, Vec<MetaRow>> = HashMap::new();
    for row in db.comment_meta_rows(comment_id).await? {
        stored.entry(row.key.clone()).or_default().push(row);
    }

    for (key, values) in incoming {
        if denylist.contains(&key) {
            continue;
        }
        let current = stored.remove(&key).unwrap_or_default();
        for (position, value) in values.into_iter().enumerate() {
            let value = decode_meta_value(value);
            match current.get(position) {
                Some(row) if decode_meta_value(row.value.clone()) == value => {}
                Some(row) => db.update_meta_value(row.meta_id, &value).await?,
                None => {
                    db.add_comment_meta(comment_id, &key, &value).await?;
                }
            }
        }
    }
    Ok(())
}

//! A hub and a destination talking over real HTTP.

mod common;

use chrono::NaiveDate;
use common::{router_for, SIGNATURE};
use domain::{Comment, CommentId, CommentStatus, Hooks, Notification, PostId, Transition};
use hub::{DispatchOutcome, Dispatcher, HttpTransport, Observer};
use std::{sync::Arc, time::Duration};
use storage::Db;

fn hub_comment(post_id: PostId, parent: CommentId, content: &str, status: CommentStatus) -> Comment {
    let at = NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    Comment {
        id: CommentId::ROOT,
        post_id,
        parent,
        author_name: "ana".into(),
        author_email: "ana@example.org".into(),
        author_url: String::new(),
        author_ip: "127.0.0.1".into(),
        created_at: at,
        created_at_gmt: at,
        content: content.into(),
        karma: 0,
        status,
        agent: String::new(),
        comment_type: "comment".into(),
    }
}

async fn serve_destination(db: Db) -> String {
    let (router, _notifications) = router_for(db);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn mirror(dest: &Db, origin: CommentId, hub_post: PostId) -> Comment {
    let local = dest
        .find_local_confirmed(origin, hub_post)
        .await
        .unwrap()
        .expect("comment was not mirrored");
    dest.get_comment(local).await.unwrap().unwrap()
}

#[tokio::test]
async fn thread_follows_the_hub() {
    let dest = Db::new("sqlite::memory:").await.unwrap();
    let dest_post = dest.create_post("mirror", Some(SIGNATURE)).await.unwrap();
    let dest_url = serve_destination(dest.clone()).await;

    let hub_db = Db::new("sqlite::memory:").await.unwrap();
    let hub_post = hub_db.create_post("original", None).await.unwrap();
    let root = hub_db
        .insert_comment(&hub_comment(hub_post, CommentId::ROOT, "root", CommentStatus::Approved))
        .await
        .unwrap();
    let reply = hub_db
        .insert_comment(&hub_comment(hub_post, root, "reply", CommentStatus::Approved))
        .await
        .unwrap();
    hub_db
        .insert_comment(&hub_comment(hub_post, root, "pending", CommentStatus::Hold))
        .await
        .unwrap();

    let live = hub_db
        .create_subscription(hub_post, &dest_url, dest_post, SIGNATURE)
        .await
        .unwrap();
    let dead = hub_db
        .create_subscription(hub_post, "http://127.0.0.1:1", PostId::new(1), "whatever")
        .await
        .unwrap();

    let hooks = Arc::new(Hooks::new());
    let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
    let observer = Observer::new(
        hub_db.clone(),
        Dispatcher::new(Arc::new(transport), hooks.clone(), 4),
        hooks,
    );

    // initial push only targets the new subscription
    let report = observer
        .handle(Notification::SubscriptionCreated {
            post_id: hub_post,
            subscription_id: live,
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.results.len(), 1);
    match &report.results[&live] {
        DispatchOutcome::Delivered(resp) => {
            assert_eq!(resp.status, 200);
            assert_eq!(resp.body["success"].as_array().unwrap().len(), 3);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let mirrored_root = mirror(&dest, root, hub_post).await;
    let mirrored_reply = mirror(&dest, reply, hub_post).await;
    assert_eq!(mirrored_root.post_id, dest_post);
    assert_eq!(mirrored_reply.parent, mirrored_root.id);
    assert_eq!(
        dest.get_post(dest_post).await.unwrap().unwrap().comment_count,
        2
    );

    // trash reaches the live destination while the dead one fails on its own
    hub_db
        .transition_comment(root, Transition::Trash)
        .await
        .unwrap();
    let report = observer
        .handle(Notification::CommentTrashed {
            post_id: hub_post,
            comment_id: root,
        })
        .await
        .unwrap()
        .unwrap();
    assert!(report.results[&live].is_delivered());
    assert!(matches!(report.results[&dead], DispatchOutcome::Failed(_)));
    assert_eq!(mirror(&dest, root, hub_post).await.status, CommentStatus::Trash);

    hub_db
        .transition_comment(root, Transition::Untrash)
        .await
        .unwrap();
    observer
        .handle(Notification::CommentUntrashed { comment_id: root })
        .await
        .unwrap();
    assert_eq!(
        mirror(&dest, root, hub_post).await.status,
        CommentStatus::Approved
    );

    // a bad signature is answered, not lost
    let mut forged = hub_db.get_subscription(live).await.unwrap().unwrap();
    forged.signature = "forged".into();
    let report = Dispatcher::new(
        Arc::new(HttpTransport::new(Duration::from_secs(5)).unwrap()),
        Arc::new(Hooks::new()),
        1,
    )
    .dispatch(
        &domain::PropagationEvent::for_ids(
            domain::EventKind::Delete,
            hub_post,
            vec![reply],
            None,
        ),
        &[forged],
    )
    .await;
    match &report.results[&live] {
        DispatchOutcome::Delivered(resp) => {
            assert_eq!(resp.status, 400);
            assert_eq!(resp.body["code"], "rest_post_invalid_subscription");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(dest
        .find_local_confirmed(reply, hub_post)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn late_approval_reaches_the_mirror() {
    let dest = Db::new("sqlite::memory:").await.unwrap();
    let dest_post = dest.create_post("mirror", Some(SIGNATURE)).await.unwrap();
    let dest_url = serve_destination(dest.clone()).await;

    let hub_db = Db::new("sqlite::memory:").await.unwrap();
    let hub_post = hub_db.create_post("original", None).await.unwrap();
    hub_db
        .create_subscription(hub_post, &dest_url, dest_post, SIGNATURE)
        .await
        .unwrap();

    let hooks = Arc::new(Hooks::new());
    let observer = Observer::new(
        hub_db.clone(),
        Dispatcher::new(
            Arc::new(HttpTransport::new(Duration::from_secs(5)).unwrap()),
            hooks.clone(),
            2,
        ),
        hooks,
    );
    let (tx, rx) = tokio::sync::mpsc::channel(8);
    let worker = tokio::spawn(hub::start(
        observer,
        rx,
        tokio_util::sync::CancellationToken::new(),
    ));

    // held on arrival, so nothing is pushed yet
    let held = hub_db
        .insert_comment(&hub_comment(hub_post, CommentId::ROOT, "wait", CommentStatus::Hold))
        .await
        .unwrap();
    tx.send(Notification::CommentInserted { comment_id: held })
        .await
        .unwrap();

    hub_db
        .transition_comment(held, Transition::Set(CommentStatus::Approved))
        .await
        .unwrap();
    tx.send(Notification::StatusChanged {
        post_id: hub_post,
        comment_id: held,
        status: CommentStatus::Approved,
    })
    .await
    .unwrap();
    drop(tx);
    worker.await.unwrap().unwrap();

    let mirrored = mirror(&dest, held, hub_post).await;
    assert_eq!(mirrored.status, CommentStatus::Approved);
    assert_eq!(mirrored.content, "wait");
    assert_eq!(
        dest.get_post(dest_post).await.unwrap().unwrap().comment_count,
        1
    );
}

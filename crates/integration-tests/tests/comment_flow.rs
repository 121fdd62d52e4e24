use domains::{DomainError, ModerationStatus, NotificationKind, Role};
use integration_tests::World;

#[tokio::test]
async fn test_new_comment_is_pending_counted_and_announced() {
    let world = World::new();
    let writer = world.member("writer");
    let reader = world.member("reader");
    let post = world.post(&writer, "Error handling");

    let c = world.comment(&post, &reader, "use thiserror").await;
    assert_eq!(c.status, ModerationStatus::Pending);
    assert_eq!(c.report_count, 0);
    assert_eq!(world.core.statistics.snapshot().await.unwrap().total_comments, 1);

    let inbox = world.inbox(&writer).await;
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationKind::Comment);
    assert_eq!(inbox[0].link, format!("/posts/{}#comment-{}", post.id, c.id));
    assert!(inbox[0].message.contains("reader"));
}

#[tokio::test]
async fn test_commenting_on_own_post_sends_nothing() {
    let world = World::new();
    let writer = world.member("writer");
    let post = world.post(&writer, "Monologue");

    world.comment(&post, &writer, "talking to myself").await;
    assert!(world.inbox(&writer).await.is_empty());
}

#[tokio::test]
async fn test_reply_reaches_parent_author() {
    let world = World::new();
    let writer = world.member("writer");
    let first = world.member("first");
    let second = world.member("second");
    let post = world.post(&writer, "Threads");
    let parent = world.comment(&post, &first, "top level").await;

    let reply = world
        .core
        .comments
        .create(post.id, second.id, "a reply", Some(parent.id))
        .await
        .unwrap();
    assert_eq!(reply.parent_id, Some(parent.id));

    let replies: Vec<_> = world
        .inbox(&first)
        .await
        .into_iter()
        .filter(|n| n.kind == NotificationKind::CommentReply)
        .collect();
    assert_eq!(replies.len(), 1);
    assert_eq!(world.inbox(&writer).await.len(), 2);
}

#[tokio::test]
async fn test_create_validates_input() {
    let world = World::new();
    let writer = world.member("writer");
    let post = world.post(&writer, "Validation");
    let comments = &world.core.comments;

    let blank = comments.create(post.id, writer.id, " \n ", None).await;
    assert!(matches!(blank, Err(DomainError::InvalidArgument(_))));

    let long = "y".repeat(1001);
    let oversized = comments.create(post.id, writer.id, &long, None).await;
    assert!(matches!(oversized, Err(DomainError::InvalidArgument(_))));

    let orphan = comments
        .create(post.id, writer.id, "reply", Some(domains::CommentId::new()))
        .await;
    assert!(matches!(orphan, Err(DomainError::NotFound("Comment", _))));

    let nowhere = comments.create(domains::PostId::new(), writer.id, "hi", None).await;
    assert!(matches!(nowhere, Err(DomainError::NotFound("Post", _))));

    assert_eq!(world.core.statistics.snapshot().await.unwrap().total_comments, 0);
}

#[tokio::test]
async fn test_edit_and_delete_permissions() {
    let world = World::new();
    let writer = world.member("writer");
    let other = world.member("other");
    let admin = world.user("root", &[Role::Admin]);
    let moderator = world.moderator("mod");
    let post = world.post(&writer, "Permissions");
    let c = world.comment(&post, &writer, "draft").await;
    let comments = &world.core.comments;

    assert!(matches!(
        comments.edit(c.id, other.id, "hijack").await,
        Err(DomainError::Forbidden(_))
    ));
    // moderating is not the same as owning
    assert!(matches!(
        comments.delete(c.id, moderator.id).await,
        Err(DomainError::Forbidden(_))
    ));

    let edited = comments.edit(c.id, writer.id, "final").await.unwrap();
    assert!(edited.is_edited);
    assert!(edited.edited_at.is_some());
    assert_eq!(edited.content, "final");

    comments.delete(c.id, admin.id).await.unwrap();
    assert!(matches!(comments.find(c.id).await, Err(DomainError::NotFound(..))));
    assert_eq!(world.core.statistics.snapshot().await.unwrap().total_comments, 0);
}

#[tokio::test]
async fn test_likes_notify_and_floor_at_zero() {
    let world = World::new();
    let writer = world.member("writer");
    let fan = world.member("fan");
    let post = world.post(&writer, "Likes");
    let c = world.comment(&post, &writer, "like me").await;
    let comments = &world.core.comments;

    let liked = comments.like(c.id, fan.id).await.unwrap();
    assert_eq!(liked.like_count, 1);
    comments.like(c.id, writer.id).await.unwrap();

    let likes: Vec<_> = world
        .inbox(&writer)
        .await
        .into_iter()
        .filter(|n| n.kind == NotificationKind::Like)
        .collect();
    assert_eq!(likes.len(), 1);

    for _ in 0..3 {
        comments.unlike(c.id, fan.id).await.unwrap();
    }
    assert_eq!(comments.find(c.id).await.unwrap().like_count, 0);
}

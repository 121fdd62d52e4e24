//! Wording and deep links for every notification the core emits.

use domains::{Comment, Notice, NotificationKind, PostSummary};

pub const MODERATION_LINK: &str = "/admin/moderation";

pub fn post_link(post: &PostSummary) -> String {
    format!("/posts/{}", post.id)
}

pub fn comment_link(comment: &Comment) -> String {
    format!("/posts/{}#comment-{}", comment.post_id, comment.id)
}

pub fn comment_approved(post: &PostSummary) -> Notice {
    Notice::new(
        NotificationKind::System,
        "Comment approved",
        format!("Your comment on '{}' has been approved.", post.title),
        post_link(post),
    )
}

pub fn comment_rejected(post: &PostSummary, reason: &str) -> Notice {
    Notice::new(
        NotificationKind::System,
        "Comment rejected",
        format!("Your comment on '{}' has been rejected. Reason: {reason}", post.title),
        post_link(post),
    )
}

pub fn comment_reported(post_title: &str, author_name: &str, reason: &str, report_count: u32) -> Notice {
    Notice::new(
        NotificationKind::System,
        "Comment reported",
        format!(
            "New report on a comment on '{post_title}'\n\
             Author: {author_name}\n\
             Reason: {reason}\n\
             Total reports: {report_count}"
        ),
        MODERATION_LINK,
    )
}

pub fn new_comment(commenter: &str, post: &PostSummary, comment: &Comment) -> Notice {
    Notice::new(
        NotificationKind::Comment,
        "New comment",
        format!("{commenter} commented on your post '{}'", post.title),
        comment_link(comment),
    )
}

pub fn comment_reply(commenter: &str, comment: &Comment) -> Notice {
    Notice::new(
        NotificationKind::CommentReply,
        "Reply to your comment",
        format!("{commenter} replied to your comment"),
        comment_link(comment),
    )
}

pub fn comment_liked(liker: &str, comment: &Comment) -> Notice {
    Notice::new(
        NotificationKind::Like,
        "New like on your comment",
        format!("{liker} liked your comment"),
        comment_link(comment),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{PostId, UserId};

    #[test]
    fn test_report_summary_mentions_everything() {
        let notice = comment_reported("Rust tips", "alice", "spam", 3);
        assert_eq!(notice.kind, NotificationKind::System);
        assert_eq!(notice.link, MODERATION_LINK);
        for needle in ["Rust tips", "alice", "spam", "3"] {
            assert!(notice.message.contains(needle), "missing {needle}");
        }
    }

    #[test]
    fn test_comment_link_targets_anchor() {
        let post = PostSummary {
            id: PostId::new(),
            title: "Hello".into(),
            author_id: UserId::new(),
        };
        let comment = Comment::new(post.id, UserId::new(), "hi", None);
        let notice = new_comment("bob", &post, &comment);
        assert_eq!(notice.link, format!("/posts/{}#comment-{}", post.id, comment.id));
        assert_eq!(notice.kind, NotificationKind::Comment);
    }
}

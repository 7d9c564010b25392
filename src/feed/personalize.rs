// "For You" selection - pure, no I/O
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

use crate::db::models::{PostWithAuthor, TagId, UserId};

/// Posts newer than this always qualify.
pub const RECENCY_WINDOW_HOURS: i64 = 24;

/// How many of the newest posts to show when nothing qualifies.
pub const FALLBACK_POST_COUNT: usize = 10;

/// Selects the posts a viewer should see, keeping the input order.
///
/// A post qualifies when its author is followed, when it carries a preferred
/// tag, or when it is younger than [`RECENCY_WINDOW_HOURS`]. Without any
/// preferences every post passes. If nothing qualifies, the first
/// [`FALLBACK_POST_COUNT`] posts of the input are returned instead.
pub fn personalize(
    mut posts: Vec<PostWithAuthor>,
    preferred_tag_ids: &HashSet<TagId>,
    followed_author_ids: &HashSet<UserId>,
    now: DateTime<Utc>,
) -> Vec<PostWithAuthor> {
    if preferred_tag_ids.is_empty() && followed_author_ids.is_empty() {
        return posts;
    }

    let cutoff = now - Duration::hours(RECENCY_WINDOW_HOURS);
    let qualifies = |p: &PostWithAuthor| {
        followed_author_ids.contains(&p.post.author_id)
            || p.tag_ids().any(|t| preferred_tag_ids.contains(t))
            || p.post.created_at > cutoff
    };

    if posts.iter().any(qualifies) {
        posts.retain(qualifies);
    } else {
        posts.truncate(FALLBACK_POST_COUNT);
    }
    posts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Post, PostId, PostTag};

    fn post(id: &str, author: &str, tags: &[&str], age: Duration, now: DateTime<Utc>) -> PostWithAuthor {
        let created_at = now - age;
        PostWithAuthor {
            post: Post {
                id: PostId::new(id),
                title: id.to_string(),
                description: String::new(),
                author_id: UserId::new(author),
                location: String::new(),
                latitude: None,
                longitude: None,
                image_urls: Vec::new(),
                created_at,
                updated_at: created_at,
            },
            author: None,
            tags: tags
                .iter()
                .map(|t| PostTag {
                    id: format!("{}-{}", id, t),
                    post_id: PostId::new(id),
                    tag_id: TagId::new(*t),
                    tag: None,
                })
                .collect(),
        }
    }

    fn ids(posts: &[PostWithAuthor]) -> Vec<&str> {
        posts.iter().map(|p| p.post.id.as_str()).collect()
    }

    fn tags(ids: &[&str]) -> HashSet<TagId> {
        ids.iter().map(|t| TagId::new(*t)).collect()
    }

    fn authors(ids: &[&str]) -> HashSet<UserId> {
        ids.iter().map(|a| UserId::new(*a)).collect()
    }

    fn old_posts(count: usize, now: DateTime<Utc>) -> Vec<PostWithAuthor> {
        (0..count)
            .map(|i| {
                post(
                    &format!("p{}", i),
                    "stranger",
                    &["music"],
                    Duration::days(3 + i as i64),
                    now,
                )
            })
            .collect()
    }

    #[test]
    fn no_preferences_returns_input_unchanged() {
        let now = Utc::now();
        let posts = old_posts(15, now);
        let result = personalize(posts.clone(), &HashSet::new(), &HashSet::new(), now);
        assert_eq!(result, posts);
    }

    #[test]
    fn tag_and_recency_rules_keep_input_order() {
        let now = Utc::now();
        let posts = vec![
            post("p2", "u2", &[], Duration::hours(2), now),
            post("p1", "u1", &["sports"], Duration::days(3), now),
            post("p3", "u3", &["music"], Duration::days(5), now),
        ];

        let result = personalize(posts, &tags(&["sports"]), &HashSet::new(), now);
        assert_eq!(ids(&result), vec!["p2", "p1"]);
    }

    #[test]
    fn followed_author_qualifies_without_tags() {
        let now = Utc::now();
        let posts = vec![
            post("a", "friend", &[], Duration::days(10), now),
            post("b", "stranger", &[], Duration::days(11), now),
        ];

        let result = personalize(posts, &HashSet::new(), &authors(&["friend"]), now);
        assert_eq!(ids(&result), vec!["a"]);
    }

    #[test]
    fn empty_selection_falls_back_to_first_ten() {
        let now = Utc::now();
        let posts = old_posts(15, now);
        let expected: Vec<String> = posts[..10].iter().map(|p| p.post.id.to_string()).collect();

        let result = personalize(posts, &tags(&["sports"]), &authors(&["friend"]), now);
        let got: Vec<String> = result.iter().map(|p| p.post.id.to_string()).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn fallback_with_fewer_than_ten_posts_returns_all() {
        let now = Utc::now();
        let posts = old_posts(3, now);
        let result = personalize(posts, &tags(&["sports"]), &HashSet::new(), now);
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn recency_window_boundary_is_exclusive() {
        let now = Utc::now();
        let posts = vec![
            post("edge", "u", &[], Duration::hours(RECENCY_WINDOW_HOURS), now),
            post("inside", "u", &[], Duration::hours(RECENCY_WINDOW_HOURS) - Duration::seconds(1), now),
            post("old", "u", &[], Duration::days(2), now),
        ];
        let result = personalize(posts, &tags(&["sports"]), &HashSet::new(), now);
        assert_eq!(ids(&result), vec!["inside"]);
    }

    #[test]
    fn post_matching_several_rules_appears_once() {
        let now = Utc::now();
        let posts = vec![post("p", "friend", &["sports", "music"], Duration::hours(1), now)];
        let result = personalize(posts, &tags(&["sports", "music"]), &authors(&["friend"]), now);
        assert_eq!(ids(&result), vec!["p"]);
    }

    #[test]
    fn empty_input_stays_empty() {
        let now = Utc::now();
        let result = personalize(Vec::new(), &tags(&["sports"]), &HashSet::new(), now);
        assert!(result.is_empty());
    }
}

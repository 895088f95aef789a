use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use uuid::Uuid;

use folio_core::domain::{NewPost, Post, PostChanges, PostFilter, User};
use folio_core::ports::{Clock, FavoriteRepository};
use folio_core::{DomainError, PostService, PostServiceConfig};
use folio_infra::InMemoryStore;

/// Advances one second per call so creation order is strictly increasing.
struct StepClock {
    ticks: AtomicI64,
}

impl Clock for StepClock {
    fn now(&self) -> DateTime<Utc> {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + TimeDelta::seconds(tick)
    }
}

struct Fixture {
    store: Arc<InMemoryStore>,
    service: PostService,
    alice: User,
    bob: User,
    carol: User,
}

async fn fixture() -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let alice = store
        .insert_user(User::new("alice".into(), "alice@example.com".into()))
        .await
        .unwrap();
    let bob = store
        .insert_user(User::new("bob".into(), "bob@example.com".into()))
        .await
        .unwrap();
    let carol = store
        .insert_user(User::new("carol".into(), "carol@example.com".into()))
        .await
        .unwrap();

    let clock = Arc::new(StepClock {
        ticks: AtomicI64::new(0),
    });
    let service = PostService::new(store.post_ports(clock), PostServiceConfig::default());

    Fixture {
        store,
        service,
        alice,
        bob,
        carol,
    }
}

fn new_post(title: &str, tags: &[&str]) -> NewPost {
    NewPost {
        title: title.to_string(),
        description: Some(format!("About {title}")),
        body: None,
        tag_list: Some(tags.iter().map(|t| t.to_string()).collect()),
    }
}

async fn create(f: &Fixture, author: &User, title: &str, tags: &[&str]) -> Post {
    f.service
        .create(author.id, new_post(title, tags))
        .await
        .unwrap()
}

fn ids(posts: &[Post]) -> Vec<Uuid> {
    posts.iter().map(|p| p.id).collect()
}

#[tokio::test]
async fn test_create_defaults_and_slug() {
    let f = fixture().await;

    let post = f
        .service
        .create(
            f.alice.id,
            NewPost {
                title: "Hello World".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(post.slug.starts_with("hello-world-"));
    assert!(post.tag_list.is_empty());
    assert_eq!(post.description, "");
    assert_eq!(post.body, "");
    assert_eq!(post.favorite_count, 0);
    assert_eq!(post.author_id, f.alice.id);

    let detail = f.service.get_by_slug(&post.slug).await.unwrap();
    assert_eq!(detail.post, post);
    assert!(detail.comments.is_empty());
}

#[tokio::test]
async fn test_create_rejects_unknown_author_and_blank_title() {
    let f = fixture().await;

    let err = f
        .service
        .create(Uuid::new_v4(), new_post("Orphan", &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound { entity_type: "user", .. }));

    let err = f
        .service
        .create(f.alice.id, new_post("   ", &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));
}

#[tokio::test]
async fn test_get_missing_post_is_not_found() {
    let f = fixture().await;

    let err = f.service.get_by_slug("nope").await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound { entity_type: "post", .. }));

    let err = f.service.get_comments("nope").await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));
}

#[tokio::test]
async fn test_update_merges_fields_and_keeps_slug() {
    let f = fixture().await;
    let post = create(&f, &f.alice, "Original", &["rust"]).await;

    let updated = f
        .service
        .update(
            &post.slug,
            PostChanges {
                title: Some("Renamed".into()),
                body: Some("New body".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.slug, post.slug);
    assert_eq!(updated.title, "Renamed");
    assert_eq!(updated.body, "New body");
    assert_eq!(updated.description, post.description);
    assert_eq!(updated.tag_list, post.tag_list);
    assert!(updated.updated_at > post.updated_at);
    assert_eq!(updated.created_at, post.created_at);
}

#[tokio::test]
async fn test_update_does_not_clobber_favorite_count() {
    let f = fixture().await;
    let post = create(&f, &f.alice, "Popular", &[]).await;
    f.service.favorite(f.bob.id, &post.slug).await.unwrap();

    let updated = f
        .service
        .update(
            &post.slug,
            PostChanges {
                description: Some("edited".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.favorite_count, 1);
}

#[tokio::test]
async fn test_delete_removes_post() {
    let f = fixture().await;
    let post = create(&f, &f.alice, "Short lived", &[]).await;

    f.service.delete(&post.slug).await.unwrap();

    assert!(matches!(
        f.service.get_by_slug(&post.slug).await,
        Err(DomainError::NotFound { .. })
    ));
    assert!(matches!(
        f.service.delete(&post.slug).await,
        Err(DomainError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_delete_cascades_favorite_edges() {
    let f = fixture().await;
    let post = create(&f, &f.alice, "Gone", &[]).await;
    f.service.favorite(f.bob.id, &post.slug).await.unwrap();

    f.service.delete(&post.slug).await.unwrap();

    assert_eq!(f.store.count_for_post(post.id).await.unwrap(), 0);
    let page = f
        .service
        .list_posts(&PostFilter {
            favorited: Some("bob".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total_count, 0);
}

#[tokio::test]
async fn test_comments_are_ordered_and_scoped() {
    let f = fixture().await;
    let post = create(&f, &f.alice, "Discussed", &[]).await;

    f.service.add_comment(&post.slug, "first").await.unwrap();
    let detail = f.service.add_comment(&post.slug, "second").await.unwrap();

    let bodies: Vec<&str> = detail.comments.iter().map(|c| c.body.as_str()).collect();
    assert_eq!(bodies, vec!["first", "second"]);
    assert!(detail.comments.iter().all(|c| c.post_id == post.id));
    assert!(detail.post.updated_at > post.updated_at);
    assert_eq!(f.service.get_comments(&post.slug).await.unwrap(), detail.comments);
}

#[tokio::test]
async fn test_delete_comment() {
    let f = fixture().await;
    let post = create(&f, &f.alice, "Discussed", &[]).await;
    let detail = f.service.add_comment(&post.slug, "remove me").await.unwrap();
    let comment_id = detail.comments[0].id;

    let detail = f
        .service
        .delete_comment(&post.slug, comment_id)
        .await
        .unwrap();
    assert!(detail.comments.is_empty());

    // A second delete is a no-op, not an error.
    let again = f
        .service
        .delete_comment(&post.slug, comment_id)
        .await
        .unwrap();
    assert_eq!(again, detail);
}

#[tokio::test]
async fn test_delete_comment_through_wrong_post_is_noop() {
    let f = fixture().await;
    let owner = create(&f, &f.alice, "Owner", &[]).await;
    let other = create(&f, &f.bob, "Other", &[]).await;
    let comment_id = f.service.add_comment(&owner.slug, "mine").await.unwrap().comments[0].id;
    let before = f.service.get_by_slug(&other.slug).await.unwrap();

    let after = f
        .service
        .delete_comment(&other.slug, comment_id)
        .await
        .unwrap();

    assert_eq!(after, before);
    let owner_comments = f.service.get_comments(&owner.slug).await.unwrap();
    assert_eq!(ids_of_comments(&owner_comments), vec![comment_id]);
}

fn ids_of_comments(comments: &[folio_core::domain::Comment]) -> Vec<Uuid> {
    comments.iter().map(|c| c.id).collect()
}

#[tokio::test]
async fn test_blank_comment_rejected() {
    let f = fixture().await;
    let post = create(&f, &f.alice, "Quiet", &[]).await;

    let err = f.service.add_comment(&post.slug, "  ").await.unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));
}

#[tokio::test]
async fn test_favorite_is_idempotent() {
    let f = fixture().await;
    let post = create(&f, &f.alice, "Likeable", &[]).await;

    let first = f.service.favorite(f.bob.id, &post.slug).await.unwrap();
    let second = f.service.favorite(f.bob.id, &post.slug).await.unwrap();

    assert_eq!(first.favorite_count, 1);
    assert_eq!(second.favorite_count, 1);
    assert_eq!(f.store.count_for_post(post.id).await.unwrap(), 1);
    assert!(f.service.is_favorited(f.bob.id, &post.slug).await.unwrap());
    assert!(!f.service.is_favorited(f.carol.id, &post.slug).await.unwrap());
}

#[tokio::test]
async fn test_unfavorite_never_goes_negative() {
    let f = fixture().await;
    let post = create(&f, &f.alice, "Ignored", &[]).await;

    let result = f.service.unfavorite(f.bob.id, &post.slug).await.unwrap();

    assert_eq!(result.favorite_count, 0);
    assert_eq!(result.updated_at, post.updated_at);
}

#[tokio::test]
async fn test_favorite_requires_existing_user_and_post() {
    let f = fixture().await;
    let post = create(&f, &f.alice, "Guarded", &[]).await;

    assert!(matches!(
        f.service.favorite(Uuid::new_v4(), &post.slug).await,
        Err(DomainError::NotFound { entity_type: "user", .. })
    ));
    assert!(matches!(
        f.service.favorite(f.bob.id, "missing").await,
        Err(DomainError::NotFound { entity_type: "post", .. })
    ));
}

#[tokio::test]
async fn test_counter_matches_edges_after_any_sequence() {
    let f = fixture().await;
    let post = create(&f, &f.alice, "Busy", &[]).await;
    let users = [&f.alice, &f.bob, &f.carol];

    // (user index, favorite?) pairs, including repeats in both directions.
    let steps = [
        (0, true),
        (1, true),
        (1, true),
        (2, false),
        (2, true),
        (0, false),
        (0, false),
        (1, false),
        (0, true),
    ];
    for (user, favorite) in steps {
        let user = users[user];
        if favorite {
            f.service.favorite(user.id, &post.slug).await.unwrap();
        } else {
            f.service.unfavorite(user.id, &post.slug).await.unwrap();
        }

        let checked = f.service.verify_favorite_count(&post.slug).await.unwrap();
        assert!(checked.favorite_count >= 0);
    }

    let final_post = f.service.verify_favorite_count(&post.slug).await.unwrap();
    assert_eq!(final_post.favorite_count, 2);
}

#[tokio::test]
async fn test_concurrent_favorites_count_once_per_user() {
    let f = fixture().await;
    let post = create(&f, &f.alice, "Contended", &[]).await;

    let mut handles = Vec::new();
    for user in [&f.alice, &f.bob, &f.carol] {
        for _ in 0..5 {
            let service = f.service.clone();
            let slug = post.slug.clone();
            let user_id = user.id;
            handles.push(tokio::spawn(async move {
                service.favorite(user_id, &slug).await
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let checked = f.service.verify_favorite_count(&post.slug).await.unwrap();
    assert_eq!(checked.favorite_count, 3);
}

#[tokio::test]
async fn test_list_filters_by_tag_and_orders_newest_first() {
    let f = fixture().await;
    let p1 = create(&f, &f.alice, "Rust post", &["rust"]).await;
    let p2 = create(&f, &f.bob, "Go post", &["go"]).await;

    let rust = f
        .service
        .list_posts(&PostFilter {
            tag: Some("rust".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(ids(&rust.posts), vec![p1.id]);
    assert_eq!(rust.total_count, 1);

    let all = f.service.list_posts(&PostFilter::default()).await.unwrap();
    assert_eq!(ids(&all.posts), vec![p2.id, p1.id]);
    assert_eq!(all.total_count, 2);
}

#[tokio::test]
async fn test_tag_filter_is_exact_membership() {
    let f = fixture().await;
    create(&f, &f.alice, "Rustacean", &["rustacean"]).await;

    let page = f
        .service
        .list_posts(&PostFilter {
            tag: Some("rust".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(page.posts.is_empty());
    assert_eq!(page.total_count, 0);
}

#[tokio::test]
async fn test_author_filter_paginates_with_total() {
    let f = fixture().await;
    create(&f, &f.alice, "First", &[]).await;
    let newest = create(&f, &f.alice, "Second", &[]).await;
    create(&f, &f.bob, "Not alice", &[]).await;

    let page = f
        .service
        .list_posts(&PostFilter {
            author: Some("alice".into()),
            limit: Some(1),
            offset: Some(0),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(ids(&page.posts), vec![newest.id]);
    assert_eq!(page.total_count, 2);
}

#[tokio::test]
async fn test_unknown_author_fails_whole_listing() {
    let f = fixture().await;
    create(&f, &f.alice, "Anything", &[]).await;

    let err = f
        .service
        .list_posts(&PostFilter {
            author: Some("nobody".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::NotFound { entity_type: "user", .. }));
}

#[tokio::test]
async fn test_favorited_filter_combines_with_tag() {
    let f = fixture().await;
    let rust = create(&f, &f.alice, "Rust", &["rust"]).await;
    let go = create(&f, &f.alice, "Go", &["go"]).await;
    create(&f, &f.alice, "Unliked rust", &["rust"]).await;
    f.service.favorite(f.carol.id, &rust.slug).await.unwrap();
    f.service.favorite(f.carol.id, &go.slug).await.unwrap();

    let favorited = f
        .service
        .list_posts(&PostFilter {
            favorited: Some("carol".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(ids(&favorited.posts), vec![go.id, rust.id]);

    let both = f
        .service
        .list_posts(&PostFilter {
            favorited: Some("carol".into()),
            tag: Some("rust".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(ids(&both.posts), vec![rust.id]);
    assert_eq!(both.total_count, 1);
}

#[tokio::test]
async fn test_feed_empty_when_following_nobody() {
    let f = fixture().await;
    create(&f, &f.alice, "Unseen", &[]).await;

    let feed = f
        .service
        .list_feed(f.carol.id, &PostFilter::default())
        .await
        .unwrap();

    assert!(feed.posts.is_empty());
    assert_eq!(feed.total_count, 0);
}

#[tokio::test]
async fn test_feed_shows_followed_authors_newest_first() {
    let f = fixture().await;
    let a1 = create(&f, &f.alice, "Alice one", &[]).await;
    create(&f, &f.carol, "Carol own", &[]).await;
    let b1 = create(&f, &f.bob, "Bob one", &[]).await;
    let a2 = create(&f, &f.alice, "Alice two", &[]).await;
    f.store.follow(f.carol.id, f.alice.id).await;
    f.store.follow(f.carol.id, f.bob.id).await;

    let feed = f
        .service
        .list_feed(f.carol.id, &PostFilter::default())
        .await
        .unwrap();
    assert_eq!(ids(&feed.posts), vec![a2.id, b1.id, a1.id]);
    assert_eq!(feed.total_count, 3);

    let page = f
        .service
        .list_feed(
            f.carol.id,
            &PostFilter {
                limit: Some(2),
                offset: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(ids(&page.posts), vec![b1.id, a1.id]);
    assert_eq!(page.total_count, 3);
}

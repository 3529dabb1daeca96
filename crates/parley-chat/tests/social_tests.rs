use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use parley_chat::{
    AppPhase, ChatError, ManualClock, MemoryStore, NewUser, PostDraft, Services, ToggleOutcome, UserStore,
};
use parley_types::models::Theme;

const OWNER: &str = "owner@x.com";
const FAN: &str = "fan.one@y.com";

fn setup() -> (Arc<MemoryStore>, Arc<ManualClock>, Services<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    for (email, first, last) in [(OWNER, "Olive", "Owner"), (FAN, "Fred", "Fan")] {
        store
            .add_user(NewUser {
                email: email.into(),
                first_name: first.into(),
                last_name: last.into(),
                profile_picture: None,
            })
            .unwrap();
    }
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()));
    let services = Services::new(store.clone(), clock.clone());
    (store, clock, services)
}

fn text_post(services: &Services<MemoryStore>, text: &str) -> parley_types::models::Post {
    services
        .social
        .create_post(OWNER, PostDraft::new(Some(text.into()), None, None).unwrap())
        .unwrap()
}

#[test]
fn post_carries_author_display_name() {
    let (_store, _clock, services) = setup();
    let post = text_post(&services, "first!");
    assert_eq!(post.author, OWNER);
    assert_eq!(post.author_name, "Olive Owner");
    assert_eq!(post.like_count, 0);
}

#[test]
fn feed_is_newest_first() {
    let (_store, clock, services) = setup();
    let older = text_post(&services, "older");
    clock.advance(Duration::minutes(5));
    let newer = text_post(&services, "newer");

    let feed = services.social.feed().unwrap();
    assert_eq!(feed.iter().map(|p| p.id).collect::<Vec<_>>(), vec![newer.id, older.id]);
    assert_eq!(services.social.posts_by(OWNER).unwrap().len(), 2);
    assert!(services.social.posts_by(FAN).unwrap().is_empty());
}

#[test]
fn double_like_returns_post_to_unliked_state() {
    let (_store, _clock, services) = setup();
    let post = text_post(&services, "like me");

    assert_eq!(services.social.toggle_like(FAN, post.id).unwrap(), ToggleOutcome::Added);
    let likes = services.social.likes(post.id).unwrap();
    assert_eq!(likes.len(), 1);
    assert_eq!(likes[0].liker_key, "fanoneycom");
    assert_eq!(likes[0].liker_name, "Fred Fan");

    assert_eq!(services.social.toggle_like(FAN, post.id).unwrap(), ToggleOutcome::Removed);
    assert!(services.social.likes(post.id).unwrap().is_empty());
    assert_eq!(services.social.feed().unwrap()[0].like_count, 0);
    assert!(services.social.notifications(OWNER).unwrap().recent.is_empty());
}

#[test]
fn like_notifies_post_author() {
    let (_store, _clock, services) = setup();
    let post = text_post(&services, "a pretty long post about many things that keeps going on");

    services.social.toggle_like(FAN, post.id).unwrap();

    let inbox = services.social.notifications(OWNER).unwrap();
    assert_eq!(inbox.recent.len(), 1);
    assert!(inbox.has_unseen());
    let n = &inbox.recent[0];
    assert_eq!(n.sender, FAN);
    assert_eq!(n.sender_name, "Fred Fan");
    assert_eq!(n.message, "recently liked your post: \"a pretty long post about many things that...\"");

    // The liker has no notifications of their own.
    assert!(services.social.notifications(FAN).unwrap().recent.is_empty());
}

#[test]
fn old_notifications_move_to_earlier() {
    let (_store, clock, services) = setup();
    let post = text_post(&services, "hi");
    services.social.toggle_like(FAN, post.id).unwrap();

    clock.advance(Duration::hours(25));
    let inbox = services.social.notifications(OWNER).unwrap();
    assert!(inbox.recent.is_empty());
    assert_eq!(inbox.earlier.len(), 1);
}

#[test]
fn only_recipient_touches_notification() {
    let (_store, _clock, services) = setup();
    let post = text_post(&services, "hi");
    services.social.toggle_like(FAN, post.id).unwrap();
    let id = services.social.notifications(OWNER).unwrap().recent[0].id;

    assert!(matches!(
        services.social.mark_notification_seen(FAN, id),
        Err(ChatError::NotRecipient)
    ));

    services.social.mark_notification_seen(OWNER, id).unwrap();
    let inbox = services.social.notifications(OWNER).unwrap();
    assert!(inbox.recent[0].seen);
    assert!(!inbox.has_unseen());

    services.social.delete_notification(OWNER, id).unwrap();
    assert!(matches!(
        services.social.delete_notification(OWNER, id),
        Err(ChatError::NotificationNotFound(_))
    ));
}

#[test]
fn liking_missing_post_fails() {
    let (_store, _clock, services) = setup();
    let err = services.social.toggle_like(FAN, uuid::Uuid::new_v4()).unwrap_err();
    assert!(matches!(err, ChatError::PostNotFound(_)));
}

#[test]
fn follow_toggles_and_lists() {
    let (_store, _clock, services) = setup();

    assert_eq!(services.social.toggle_follow(FAN, OWNER).unwrap(), ToggleOutcome::Added);
    assert_eq!(services.social.followers(OWNER).unwrap().len(), 1);
    assert_eq!(services.social.following(FAN).unwrap()[0].followee, OWNER);

    assert_eq!(services.social.toggle_follow(FAN, OWNER).unwrap(), ToggleOutcome::Removed);
    assert!(services.social.followers(OWNER).unwrap().is_empty());

    assert!(matches!(services.social.toggle_follow(FAN, FAN), Err(ChatError::SelfFollow)));
    assert!(matches!(
        services.social.toggle_follow(FAN, "ghost@x.com"),
        Err(ChatError::UserNotFound(_))
    ));
}

#[test]
fn presence_follows_app_phase() {
    let (store, _clock, services) = setup();

    let user = services.presence.transition(Some(FAN), AppPhase::Foreground).unwrap();
    assert!(user.active_status);
    assert!(store.user_by_email(FAN).unwrap().unwrap().active_status);

    services.presence.transition(Some(FAN), AppPhase::Background).unwrap();
    assert!(!store.user_by_email(FAN).unwrap().unwrap().active_status);
}

#[test]
fn presence_without_credential_fails() {
    let (_store, _clock, services) = setup();
    assert!(matches!(
        services.presence.transition(None, AppPhase::Foreground),
        Err(ChatError::MissingCredential)
    ));
    assert!(matches!(
        services.presence.transition(Some("nobody@x.com"), AppPhase::Foreground),
        Err(ChatError::UserNotFound(_))
    ));
}

#[test]
fn theme_defaults_to_light_and_accepts_flags() {
    let (_store, _clock, services) = setup();
    assert_eq!(services.preferences.theme(FAN).unwrap(), Theme::Light);

    assert_eq!(services.preferences.set_theme_flag(FAN, "On").unwrap(), Theme::Dark);
    assert_eq!(services.preferences.theme(FAN).unwrap(), Theme::Dark);
    assert_eq!(services.preferences.theme(OWNER).unwrap(), Theme::Light);

    assert!(matches!(
        services.preferences.set_theme_flag(FAN, "dark"),
        Err(ChatError::InvalidTheme(_))
    ));
}

#[test]
fn colliding_liker_keys_take_the_notification_with_the_like() {
    let (store, _clock, services) = setup();
    // Sanitizes to the same key as FAN.
    store
        .add_user(NewUser {
            email: "fanone@ycom".into(),
            first_name: "Other".into(),
            last_name: "Fan".into(),
            profile_picture: None,
        })
        .unwrap();
    let post = text_post(&services, "hi");

    assert_eq!(services.social.toggle_like(FAN, post.id).unwrap(), ToggleOutcome::Added);
    assert_eq!(services.social.notifications(OWNER).unwrap().recent.len(), 1);

    // The second account shares the key, so its toggle removes the first like
    // and the notification that announced it.
    assert_eq!(
        services.social.toggle_like("fanone@ycom", post.id).unwrap(),
        ToggleOutcome::Removed
    );
    assert!(services.social.likes(post.id).unwrap().is_empty());
    assert!(services.social.notifications(OWNER).unwrap().recent.is_empty());
}

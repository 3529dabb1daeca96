use std::sync::Arc;

use chrono::{TimeZone, Utc};

use parley_chat::{ChatError, ManualClock, MemoryStore, NewUser, ProfileEdit, Services};
use parley_types::models::{AccountStatus, PostKind};

const ALICE: &str = "alice@x.com";

fn setup() -> (Arc<MemoryStore>, Services<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    for (email, first, last) in [
        (ALICE, "Alice", "Anders"),
        ("albert@x.com", "Albert", "Zed"),
        ("zoe@y.com", "Zoe", "Alder"),
        ("bob@y.com", "Bob", "Marley"),
    ] {
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
    (store.clone(), Services::new(store, clock))
}

fn id_of(store: &MemoryStore, email: &str) -> uuid::Uuid {
    use parley_chat::UserStore;
    store.user_by_email(email).unwrap().unwrap().id
}

#[test]
fn verify_rejects_disabled_and_missing_accounts() {
    let (store, services) = setup();
    let alice = id_of(&store, ALICE);

    assert_eq!(services.accounts.verify(alice).unwrap().email, ALICE);

    store.set_account_status(alice, AccountStatus::Disabled).unwrap();
    assert!(matches!(services.accounts.verify(alice), Err(ChatError::AccountDisabled)));

    assert!(matches!(
        services.accounts.verify(uuid::Uuid::new_v4()),
        Err(ChatError::UserNotFound(_))
    ));
}

#[test]
fn profile_edit_updates_fields_and_keeps_the_rest() {
    let (_store, services) = setup();

    let user = services
        .accounts
        .update_profile(
            ALICE,
            ProfileEdit {
                last_name: Some("  Ng ".into()),
                bio: Some("climbs things".into()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(user.first_name, "Alice");
    assert_eq!(user.last_name, "Ng");
    assert_eq!(user.bio.as_deref(), Some("climbs things"));

    // A blank bio clears it; a blank name is refused.
    let user = services
        .accounts
        .update_profile(ALICE, ProfileEdit { bio: Some(" ".into()), ..Default::default() })
        .unwrap();
    assert_eq!(user.bio, None);
    assert!(matches!(
        services
            .accounts
            .update_profile(ALICE, ProfileEdit { first_name: Some("".into()), ..Default::default() }),
        Err(ChatError::InvalidProfile(_))
    ));

    // No post for plain field edits.
    assert!(services.social.feed().unwrap().is_empty());
}

#[test]
fn new_profile_picture_is_posted_once() {
    let (_store, services) = setup();
    let edit = ProfileEdit {
        profile_picture: Some("https://img.example/alice.png".into()),
        ..Default::default()
    };

    let user = services.accounts.update_profile(ALICE, edit.clone()).unwrap();
    assert_eq!(user.profile_picture.as_deref(), Some("https://img.example/alice.png"));

    let posts = services.social.posts_by(ALICE).unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].kind, PostKind::ProfilePic);
    assert_eq!(posts[0].image_url.as_deref(), Some("https://img.example/alice.png"));
    assert_eq!(posts[0].text, None);
    assert_eq!(posts[0].author_name, "Alice Anders");

    // Same picture again is not a change.
    services.accounts.update_profile(ALICE, edit).unwrap();
    assert_eq!(services.social.posts_by(ALICE).unwrap().len(), 1);
}

#[test]
fn unknown_user_cannot_edit_a_profile() {
    let (_store, services) = setup();
    assert!(matches!(
        services.accounts.update_profile("ghost@z.com", ProfileEdit::default()),
        Err(ChatError::UserNotFound(_))
    ));
    assert!(matches!(
        services.accounts.update_profile(" ", ProfileEdit::default()),
        Err(ChatError::MissingCredential)
    ));
}

#[test]
fn search_matches_first_or_last_name_prefix() {
    let (_store, services) = setup();
    let names = |q: &str| -> Vec<String> {
        services
            .accounts
            .search(q)
            .unwrap()
            .into_iter()
            .map(|u| u.display_name())
            .collect()
    };

    assert_eq!(names("al"), vec!["Albert Zed", "Alice Anders", "Zoe Alder"]);
    assert_eq!(names("ALI"), vec!["Alice Anders"]);
    assert_eq!(names("marl"), vec!["Bob Marley"]);
    // Prefix only, not substring.
    assert!(names("lic").is_empty());
    assert!(names("  ").is_empty());
}

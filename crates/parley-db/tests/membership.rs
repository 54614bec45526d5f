//! Store-level tests for group lifecycle, membership, and message bookkeeping.

use parley_db::{Database, StoreError};
use parley_types::perms::{Role, DEFAULT_MEMBER_PERMISSIONS};
use uuid::Uuid;

fn store() -> Database {
    Database::open_in_memory().unwrap()
}

fn seed_user(db: &Database, name: &str) -> String {
    let id = Uuid::new_v4().to_string();
    db.create_user(&id, &format!("{name}@example.com"), name, "argon2-hash")
        .unwrap();
    id
}

#[test]
fn create_group_seeds_exactly_one_creator() {
    let db = store();
    let ada = seed_user(&db, "ada");

    let group = db.create_group(&ada, "Test Group", None, false).unwrap();
    assert_eq!(group.slug, "test-group");
    assert!(group.invite_code.starts_with("INV-"));
    assert_eq!(group.invite_code.len(), 12);

    let members = db.list_members(&group.id).unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user_id, ada);
    assert_eq!(members[0].role, Role::Creator);
    assert_eq!(members[0].permissions, Role::Creator.template());
}

#[test]
fn duplicate_group_name_gets_a_disambiguated_slug() {
    let db = store();
    let ada = seed_user(&db, "ada");

    let first = db.create_group(&ada, "Book Club", None, false).unwrap();
    let second = db.create_group(&ada, "Book Club", None, false).unwrap();

    assert_eq!(first.slug, "book-club");
    assert_ne!(second.slug, first.slug);
    assert!(second.slug.starts_with("book-club-"));
}

#[test]
fn create_group_rejects_unknown_creator() {
    let db = store();
    let err = db
        .create_group(&Uuid::new_v4().to_string(), "Ghost Group", None, false)
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound("user")));
}

#[test]
fn join_by_invite_code_yields_default_member() {
    let db = store();
    let ada = seed_user(&db, "ada");
    let bob = seed_user(&db, "bob");

    let group = db.create_group(&ada, "Chess", None, true).unwrap();
    let found = db.find_group_by_ref(&group.invite_code).unwrap().unwrap();
    assert_eq!(found.id, group.id);

    let member = db.insert_member(&bob, &found.id, Role::Member).unwrap();
    assert_eq!(member.role, Role::Member);
    assert_eq!(member.permissions, DEFAULT_MEMBER_PERMISSIONS);
    assert_eq!(db.member_count(&group.id).unwrap(), 2);
}

#[test]
fn group_resolves_by_id_slug_and_code() {
    let db = store();
    let ada = seed_user(&db, "ada");
    let group = db.create_group(&ada, "Lindy Hop", None, false).unwrap();

    for reference in [&group.id, &group.slug, &group.invite_code] {
        let found = db.find_group_by_ref(reference).unwrap().unwrap();
        assert_eq!(found.id, group.id);
    }
    assert!(db.find_group_by_ref("no-such-group").unwrap().is_none());
}

#[test]
fn joining_twice_is_a_conflict_and_leaves_state_unchanged() {
    let db = store();
    let ada = seed_user(&db, "ada");
    let bob = seed_user(&db, "bob");
    let group = db.create_group(&ada, "Chess", None, false).unwrap();

    db.insert_member(&bob, &group.id, Role::Member).unwrap();
    let err = db.insert_member(&bob, &group.id, Role::Member).unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    assert_eq!(db.member_count(&group.id).unwrap(), 2);
}

#[test]
fn promote_assigns_admin_template() {
    let db = store();
    let ada = seed_user(&db, "ada");
    let bob = seed_user(&db, "bob");
    let group = db.create_group(&ada, "Chess", None, false).unwrap();
    db.insert_member(&bob, &group.id, Role::Member).unwrap();

    let promoted = db.set_member_role(&bob, &group.id, Role::Admin).unwrap();
    assert_eq!(promoted.role, Role::Admin);
    assert_eq!(promoted.permissions, Role::Admin.template());
}

#[test]
fn demote_restores_the_member_template() {
    let db = store();
    let ada = seed_user(&db, "ada");
    let bob = seed_user(&db, "bob");
    let group = db.create_group(&ada, "Chess", None, false).unwrap();
    db.insert_member(&bob, &group.id, Role::Member).unwrap();

    // Custom flags granted while a member are wiped by the promote/demote
    // cycle; templates are canonical.
    let patch = serde_json::from_str(r#"{"manageTopics": true}"#).unwrap();
    db.update_member_permissions(&bob, &group.id, &patch).unwrap();

    db.set_member_role(&bob, &group.id, Role::Admin).unwrap();
    let demoted = db.set_member_role(&bob, &group.id, Role::Member).unwrap();
    assert_eq!(demoted.role, Role::Member);
    assert_eq!(demoted.permissions, DEFAULT_MEMBER_PERMISSIONS);
}

#[test]
fn creator_membership_is_immutable() {
    let db = store();
    let ada = seed_user(&db, "ada");
    let bob = seed_user(&db, "bob");
    let group = db.create_group(&ada, "Chess", None, false).unwrap();
    db.insert_member(&bob, &group.id, Role::Member).unwrap();

    // Cannot remove, demote, or retarget the creator.
    assert!(matches!(
        db.remove_member(&ada, &group.id).unwrap_err(),
        StoreError::CreatorImmutable
    ));
    assert!(matches!(
        db.set_member_role(&ada, &group.id, Role::Member).unwrap_err(),
        StoreError::CreatorImmutable
    ));
    // Cannot promote anyone *to* creator either.
    assert!(matches!(
        db.set_member_role(&bob, &group.id, Role::Creator).unwrap_err(),
        StoreError::CreatorImmutable
    ));

    let creator = db.get_member(&ada, &group.id).unwrap().unwrap();
    assert_eq!(creator.role, Role::Creator);
    assert_eq!(db.member_count(&group.id).unwrap(), 2);
}

#[test]
fn permission_patch_overlays_only_named_flags() {
    let db = store();
    let ada = seed_user(&db, "ada");
    let bob = seed_user(&db, "bob");
    let group = db.create_group(&ada, "Chess", None, false).unwrap();
    db.insert_member(&bob, &group.id, Role::Member).unwrap();

    let patch = serde_json::from_str(r#"{"createTopics": true, "sendMessage": false}"#).unwrap();
    let updated = db.update_member_permissions(&bob, &group.id, &patch).unwrap();

    assert!(updated.permissions.create_topics);
    assert!(!updated.permissions.send_message);
    // Flags absent from the patch keep their template values.
    assert!(updated.permissions.invite_members);
    assert!(!updated.permissions.manage_members);
}

#[test]
fn reactions_are_idempotent_per_user_and_emoji() {
    let db = store();
    let ada = seed_user(&db, "ada");
    let group = db.create_group(&ada, "Chess", None, false).unwrap();
    let msg = Uuid::new_v4().to_string();
    db.insert_message(&msg, &group.id, &ada, "gg", "TEXT", None, None)
        .unwrap();

    assert!(db.add_reaction(&msg, &ada, "👍").unwrap());
    assert!(!db.add_reaction(&msg, &ada, "👍").unwrap());
    // A different emoji from the same user is a separate reaction.
    assert!(db.add_reaction(&msg, &ada, "🔥").unwrap());

    let rows = db.reactions_for_messages(&[msg.clone()]).unwrap();
    assert_eq!(rows.len(), 2);

    assert!(db.remove_reaction(&msg, &ada, "👍").unwrap());
    assert!(!db.remove_reaction(&msg, &ada, "👍").unwrap());
}

#[test]
fn marking_seen_twice_keeps_one_receipt() {
    let db = store();
    let ada = seed_user(&db, "ada");
    let group = db.create_group(&ada, "Chess", None, false).unwrap();
    let msg = Uuid::new_v4().to_string();
    db.insert_message(&msg, &group.id, &ada, "hello", "TEXT", None, None)
        .unwrap();

    db.mark_seen(&msg, &ada).unwrap();
    db.mark_seen(&msg, &ada).unwrap();

    let rows = db.seen_for_messages(&[msg]).unwrap();
    assert_eq!(rows.len(), 1);
}

#[test]
fn soft_deleted_messages_keep_their_row() {
    let db = store();
    let ada = seed_user(&db, "ada");
    let group = db.create_group(&ada, "Chess", None, false).unwrap();
    let msg = Uuid::new_v4().to_string();
    db.insert_message(&msg, &group.id, &ada, "typo", "TEXT", None, None)
        .unwrap();

    db.soft_delete_message(&msg).unwrap();

    let row = db.get_message(&msg).unwrap().unwrap();
    assert!(row.deleted);
    assert_eq!(row.content, "");

    // A deleted message is no longer editable.
    let err = db.update_message_content(&msg, "fixed").unwrap_err();
    assert!(matches!(err, StoreError::NotFound("message")));
}

#[test]
fn message_pagination_walks_backwards_in_time() {
    let db = store();
    let ada = seed_user(&db, "ada");
    let group = db.create_group(&ada, "Chess", None, false).unwrap();

    for i in 0..5 {
        let id = Uuid::new_v4().to_string();
        db.insert_message(&id, &group.id, &ada, &format!("m{i}"), "TEXT", None, None)
            .unwrap();
        // Space rows out so created_at ordering is strict.
        std::thread::sleep(std::time::Duration::from_millis(5));
    }

    let page = db.list_messages(&group.id, 3, None).unwrap();
    assert!(page.len() <= 3);
    for pair in page.windows(2) {
        assert!(pair[0].created_at >= pair[1].created_at);
    }
}

#[test]
fn delete_group_cascades_through_every_table() {
    let db = store();
    let ada = seed_user(&db, "ada");
    let bob = seed_user(&db, "bob");
    let group = db.create_group(&ada, "Chess", None, false).unwrap();
    db.insert_member(&bob, &group.id, Role::Member).unwrap();
    db.create_topic(&group.id, "Openings", &ada).unwrap();

    let msg = Uuid::new_v4().to_string();
    db.insert_message(&msg, &group.id, &bob, "e4", "TEXT", None, None)
        .unwrap();
    db.add_reaction(&msg, &ada, "👍").unwrap();
    db.mark_seen(&msg, &ada).unwrap();

    db.delete_group(&group.id).unwrap();

    assert!(db.get_group(&group.id).unwrap().is_none());
    assert_eq!(db.member_count(&group.id).unwrap(), 0);
    assert!(db.list_topics(&group.id).unwrap().is_empty());
    assert!(db.list_messages(&group.id, 10, None).unwrap().is_empty());
    assert!(db.reactions_for_messages(&[msg.clone()]).unwrap().is_empty());
    assert!(db.seen_for_messages(&[msg]).unwrap().is_empty());

    // Deleting again reports not found.
    assert!(matches!(
        db.delete_group(&group.id).unwrap_err(),
        StoreError::NotFound("group")
    ));
}

#[test]
fn duplicate_email_registration_is_a_conflict() {
    let db = store();
    seed_user(&db, "ada");
    let err = db
        .create_user(
            &Uuid::new_v4().to_string(),
            "ada@example.com",
            "ada2",
            "argon2-hash",
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[test]
fn database_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("parley.db");

    let ada = {
        let db = Database::open(&path).unwrap();
        let ada = seed_user(&db, "ada");
        db.create_group(&ada, "Durable", None, false).unwrap();
        ada
    };

    let db = Database::open(&path).unwrap();
    let groups = db.list_groups_for_user(&ada).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].slug, "durable");
}

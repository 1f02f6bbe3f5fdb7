//! End-to-end repository behavior against the in-memory collection

use std::sync::Arc;

use acton_repository::prelude::*;
use acton_repository::repository::RepositoryOperation;
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct User {
    #[serde(rename = "_id")]
    id: i64,
    name: String,
    email: String,
    age: i32,
    deleted_at: i64,
}

impl Entity<i64> for User {
    fn fields() -> &'static [EntityField] {
        const FIELDS: &[EntityField] = &[
            EntityField::new("ID").with_storage("_id"),
            EntityField::new("Name").with_storage("name"),
            EntityField::new("Email").with_storage("email"),
            EntityField::new("Age").with_storage("age"),
            EntityField::new("DeletedAt").with_storage("deleted_at"),
        ];
        FIELDS
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Tag {
    #[serde(rename = "_id")]
    id: i64,
    name: String,
}

impl Entity<i64> for Tag {
    fn fields() -> &'static [EntityField] {
        const FIELDS: &[EntityField] = &[
            EntityField::new("ID").with_storage("_id"),
            EntityField::new("Name").with_storage("name"),
        ];
        FIELDS
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Article {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    title: String,
}

impl Entity<Option<ObjectId>> for Article {
    fn fields() -> &'static [EntityField] {
        const FIELDS: &[EntityField] = &[
            EntityField::new("ID").with_storage("_id"),
            EntityField::new("Title").with_storage("title"),
        ];
        FIELDS
    }

    fn id(&self) -> Option<ObjectId> {
        self.id
    }

    fn set_id(&mut self, id: Option<ObjectId>) {
        self.id = id;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Account {
    uid: String,
    owner: String,
}

impl Entity<String> for Account {
    fn fields() -> &'static [EntityField] {
        const FIELDS: &[EntityField] = &[
            EntityField::new("Id").with_storage("uid"),
            EntityField::new("Owner").with_storage("owner"),
        ];
        FIELDS
    }

    fn id(&self) -> String {
        self.uid.clone()
    }

    fn set_id(&mut self, id: String) {
        self.uid = id;
    }
}

fn is_unset(id: &i64) -> bool {
    *id == 0
}

/// Numeric id that is left to the store when unset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Counter {
    #[serde(rename = "_id", skip_serializing_if = "is_unset")]
    id: i64,
    value: i64,
}

impl Entity<i64> for Counter {
    fn fields() -> &'static [EntityField] {
        const FIELDS: &[EntityField] = &[
            EntityField::new("ID").with_storage("_id"),
            EntityField::new("Value").with_storage("value"),
        ];
        FIELDS
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

fn users() -> (Arc<MemoryCollection>, DocumentRepository<i64, User>) {
    let collection = Arc::new(MemoryCollection::new("users"));
    let repository = DocumentRepository::new(collection.clone()).expect("valid entity");
    (collection, repository)
}

fn tags() -> DocumentRepository<i64, Tag> {
    DocumentRepository::with_collection(MemoryCollection::new("tags")).expect("valid entity")
}

fn user(id: i64, name: &str) -> User {
    User {
        id,
        name: name.to_string(),
        email: format!("{}@example.com", name),
        age: 20 + id as i32,
        deleted_at: 0,
    }
}

async fn seed(repository: &DocumentRepository<i64, User>, count: i64) {
    for id in 1..=count {
        repository
            .create(&mut user(id, &format!("user{}", id)))
            .await
            .expect("create");
    }
}

#[tokio::test]
async fn create_then_find_by_id_round_trips() {
    let (_, repository) = users();
    let mut ada = user(1, "ada");

    let id = repository.create(&mut ada).await.expect("create");
    assert_eq!(id, 1);

    let found = repository.find_by_id(&1).await.expect("find");
    assert_eq!(found, ada);
}

#[tokio::test]
async fn duplicate_create_is_duplicated_key() {
    let (_, repository) = users();
    repository.create(&mut user(1, "ada")).await.expect("first create");

    let err = repository
        .create(&mut user(1, "grace"))
        .await
        .expect_err("same id");
    assert!(err.is_duplicated_key());
    assert_eq!(err.operation, RepositoryOperation::Create);
    assert_eq!(err.entity_type.as_deref(), Some("User"));
    assert_eq!(err.entity_id.as_deref(), Some("1"));
    assert_eq!(
        err.store_error().map(|e| e.kind),
        Some(StoreErrorKind::DuplicateKey)
    );
}

#[tokio::test]
async fn create_writes_generated_id_back() {
    let repository =
        DocumentRepository::<Option<ObjectId>, Article>::with_collection(MemoryCollection::new("articles"))
            .expect("valid entity");
    let mut article = Article {
        id: None,
        title: "Hello".to_string(),
    };

    let id = repository.create(&mut article).await.expect("create");
    assert!(id.is_some());
    assert_eq!(article.id, id);

    let found = repository.find_by_id(&id).await.expect("find");
    assert_eq!(found.title, "Hello");
}

#[tokio::test]
async fn create_uses_entity_value_for_custom_id_field() {
    let repository = DocumentRepository::<String, Account>::with_collection(
        MemoryCollection::new("accounts").with_unique_index("uid"),
    )
    .expect("valid entity");
    assert_eq!(repository.id_field(), "uid");

    let mut account = Account {
        uid: "acc-1".to_string(),
        owner: "ada".to_string(),
    };
    let id = repository.create(&mut account).await.expect("create");
    assert_eq!(id, "acc-1");
    assert_eq!(account.uid, "acc-1");

    let found = repository
        .find_by_id(&"acc-1".to_string())
        .await
        .expect("find");
    assert_eq!(found.owner, "ada");

    let err = repository
        .create(&mut account.clone())
        .await
        .expect_err("uid is unique");
    assert!(err.is_duplicated_key());
}

#[tokio::test]
async fn generated_id_of_wrong_type_is_serialization_error() {
    let repository = DocumentRepository::<i64, Counter>::with_collection(MemoryCollection::new("counters"))
        .expect("valid entity");
    let mut counter = Counter { id: 0, value: 3 };

    let err = repository
        .create(&mut counter)
        .await
        .expect_err("ObjectId is not an i64");
    assert_eq!(err.kind, RepositoryErrorKind::Serialization);
    assert!(err.message.contains("unexpected type"));
    assert_eq!(counter.id, 0);
}

#[tokio::test]
async fn find_by_id_missing_is_not_found() {
    let (_, repository) = users();
    let err = repository.find_by_id(&42).await.expect_err("empty collection");
    assert!(err.is_not_found());
    assert_eq!(err.operation, RepositoryOperation::FindById);
    assert_eq!(err.entity_id.as_deref(), Some("42"));
    assert_eq!(
        err.store_error().map(|e| e.kind),
        Some(StoreErrorKind::NoDocuments)
    );
}

#[tokio::test]
async fn find_one_respects_orders() {
    let (_, repository) = users();
    seed(&repository, 3).await;

    let oldest = repository
        .find_one(doc! {}, &[Order::desc("age")])
        .await
        .expect("find");
    assert_eq!(oldest.id, 3);

    let youngest_over_21 = repository
        .find_one(doc! { "age": { "$gt": 21 } }, &[Order::signed("age", 1)])
        .await
        .expect("find");
    assert_eq!(youngest_over_21.id, 2);

    let err = repository
        .find_one(doc! { "name": "nobody" }, &[])
        .await
        .expect_err("no match");
    assert!(err.is_not_found());
}

#[tokio::test]
async fn soft_delete_hides_records_until_unscoped() {
    let (collection, repository) = users();
    seed(&repository, 2).await;
    assert!(repository.soft_delete_enabled());
    assert_eq!(repository.soft_delete_field(), Some("deleted_at"));

    repository.delete_by_id(&1).await.expect("delete");

    let err = repository.find_by_id(&1).await.expect_err("hidden");
    assert!(err.is_not_found());

    let unscoped = repository.unscoped();
    assert!(unscoped.is_unscoped());
    assert!(!repository.is_unscoped());

    let deleted = unscoped.find_by_id(&1).await.expect("still stored");
    assert!(deleted.deleted_at > 0);
    assert_eq!(deleted.name, "user1");

    assert_eq!(repository.count().await.expect("count"), 1);
    assert_eq!(unscoped.count().await.expect("count"), 2);
    assert_eq!(collection.len().await, 2);
}

#[tokio::test]
async fn documents_without_soft_delete_field_are_visible() {
    let (collection, repository) = users();
    collection
        .insert_one(doc! { "_id": 9_i64, "name": "legacy", "email": "", "age": 1, "deleted_at": 0_i64 })
        .await
        .expect("insert");
    collection
        .insert_one(doc! { "_id": 10_i64, "name": "older", "email": "", "age": 1 })
        .await
        .expect("insert");

    assert_eq!(repository.count().await.expect("count"), 2);
    assert!(repository.exists_by_id(&10).await.expect("exists"));
}

#[tokio::test]
async fn two_documents_hard_delete_mode() {
    let repository = tags();
    assert!(!repository.soft_delete_enabled());
    assert_eq!(repository.soft_delete_field(), None);

    for (id, name) in [(1, "a"), (2, "b")] {
        repository
            .create(&mut Tag {
                id,
                name: name.to_string(),
            })
            .await
            .expect("create");
    }

    let found = repository
        .find_by_filter(doc! { "name": "a" })
        .await
        .expect("find");
    assert_eq!(found.len(), 1);
    assert!(found.contains(&1));

    assert_eq!(repository.count().await.expect("count"), 2);
    repository.delete_all().await.expect("delete");
    assert_eq!(repository.count().await.expect("count"), 0);
    assert!(repository.unscoped().find_all().await.expect("find").is_empty());
}

#[tokio::test]
async fn two_documents_soft_delete_mode() {
    let (collection, repository) = users();
    repository.create(&mut user(1, "a")).await.expect("create");
    repository.create(&mut user(2, "b")).await.expect("create");

    let found = repository
        .find_by_filter(doc! { "name": "a" })
        .await
        .expect("find");
    assert_eq!(found.ids(), vec![1]);

    assert_eq!(repository.count().await.expect("count"), 2);
    repository.delete_all().await.expect("delete");

    assert_eq!(repository.count().await.expect("count"), 0);
    assert!(repository.find_all().await.expect("find").is_empty());
    assert_eq!(repository.unscoped().count().await.expect("count"), 2);

    let everything = repository.unscoped().find_all().await.expect("find");
    assert_eq!(everything.len(), 2);
    assert!(everything.iter().all(|u| u.deleted_at > 0));
    assert_eq!(collection.len().await, 2);
}

#[tokio::test]
async fn unscoped_delete_removes_physically_with_raw_filter() {
    let (collection, repository) = users();
    seed(&repository, 3).await;
    repository.delete_by_id(&1).await.expect("soft delete");

    // The soft-deleted record matches too: no visibility clause on removal
    repository
        .unscoped()
        .delete(doc! { "age": { "$lt": 23 } })
        .await
        .expect("hard delete");

    assert_eq!(collection.len().await, 1);
    assert_eq!(repository.count().await.expect("count"), 1);
    assert!(repository.exists_by_id(&3).await.expect("exists"));
}

#[tokio::test]
async fn find_by_ids_reports_partial_matches() {
    let (_, repository) = users();
    seed(&repository, 3).await;
    repository.delete_by_id(&3).await.expect("delete");

    let found = repository.find_by_ids(&[1, 3, 7, 1]).await.expect("find");
    assert_eq!(found.len(), 1);
    assert_eq!(found.get(&1).map(|u| u.name.as_str()), Some("user1"));
    assert!(found.get(&3).is_none());

    let unscoped = repository.unscoped().find_by_ids(&[1, 3]).await.expect("find");
    assert_eq!(unscoped.len(), 2);

    assert!(repository.find_by_ids(&[]).await.expect("empty").is_empty());
}

#[tokio::test]
async fn exists_variants() {
    let (_, repository) = users();
    seed(&repository, 3).await;
    repository.delete_by_id(&2).await.expect("delete");

    assert!(repository.exists(doc! { "name": "user1" }).await.expect("exists"));
    assert!(!repository.exists(doc! { "name": "user2" }).await.expect("exists"));
    assert!(repository
        .unscoped()
        .exists(doc! { "name": "user2" })
        .await
        .expect("exists"));
    assert!(!repository.exists_by_id(&99).await.expect("exists"));

    let exists = repository.exists_by_ids(&[1, 2, 3, 4]).await.expect("exists");
    assert_eq!(exists.len(), 2);
    assert!(exists.exists(&1));
    assert!(!exists.exists(&2));
    assert!(exists.exists(&3));
    assert!(!exists.exists(&4));
    assert!(!exists.contains_key(&4));

    assert!(repository.exists_by_ids(&[]).await.expect("empty").is_empty());
}

#[tokio::test]
async fn update_non_zero_leaves_other_fields_alone() {
    let (_, repository) = users();
    repository.create(&mut user(1, "ada")).await.expect("create");

    let patch = User {
        name: "Ada Lovelace".to_string(),
        ..User::default()
    };
    repository
        .update_non_zero_by_id(&1, &patch)
        .await
        .expect("update");

    let stored = repository.find_by_id(&1).await.expect("find");
    assert_eq!(stored.name, "Ada Lovelace");
    assert_eq!(stored.email, "ada@example.com");
    assert_eq!(stored.age, 21);
    assert_eq!(stored.deleted_at, 0);

    repository
        .update_non_zero(doc! { "age": 21 }, &User {
            age: 36,
            ..User::default()
        })
        .await
        .expect("update");
    let stored = repository.find_by_id(&1).await.expect("find");
    assert_eq!(stored.age, 36);
    assert_eq!(stored.name, "Ada Lovelace");
}

#[tokio::test]
async fn update_sets_fields_on_visible_records_only() {
    let (_, repository) = users();
    seed(&repository, 3).await;
    repository.delete_by_id(&3).await.expect("delete");

    repository
        .update(doc! {}, doc! { "email": "redacted" })
        .await
        .expect("update");
    repository
        .update_by_id(&1, doc! { "name": "first" })
        .await
        .expect("update");

    let redacted = repository
        .count_by_filter(doc! { "email": "redacted" })
        .await
        .expect("count");
    assert_eq!(redacted, 2);

    let hidden = repository.unscoped().find_by_id(&3).await.expect("find");
    assert_eq!(hidden.email, "user3@example.com");
    assert_eq!(repository.find_by_id(&1).await.expect("find").name, "first");
}

#[tokio::test]
async fn pagination_follows_requested_order() {
    let (_, repository) = users();
    seed(&repository, 5).await;

    for offset in 0..5_u64 {
        let page = repository
            .find_by_page(1, offset, &[Order::asc("_id")])
            .await
            .expect("page");
        assert_eq!(page.ids(), vec![offset as i64 + 1]);
    }

    let descending = repository
        .find_by_page(2, 1, &[Order::desc("age")])
        .await
        .expect("page");
    assert_eq!(descending.ids(), vec![4, 3]);

    let unordered = repository.find_by_page(1, 2, &[]).await.expect("page");
    assert_eq!(unordered.len(), 1);

    let past_the_end = repository.find_by_page(10, 5, &[]).await.expect("page");
    assert!(past_the_end.is_empty());

    let filtered = repository
        .find_by_filter_with_page(doc! { "age": { "$gte": 23 } }, 2, 0, &[Order::desc("_id")])
        .await
        .expect("page");
    assert_eq!(filtered.ids(), vec![5, 4]);
}

#[tokio::test]
async fn caller_or_is_combined_with_visibility() {
    let (_, repository) = users();
    seed(&repository, 3).await;
    repository.delete_by_id(&1).await.expect("delete");

    let found = repository
        .find_by_filter(doc! { "$or": [ { "name": "user1" }, { "name": "user2" } ] })
        .await
        .expect("find");
    assert_eq!(found.ids(), vec![2]);
}

#[tokio::test]
async fn delete_by_ids_and_filter_in_soft_mode() {
    let (collection, repository) = users();
    seed(&repository, 4).await;

    repository.delete_by_ids(&[1, 2]).await.expect("delete");
    repository
        .delete_all_by_filter(doc! { "name": "user3" })
        .await
        .expect("delete");
    repository.delete_by_ids(&[]).await.expect("no-op");

    assert_eq!(repository.find_all().await.expect("find").ids(), vec![4]);
    assert_eq!(collection.len().await, 4);

    let raw = collection.documents().await;
    let stamped = raw
        .iter()
        .filter(|d| d.get_i64("deleted_at").map(|t| t > 0).unwrap_or(false))
        .count();
    assert_eq!(stamped, 3);
}

#[tokio::test]
async fn delete_by_id_in_hard_mode() {
    let repository = tags();
    repository
        .create(&mut Tag {
            id: 1,
            name: "a".to_string(),
        })
        .await
        .expect("create");
    repository.delete_by_id(&1).await.expect("delete");
    assert!(repository.find_by_id(&1).await.expect_err("gone").is_not_found());
    repository.delete_by_id(&1).await.expect("deleting nothing is fine");
}

#[tokio::test]
async fn concurrent_readers_share_one_repository() {
    let (_, repository) = users();
    seed(&repository, 10).await;

    let mut handles = Vec::new();
    for id in 1..=10_i64 {
        let repository = repository.clone();
        handles.push(tokio::spawn(async move {
            repository.find_by_id(&id).await.map(|u| u.id)
        }));
    }
    for (expected, handle) in (1..=10_i64).zip(handles) {
        assert_eq!(handle.await.expect("join").expect("find"), expected);
    }
}

/// Soft-deletable entity whose timestamp is unset until deletion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Session {
    #[serde(rename = "_id")]
    id: i64,
    token: String,
    deleted_at: Option<i64>,
}

impl Entity<i64> for Session {
    fn fields() -> &'static [EntityField] {
        const FIELDS: &[EntityField] = &[
            EntityField::new("ID").with_storage("_id"),
            EntityField::new("Token").with_storage("token"),
            EntityField::new("DeletedAt").with_storage("deleted_at"),
        ];
        FIELDS
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

/// Declares `id` and `deleted_at` in snake case, which are plain attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Snake {
    #[serde(rename = "_id")]
    id: i64,
    deleted_at: i64,
}

impl Entity<i64> for Snake {
    fn fields() -> &'static [EntityField] {
        const FIELDS: &[EntityField] = &[
            EntityField::new("id").with_storage("_id"),
            EntityField::new("deleted_at"),
        ];
        FIELDS
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

/// Upper-case id with an ordinary `deleted_at` column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Archive {
    #[serde(rename = "_id")]
    id: i64,
    deleted_at: i64,
}

impl Entity<i64> for Archive {
    fn fields() -> &'static [EntityField] {
        const FIELDS: &[EntityField] = &[
            EntityField::new("ID").with_storage("_id"),
            EntityField::new("deleted_at"),
        ];
        FIELDS
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

#[tokio::test]
async fn optional_soft_delete_timestamp_is_visible_until_deleted() {
    let repository =
        DocumentRepository::<i64, Session>::with_collection(MemoryCollection::new("sessions"))
            .expect("valid entity");
    let mut session = Session {
        id: 1,
        token: "t1".to_string(),
        deleted_at: None,
    };
    repository.create(&mut session).await.expect("create");

    assert_eq!(repository.find_by_id(&1).await.expect("visible"), session);
    assert_eq!(repository.count().await.expect("count"), 1);
    assert!(repository.exists_by_id(&1).await.expect("exists"));

    repository.delete_by_id(&1).await.expect("soft delete");
    assert!(repository
        .find_by_id(&1)
        .await
        .expect_err("hidden")
        .is_not_found());
    let stamped = repository.unscoped().find_by_id(&1).await.expect("unscoped");
    assert!(stamped.deleted_at.is_some_and(|at| at > 0));
}

#[test]
fn lowercase_id_attribute_is_rejected() {
    let err = DocumentRepository::<i64, Snake>::with_collection(MemoryCollection::new("snakes"))
        .expect_err("`id` is not an identifier attribute");
    assert_eq!(err.kind, RepositoryErrorKind::Configuration);
}

#[tokio::test]
async fn snake_case_deleted_at_keeps_hard_delete() {
    let collection = Arc::new(MemoryCollection::new("archives"));
    let repository =
        DocumentRepository::<i64, Archive>::new(collection.clone()).expect("valid entity");
    assert!(!repository.soft_delete_enabled());
    assert_eq!(repository.soft_delete_field(), None);

    repository
        .create(&mut Archive { id: 1, deleted_at: 0 })
        .await
        .expect("create");
    repository.delete_by_id(&1).await.expect("delete");
    assert!(collection.is_empty().await);
}

//! ObjectStore interface tests.
//!
//! These tests verify the contract of the ObjectStore trait. Each test uses
//! its own key prefix so a single store instance can run the whole suite.

use logroll::store::{ObjectStore, StoreError};

fn keys(objects: &[logroll::store::ObjectMeta]) -> Vec<&str> {
    objects.iter().map(|o| o.key.as_str()).collect()
}

// =============================================================================
// ObjectStore::get tests
// =============================================================================

pub async fn test_get_missing<S: ObjectStore + ?Sized>(store: &S) {
    let result = store.get("test_get_missing/none").await;
    assert!(
        matches!(result, Err(StoreError::NotFound(_))),
        "missing object should be NotFound"
    );
}

pub async fn test_put_then_get<S: ObjectStore + ?Sized>(store: &S) {
    let body = b"{\"a\":1}\n{\"a\":2}".to_vec();
    store
        .put("test_put_then_get/2023/05/01/10/x", body.clone())
        .await
        .expect("put should succeed");

    let read = store
        .get("test_put_then_get/2023/05/01/10/x")
        .await
        .expect("get should succeed");
    assert_eq!(read, body);
}

pub async fn test_get_preserves_binary<S: ObjectStore + ?Sized>(store: &S) {
    let body = vec![0u8, 10, 13, 200, 255, b'\n'];
    store
        .put("test_binary/blob", body.clone())
        .await
        .expect("put should succeed");

    assert_eq!(store.get("test_binary/blob").await.unwrap(), body);
}

// =============================================================================
// ObjectStore::put tests
// =============================================================================

pub async fn test_put_replaces<S: ObjectStore + ?Sized>(store: &S) {
    store.put("test_put_replaces/x", b"old".to_vec()).await.unwrap();
    store.put("test_put_replaces/x", b"new".to_vec()).await.unwrap();

    assert_eq!(store.get("test_put_replaces/x").await.unwrap(), b"new");
    assert_eq!(store.list("test_put_replaces/").await.unwrap().len(), 1);
}

pub async fn test_put_rejects_escaping_keys<S: ObjectStore + ?Sized>(store: &S) {
    for key in ["../escape", "/absolute", "a/./b", ""] {
        let result = store.put(key, b"x".to_vec()).await;
        assert!(
            matches!(result, Err(StoreError::InvalidKey(_))),
            "key {:?} should be rejected",
            key
        );
    }
}

// =============================================================================
// ObjectStore::list tests
// =============================================================================

pub async fn test_list_empty_prefix<S: ObjectStore + ?Sized>(store: &S) {
    let objects = store.list("test_list_empty/").await.expect("list should succeed");
    assert!(objects.is_empty());
}

pub async fn test_list_sorted_and_scoped<S: ObjectStore + ?Sized>(store: &S) {
    for key in [
        "test_list_scoped/b",
        "test_list_scoped/a/2",
        "test_list_scoped/a/1",
        "test_list_scoped_other/c",
    ] {
        store.put(key, b"x".to_vec()).await.unwrap();
    }

    let objects = store.list("test_list_scoped/").await.unwrap();
    assert_eq!(
        keys(&objects),
        vec![
            "test_list_scoped/a/1",
            "test_list_scoped/a/2",
            "test_list_scoped/b"
        ]
    );
}

pub async fn test_list_partial_name_prefix<S: ObjectStore + ?Sized>(store: &S) {
    store.put("test_list_partial/2023-05-01T10-a", b"x".to_vec()).await.unwrap();
    store.put("test_list_partial/2023-05-02T10-b", b"x".to_vec()).await.unwrap();

    let objects = store.list("test_list_partial/2023-05-01").await.unwrap();
    assert_eq!(keys(&objects), vec!["test_list_partial/2023-05-01T10-a"]);
}

pub async fn test_list_reports_size<S: ObjectStore + ?Sized>(store: &S) {
    store.put("test_list_size/x", b"12345".to_vec()).await.unwrap();

    let objects = store.list("test_list_size/").await.unwrap();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].size, 5);
}

pub async fn test_list_sees_own_writes<S: ObjectStore + ?Sized>(store: &S) {
    store.put("test_list_rw/x", b"x".to_vec()).await.unwrap();
    assert_eq!(store.list("test_list_rw/").await.unwrap().len(), 1);

    store.delete("test_list_rw/x").await.unwrap();
    assert!(store.list("test_list_rw/").await.unwrap().is_empty());
}

// =============================================================================
// ObjectStore::delete tests
// =============================================================================

pub async fn test_delete_existing<S: ObjectStore + ?Sized>(store: &S) {
    store.put("test_delete/x", b"x".to_vec()).await.unwrap();
    store.delete("test_delete/x").await.expect("delete should succeed");

    assert!(matches!(
        store.get("test_delete/x").await,
        Err(StoreError::NotFound(_))
    ));
}

pub async fn test_delete_missing_is_ok<S: ObjectStore + ?Sized>(store: &S) {
    store
        .delete("test_delete_missing/none")
        .await
        .expect("deleting a missing object should succeed");
}

#[macro_export]
macro_rules! run_object_store_tests {
    ($store:expr) => {
        use $crate::store::object_store_tests::*;

        // get tests
        test_get_missing($store).await;
        println!("  test_get_missing: PASSED");

        test_put_then_get($store).await;
        println!("  test_put_then_get: PASSED");

        test_get_preserves_binary($store).await;
        println!("  test_get_preserves_binary: PASSED");

        // put tests
        test_put_replaces($store).await;
        println!("  test_put_replaces: PASSED");

        test_put_rejects_escaping_keys($store).await;
        println!("  test_put_rejects_escaping_keys: PASSED");

        // list tests
        test_list_empty_prefix($store).await;
        println!("  test_list_empty_prefix: PASSED");

        test_list_sorted_and_scoped($store).await;
        println!("  test_list_sorted_and_scoped: PASSED");

        test_list_partial_name_prefix($store).await;
        println!("  test_list_partial_name_prefix: PASSED");

        test_list_reports_size($store).await;
        println!("  test_list_reports_size: PASSED");

        test_list_sees_own_writes($store).await;
        println!("  test_list_sees_own_writes: PASSED");

        // delete tests
        test_delete_existing($store).await;
        println!("  test_delete_existing: PASSED");

        test_delete_missing_is_ok($store).await;
        println!("  test_delete_missing_is_ok: PASSED");
    };
}

/// Idempotent ensure-style helpers
mod common;

use common::ScriptedStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokengate::core::{Property, StoreError};
use tokengate::{EntityHelper, EntityStore, MemoryEngine, PersistentStore, RequestContext, StoreConfig};

type Writes = Arc<Mutex<Vec<(String, String, Vec<Property>)>>>;

fn recording(store: ScriptedStore) -> (ScriptedStore, Writes) {
    let writes: Writes = Arc::new(Mutex::new(Vec::new()));
    let recorded = writes.clone();
    let store = store.on_set(move |_, kind, key, properties, content| {
        assert!(content.is_none());
        recorded
            .lock()
            .unwrap()
            .push((kind.to_string(), key.to_string(), properties.to_vec()));
        Ok(())
    });
    (store, writes)
}

#[tokio::test]
async fn test_ensure_exists_leaves_existing_entity_alone() {
    let store = ScriptedStore::new().on_get(|_, _, _| Ok((vec![Property::new("Keep", 1i64)], None)));
    let helper = EntityHelper::new(store);

    helper
        .ensure_exists(&RequestContext::new(), "Thing", "t", false)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_ensure_exists_creates_empty_entity() {
    let (store, writes) = recording(ScriptedStore::new().on_get(|_, _, _| Err(StoreError::NotFound)));
    let helper = EntityHelper::new(store);

    helper
        .ensure_exists(&RequestContext::new(), "Thing", "t", false)
        .await
        .unwrap();

    assert_eq!(
        *writes.lock().unwrap(),
        vec![("Thing".to_string(), "t".to_string(), vec![])]
    );
}

#[tokio::test]
async fn test_ensure_exists_surfaces_read_errors() {
    let store = ScriptedStore::new().on_get(|_, _, _| Err(StoreError::Transport("bluh".into())));
    let helper = EntityHelper::new(store);

    let res = helper
        .ensure_exists(&RequestContext::new(), "Thing", "t", false)
        .await;
    assert_eq!(res, Err(StoreError::Transport("bluh".into())));
}

#[tokio::test]
async fn test_ensure_exists_runs_inside_transaction() {
    let transactions = Arc::new(AtomicUsize::new(0));
    let counted = transactions.clone();
    let store = ScriptedStore::new()
        .on_get(|ctx, _, _| {
            assert!(ctx.transaction().is_some());
            Err(StoreError::NotFound)
        })
        .on_set(|ctx, _, _, _, _| {
            assert!(ctx.transaction().is_some());
            Ok(())
        })
        .on_transact(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    let helper = EntityHelper::new(store);

    helper
        .ensure_exists(&RequestContext::new(), "Thing", "t", true)
        .await
        .unwrap();
    assert_eq!(transactions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_ensure_exists_is_idempotent() {
    let store = EntityStore::new(Arc::new(MemoryEngine::new()), &StoreConfig::new());
    let helper = EntityHelper::new(store.clone());
    let ctx = RequestContext::new();

    helper.ensure_exists(&ctx, "Thing", "t", true).await.unwrap();
    store.set(&ctx, "Thing", "t", &[Property::new("Added", true)]).await.unwrap();
    helper.ensure_exists(&ctx, "Thing", "t", true).await.unwrap();

    assert_eq!(
        store.get(&ctx, "Thing", "t").await.unwrap(),
        vec![Property::new("Added", true)]
    );
}

#[tokio::test]
async fn test_ensure_property_matching_value_skips_write() {
    let store = ScriptedStore::new().on_get(|_, _, _| {
        Ok((vec![Property::new("A", 1i64), Property::new("B", "x")], None))
    });
    let helper = EntityHelper::new(store);

    helper
        .ensure_property(&RequestContext::new(), "Cfg", "c", "B", "x", false)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_ensure_property_type_mismatch_is_not_equal() {
    let (store, writes) = recording(
        ScriptedStore::new().on_get(|_, _, _| Ok((vec![Property::new("N", 1i64)], None))),
    );
    let helper = EntityHelper::new(store);

    helper
        .ensure_property(&RequestContext::new(), "Cfg", "c", "N", 1.0, false)
        .await
        .unwrap();

    assert_eq!(
        *writes.lock().unwrap(),
        vec![("Cfg".to_string(), "c".to_string(), vec![Property::new("N", 1.0)])]
    );
}

#[tokio::test]
async fn test_ensure_property_overwrites_in_place() {
    let (store, writes) = recording(ScriptedStore::new().on_get(|_, _, _| {
        Ok((
            vec![Property::new("A", 1i64), Property::new("B", "old"), Property::new("C", true)],
            None,
        ))
    }));
    let helper = EntityHelper::new(store);

    helper
        .ensure_property(&RequestContext::new(), "Cfg", "c", "B", "new", false)
        .await
        .unwrap();

    assert_eq!(
        writes.lock().unwrap()[0].2,
        vec![Property::new("A", 1i64), Property::new("B", "new"), Property::new("C", true)]
    );
}

#[tokio::test]
async fn test_ensure_property_appends_to_missing_entity() {
    let (store, writes) = recording(ScriptedStore::new().on_get(|_, _, _| Err(StoreError::NotFound)));
    let helper = EntityHelper::new(store);

    helper
        .ensure_property(&RequestContext::new(), "Cfg", "c", "A", 7i64, false)
        .await
        .unwrap();

    assert_eq!(writes.lock().unwrap()[0].2, vec![Property::new("A", 7i64)]);
}

#[tokio::test]
async fn test_ensure_property_surfaces_write_errors() {
    let store = ScriptedStore::new()
        .on_get(|_, _, _| Err(StoreError::NotFound))
        .on_set(|_, _, _, _, _| Err(StoreError::AccessDenied))
        .transactional();
    let helper = EntityHelper::new(store);

    let res = helper
        .ensure_property(&RequestContext::new(), "Cfg", "c", "A", 7i64, true)
        .await;
    assert_eq!(res, Err(StoreError::AccessDenied));
}

use super::*;
use nexus_core::{Edge, GraphData, KeyValueStore, Node};
use tempfile::tempdir;

fn sample_graph() -> GraphData {
    let mut graph = GraphData::seed();
    let mut node = Node::new("Hermione Granger", "Brightest witch of her age").with_group(2);
    node.extra
        .insert("house".to_string(), serde_json::json!("Gryffindor"));
    graph.nodes.push(node);
    graph
        .edges
        .push(Edge::new("Hermione Granger", "Ron Weasley", "spouse"));
    graph
}

#[test]
fn test_autosave_round_trip() -> Result<(), StorageError> {
    let dir = tempdir()?;
    let slot = AutosaveSlot::new(dir.path().join("nested").join("autosave.json"));
    assert!(!slot.exists());
    assert_eq!(slot.read()?, None);

    let graph = sample_graph();
    slot.write(&graph)?;
    assert!(slot.exists());
    assert_eq!(slot.read()?, Some(graph));

    // No temp file left behind.
    let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("nested"))?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
    Ok(())
}

#[test]
fn test_autosave_overwrites_and_clears() -> Result<(), StorageError> {
    let dir = tempdir()?;
    let slot = AutosaveSlot::new(dir.path().join("autosave.json"));
    slot.write(&sample_graph())?;
    slot.write(&GraphData::seed())?;
    assert_eq!(slot.read()?, Some(GraphData::seed()));

    slot.clear()?;
    assert_eq!(slot.read()?, None);
    slot.clear()?;
    Ok(())
}

#[test]
fn test_corrupt_autosave_is_an_error() -> Result<(), StorageError> {
    let dir = tempdir()?;
    let path = dir.path().join("autosave.json");
    std::fs::write(&path, "{ truncated")?;
    let slot = AutosaveSlot::new(&path);
    assert!(matches!(slot.read(), Err(StorageError::Json(_))));
    Ok(())
}

#[test]
fn test_sqlite_kv_in_memory() -> Result<(), StorageError> {
    let store = SqliteKvStore::new_in_memory()?;
    assert_eq!(store.get("graph.camera").unwrap(), None);

    store.set("graph.camera", "{\"scale\":1.0}").unwrap();
    store.set("graph.camera", "{\"scale\":2.0}").unwrap();
    store.set("graph.positions", "{}").unwrap();
    assert_eq!(
        store.get("graph.camera").unwrap().as_deref(),
        Some("{\"scale\":2.0}")
    );
    assert_eq!(store.keys()?, vec!["graph.camera", "graph.positions"]);

    store.remove("graph.camera").unwrap();
    assert_eq!(store.keys()?, vec!["graph.positions"]);
    Ok(())
}

#[test]
fn test_sqlite_kv_persists_across_reopen() -> Result<(), StorageError> {
    let dir = tempdir()?;
    let path = dir.path().join("view_state.db");
    {
        let store = SqliteKvStore::open(&path)?;
        store.set("graph.positions", "{\"A\":{\"x\":1.0,\"y\":2.0}}").unwrap();
    }
    let store = SqliteKvStore::open(&path)?;
    assert_eq!(
        store.get("graph.positions").unwrap().as_deref(),
        Some("{\"A\":{\"x\":1.0,\"y\":2.0}}")
    );
    Ok(())
}

#[test]
fn test_newer_schema_is_refused() -> Result<(), StorageError> {
    let dir = tempdir()?;
    let path = dir.path().join("view_state.db");
    {
        let conn = rusqlite::Connection::open(&path)?;
        conn.pragma_update(None, "user_version", (SCHEMA_VERSION + 1).to_string())?;
    }
    assert!(matches!(
        SqliteKvStore::open(&path),
        Err(StorageError::Other(_))
    ));
    Ok(())
}

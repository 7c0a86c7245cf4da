use rusqlite::{Connection, params};
use serde_json::{Value, json};
use singularity_core::operations::{BackupEnvelope, IngestOperationRequest};
use singularity_core::{
    Codec, DataSingularity, Payload, PayloadKind, SingularityError, SingularityOptions,
    TabularFrame, integrity_digest,
};
use std::path::Path;

fn file_store(dir: &Path, name: &str) -> DataSingularity {
    let path = dir.join(name);
    DataSingularity::open(SingularityOptions::with_connection(format!(
        "sqlite:///{}",
        path.display()
    )))
    .unwrap()
}

fn sample_record() -> Value {
    json!({
        "stellar_objects": ["quasar", "pulsar", "neutron_star"],
        "coordinates": [{"x": 12.5, "y": 42.3, "z": 88.8}],
        "energy_levels": [1e9, 1e12, 1e15]
    })
}

fn sample_frame() -> TabularFrame {
    TabularFrame::new(
        vec!["object".to_string(), "mass".to_string(), "active".to_string()],
        vec![
            vec![json!("quasar"), json!(1.5e9), json!(true)],
            vec![json!("pulsar"), json!(1.4), json!(false)],
            vec![json!("nebula"), Value::Null, json!(true)],
        ],
    )
    .unwrap()
}

#[test]
fn test_ingest_is_deterministic_across_key_order() {
    let store = DataSingularity::in_memory().unwrap();

    let a: Value = serde_json::from_str(r#"{"alpha": 1, "beta": {"x": 1, "y": [true, null]}}"#).unwrap();
    let b: Value = serde_json::from_str(r#"{"beta": {"y": [true, null], "x": 1}, "alpha": 1}"#).unwrap();

    let id_a = store.ingest_value(a).unwrap();
    let id_b = store.ingest_value(b).unwrap();
    assert_eq!(id_a, id_b);
    assert_eq!(store.len().unwrap(), 1);

    // A separate store derives the same id for the same content.
    let other = DataSingularity::in_memory().unwrap();
    assert_eq!(other.ingest_value(sample_record()).unwrap(), store.ingest_value(sample_record()).unwrap());
}

#[test]
fn test_round_trip_for_every_shape() {
    let store = DataSingularity::in_memory().unwrap();

    let payloads = vec![
        Payload::from_value(sample_record()).unwrap(),
        Payload::from_value(json!([{"x": 1}, {"x": 2, "nested": {"b": [1, 2.5, "s"]}}])).unwrap(),
        Payload::from_value(json!({})).unwrap(),
        Payload::from_value(json!([])).unwrap(),
        Payload::Frame(sample_frame()),
    ];

    for payload in payloads {
        let id = store.ingest(payload.clone()).unwrap();
        assert_eq!(store.retrieve(&id).unwrap(), payload);
    }
}

#[test]
fn test_frame_round_trip_keeps_shape() {
    let store = DataSingularity::in_memory().unwrap();
    let id = store.ingest(Payload::Frame(sample_frame())).unwrap();

    match store.retrieve(&id).unwrap() {
        Payload::Frame(frame) => {
            assert_eq!(frame.len(), 3);
            assert_eq!(
                frame.columns(),
                &["active".to_string(), "mass".to_string(), "object".to_string()]
            );
            assert_eq!(frame, sample_frame());
        }
        other => panic!("expected a frame, got {:?}", other.kind()),
    }
}

#[test]
fn test_dimension_tag_is_stored_verbatim() {
    let store = DataSingularity::in_memory().unwrap();
    let id = store
        .ingest_with_tag(Payload::from_value(json!({"d": 11})).unwrap(), 11)
        .unwrap();

    let record = store.record_store().select_by_id(&id).unwrap().unwrap();
    assert_eq!(record.dimension_tag, 11);
    assert_eq!(record.payload_kind, PayloadKind::Record);
}

#[test]
fn test_retrieve_missing_is_not_found() {
    let store = DataSingularity::in_memory().unwrap();
    let err = store.retrieve("nonexistent-id").unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("nonexistent-id"));
}

#[test]
fn test_scalar_ingest_is_rejected_without_side_effects() {
    let store = DataSingularity::in_memory().unwrap();

    let err = store.ingest_value(json!(42)).unwrap_err();
    assert!(matches!(err, SingularityError::UnsupportedPayloadType(_)));
    assert!(store.is_empty().unwrap());
}

#[test]
fn test_tampered_bytes_raise_integrity_violation() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = file_store(temp_dir.path(), "tamper.db");
    let id = store.ingest_value(sample_record()).unwrap();

    let conn = Connection::open(temp_dir.path().join("tamper.db")).unwrap();
    let mut bytes: Vec<u8> = conn
        .query_row(
            "SELECT compressed_payload FROM compressed_data WHERE id = ?1",
            [&id],
            |row| row.get(0),
        )
        .unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    conn.execute(
        "UPDATE compressed_data SET compressed_payload = ?1 WHERE id = ?2",
        params![bytes, id],
    )
    .unwrap();

    let err = store.retrieve(&id).unwrap_err();
    assert!(err.is_integrity_violation(), "unexpected error: {err}");
}

#[test]
fn test_valid_digest_over_garbage_is_codec_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = file_store(temp_dir.path(), "garbage.db");
    let id = store.ingest_value(sample_record()).unwrap();

    let garbage = b"not a compressed frame".to_vec();
    let conn = Connection::open(temp_dir.path().join("garbage.db")).unwrap();
    conn.execute(
        "UPDATE compressed_data SET compressed_payload = ?1, integrity_digest = ?2 WHERE id = ?3",
        params![garbage, integrity_digest(&garbage), id],
    )
    .unwrap();

    let err = store.retrieve(&id).unwrap_err();
    assert!(matches!(err, SingularityError::Codec(_)), "unexpected error: {err}");
}

#[test]
fn test_decodable_bytes_of_wrong_shape_is_format_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = file_store(temp_dir.path(), "shape.db");
    let id = store.ingest_value(json!({"a": 1})).unwrap();

    let conn = Connection::open(temp_dir.path().join("shape.db")).unwrap();
    conn.execute(
        "UPDATE compressed_data SET payload_kind = 'sequence' WHERE id = ?1",
        [&id],
    )
    .unwrap();

    let err = store.retrieve(&id).unwrap_err();
    assert!(matches!(err, SingularityError::Format { .. }), "unexpected error: {err}");
}

#[test]
fn test_partial_failure_transfer() {
    let source = DataSingularity::in_memory().unwrap();
    let target = DataSingularity::in_memory().unwrap();

    let a = source.ingest_value(json!({"name": "A"})).unwrap();
    let c = source.ingest_value(json!({"name": "C"})).unwrap();
    let b = "b".repeat(64);

    let wormhole = singularity_core::Wormhole::new(source.clone(), target.clone());
    let result = wormhole.transfer([a.clone(), b.clone(), c.clone()]);

    assert_eq!(result.transferred, vec![a.clone(), c.clone()]);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].id, b);
    assert!(result.failures[0].cause.is_not_found());
    assert!(!result.is_complete());

    let mut target_ids = target.ids().unwrap();
    target_ids.sort();
    let mut expected = vec![a.clone(), c.clone()];
    expected.sort();
    assert_eq!(target_ids, expected);
    assert_eq!(target.retrieve(&a).unwrap(), source.retrieve(&a).unwrap());
}

#[test]
fn test_transfer_skips_corrupt_records_and_keeps_tags() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = file_store(temp_dir.path(), "source.db");

    let good = source
        .ingest_with_tag(Payload::Frame(sample_frame()), 9)
        .unwrap();
    let bad = source.ingest_value(json!([1, 2, 3])).unwrap();

    let conn = Connection::open(temp_dir.path().join("source.db")).unwrap();
    conn.execute(
        "UPDATE compressed_data SET integrity_digest = '00' WHERE id = ?1",
        [&bad],
    )
    .unwrap();

    let target_path = temp_dir.path().join("target.db");
    let wormhole = source
        .create_wormhole(&format!("sqlite:///{}", target_path.display()))
        .unwrap();
    let result = wormhole.sync_all().unwrap();

    assert_eq!(result.transferred, vec![good.clone()]);
    assert_eq!(result.failures.len(), 1);
    let error = result.failures.into_iter().next().unwrap().into_error();
    match error {
        SingularityError::TransferItem { id, source } => {
            assert_eq!(id, bad);
            assert!(source.is_integrity_violation());
        }
        other => panic!("unexpected error: {other}"),
    }

    let record = wormhole
        .target()
        .record_store()
        .select_by_id(&good)
        .unwrap()
        .unwrap();
    assert_eq!(record.dimension_tag, 9);
    assert_eq!(wormhole.target().len().unwrap(), 1);
}

#[test]
fn test_backup_envelope_and_restore() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = DataSingularity::in_memory().unwrap();
    let ids = vec![
        store.ingest_value(sample_record()).unwrap(),
        store.ingest(Payload::Frame(sample_frame())).unwrap(),
    ];

    let path = store.backup(temp_dir.path().join("backups")).unwrap();
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("singularity_bkp_"));
    assert!(name.ends_with(".sq"));

    let envelope = BackupEnvelope::read_from(&path, &Codec::new(0.1).unwrap()).unwrap();
    assert_eq!(envelope.metadata.format_version, "4.3");
    assert_eq!(envelope.metadata.compression_level, 0.9);
    assert!(envelope.metadata.quantum_storage_flag);
    assert_eq!(envelope.data.len(), 2);

    // The decompressed file is the documented JSON envelope.
    let raw = Codec::new(0.9)
        .unwrap()
        .decompress(&std::fs::read(&path).unwrap())
        .unwrap();
    let json: Value = serde_json::from_slice(&raw).unwrap();
    assert!(json["metadata"]["created_at"].is_string());
    assert!(json["data"][0]["compressed_payload"].is_string());
    assert!(json["data"][0]["temporal_index"]["temporal_vectors"].is_array());

    let restored = DataSingularity::in_memory().unwrap();
    let result = restored.restore(&path).unwrap();
    assert_eq!(result.restored, 2);
    assert_eq!(result.already_present, 0);
    for id in &ids {
        assert_eq!(restored.retrieve(id).unwrap(), store.retrieve(id).unwrap());
    }

    let again = restored.restore(&path).unwrap();
    assert_eq!(again.restored, 0);
    assert_eq!(again.already_present, 2);
}

#[test]
fn test_restore_rejects_corrupt_backup_atomically() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = DataSingularity::in_memory().unwrap();
    store.ingest_value(json!({"k": "v"})).unwrap();
    store.ingest_value(json!({"k": "w"})).unwrap();

    let codec = Codec::new(0.9).unwrap();
    let path = store.backup(temp_dir.path()).unwrap();
    let mut envelope = BackupEnvelope::read_from(&path, &codec).unwrap();
    envelope.data[1].compressed_payload.push(0);
    let tampered = codec.compress(&serde_json::to_vec(&envelope).unwrap()).unwrap();
    std::fs::write(&path, tampered).unwrap();

    let target = DataSingularity::in_memory().unwrap();
    let err = target.restore(&path).unwrap_err();
    assert!(err.is_integrity_violation());
    assert!(target.is_empty().unwrap());
}

#[test]
fn test_record_and_frame_with_equal_bytes_keep_their_shapes() {
    let store = DataSingularity::in_memory().unwrap();

    let record = Payload::from_value(json!({"columns": ["a"], "rows": [[1]]})).unwrap();
    let frame = Payload::Frame(TabularFrame::new(vec!["a".to_string()], vec![vec![json!(1)]]).unwrap());

    let id_record = store.ingest(record.clone()).unwrap();
    let id_frame = store.ingest(frame.clone()).unwrap();

    assert_ne!(id_record, id_frame);
    assert_eq!(store.len().unwrap(), 2);
    assert_eq!(store.retrieve(&id_record).unwrap(), record);
    assert_eq!(store.retrieve(&id_frame).unwrap(), frame);
}

fn rewrite_backup(path: &Path, edit: impl FnOnce(&mut BackupEnvelope)) {
    let codec = Codec::new(0.9).unwrap();
    let mut envelope = BackupEnvelope::read_from(path, &codec).unwrap();
    edit(&mut envelope);
    let bytes = codec.compress(&serde_json::to_vec(&envelope).unwrap()).unwrap();
    std::fs::write(path, bytes).unwrap();
}

#[test]
fn test_restore_rejects_record_under_foreign_id() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = DataSingularity::in_memory().unwrap();
    store.ingest_value(json!({"k": "v"})).unwrap();
    store.ingest_value(json!({"k": "w"})).unwrap();

    let path = store.backup(temp_dir.path()).unwrap();
    rewrite_backup(&path, |envelope| envelope.data[0].id = "f".repeat(64));

    let target = DataSingularity::in_memory().unwrap();
    let err = target.restore(&path).unwrap_err();
    assert!(err.is_integrity_violation(), "unexpected error: {err}");
    assert!(target.is_empty().unwrap());
    assert!(target.retrieve(&"f".repeat(64)).unwrap_err().is_not_found());
}

#[test]
fn test_restore_rejects_record_with_wrong_kind() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = DataSingularity::in_memory().unwrap();
    store.ingest_value(json!({"k": "v"})).unwrap();

    let path = store.backup(temp_dir.path()).unwrap();
    rewrite_backup(&path, |envelope| envelope.data[0].payload_kind = PayloadKind::Sequence);

    let target = DataSingularity::in_memory().unwrap();
    let err = target.restore(&path).unwrap_err();
    assert!(matches!(err, SingularityError::Format { .. }), "unexpected error: {err}");
    assert!(target.is_empty().unwrap());
}

#[test]
fn test_empty_store_backup() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = DataSingularity::in_memory().unwrap();
    let path = store.backup(temp_dir.path()).unwrap();

    let envelope = BackupEnvelope::read_from(&path, store.codec()).unwrap();
    assert!(envelope.data.is_empty());
}

#[test]
fn test_large_payload_round_trip() {
    let store = DataSingularity::in_memory().unwrap();
    let items: Vec<Value> = (0..20_000)
        .map(|i| json!({"index": i, "label": format!("item-{:06}", i), "weight": i as f64 / 7.0}))
        .collect();
    let payload = Payload::Sequence(items);
    assert!(payload.canonicalize().unwrap().bytes.len() > 1024 * 1024);

    let result = store
        .ingest_operation()
        .run(IngestOperationRequest::new(payload.clone()))
        .unwrap();
    assert!(result.compressed_len < 1024 * 1024);
    assert_eq!(store.retrieve(&result.id).unwrap(), payload);
}

#[test]
fn test_concurrent_ingest_on_shared_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("shared.db");
    let connection = format!("sqlite:///{}", path.display());
    let first = DataSingularity::open(SingularityOptions::with_connection(connection.clone())).unwrap();

    std::thread::scope(|scope| {
        for worker in 0..4 {
            let connection = connection.clone();
            scope.spawn(move || {
                let store =
                    DataSingularity::open(SingularityOptions::with_connection(connection)).unwrap();
                for i in 0..10 {
                    store
                        .ingest_value(json!({"worker": worker, "item": i}))
                        .unwrap();
                    // Every worker also ingests shared content.
                    store.ingest_value(json!({"shared": i})).unwrap();
                }
            });
        }
    });

    assert_eq!(first.len().unwrap(), 4 * 10 + 10);
}

use nagcfg::error::NagcfgError;
use nagcfg::identifier::{Identifier, IdentifierGenerator};
use nagcfg::object::ConfigObject;
use nagcfg::schema::ObjectType;
use nagcfg::store::ObjectStore;

fn object(generator: &IdentifierGenerator, object_type: ObjectType, props: &[(&str, &str)]) -> ConfigObject {
    let mut object = ConfigObject::with_id(object_type, generator.generate());
    for (key, value) in props {
        object.set(key, value);
    }
    object
}

fn keep(store: &mut ObjectStore, object: ConfigObject) -> Identifier {
    let id = object.id().expect("id");
    store.insert(object).expect("insert ok");
    id
}

#[test]
fn deleted_objects_drop_out_of_the_order() {
    let generator = IdentifierGenerator::new();
    let mut store = ObjectStore::new();
    let a = keep(&mut store, object(&generator, ObjectType::Host, &[("host_name", "a")]));
    let b = keep(&mut store, object(&generator, ObjectType::Host, &[("host_name", "b")]));
    let c = keep(&mut store, object(&generator, ObjectType::Host, &[("host_name", "c")]));
    assert_eq!(store.keys(), vec![a, b, c]);
    assert!(store.delete(&b).is_some());
    assert_eq!(store.keys(), vec![a, c]);
    assert!(store.delete(&b).is_none());
    store.compact_order();
    assert_eq!(store.keys(), vec![a, c]);
    let names: Vec<&str> = store.iter().filter_map(|o| o.get("host_name")).collect();
    assert_eq!(names, vec!["a", "c"]);
}

#[test]
fn readded_objects_move_to_the_end() {
    let generator = IdentifierGenerator::new();
    let mut store = ObjectStore::new();
    let a = keep(&mut store, object(&generator, ObjectType::Host, &[]));
    let b = keep(&mut store, object(&generator, ObjectType::Host, &[]));
    let removed = store.delete(&a).expect("present");
    assert!(!store.add(a, removed).expect("re-add"));
    assert_eq!(store.keys(), vec![b, a]);
    store.compact_order();
    assert_eq!(store.keys(), vec![b, a]);
}

#[test]
fn add_reports_displacement_and_add_if_absent_refuses() {
    let generator = IdentifierGenerator::new();
    let mut store = ObjectStore::new();
    let id = generator.generate();
    assert!(!store.add(id, ConfigObject::new(ObjectType::Command)).expect("add"));
    assert_eq!(store.get(&id).and_then(|o| o.id()), Some(id));
    assert!(store.add(id, ConfigObject::new(ObjectType::Contact)).expect("replace"));
    assert_eq!(store.get(&id).map(|o| o.object_type()), Some(ObjectType::Contact));
    assert!(!store.add_if_absent(id, ConfigObject::new(ObjectType::Host)).expect("refuse"));
    assert_eq!(store.get(&id).map(|o| o.object_type()), Some(ObjectType::Contact));
    assert_eq!(store.len(), 1);
    assert_eq!(store.keys(), vec![id]);
}

#[test]
fn objects_are_only_stored_under_their_own_identifier() {
    let generator = IdentifierGenerator::new();
    let mut store = ObjectStore::new();
    let a = generator.generate();
    let b = generator.generate();
    let result = store.add(a, ConfigObject::with_id(ObjectType::Host, b));
    assert!(matches!(result, Err(NagcfgError::Invariant(_))));
    assert!(store.is_empty());
    assert!(store.add_if_absent(a, ConfigObject::with_id(ObjectType::Host, b)).is_err());

    // the same identifier is fine
    assert!(!store.add(a, ConfigObject::with_id(ObjectType::Host, a)).expect("add"));
    let json = store.to_json().expect("json");
    assert!(json.contains(&a.to_string()));
    assert!(!json.contains(&b.to_string()));
    let restored = ObjectStore::from_json(&json).expect("restore");
    assert_eq!(restored.keys(), vec![a]);
}

#[test]
fn insert_needs_an_identifier() {
    let mut store = ObjectStore::new();
    let result = store.insert(ConfigObject::new(ObjectType::Host));
    assert!(matches!(result, Err(NagcfgError::Invariant(_))));
}

#[test]
fn duplicate_services_keep_the_first() {
    let generator = IdentifierGenerator::new();
    let mut store = ObjectStore::new();
    let first = keep(&mut store, object(&generator, ObjectType::Service, &[("host_name", "h1"), ("service_description", "PING")]));
    let second = keep(&mut store, object(&generator, ObjectType::Service, &[("host_name", "h1"), ("service_description", "PING"), ("notes", "copy")]));
    let other = keep(&mut store, object(&generator, ObjectType::Service, &[("host_name", "h2"), ("service_description", "PING")]));
    // same names on a host are not a service duplicate
    keep(&mut store, object(&generator, ObjectType::Host, &[("host_name", "h1"), ("host_description", "PING")]));

    let duplicates = store.find_duplicate_services();
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates.get("h1;PING"), Some(&vec![first, second]));

    assert_eq!(store.remove_duplicate_services(Some(duplicates)), 1);
    assert!(store.contains(&first));
    assert!(!store.contains(&second));
    assert!(store.contains(&other));
    assert_eq!(store.len(), 3);
    assert_eq!(store.remove_duplicate_services(None), 0);
}

#[test]
fn split_by_provenance_skips_objects_without_one() {
    let generator = IdentifierGenerator::new();
    let mut store = ObjectStore::new();
    let mut ids = Vec::new();
    for provenance in ["f1", "f1", "f2", ""] {
        let mut o = object(&generator, ObjectType::Host, &[]);
        o.provenance = provenance.to_string();
        ids.push(keep(&mut store, o));
    }
    let groups = store.split_by_provenance();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups.get("f1"), Some(&vec![ids[0], ids[1]]));
    assert_eq!(groups.get("f2"), Some(&vec![ids[2]]));
    assert!(groups.values().all(|group| !group.contains(&ids[3])));
}

#[test]
fn bulk_property_edits() {
    let generator = IdentifierGenerator::new();
    let mut store = ObjectStore::new();
    let a = keep(&mut store, object(&generator, ObjectType::Host, &[("host_name", "a"), ("notes", "x")]));
    let b = keep(&mut store, object(&generator, ObjectType::Host, &[("host_name", "b"), ("notes", "y")]));

    // no ids: every object, two keys but only one value
    assert_eq!(store.set_properties(&[], &["parents", "alias"], &["core"]), 2);
    assert_eq!(store.get(&a).and_then(|o| o.get("parents")), Some("core"));
    assert_eq!(store.get(&b).and_then(|o| o.get("alias")), None);

    assert_eq!(store.set_properties(&[b], &["alias"], &["bee"]), 1);
    assert_eq!(store.get(&b).and_then(|o| o.get("alias")), Some("bee"));

    // no ids deletes nothing
    assert_eq!(store.delete_properties(&[], &["notes"]), 0);
    assert_eq!(store.delete_properties(&[a, b], &["notes", "alias"]), 3);
    assert_eq!(store.get(&a).and_then(|o| o.get("notes")), None);
}

#[test]
fn filter_type_keeps_store_order() {
    let generator = IdentifierGenerator::new();
    let mut store = ObjectStore::new();
    let h = keep(&mut store, object(&generator, ObjectType::Host, &[]));
    keep(&mut store, object(&generator, ObjectType::Command, &[]));
    let s = keep(&mut store, object(&generator, ObjectType::Service, &[]));
    assert_eq!(store.filter_type(&[ObjectType::Service, ObjectType::Host]), vec![h, s]);
    assert!(store.filter_type(&[ObjectType::TimePeriod]).is_empty());
}

#[test]
fn alignment_follows_the_longest_key() {
    let generator = IdentifierGenerator::new();
    let mut store = ObjectStore::new();
    keep(&mut store, object(&generator, ObjectType::Host, &[("host_name", "a")]));
    keep(&mut store, object(&generator, ObjectType::Service, &[("service_description", "b")]));
    assert_eq!(store.longest_key(), "service_description".len());
    assert_eq!(store.auto_align(), "service_description".len() + 2);
    assert!(store.iter().all(|o| o.align == 21));
}

#[test]
fn append_counts_refused_objects() {
    let generator = IdentifierGenerator::new();
    let mut left = ObjectStore::new();
    let mut right = ObjectStore::new();
    let shared = object(&generator, ObjectType::Host, &[]);
    keep(&mut left, shared.clone());
    keep(&mut right, shared);
    let fresh = keep(&mut right, object(&generator, ObjectType::Host, &[]));
    match left.append(right) {
        Err(NagcfgError::Append { failed, total }) => assert_eq!((failed, total), (1, 2)),
        other => panic!("expected an append error, got {other:?}"),
    }
    assert!(left.contains(&fresh));
    assert_eq!(left.len(), 2);
}

#[test]
fn from_ordered_sorts_by_source_then_sequence() {
    let generator = IdentifierGenerator::new();
    let mut tagged = Vec::new();
    let mut expected = Vec::new();
    for source in 0..2usize {
        for sequence in 0..3u64 {
            let mut o = object(&generator, ObjectType::Host, &[]);
            o.sequence = sequence;
            expected.push(o.id().expect("id"));
            tagged.push((source, o));
        }
    }
    // arrival order scrambled
    tagged.reverse();
    tagged.swap(0, 4);
    let store = ObjectStore::from_ordered(tagged).expect("store");
    assert_eq!(store.keys(), expected);
}

#[test]
fn json_interchange_round_trip() {
    let generator = IdentifierGenerator::new();
    let mut store = ObjectStore::new();
    let mut host = object(&generator, ObjectType::Host, &[("host_name", "web01"), ("address", "10.0.0.1")]);
    host.provenance = "/etc/nagios/hosts.cfg".to_string();
    let h = keep(&mut store, host);
    let c = keep(&mut store, object(&generator, ObjectType::Command, &[("command_name", "check_ping")]));

    let json = store.to_json().expect("encode");
    let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
    let entry = &value[h.to_string()];
    assert_eq!(entry["uuid"], h.to_string());
    assert_eq!(entry["type"], "host");
    assert_eq!(entry["fileid"], "/etc/nagios/hosts.cfg");
    assert_eq!(entry["props"]["address"], "10.0.0.1");

    let restored = ObjectStore::from_json(&json).expect("decode");
    assert_eq!(restored.keys(), vec![h, c]);
    for id in [h, c] {
        let before = store.get(&id).expect("original");
        let after = restored.get(&id).expect("restored");
        assert_eq!(after.object_type(), before.object_type());
        assert_eq!(after.provenance, before.provenance);
        assert_eq!(after.properties(), before.properties());
    }
}

#[test]
fn json_with_mismatching_keys_is_rejected() {
    let generator = IdentifierGenerator::new();
    let (a, b) = (generator.generate(), generator.generate());
    let json = format!(r#"{{"{a}": {{"uuid": "{b}", "type": "host", "fileid": "", "props": {{}}}}}}"#);
    assert!(matches!(ObjectStore::from_json(&json), Err(NagcfgError::Serialization(_))));
    assert!(ObjectStore::from_json("{\"not-an-id\": 1}").is_err());
}

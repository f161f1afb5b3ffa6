use std::fs;
use std::io;

use nagcfg::error::NagcfgError;
use nagcfg::identifier::IdentifierGenerator;
use nagcfg::object::ConfigObject;
use nagcfg::reader::{parse_str, read_file};
use nagcfg::schema::ObjectType;
use nagcfg::store::ObjectStore;
use nagcfg::writer::{render_object, write_all, write_split_by_provenance, write_split_with};

fn host(name: &str, address: &str) -> ConfigObject {
    let mut host = ConfigObject::new(ObjectType::Host);
    host.set("address", address);
    host.set("host_name", name);
    host.set("use", "generic-host");
    host
}

fn line(key: &str, value: &str) -> String {
    format!("    {key:<31}{value}\n")
}

#[test]
fn renders_comment_block_and_padding() {
    let text = render_object(&host("web01", "10.0.0.1"), false);
    let expected = format!(
        "# host 'web01'\ndefine host {{\n{}{}{}}}\n\n",
        line("address", "10.0.0.1"),
        line("host_name", "web01"),
        line("use", "generic-host"),
    );
    assert_eq!(text, expected);
}

#[test]
fn sorted_rendering_follows_the_type_order() {
    let text = render_object(&host("web01", "10.0.0.1"), true);
    let keys: Vec<&str> = text
        .lines()
        .skip(2)
        .filter_map(|l| l.split_whitespace().next())
        .filter(|k| *k != "}")
        .collect();
    assert_eq!(keys, vec!["use", "host_name", "address"]);
}

#[test]
fn unknown_keys_sort_last_by_name() {
    let mut service = ConfigObject::new(ObjectType::Service);
    service.set("zz_custom", "1");
    service.set("_custom", "2");
    service.set("check_command", "check_ping");
    service.set("host_name", "web01");
    let text = render_object(&service, true);
    let keys: Vec<&str> = text
        .lines()
        .skip(2)
        .filter_map(|l| l.split_whitespace().next())
        .filter(|k| *k != "}")
        .collect();
    assert_eq!(keys, vec!["host_name", "check_command", "_custom", "zz_custom"]);
}

#[test]
fn long_keys_keep_a_space_before_the_value() {
    let mut object = ConfigObject::new(ObjectType::Contact);
    object.align = 4;
    object.indent = 2;
    object.set("contact_name", "alice");
    let text = render_object(&object, false);
    assert!(text.contains("\n  contact_name alice\n"));
}

#[test]
fn template_and_anonymous_comments() {
    let mut template = ConfigObject::new(ObjectType::Host);
    template.set("name", "generic-host");
    template.set("register", "0");
    assert!(render_object(&template, false).starts_with("# host template 'generic-host'\n"));

    let mut dependency = ConfigObject::new(ObjectType::HostDependency);
    dependency.set("host_name", "web01");
    assert!(render_object(&dependency, false).starts_with("# hostdependency\ndefine hostdependency {\n"));
}

#[test]
fn write_all_uses_store_order() {
    let generator = IdentifierGenerator::new();
    let mut store = ObjectStore::new();
    for name in ["c", "a", "b"] {
        store.add(generator.generate(), host(name, "127.0.0.1")).expect("add");
    }
    let mut out = Vec::new();
    assert_eq!(write_all(&store, &mut out, true).expect("write"), 3);
    let text = String::from_utf8(out).expect("utf8");
    let names: Vec<String> = parse_str(&text)
        .expect("parse")
        .iter()
        .filter_map(|o| o.get("host_name").map(str::to_string))
        .collect();
    assert_eq!(names, vec!["c", "a", "b"]);
}

#[test]
fn split_write_lands_in_each_source_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let generator = IdentifierGenerator::new();
    let mut store = ObjectStore::new();
    let first = dir.path().join("first.cfg");
    let second = dir.path().join("second.cfg");
    for (path, name) in [(&first, "a"), (&second, "b"), (&first, "c")] {
        let mut object = host(name, "127.0.0.1");
        object.provenance = path.display().to_string();
        store.add(generator.generate(), object).expect("add");
    }
    // no provenance, not written anywhere
    store.add(generator.generate(), host("orphan", "127.0.0.1")).expect("add");

    let report = write_split_by_provenance(&store, true).expect("write");
    assert_eq!(report.destinations, 2);
    assert_eq!(report.objects, 3);

    let names = |path: &std::path::Path| -> Vec<String> {
        read_file(path, None)
            .expect("read back")
            .iter()
            .filter_map(|o| o.get("host_name").map(str::to_string))
            .collect()
    };
    assert_eq!(names(first.as_path()), vec!["a", "c"]);
    assert_eq!(names(second.as_path()), vec!["b"]);
    assert_eq!(fs::read_dir(dir.path()).expect("list").count(), 2);
}

#[test]
fn failed_destinations_are_reported_individually() {
    let generator = IdentifierGenerator::new();
    let mut store = ObjectStore::new();
    for provenance in ["ok.cfg", "denied-1.cfg", "denied-2.cfg"] {
        let mut object = host(provenance, "127.0.0.1");
        object.provenance = provenance.to_string();
        store.add(generator.generate(), object).expect("add");
    }
    let result = write_split_with(&store, false, |provenance| {
        if provenance.starts_with("denied") {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        } else {
            Ok(io::sink())
        }
    });
    match result {
        Err(NagcfgError::Write(failures)) => {
            assert_eq!(failures.count(), 2);
            assert_eq!(failures.attempted, 3);
            let names: Vec<&str> = failures.failures.iter().map(|f| f.provenance.as_str()).collect();
            assert_eq!(names, vec!["denied-1.cfg", "denied-2.cfg"]);
            assert!(failures.to_string().starts_with("2 of 3 destinations failed"));
        }
        other => panic!("expected write failures, got {other:?}"),
    }
}

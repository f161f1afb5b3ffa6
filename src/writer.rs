use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::sync::mpsc;
use std::thread;

use thiserror::Error;
use tracing::{info, warn};

use crate::error::Result;
use crate::object::ConfigObject;
use crate::schema::SORT_ORDER;
use crate::store::ObjectStore;

// ------------- rendering -------------

/// Text of one object: its comment line, the definition block and a blank line.
///
/// Properties come in key order, or in the customary order for the object
/// type when `sorted` is set. Keys without a place in that order go last.
pub fn render_object(object: &ConfigObject, sorted: bool) -> String {
    let object_type = object.object_type();
    let mut properties: Vec<(&String, &String)> = object.properties().iter().collect();
    if sorted {
        properties.sort_by_key(|(key, _)| (SORT_ORDER.rank(key, object_type), *key));
    }
    let prefix = " ".repeat(object.indent);
    let mut text = String::with_capacity(64 + properties.len() * (object.align + 24));
    text.push_str(&object.comment());
    text.push('\n');
    text.push_str(&format!("define {object_type} {{\n"));
    for (key, value) in properties {
        // always at least one space between key and value
        let width = object.align.max(key.chars().count() + 1);
        text.push_str(&format!("{prefix}{key:<width$}{value}\n"));
    }
    text.push_str("}\n\n");
    text
}

pub fn write_object<W: Write>(w: &mut W, object: &ConfigObject, sorted: bool) -> io::Result<()> {
    w.write_all(render_object(object, sorted).as_bytes())
}

/// Writes every object in store order. Returns the number written.
pub fn write_all<W: Write>(store: &ObjectStore, w: &mut W, sorted: bool) -> Result<usize> {
    let mut written = 0;
    for object in store.iter() {
        write_object(w, object, sorted)?;
        written += 1;
    }
    w.flush()?;
    Ok(written)
}

// ------------- split writing -------------

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteReport {
    pub destinations: usize,
    pub objects: usize,
}

#[derive(Debug)]
pub struct DestinationFailure {
    pub provenance: String,
    pub error: io::Error,
}

/// Every destination that could not be written, and why.
#[derive(Error, Debug)]
#[error("{} of {} destinations failed: {}", .failures.len(), .attempted, describe(.failures))]
pub struct WriteFailures {
    pub attempted: usize,
    pub failures: Vec<DestinationFailure>,
}

impl WriteFailures {
    pub fn count(&self) -> usize {
        self.failures.len()
    }
}

fn describe(failures: &[DestinationFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.provenance, f.error))
        .collect::<Vec<String>>()
        .join(", ")
}

/// Writes each provenance group back to the file it was read from, one
/// thread per file. Objects without provenance are not written.
pub fn write_split_by_provenance(store: &ObjectStore, sorted: bool) -> Result<WriteReport> {
    write_split_with(store, sorted, |provenance| {
        File::create(provenance).map(BufWriter::new)
    })
}

/// Like [`write_split_by_provenance`], with `open` supplying the destination
/// for a provenance.
pub fn write_split_with<F, W>(store: &ObjectStore, sorted: bool, open: F) -> Result<WriteReport>
where
    F: Fn(&str) -> io::Result<W> + Sync,
    W: Write,
{
    let groups = store.split_by_provenance();
    let attempted = groups.len();
    let open = &open;
    let outcomes: Vec<(String, usize, io::Result<()>)> = thread::scope(|scope| {
        let (tx, rx) = mpsc::channel();
        for (provenance, ids) in &groups {
            let tx = tx.clone();
            scope.spawn(move || {
                let result = open(provenance).and_then(|mut w| {
                    for object in ids.iter().filter_map(|id| store.get(id)) {
                        write_object(&mut w, object, sorted)?;
                    }
                    w.flush()
                });
                let _ = tx.send((provenance.clone(), ids.len(), result));
            });
        }
        drop(tx);
        rx.iter().collect()
    });

    let mut report = WriteReport::default();
    let mut failures = Vec::new();
    for (provenance, objects, result) in outcomes {
        match result {
            Ok(()) => {
                report.destinations += 1;
                report.objects += objects;
            }
            Err(error) => {
                warn!(%provenance, %error, "unable to write destination");
                failures.push(DestinationFailure { provenance, error });
            }
        }
    }
    if !failures.is_empty() {
        failures.sort_by(|a, b| a.provenance.cmp(&b.provenance));
        return Err(WriteFailures { attempted, failures }.into());
    }
    info!(destinations = report.destinations, objects = report.objects, "split write complete");
    Ok(report)
}

//! Concurrent loading of many sources into one store.
//!
//! Every source is read on its own thread, which sends what it parses over a
//! small bounded channel. One relay thread per source channel forwards onto a
//! single shared channel, and a supervisor joins the relays. The shared channel
//! closes once the last relay is done, so a consumer simply drains it.
//!
//! Objects from different sources arrive interleaved in no particular order.
//! Each carries the index of its source and its sequence within that source,
//! which is all [`SourceLoader::load_store`] needs to rebuild the read order.
//!
//! There is no cancellation. A source that never ends keeps the channel open.
use std::fmt;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread;

use tracing::{debug, info, warn};

use crate::error::{NagcfgError, Result};
use crate::identifier::IdentifierGenerator;
use crate::object::ConfigObject;
use crate::reader::Reader;
use crate::store::ObjectStore;

pub const DEFAULT_BUFFER: usize = 4;

// ------------- Source -------------
pub enum Source {
    File(PathBuf),
    Reader {
        provenance: String,
        reader: Box<dyn BufRead + Send>,
    },
}

impl Source {
    pub fn file(path: impl AsRef<Path>) -> Self {
        Source::File(path.as_ref().to_path_buf())
    }
    pub fn reader(provenance: impl Into<String>, reader: impl Read + Send + 'static) -> Self {
        Source::Reader {
            provenance: provenance.into(),
            reader: Box::new(BufReader::new(reader)),
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Source::File(path) => write!(f, "File({})", path.display()),
            Source::Reader { provenance, .. } => write!(f, "Reader({provenance})"),
        }
    }
}

/// One item on the shared channel.
#[derive(Debug)]
pub enum Ingested {
    Object {
        source: usize,
        object: ConfigObject,
    },
    /// The source stopped here. Objects it sent before this are still valid.
    Failed {
        source: usize,
        provenance: String,
        error: NagcfgError,
    },
}

#[derive(Debug)]
pub struct SourceFailure {
    pub source: usize,
    pub provenance: String,
    pub error: NagcfgError,
}

#[derive(Debug)]
pub struct IngestReport {
    pub store: ObjectStore,
    pub failures: Vec<SourceFailure>,
}

impl IngestReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

// ------------- SourceLoader -------------
#[derive(Debug, Clone)]
pub struct SourceLoader {
    generator: Arc<IdentifierGenerator>,
    buffer: usize,
}

impl SourceLoader {
    pub fn new(generator: Arc<IdentifierGenerator>) -> Self {
        Self {
            generator,
            buffer: DEFAULT_BUFFER,
        }
    }
    /// Capacity of each per-source channel.
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer;
        self
    }

    pub fn load_sources(&self, sources: Vec<Source>) -> Receiver<Ingested> {
        let (out_tx, out_rx) = mpsc::sync_channel(self.buffer);
        let mut relays = Vec::with_capacity(sources.len());
        for (index, source) in sources.into_iter().enumerate() {
            let (tx, rx) = mpsc::sync_channel(self.buffer);
            let generator = Arc::clone(&self.generator);
            thread::spawn(move || tokenize(index, source, generator, tx));
            let out = out_tx.clone();
            relays.push(thread::spawn(move || {
                for item in rx {
                    if out.send(item).is_err() {
                        // consumer hung up
                        break;
                    }
                }
            }));
        }
        drop(out_tx);
        let count = relays.len();
        thread::spawn(move || {
            for relay in relays {
                if relay.join().is_err() {
                    warn!("relay thread panicked");
                }
            }
            debug!(sources = count, "all sources relayed");
        });
        out_rx
    }

    /// Drains [`SourceLoader::load_sources`] into a store ordered by source
    /// and position within the source. Failed sources are reported, not fatal.
    pub fn load_store(&self, sources: Vec<Source>) -> Result<IngestReport> {
        let mut objects = Vec::new();
        let mut failures = Vec::new();
        for item in self.load_sources(sources) {
            match item {
                Ingested::Object { source, object } => objects.push((source, object)),
                Ingested::Failed {
                    source,
                    provenance,
                    error,
                } => failures.push(SourceFailure {
                    source,
                    provenance,
                    error,
                }),
            }
        }
        failures.sort_by_key(|f| f.source);
        let store = ObjectStore::from_ordered(objects)?;
        info!(objects = store.len(), failed_sources = failures.len(), "ingestion complete");
        Ok(IngestReport { store, failures })
    }
}

fn tokenize(
    index: usize,
    source: Source,
    generator: Arc<IdentifierGenerator>,
    tx: SyncSender<Ingested>,
) {
    let (provenance, input): (String, Box<dyn BufRead + Send>) = match source {
        Source::File(path) => {
            let provenance = fs::canonicalize(&path)
                .unwrap_or_else(|_| path.clone())
                .display()
                .to_string();
            match File::open(&path) {
                Ok(file) => (provenance, Box::new(BufReader::new(file))),
                Err(e) => {
                    warn!(%provenance, error = %e, "unable to open source");
                    let _ = tx.send(Ingested::Failed {
                        source: index,
                        provenance,
                        error: e.into(),
                    });
                    return;
                }
            }
        }
        Source::Reader { provenance, reader } => (provenance, reader),
    };
    let mut reader = Reader::new(input)
        .with_provenance(provenance.clone())
        .with_generator(generator);
    let mut sent = 0usize;
    loop {
        match reader.read_one() {
            Ok(Some(object)) => {
                if tx.send(Ingested::Object { source: index, object }).is_err() {
                    return;
                }
                sent += 1;
            }
            Ok(None) => break,
            Err(error) => {
                warn!(%provenance, %error, "source aborted");
                let _ = tx.send(Ingested::Failed {
                    source: index,
                    provenance: provenance.clone(),
                    error,
                });
                break;
            }
        }
    }
    debug!(%provenance, objects = sent, "source exhausted");
}

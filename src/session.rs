use std::collections::HashSet;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

// our own stuff that we need
use crate::error::Result;
use crate::identifier::{Identifier, IdentifierGenerator};
use crate::ingest::{Source, SourceFailure, SourceLoader};
use crate::query::Query;
use crate::reader::Reader;
use crate::schema::ObjectType;
use crate::settings::Settings;
use crate::store::{Duplicates, ObjectStore};
use crate::writer::{self, WriteReport};

// ------------- Session -------------
/// A loaded configuration plus the current selection of objects.
///
/// Searches narrow the selection, and bulk edits and deletes apply to it.
pub struct Session {
    id: Identifier,
    store: ObjectStore,
    matches: Vec<Identifier>,
    generator: Arc<IdentifierGenerator>,
    settings: Settings,
    from_pipe: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }
    pub fn with_settings(settings: Settings) -> Self {
        Self::with_generator(settings, Arc::new(IdentifierGenerator::new()))
    }
    pub fn with_generator(settings: Settings, generator: Arc<IdentifierGenerator>) -> Self {
        Self {
            id: generator.generate(),
            store: ObjectStore::new(),
            matches: Vec::new(),
            generator,
            settings,
            from_pipe: false,
        }
    }
    pub fn id(&self) -> Identifier {
        self.id
    }
    pub fn store(&self) -> &ObjectStore {
        &self.store
    }
    pub fn store_mut(&mut self) -> &mut ObjectStore {
        &mut self.store
    }
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
    pub fn len(&self) -> usize {
        self.store.len()
    }
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
    /// True when the content came from a stream without provenance.
    pub fn from_pipe(&self) -> bool {
        self.from_pipe
    }

    // ------------- loading -------------
    pub fn load_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<Vec<SourceFailure>> {
        self.load_sources(paths.iter().map(Source::file).collect())
    }
    /// Loads all sources concurrently and adds their objects to the store.
    /// Sources that fail are returned; what they produced before failing is kept.
    pub fn load_sources(&mut self, sources: Vec<Source>) -> Result<Vec<SourceFailure>> {
        let loader =
            SourceLoader::new(Arc::clone(&self.generator)).with_buffer(self.settings.channel_buffer);
        let mut report = loader.load_store(sources)?;
        self.apply_layout(&mut report.store);
        self.store.append(report.store)?;
        self.from_pipe = false;
        Ok(report.failures)
    }
    /// Reads a single stream, such as stdin. Objects get no provenance, so
    /// they can only be written with [`Session::write_stream`].
    pub fn load_reader<R: Read>(&mut self, input: R) -> Result<usize> {
        let mut loaded = ObjectStore::new();
        let count = Reader::new(BufReader::new(input))
            .with_generator(Arc::clone(&self.generator))
            .read_into(&mut loaded)?;
        self.apply_layout(&mut loaded);
        self.store.append(loaded)?;
        self.from_pipe = true;
        info!(session = %self.id, objects = count, "stream loaded");
        Ok(count)
    }

    fn apply_layout(&self, store: &mut ObjectStore) {
        store.set_layout(self.settings.indent, self.settings.align);
        if self.settings.auto_align {
            store.auto_align();
        }
    }

    // ------------- selection -------------
    pub fn matches(&self) -> &[Identifier] {
        &self.matches
    }
    pub fn clear_matches(&mut self) {
        self.matches.clear();
    }
    pub fn filter_type(&mut self, types: &[ObjectType]) -> &[Identifier] {
        self.matches = self.store.filter_type(types);
        &self.matches
    }
    /// Searches within the current matches, or the whole store when there are none.
    pub fn search(&mut self, query: &Query) -> Result<&[Identifier]> {
        let subset = (!self.matches.is_empty()).then_some(self.matches.as_slice());
        let found = query.search(&self.store, subset)?;
        debug!(session = %self.id, matches = found.len(), "search");
        self.matches = found;
        Ok(&self.matches)
    }
    /// Replaces the matches with every other object. With no matches, that is everything.
    pub fn inverse_results(&mut self) -> &[Identifier] {
        let current: HashSet<Identifier> = self.matches.iter().copied().collect();
        self.matches = self
            .store
            .keys()
            .into_iter()
            .filter(|id| !current.contains(id))
            .collect();
        &self.matches
    }
    /// Removes the matched objects from the store and hands them back.
    pub fn delete_matches(&mut self) -> Result<ObjectStore> {
        let mut deleted = ObjectStore::new();
        for id in std::mem::take(&mut self.matches) {
            if let Some(object) = self.store.delete(&id) {
                deleted.add(id, object)?;
            }
        }
        Ok(deleted)
    }

    // ------------- editing -------------
    /// Sets properties on the matches, or on every object if nothing is matched.
    pub fn set_keys<K: AsRef<str>, V: AsRef<str>>(&mut self, keys: &[K], values: &[V]) -> usize {
        self.store.set_properties(&self.matches, keys, values)
    }
    /// Deletes properties from the matches only.
    pub fn delete_keys<K: AsRef<str>>(&mut self, keys: &[K]) -> usize {
        self.store.delete_properties(&self.matches, keys)
    }
    pub fn service_duplicates(&self) -> Duplicates {
        self.store.find_duplicate_services()
    }
    pub fn remove_duplicate_services(&mut self) -> usize {
        let removed = self.store.remove_duplicate_services(None);
        if removed > 0 {
            info!(session = %self.id, removed, "duplicate services removed");
        }
        removed
    }

    // ------------- writing -------------
    pub fn write_stream<W: Write>(&self, w: &mut W) -> Result<usize> {
        writer::write_all(&self.store, w, self.settings.sorted)
    }
    /// Writes every object back to the file it came from.
    pub fn write_back(&self) -> Result<WriteReport> {
        writer::write_split_by_provenance(&self.store, self.settings.sorted)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

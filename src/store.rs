use std::collections::{BTreeMap, HashSet};

// the store is keyed by identifiers, which hash well with a fast hasher
use core::hash::BuildHasherDefault;
use std::collections::HashMap;
use seahash::SeaHasher;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// our own stuff that we need
use crate::error::{NagcfgError, Result};
use crate::identifier::Identifier;
use crate::object::ConfigObject;
use crate::schema::ObjectType;

pub type IdHasher = BuildHasherDefault<SeaHasher>;

/// Natural key of a service mapped to every identifier carrying it, in store order.
pub type Duplicates = BTreeMap<String, Vec<Identifier>>;

// ------------- ObjectStore -------------
/// Objects keyed by identifier, remembering the order they were added in.
///
/// Deleting an object leaves its identifier in the order list. Stale entries
/// are skipped whenever order is asked for, and [`ObjectStore::compact_order`]
/// drops them for good.
#[derive(Debug, Default, Clone)]
pub struct ObjectStore {
    objects: HashMap<Identifier, ConfigObject, IdHasher>,
    order: Vec<Identifier>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
    /// Builds a store from objects tagged with the index of the source they
    /// came from. Order is (source index, sequence within that source), no
    /// matter in which order the objects arrive.
    pub fn from_ordered(mut objects: Vec<(usize, ConfigObject)>) -> Result<Self> {
        objects.sort_by_key(|(source, object)| (*source, object.sequence));
        let mut store = Self::new();
        for (_, object) in objects {
            store.insert(object)?;
        }
        Ok(store)
    }

    /// Upsert. Returns true if an object was displaced. An object without an
    /// identifier takes on `id`; one that already has a different identifier
    /// is refused.
    ///
    /// An identifier that was deleted and is added again moves to the end of
    /// the order.
    pub fn add(&mut self, id: Identifier, mut object: ConfigObject) -> Result<bool> {
        if !object.assign_id(id) && object.id() != Some(id) {
            warn!(%id, object = %object, "object refused, it carries another identifier");
            return Err(NagcfgError::Invariant(format!(
                "cannot store {object} under identifier {id}"
            )));
        }
        let displaced = self.objects.insert(id, object).is_some();
        if !displaced {
            // more order entries than objects means some are stale
            if self.order.len() >= self.objects.len() {
                self.order.retain(|tracked| *tracked != id);
            }
            self.order.push(id);
        }
        Ok(displaced)
    }
    /// Refuses to overwrite. Returns true if the object was added.
    pub fn add_if_absent(&mut self, id: Identifier, object: ConfigObject) -> Result<bool> {
        if self.objects.contains_key(&id) {
            debug!(%id, "attempt to add an existing identifier ignored");
            return Ok(false);
        }
        Ok(!self.add(id, object)?)
    }
    /// Adds an object under its own identifier.
    pub fn insert(&mut self, object: ConfigObject) -> Result<bool> {
        let id = object.id().ok_or_else(|| {
            NagcfgError::Invariant(format!("cannot store {object} without an identifier"))
        })?;
        self.add(id, object)
    }
    pub fn get(&self, id: &Identifier) -> Option<&ConfigObject> {
        self.objects.get(id)
    }
    pub fn get_mut(&mut self, id: &Identifier) -> Option<&mut ConfigObject> {
        self.objects.get_mut(id)
    }
    pub fn delete(&mut self, id: &Identifier) -> Option<ConfigObject> {
        self.objects.remove(id)
    }
    pub fn contains(&self, id: &Identifier) -> bool {
        self.objects.contains_key(id)
    }
    pub fn len(&self) -> usize {
        self.objects.len()
    }
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Sets the given properties on the listed objects, or on every object
    /// when no identifiers are given. Returns the number of properties set.
    pub fn set_properties<K: AsRef<str>, V: AsRef<str>>(
        &mut self,
        ids: &[Identifier],
        keys: &[K],
        values: &[V],
    ) -> usize {
        if ids.is_empty() {
            return self
                .objects
                .values_mut()
                .map(|object| object.set_keys(keys, values))
                .sum();
        }
        let mut count = 0;
        for id in ids {
            if let Some(object) = self.objects.get_mut(id) {
                count += object.set_keys(keys, values);
            }
        }
        count
    }
    /// Deletes the given properties from the listed objects. An empty id
    /// list deletes nothing.
    pub fn delete_properties<K: AsRef<str>>(&mut self, ids: &[Identifier], keys: &[K]) -> usize {
        let mut count = 0;
        for id in ids {
            if let Some(object) = self.objects.get_mut(id) {
                count += object.delete_keys(keys);
            }
        }
        count
    }

    pub fn longest_key(&self) -> usize {
        self.objects.values().map(ConfigObject::longest_key).max().unwrap_or(0)
    }
    /// Aligns every object to the longest key in the store.
    pub fn auto_align(&mut self) -> usize {
        let align = self.longest_key() + 2;
        for object in self.objects.values_mut() {
            object.align = align;
        }
        align
    }
    pub fn set_layout(&mut self, indent: usize, align: usize) {
        for object in self.objects.values_mut() {
            object.indent = indent;
            object.align = align;
        }
    }

    /// Identifiers in the order their objects were added.
    ///
    /// Deleted objects are filtered out. Objects the order list does not know
    /// about follow the tracked ones, sorted by identifier time, which is not
    /// necessarily the order they were added in.
    pub fn keys(&self) -> Vec<Identifier> {
        let mut seen = HashSet::with_capacity(self.objects.len());
        let mut keys: Vec<Identifier> = self
            .order
            .iter()
            .filter(|id| self.objects.contains_key(*id) && seen.insert(**id))
            .copied()
            .collect();
        if keys.len() < self.objects.len() {
            let mut untracked: Vec<Identifier> = self
                .objects
                .keys()
                .filter(|id| !seen.contains(*id))
                .copied()
                .collect();
            untracked.sort_by_key(|id| (id.timestamp(), id.clock_sequence(), *id));
            keys.extend(untracked);
        }
        keys
    }
    /// Objects in [`ObjectStore::keys`] order.
    pub fn iter(&self) -> impl Iterator<Item = &ConfigObject> + '_ {
        self.keys().into_iter().filter_map(move |id| self.objects.get(&id))
    }
    /// Rewrites the order list so it holds exactly the live identifiers.
    pub fn compact_order(&mut self) {
        self.order = self.keys();
    }

    pub fn split_by_provenance(&self) -> BTreeMap<String, Vec<Identifier>> {
        let mut groups: BTreeMap<String, Vec<Identifier>> = BTreeMap::new();
        for id in self.keys() {
            let Some(object) = self.objects.get(&id) else {
                continue;
            };
            if object.provenance.is_empty() {
                continue;
            }
            groups.entry(object.provenance.clone()).or_default().push(id);
        }
        groups
    }

    pub fn filter_type(&self, types: &[ObjectType]) -> Vec<Identifier> {
        self.keys()
            .into_iter()
            .filter(|id| {
                self.objects
                    .get(id)
                    .is_some_and(|object| types.contains(&object.object_type()))
            })
            .collect()
    }

    /// Moves every object of `other` into this store. Identifiers already
    /// present are refused and counted in the error.
    pub fn append(&mut self, mut other: ObjectStore) -> Result<()> {
        let total = other.len();
        let mut failed = 0;
        for id in other.keys() {
            if let Some(object) = other.objects.remove(&id) {
                if !matches!(self.add_if_absent(id, object), Ok(true)) {
                    failed += 1;
                }
            }
        }
        if failed > 0 {
            return Err(NagcfgError::Append { failed, total });
        }
        Ok(())
    }

    // ------------- duplicates -------------
    /// Services sharing `host_name;service_description`. Only keys seen more
    /// than once are returned.
    pub fn find_duplicate_services(&self) -> Duplicates {
        let mut groups = Duplicates::new();
        for id in self.keys() {
            let Some(object) = self.objects.get(&id) else {
                continue;
            };
            if object.object_type() != ObjectType::Service {
                continue;
            }
            if let Some(natural_key) = object.unique_check_name() {
                groups.entry(natural_key).or_default().push(id);
            }
        }
        groups.retain(|natural_key, ids| {
            if ids.len() > 1 {
                debug!(key = %natural_key, count = ids.len(), "duplicate services");
                true
            } else {
                false
            }
        });
        groups
    }
    /// Deletes all but the first object of every duplicate group. Pass the
    /// result of an earlier [`ObjectStore::find_duplicate_services`] to skip
    /// the scan. Returns the number of objects deleted.
    pub fn remove_duplicate_services(&mut self, duplicates: Option<Duplicates>) -> usize {
        let duplicates = duplicates.unwrap_or_else(|| self.find_duplicate_services());
        duplicates
            .values()
            .flat_map(|ids| ids.iter().skip(1))
            .filter(|id| self.objects.remove(*id).is_some())
            .count()
    }

    // ------------- interchange -------------
    pub fn to_json(&self) -> Result<String> {
        let entries: BTreeMap<String, Interchange> = self
            .iter()
            .filter_map(|object| {
                let id = object.id()?;
                Some((id.to_string(), Interchange::from_object(id, object)))
            })
            .collect();
        Ok(serde_json::to_string_pretty(&entries)?)
    }
    /// Restores a store from [`ObjectStore::to_json`] output. Order follows
    /// identifier time.
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: BTreeMap<String, Interchange> = serde_json::from_str(json)?;
        let mut objects = Vec::with_capacity(entries.len());
        for (key, entry) in entries {
            let id: Identifier = key.parse()?;
            if id != entry.uuid {
                return Err(NagcfgError::Serialization(format!(
                    "entry {key} carries mismatching identifier {}",
                    entry.uuid
                )));
            }
            objects.push(entry.into_object());
        }
        objects.sort_by_key(|object| {
            object
                .id()
                .map(|id| (id.timestamp(), id.clock_sequence(), id))
        });
        let mut store = Self::new();
        for object in objects {
            store.insert(object)?;
        }
        Ok(store)
    }
}

#[derive(Serialize, Deserialize)]
struct Interchange {
    uuid: Identifier,
    #[serde(rename = "type")]
    object_type: ObjectType,
    fileid: String,
    props: BTreeMap<String, String>,
}

impl Interchange {
    fn from_object(id: Identifier, object: &ConfigObject) -> Self {
        Self {
            uuid: id,
            object_type: object.object_type(),
            fileid: object.provenance.clone(),
            props: object.properties().clone(),
        }
    }
    fn into_object(self) -> ConfigObject {
        let mut object = ConfigObject::with_id(self.object_type, self.uuid);
        object.provenance = self.fileid;
        for (key, value) in &self.props {
            object.set(key, value);
        }
        object
    }
}

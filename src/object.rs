use std::collections::BTreeMap;
use std::fmt;

// used for all property matching
use regex::Regex;

// our own stuff that we need
use crate::identifier::Identifier;
use crate::query::Query;
use crate::schema::{DEFAULT_ALIGN, DEFAULT_INDENT, ObjectType, SEP_CMD};

// ------------- ConfigObject -------------
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigObject {
    object_type: ObjectType,
    id: Option<Identifier>,
    pub provenance: String,
    // position within the source it was read from
    pub sequence: u64,
    properties: BTreeMap<String, String>,
    pub indent: usize,
    pub align: usize,
}

impl ConfigObject {
    pub fn new(object_type: ObjectType) -> Self {
        Self {
            object_type,
            id: None,
            provenance: String::new(),
            sequence: 0,
            properties: BTreeMap::new(),
            indent: DEFAULT_INDENT,
            align: DEFAULT_ALIGN,
        }
    }
    pub fn with_id(object_type: ObjectType, id: Identifier) -> Self {
        let mut object = Self::new(object_type);
        object.id = Some(id);
        object
    }
    // fixed at construction
    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }
    pub fn id(&self) -> Option<Identifier> {
        self.id
    }
    /// Gives the object its identity. Returns false, leaving the object
    /// untouched, if it already has one.
    pub fn assign_id(&mut self, id: Identifier) -> bool {
        if self.id.is_some() {
            return false;
        }
        self.id = Some(id);
        true
    }
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
    pub fn len(&self) -> usize {
        self.properties.len()
    }
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Returns true if an existing value was overwritten.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        self.properties.insert(key.to_string(), value.to_string()).is_some()
    }
    /// Returns true only if the key was not present and has been added.
    pub fn add(&mut self, key: &str, value: &str) -> bool {
        if self.properties.contains_key(key) {
            return false;
        }
        self.properties.insert(key.to_string(), value.to_string());
        true
    }
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
    pub fn delete(&mut self, key: &str) -> bool {
        self.properties.remove(key).is_some()
    }
    /// Pairs keys with values by position, stopping at the shorter list.
    pub fn set_keys<K: AsRef<str>, V: AsRef<str>>(&mut self, keys: &[K], values: &[V]) -> usize {
        let count = keys.len().min(values.len());
        for (key, value) in keys.iter().zip(values) {
            self.set(key.as_ref(), value.as_ref());
        }
        count
    }
    pub fn delete_keys<K: AsRef<str>>(&mut self, keys: &[K]) -> usize {
        keys.iter().filter(|key| self.delete(key.as_ref())).count()
    }

    pub fn get_list(&self, key: &str, separator: &str) -> Option<Vec<&str>> {
        self.get(key).map(|value| value.split(separator).collect())
    }
    pub fn set_list<S: AsRef<str>>(&mut self, key: &str, separator: &str, items: &[S]) -> bool {
        let joined = join(items, separator);
        self.set(key, &joined)
    }
    pub fn add_list<S: AsRef<str>>(&mut self, key: &str, separator: &str, items: &[S]) -> bool {
        let joined = join(items, separator);
        self.add(key, &joined)
    }

    // ------------- identity -------------
    pub fn host_name(&self) -> Option<&str> {
        match self.object_type {
            ObjectType::Host | ObjectType::Service => self.get("host_name"),
            _ => None,
        }
    }
    /// The `!` separated parts of a service check command.
    pub fn check_command(&self) -> Option<Vec<&str>> {
        if self.object_type != ObjectType::Service {
            return None;
        }
        self.get_list("check_command", SEP_CMD)
    }
    pub fn check_command_name(&self) -> Option<&str> {
        self.check_command()?.first().copied()
    }
    pub fn check_command_args(&self) -> Option<Vec<&str>> {
        self.check_command().map(|parts| parts.into_iter().skip(1).collect())
    }
    /// `<type>_name`, or the generic `name` used by templates.
    pub fn name(&self) -> Option<&str> {
        self.get(&format!("{}_name", self.object_type))
            .or_else(|| self.get("name"))
    }
    pub fn description(&self) -> Option<&str> {
        self.get(&format!("{}_description", self.object_type))
    }
    /// `host_name;service_description`, the natural key of a service.
    pub fn unique_check_name(&self) -> Option<String> {
        let host = self.host_name()?;
        let description = self.description()?;
        Some(format!("{host};{description}"))
    }

    /// The single comment line written above the definition.
    pub fn comment(&self) -> String {
        let t = self.object_type;
        let own = if t == ObjectType::Service {
            self.description()
        } else {
            self.get(&format!("{t}_name"))
        };
        if let Some(name) = own {
            return format!("# {t} '{name}'");
        }
        match self.get("name") {
            Some(name) => format!("# {t} template '{name}'"),
            None => format!("# {t}"),
        }
    }

    // ------------- layout -------------
    pub fn longest_key(&self) -> usize {
        self.properties
            .keys()
            .map(|key| key.chars().count())
            .max()
            .unwrap_or(0)
    }
    pub fn auto_align(&mut self) -> usize {
        self.align = self.longest_key() + 2;
        self.align
    }

    // ------------- matching -------------
    pub fn matches_any(&self, rx: &Regex) -> bool {
        self.properties.values().any(|value| rx.is_match(value))
    }
    /// True if the value of any of the given keys matches. Missing keys never match.
    pub fn matches_any_key<K: AsRef<str>>(&self, rx: &Regex, keys: &[K]) -> bool {
        keys.iter()
            .any(|key| self.get(key.as_ref()).is_some_and(|value| rx.is_match(value)))
    }
    /// True if every given key exists and its value matches.
    pub fn matches_all_keys<K: AsRef<str>>(&self, rx: &Regex, keys: &[K]) -> bool {
        keys.iter()
            .all(|key| self.get(key.as_ref()).is_some_and(|value| rx.is_match(value)))
    }
    /// Positional pairing of keys and patterns. An unbalanced query never matches.
    pub fn matches_pairs(&self, query: &Query) -> bool {
        if !query.is_balanced() {
            return false;
        }
        query
            .keys()
            .iter()
            .zip(query.patterns())
            .all(|(key, rx)| self.get(key).is_some_and(|value| rx.is_match(value)))
    }
}

impl fmt::Display for ConfigObject {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{} {} ({} properties)", self.object_type, id, self.len()),
            None => write!(f, "{} ({} properties)", self.object_type, self.len()),
        }
    }
}

fn join<S: AsRef<str>>(items: &[S], separator: &str) -> String {
    items
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>()
        .join(separator)
}

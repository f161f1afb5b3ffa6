//! nagcfg – reading, querying and writing Nagios style object configuration.
//!
//! Object configuration is a sequence of definition blocks:
//!
//! ```text
//! define service {
//!     host_name                      web01
//!     service_description            HTTP
//!     check_command                  check_http!-p 8080
//! }
//! ```
//!
//! Each block becomes a [`object::ConfigObject`]: its [`schema::ObjectType`],
//! a map of properties, the source it was read from (its provenance) and a
//! time-ordered [`identifier::Identifier`]. Objects live in an
//! [`store::ObjectStore`] that remembers the order they were read in.
//!
//! ## Modules
//! * [`reader`] – the line based tokenizer and block parser.
//! * [`store`] – the object store, duplicate services and JSON interchange.
//! * [`query`] – regex searches over properties; see the module docs for how
//!   keys and patterns combine.
//! * [`ingest`] – reads many sources concurrently into one store.
//! * [`writer`] – renders objects, optionally in the customary per-type key
//!   order, to one stream or back to each source file in parallel.
//! * [`session`] – ties it together: load, narrow a selection, edit, write back.
//! * [`settings`] – layered runtime settings.
//!
//! ## Quick Start
//! ```
//! use nagcfg::query::Query;
//! use nagcfg::session::Session;
//! let mut session = Session::new();
//! let text = "define host {\n    host_name web01\n    address 10.0.0.1\n}\n";
//! session.load_reader(text.as_bytes()).unwrap();
//! let mut query = Query::new();
//! query.add_key_pattern("host_name", "^web").unwrap();
//! assert_eq!(session.search(&query).unwrap().len(), 1);
//! ```
//!
//! ## Known limitations
//! Braces inside values are told apart from block delimiters by column only,
//! see [`reader`]. Objects added to a store after loading are ordered after
//! the loaded ones by identifier time rather than by when they were added.

pub mod error;
pub mod identifier;
pub mod schema;
pub mod object;
pub mod reader;
pub mod store;
pub mod query;
pub mod ingest;
pub mod writer;
pub mod session;
pub mod settings;

//! Elastic Schema
//!
//! Declarative schema management for Elasticsearch-compatible clusters:
//! creating, modifying, deleting and introspecting indexes, and configuring
//! their text-analysis pipelines.
//!
//! ## Features
//!
//! - **Blueprints**: index structure and analysis components are described by
//!   populating a blueprint in a closure, then applied in one cluster call
//! - **Ordered analysis**: analyzers, tokenizers and filters keep their
//!   declaration order, so later components can reference earlier ones
//! - **Mapping introspection**: nested mappings are reduced to the logical
//!   field names used in queries (`comments.author`)
//! - **Pluggable transport**: everything goes through the [`Connection`] trait;
//!   [`MemoryConnection`] serves tests and dry runs
//!
//! ## Example
//!
//! ```
//! use elastic_schema::{MemoryConnection, SchemaBuilder};
//!
//! let schema = SchemaBuilder::new(MemoryConnection::new());
//! schema.create("blog_posts", |index| {
//!     index.text("title");
//!     index.nested("comments").with_properties(|c| {
//!         c.text("author");
//!     });
//! })?;
//!
//! assert!(schema.has_field("blog_posts", "comments.author"));
//! # Ok::<(), elastic_schema::SchemaError>(())
//! ```

pub mod analyzer;
pub mod blueprint;
pub mod builder;
pub mod config;
pub mod connection;
pub mod error;
pub mod mapping;
pub mod memory;

pub use analyzer::{AnalyzerBlueprint, AnalyzerDefinition, AnalyzerKind};
pub use blueprint::{FieldDefinition, IndexBlueprint};
pub use builder::SchemaBuilder;
pub use config::{OutputFormat, SchemaConfig};
pub use connection::{Connection, IndexInfo};
pub use error::{Result, SchemaError};
pub use memory::{Call, MemoryConnection};

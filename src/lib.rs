//! # rowbuf - Schema-Driven Row Buffer Engine
//!
//! rowbuf turns a declarative table description (columns, types, primary key,
//! update target, optional paging column) into a live, mutable, in-memory row
//! container backed by a relational store. The same compiled metadata drives
//! three coupled facilities:
//!
//! - **SQL generation**: parametrized INSERT/UPDATE/DELETE statements (or a
//!   single stored-procedure call) derived once from the updatable-column set
//!   and executed row-by-row or as one driver-level batch.
//! - **Retrieval and server paging**: query execution with optional predicate
//!   injection and a page-scoped connection that stays open across page
//!   requests.
//! - **Frame codec**: a fixed-width binary representation of one row's
//!   updatable columns for non-relational transport (device and agent
//!   protocols), with caller-selected endianness.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │   Descriptor (JSON table + columns)  │
//! ├──────────────────────────────────────┤
//! │   Schema Compiler (CompiledSchema)   │
//! ├──────────────────┬───────────────────┤
//! │  Mutation Plan   │   Frame Layout    │
//! ├──────────────────┴───────────────────┤
//! │   DataBuffer (retrieve/save/paging)  │
//! ├──────────────────────────────────────┤
//! │   Backend seam (Connector traits)    │
//! └──────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use rowbuf::{CompiledSchema, DataBuffer, Operation, SchemaDesc};
//!
//! let desc = SchemaDesc::from_json(descriptor_json)?;
//! let schema = CompiledSchema::compile(&desc, &env)?;
//! let mut db = DataBuffer::new(schema, env);
//!
//! db.retrieve(&[])?;
//! db.save(Operation::Insert)?;
//! ```
//!
//! ## Module Overview
//!
//! - [`types`]: logical column types, SQL type codes, runtime values
//! - [`schema`]: declarative descriptors and the one-shot compiler
//! - [`sql`]: mutation statement builder and the query-rewriter seam
//! - [`backend`]: connector/connection traits the engine drives
//! - [`rowset`]: scrollable in-memory row store with insert staging
//! - [`engine`]: retrieval, paging and mutation state machine
//! - [`frame`]: fixed-width binary frame layout and codec
//!
//! ## Concurrency Model
//!
//! A container is single-threaded by design. Many containers may run
//! concurrently, each independently connected, but one container's cursor,
//! command text and page counter must not be mutated from two threads.

pub mod backend;
pub mod engine;
pub mod error;
pub mod frame;
pub mod rowset;
pub mod schema;
pub mod sql;
pub mod types;

pub use backend::{
    Connection, Connector, DirSource, Environment, ExecResult, PageWindow, ProcResult,
    SchemaSource,
};
pub use engine::DataBuffer;
pub use error::Error;
pub use frame::{ByteOrder, Frame, FrameBuffer, FrameLayout};
pub use rowset::RowStore;
pub use schema::{ColumnDesc, ColumnMeta, CompiledSchema, SchemaDesc, Style, TableDesc, ValuePair};
pub use sql::{AppendWhere, MutationPlan, MutationStatement, QueryRewriter};
pub use types::{DataType, Operation, SqlType, Value};

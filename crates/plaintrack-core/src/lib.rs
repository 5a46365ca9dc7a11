//! Domain records, Markdown codec, query engine and analytics for plaintrack.
//!
//! Nothing in this crate touches the filesystem. Callers hand in raw text and
//! get records back (or the other way around), and every time-dependent
//! computation takes `now` explicitly.

/// Workload, progress, due dates, status and burndown computations.
pub mod analytics;
/// Markdown encoding and decoding of index and task files.
pub mod codec;
/// Task identifier derivation.
pub mod id;
/// Index, task and option records.
pub mod model;
/// Task filtering and sorting.
pub mod query;
/// Timestamp parsing, formatting and calendar helpers.
pub mod timestamp;

pub use codec::{
    CodecError, TaskCodec, decode_index, decode_index_bytes, decode_task, decode_task_bytes,
    encode_index, encode_task,
};
pub use id::{InvalidTaskName, checked_task_id, task_id};
pub use model::{
    Column, Comment, CustomField, CustomFieldType, CustomValue, Index, IndexOptions, Relation,
    Sprint, SubTask, Task, TaskMetadata, UpdatePolicy,
};
pub use query::{
    FieldKind, FieldResolver, FieldValue, FilterValue, QueryError, SortOrder, Sorter, TaskFilter,
    filter_tasks, sort_tasks,
};

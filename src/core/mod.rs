//! Core data types and I/O operations.

pub mod loaders;
pub mod record;
pub mod table;
pub mod transforms;
pub mod writers;

pub use loaders::{LoadedRecords, LoaderError, ScheduleKey, ScheduleTrace, WeldKey};
pub use record::{Attribute, Matrix, OutputRecord};
pub use table::{Cell, Table};
pub use writers::{read_json_store, write_records, JsonStore, MemoryStore, RecordStore, WriteError};

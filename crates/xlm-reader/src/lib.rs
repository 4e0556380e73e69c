//! Streaming workbook reader: type introspection (C1), cell normalization
//! (C2), dimension prevalidation (C3), the streaming reader kernel (C4), and
//! the read strategy selector (C5).

pub mod colref;
pub mod convert;
pub mod dimension;
pub mod memory_monitor;
pub mod normalize;
pub mod package;
pub mod reactive;
pub mod reader;
pub mod strategy;
pub mod type_cache;

pub use convert::ConvertError;
pub use dimension::{DimensionError, DimensionMap, DimensionPrevalidator, SheetDimension};
pub use normalize::normalize as normalize_cell_value;
pub use reactive::ReactiveDispatchRunner;
pub use reader::{BatchSink, ReadOutcome, ReaderError, RowRecord, StreamingWorkbookReader};
pub use strategy::{DispatchError, ParallelDispatchRunner, ReadStrategySelector, StrategyContext};
pub use type_cache::{DescribedRecord, FieldDescriptor, TypeIntrospectionCache};

//! Convenient imports for typical `pgload` usage.
//!
//! ```ignore
//! use pgload::prelude::*;
//! ```

pub use crate::{
    GenericClient, Loader, Mapper, MapperConfig, OrmError, OrmResult, Record, Scannable,
    StructInsert, StructUpdate, run_in_transaction,
};

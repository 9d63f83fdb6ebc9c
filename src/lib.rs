//! Dashboard data-source bridge for a Spice runtime.
//!
//! Queries are executed remotely and answered as Arrow record batches; the
//! columnar layer decodes every batch and folds it into one typed data frame
//! per query.

pub mod backend;
pub mod cli;
pub mod columnar;
pub mod config;
pub mod datasource;
pub mod error;
pub mod format;
pub mod frame;
pub mod logging;
pub mod masking;
pub mod output;
pub mod query;

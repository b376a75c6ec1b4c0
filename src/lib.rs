//! Concurrent HTTP load generation against a single URL.
//!
//! One thread per unit, all launched in a burst, joined once, then reduced
//! into a report. Responses can be saved to disk and checked byte-for-byte
//! against a reference file.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod limits;
pub mod reference;
pub mod report;
pub mod transfer;
pub mod unit;
pub mod worker;

pub use config::{RunConfig, MAX_POPULATION};
pub use dispatch::{Dispatcher, Population};
pub use error::{RunError, UnitError, UnitErrorKind};
pub use report::{summarize, Report};
pub use transfer::{HttpTransfer, Transfer, TransferSink};

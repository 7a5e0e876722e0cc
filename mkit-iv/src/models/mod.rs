//! Data models for mkit-iv (Input Voucher intake service)

pub mod batch;
pub mod record;

pub use batch::{Batch, BatchReport, ReviewStatus, StatusCounts};
pub use record::{RecordStatus, SourceChannel, StatusTransition, VoucherRecord};

//! Text parsing: single email files, quote-trail reordering, multi-message
//! blob splitting, Gmail print exports, and header-value helpers.

pub mod email;
pub mod gmail;
pub mod header;
pub mod splitter;
pub mod trail;

pub use email::{load_email_file, parse, ParseMode};
pub use gmail::parse_gmail_export;
pub use splitter::{SplitStrategy, ThreadSplitter};
pub use trail::reorder;

pub mod error;
pub mod fetcher;
pub mod infobox;
pub mod parser;
pub mod rate_limit;
pub mod result;

pub use error::{ExtractionError, TransportError};
pub use fetcher::{FetchPolicy, Fetcher, HttpTransport, PageRequest, Transport};
pub use infobox::{RawRecord, extract_infobox};
pub use parser::{ParsedDocument, parse, parse_page};
pub use rate_limit::RateLimiter;
pub use result::FetchOutcome;

pub mod errors;
pub mod model;
mod reader;
pub mod schema;

pub use errors::ParserError;
pub use model::{LoadedRequestLog, Priority, Request, RequestLog, DONE_STATUS};
pub use reader::{load_requests, parse_requests};
pub use schema::REQUEST_COLUMNS;

#[cfg(test)]
mod tests;

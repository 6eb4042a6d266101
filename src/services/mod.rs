pub mod contact_researcher;
pub mod droid;
pub mod email_generator;
pub mod firecrawl;
pub mod openai_client;
pub mod page_parser;
pub mod pipeline;
pub mod process_registry;
pub mod progress_tracker;
pub mod search_client;
pub mod website_scraper;

#[cfg(test)]
pub mod testing;

pub use contact_researcher::*;
pub use droid::*;
pub use email_generator::*;
pub use firecrawl::*;
pub use openai_client::*;
pub use pipeline::*;
pub use process_registry::*;
pub use progress_tracker::*;
pub use search_client::*;
pub use website_scraper::*;

pub mod address;
pub mod browser;
pub mod discovery;
pub mod listing;
pub mod rules;
pub mod session;
pub mod traits;
pub mod types;
pub mod urls;

pub use address::AddressScraper;
pub use browser::{ChromePage, ChromeSession};
pub use discovery::UrlDiscovery;
pub use listing::{parse_listing, ListingExtractor};
pub use session::{bootstrap_session, ConsoleOperator};
pub use traits::{load_or_close, BrowserSession, Operator, PageHandle};
pub use types::{AreaTarget, DiscoveryState};

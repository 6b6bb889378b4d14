//! Concrete extraction strategies for the three methods.

pub mod api;
pub mod browser;
pub mod dom;
pub mod http_client;

use std::sync::Arc;
use std::time::Duration;

use ax_engine::{Method, StrategyRegistry};

pub use api::ApiStrategy;
pub use browser::BrowserStrategy;
pub use dom::DomStrategy;
pub use http_client::HttpClient;

/// Registry with every method wired up. The browser handle is returned so
/// the caller can shut Chromium down when done.
pub fn default_registry(http_timeout: Duration) -> (StrategyRegistry, Arc<BrowserStrategy>) {
    let http = HttpClient::new(http_timeout);
    let browser = Arc::new(BrowserStrategy::new(http_timeout));

    let registry = StrategyRegistry::new()
        .with_strategy(Method::Api, Arc::new(ApiStrategy::new(http.clone())))
        .with_strategy(Method::Dom, Arc::new(DomStrategy::new(http)))
        .with_strategy(Method::Browser, browser.clone());

    (registry, browser)
}

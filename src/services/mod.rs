// Service exports
pub mod cache;
pub mod live_store;
pub mod store;
pub mod website;

pub use cache::{CacheEntry, CacheError, CacheKey, CacheLookup, CacheManager, CacheStats};
pub use live_store::{LiveStoreClient, LiveStoreError};
pub use store::{DataSource, RiskKeywordStore, StaticDataset, StoreError, TaxonomyStore};
pub use website::{RobotsRules, WebsiteAnalysis, WebsiteError, WebsitePipeline};

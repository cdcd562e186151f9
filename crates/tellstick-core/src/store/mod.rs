mod refresh;
mod state_store;

pub(crate) use refresh::{enrich_from_cache, enrich_from_info};
pub use state_store::StateStore;
pub(crate) use state_store::StoreState;

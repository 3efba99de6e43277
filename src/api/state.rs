use std::sync::Arc;
use sqlx::{Pool, Sqlite};
use crate::ai::GenerationProvider;
use crate::billing::StripeClient;
use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Sqlite>,
    pub config: Arc<Config>,
    pub generator: Arc<dyn GenerationProvider>,
    pub stripe: Arc<StripeClient>,
}

pub mod auth;
pub mod common;
pub mod coupons;
pub mod health;
pub mod stores;
pub mod transactions;
pub mod users;

use std::sync::Arc;

use crate::auth::TokenService;
use crate::events::EventSender;
use crate::repositories::CommerceRepository;
use crate::services::{AccountService, CouponService, StoreService, TransactionEngine};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub accounts: Arc<AccountService>,
    pub stores: Arc<StoreService>,
    pub coupons: Arc<CouponService>,
    pub transactions: Arc<TransactionEngine>,
}

impl AppServices {
    /// Wires every service against one repository and event channel.
    pub fn new(
        repo: Arc<dyn CommerceRepository>,
        tokens: Arc<TokenService>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            accounts: Arc::new(AccountService::new(
                repo.clone(),
                tokens,
                event_sender.clone(),
            )),
            stores: Arc::new(StoreService::new(repo.clone(), event_sender.clone())),
            coupons: Arc::new(CouponService::new(repo.clone(), event_sender.clone())),
            transactions: Arc::new(TransactionEngine::new(repo, event_sender)),
        }
    }
}

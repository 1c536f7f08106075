// Staff accounts and sessions
pub mod accounts;

// Store administration
pub mod coupons;
pub mod stores;

// Checkout
pub mod transactions;

pub use accounts::AccountService;
pub use coupons::{CouponEngine, CouponService};
pub use stores::StoreService;
pub use transactions::TransactionEngine;

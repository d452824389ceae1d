//! Service layer
//!
//! Business logic for each module of the ERP. Services validate input,
//! enforce domain rules, call repositories, and manage cache invalidation.

pub mod backup;
pub mod budget;
pub mod contact;
pub mod ledger;
pub mod password;
pub mod project;
pub mod rate_limiter;
pub mod task;
pub mod user;

pub use budget::BudgetService;
pub use contact::ContactService;
pub use ledger::LedgerService;
pub use project::ProjectService;
pub use rate_limiter::LoginRateLimiter;
pub use task::TaskService;
pub use user::UserService;

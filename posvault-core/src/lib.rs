pub mod cache;
pub mod coordinator;
pub mod error;
pub mod fee;
pub mod intent;
pub mod overview;
pub mod role;


pub use cache::{FactCache, FactState};
pub use coordinator::{ActionCoordinator, ActionId, LifecycleState, PendingAction};
pub use error::{CoordinatorError, FailureReason, ValidationError};
pub use fee::{quote, FeeQuote};
pub use overview::{lookup_merchant, VaultOverview, VaultStatus};
pub use role::{resolve, Access, RoleResolver, RoleStatus, Roles};

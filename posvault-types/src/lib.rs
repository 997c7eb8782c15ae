pub mod amount;
pub mod fact;
pub mod identity;
pub mod operation;
pub mod submission;

pub use amount::{Amount, AmountError};
pub use fact::{FactKey, FactValue};
pub use identity::{is_valid_identity, Identity, IdentityError};
pub use operation::{OperationKind, VaultOperation};
pub use submission::{Submission, TxReference};

pub mod user;
pub mod alert;

pub use user::{CurrentUser, User};
pub use alert::{ActiveAlert, Alert, AlertCondition, AlertOwner, AlertType, AlertUpdate, Comparison};

pub mod payment;
pub mod plan;
pub mod user;

pub use payment::{PaymentRecord, PaymentStatus};
pub use plan::GeneratedPlan;
pub use user::{NewUserProfile, UserProfile};

pub mod partner;
pub mod customer;
pub mod slot;
pub mod booking;
pub mod payment;
pub mod refund;
pub mod discount;

pub use partner::*;
pub use customer::*;
pub use slot::*;
pub use booking::*;
pub use payment::*;
pub use refund::*;
pub use discount::*;

pub mod appointment;
pub mod availability;
pub mod blocked_slot;
pub mod transaction;
pub mod user;

pub use appointment::AppointmentRepository;
pub use availability::AvailabilityRepository;
pub use blocked_slot::BlockedSlotRepository;
pub use transaction::TransactionRepository;
pub use user::UserRepository;

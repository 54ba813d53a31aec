pub mod errors;
pub mod gate;
pub mod keys;
pub mod password;

pub use errors::AuthError;
pub use gate::AuthGate;

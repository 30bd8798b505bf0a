mod device;
mod failed_auth;
mod license;
mod user;

pub use device::*;
pub use failed_auth::*;
pub use license::*;
pub use user::*;

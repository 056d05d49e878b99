//! Users, passwords and cookie based sessions.

mod cookie;
mod log_in;
mod log_out;
mod middleware;
mod password;
mod register_user;
mod token;
mod user;

pub use cookie::DEFAULT_COOKIE_DURATION;
pub use log_in::post_log_in;
pub use log_out::get_log_out;
pub use middleware::auth_guard;
pub use password::{PasswordHash, ValidatedPassword};
pub use register_user::register_user;
pub use user::{
    User, UserID, create_user, create_user_table, get_user_by_email, get_user_by_id,
    normalize_email,
};

#[cfg(test)]
pub use cookie::{COOKIE_TOKEN, set_auth_cookie};

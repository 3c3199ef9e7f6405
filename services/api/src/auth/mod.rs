pub mod password;
pub mod token;

pub use token::{bearer_token, Claims, TokenError, TokenPair, TokenService};

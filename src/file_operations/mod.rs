pub mod authz;
pub mod chunked;
pub mod claims;
pub mod errors;
pub mod handlers;
pub mod hierarchy;
pub mod operations;
pub mod path_utils;
pub mod share_token;
pub mod store;

//! GitHub webhook intake: signature check, payload parsing, trigger policy.

pub mod handler;
pub mod parser;
pub mod payload;
pub mod signature;

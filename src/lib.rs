pub mod api;
pub mod config;
pub mod core;
pub mod wechat;

#[cfg(test)]
pub(crate) mod testing;

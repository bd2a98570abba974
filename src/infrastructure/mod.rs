pub mod channel_gateway;
pub mod http_api;

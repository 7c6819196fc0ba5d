pub mod gateway;
pub mod http_gateway;

pub use gateway::TestGateway;
pub use http_gateway::HttpGateway;

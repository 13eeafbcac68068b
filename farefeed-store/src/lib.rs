pub mod app_config;
pub mod memory;
pub mod redis_broker;

pub use app_config::Config;
pub use memory::InMemoryBroker;
pub use redis_broker::RedisBroker;

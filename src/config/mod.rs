pub mod schema;

#[allow(unused_imports)]
pub use schema::{
    AgentConfig, Config, GatewayConfig, ObservabilityConfig, SessionsConfig, WeatherConfig,
};

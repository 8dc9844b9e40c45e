pub mod schema;

#[allow(unused_imports)]
pub use schema::{
    parse_temperature, Config, FixturesConfig, GatewayConfig, DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT,
};

pub mod eod_handlers;
pub mod handlers;
pub mod market_handlers;
pub mod openapi;
pub mod prediction_handlers;
pub mod responses;
pub mod routes;

pub use handlers::HealthState;
pub use market_handlers::MarketState;
pub use openapi::ApiDoc;
pub use responses::*;
pub use routes::create_router;

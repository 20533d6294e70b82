pub mod http_client;
pub mod token_estimator;

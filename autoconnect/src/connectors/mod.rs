pub mod http;

pub use http::{HttpBasicConnector, HttpTokenConnector};

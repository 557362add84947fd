pub mod client;
pub mod dispatch;
pub mod request;
pub mod response;
pub mod throttle;

pub use client::HttpClient;
pub use dispatch::{Dispatcher, SharedDispatcher};
pub use request::HttpRequest;
pub use response::{HttpResponse, Outcome};

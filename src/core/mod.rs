pub mod dispatcher;
pub mod registry;
pub mod request;
pub mod response;

pub use dispatcher::{Dispatcher, route_key};
pub use registry::ServiceRegistry;
pub use request::ServiceRequest;
pub use response::{ResponseError, ServiceResponse};

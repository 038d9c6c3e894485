pub mod api_response;
pub mod notification;
pub mod openapi;

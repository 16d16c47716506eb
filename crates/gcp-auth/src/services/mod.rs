pub mod grant_builder;
pub mod login_service;

pub use grant_builder::build_grant;
pub use login_service::LoginService;

pub mod auth_service;
pub use auth_service::{AuthService, RegisterRequest};

pub mod auth_service_impl;
pub use auth_service_impl::SeaOrmAuthService;

pub mod mailer;
pub use mailer::{LogMailer, ResetMailer};

pub mod access_key;
pub mod auth;
pub mod captcha;
pub mod download;
pub mod markup;
pub mod resolver;
pub mod tags;
pub mod tasks;

pub use access_key::AccessKeyIssuer;
pub use auth::{AuthService, SessionRenewer};
pub use captcha::{CaptchaChallenge, CaptchaSolver};
pub use download::{DocumentSource, DownloadService};
pub use resolver::{ProcessResolver, ResolveStrategy, Resolver};
pub use tags::TagService;
pub use tasks::TaskService;

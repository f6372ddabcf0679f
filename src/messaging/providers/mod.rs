//! Concrete transport providers.

pub mod mail;
mod stub;

pub use mail::{LogMailChannel, MailChannel, MailProvider, SmtpMailChannel};
pub use stub::StubProvider;

mod email;

pub use email::{SmtpMailer, VerificationMailer};

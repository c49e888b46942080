pub mod email;
pub mod payment;

pub use email::{EmailMessage, EmailSender, LogEmailSender, SmtpEmailSender};
pub use payment::{ChargeRequest, GatewayError, GatewayResponse, PaymentGateway, TranzilaGateway};

pub mod email;
pub mod phone;
pub mod provider;
pub mod sender;
pub mod sms;
pub mod whatsapp;

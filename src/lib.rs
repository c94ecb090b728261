//! Codec core for a small suite of developer tools: TOTP code generation,
//! Google Authenticator migration payloads, QRIS/EMVCo TLV payloads and
//! Luhn-valid test card numbers. Everything in here is a pure function over
//! value inputs; callers own scheduling, storage and presentation.

pub mod account;
pub mod aegis;
pub mod base32;
pub mod card;
pub mod migration;
pub mod qris;
pub mod totp;

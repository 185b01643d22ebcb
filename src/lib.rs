//! Keeps an SSH authorized-keys file in sync with users' published keys.
//!
//! Each cycle fetches `{host}/{user}.keys` for every configured user
//! ([`fetch`]), joins the successful listings in order ([`aggregate`]) and
//! atomically replaces the key file with the result ([`publish`]). The
//! [`scheduler`] runs one cycle or repeats them on an interval.

pub mod aggregate;
pub mod config;
pub mod fetch;
pub mod publish;
pub mod scheduler;

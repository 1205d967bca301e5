//! Test modules for the consumer engine
//!
//! Tests are organized by functional area; `helpers` holds shared fixtures.

mod acknowledgement;
mod helpers;

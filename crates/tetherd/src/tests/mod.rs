//! Test suites for the tether daemon.

mod support;
mod unit;

//! Test suites shared by every guard implementation.
//!
//! Each function is generic over the guard so downstream crates can run the
//! same assertions against their own reclamation strategy.

pub mod skip_list_stress_tests;

//! Fixtures for driving clients, surfaces and outputs in tests.

pub mod testrun;

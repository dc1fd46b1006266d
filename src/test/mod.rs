//! Test-only infrastructure shared by the service integration tests.

pub(crate) mod helpers;

pub(crate) use context::TestContext;

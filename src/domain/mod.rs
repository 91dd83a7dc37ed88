// Market data domain
pub mod market;

// Port interfaces
pub mod ports;

// Data-quality checks
pub mod validation;

// Domain-specific error types
pub mod errors;

//! Distributor Application Workflow
//!
//! ```text
//! apply ──▶ PENDING ──approve──▶ APPROVED  (distributor enrolled)
//!              └─────reject────▶ REJECTED
//! ```

pub mod models;
pub mod service;

pub use models::{ApplicationRequest, ApplicationStatus, DistributorApplication};
pub use service::ApplicationService;

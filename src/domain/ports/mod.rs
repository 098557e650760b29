//! Port trait definitions (hexagonal architecture).
//!
//! Async trait interfaces that infrastructure adapters must implement:
//! - `Coordinator`: the remote service issuing tasks and receiving results
//! - `TaskHandler`: one registered executor per `(domain, kind)` pair
//! - `Sandbox` / `SandboxFactory`: disposable per-task execution contexts
//!
//! These contracts keep the control loop independent of any concrete
//! transport or target site.

pub mod coordinator;
pub mod handler;

pub use coordinator::{Coordinator, CredentialStore, Credentials};
pub use handler::{Sandbox, SandboxFactory, TaskHandler};

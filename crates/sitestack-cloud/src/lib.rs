//! SiteStack Cloud Infrastructure
//!
//! This crate provides the declarative resource model and reconciliation
//! engine behind SiteStack. Resources are declared with explicit attribute
//! references; the engine orders them into a dependency graph, diffs them
//! against recorded state and realizes the difference through a provider.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  SiteStack CLI                   │
//! │            (sitestack preview/up/destroy)        │
//! └─────────────────┬───────────────────────────────┘
//!                   │ ResourceSet
//! ┌─────────────────▼───────────────────────────────┐
//! │                sitestack-cloud                   │
//! │  ┌──────────────┐  ┌──────────────┐             │
//! │  │ Input / Graph│  │  Reconciler  │             │
//! │  └──────────────┘  └──────┬───────┘             │
//! │  ┌──────────────┐         │                     │
//! │  │  State Mgmt  │◄────────┤                     │
//! │  └──────────────┘         │                     │
//! └───────────────────────────┼─────────────────────┘
//!                             │ trait CloudProvider
//!                     ┌───────▼───────┐
//!                     │ aws provider  │
//!                     └───────────────┘
//! ```

pub mod action;
pub mod engine;
pub mod error;
pub mod graph;
pub mod input;
pub mod provider;
pub mod state;

// Re-exports
pub use action::{Action, ActionResult, ActionType, ApplyResult, Plan, PlanSummary};
pub use engine::Reconciler;
pub use error::{CloudError, Result};
pub use graph::DependencyGraph;
pub use input::{AttrRef, Input};
pub use provider::{
    Attributes, AuthStatus, CloudProvider, REDACTED, ResolvedResource, ResourceConfig,
    ResourceSet,
};
pub use state::{GlobalState, ResourceState, ResourceStatus, StateLock, StateManager};

//! rackdirector provisioning
//!
//! Plan lifecycle and boot content for hosts being reinstalled:
//!
//! - [`PlanCatalog`]: plan names and their stage sequences
//! - [`PlanRegistry`]: which host is in which stage of which plan
//! - [`BootAssets`]: PXE menu, iPXE script and installer seed rendering
//! - [`ProvisioningService`]: the operations exposed over HTTP
//!
//! A host with no plan boots its local disk. Assigning a plan power cycles
//! the host; while its current stage is `install-<os>` the boot menu selects
//! `<os>` and `/installseed` serves `install-<os>.template`. Advancing past
//! the last stage retires the plan.

pub mod catalog;
pub mod content;
pub mod error;
pub mod registry;
pub mod service;

pub use catalog::PlanCatalog;
pub use content::{
    default_menu, render_netmask, BootAssets, ContentSettings, IPXE_TEMPLATE, PXE_MENU_TEMPLATE,
};
pub use error::{ConfigError, ProvisionError, Result};
pub use registry::{Advance, PlanRegistry, PlanStore, ProvisioningPlan};
pub use service::ProvisioningService;

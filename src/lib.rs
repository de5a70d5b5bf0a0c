//! Multi-tenant identity core: tenant context resolution, role hierarchy
//! authorization, and the primary ownership transfer saga. Transport,
//! token wire formats, and storage schemas live in the surrounding service.

pub mod config;
pub mod error;
pub mod events;
pub mod roles;
pub mod saga;
pub mod services;
pub mod store;
pub mod tenant;
pub mod token;

pub use config::IdentityConfig;
pub use error::IdentityError;
pub use roles::{can_act, Role};
pub use saga::{OwnershipTransferSaga, SagaTermination, SwapStep, TransferReceipt};
pub use services::AccountService;
pub use tenant::{TenantContext, TenantResolver};

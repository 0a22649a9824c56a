//! Plans native link actions for a build system. Given the objects and libraries of one link
//! target, works out which actions are needed to produce it: the link itself and, when ThinLTO
//! bitcode is involved, the indexing step and one backend compile per bitcode file.
//!
//! Planning happens in phases, each consuming the previous one:
//!
//! - `LinkActionBuilder` accumulates inputs. `build` plans a link without LTO.
//! - `LinkActionBuilder::plan_lto_backends` decides whether indexing runs and creates the
//!   backends, giving a `BackendPlan`.
//! - `BackendPlan::plan_lto_indexing` plans the indexing step if the link allows it.
//! - `LtoPhase::build` plans the final link.

use error::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub mod artifact;
pub mod assemble;
pub mod backend;
pub mod bitcode;
pub mod builder;
pub mod collector;
pub mod env;
pub mod error;
pub mod features;
pub mod indexing;
pub mod inputs;
pub mod link_type;
pub mod linkstamp;
pub mod lto_plan;
pub mod options;
pub mod ordered_set;
pub mod request;
pub(crate) mod timing;
pub mod whole_archive;

pub use assemble::LinkPlan;
pub use builder::LinkActionBuilder;
pub use lto_plan::BackendPlan;
pub use lto_plan::LtoPhase;
pub use request::LinkRequest;

/// Installs a global tracing subscriber. With `time_phases`, prints how long each phase took.
/// Otherwise logs according to `RUST_LOG`.
pub fn init_tracing(time_phases: bool) -> Result {
    if time_phases {
        timing::init_tracing()
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(EnvFilter::from_default_env())
            .try_init()?;
        Ok(())
    }
}

//! Reference producers
//!
//! Each producer decides for itself whether it applies to the installation
//! kind and configured backends, returning nothing when it does not.

pub mod charts;
pub mod cloudsql;
pub mod common;
pub mod proxy;
pub mod rbac;
pub mod server;
pub mod workspace_daemon;

use crate::compose::{Composite, compose, helm_compose, producer};
use crate::objects::Object;

/// Typed objects for every component, in emission order
pub fn objects() -> Composite<Object> {
    compose(
        "objects",
        vec![
            Box::new(producer("rbac", rbac::objects)),
            Box::new(producer("proxy", proxy::objects)),
            Box::new(producer("server", server::objects)),
            Box::new(producer("cloudsql", cloudsql::objects)),
            Box::new(producer("ws-daemon", workspace_daemon::objects)),
        ],
    )
}

/// Chart-rendered in-cluster dependencies
pub fn charts() -> Composite<String> {
    helm_compose(
        "charts",
        vec![
            Box::new(producer("mysql", charts::mysql)),
            Box::new(producer("minio", charts::minio)),
            Box::new(producer("registry", charts::registry)),
        ],
    )
}

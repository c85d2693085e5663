//! filemesh: a peer-to-peer file transfer engine.
//!
//! The core is four components, leaves first: the [`model`] value types,
//! the content-addressed [`store`], the per-file [`transfer`] state
//! machine, and the [`coordinator`] that routes commands into it. Around
//! that core sit the framed [`session`] layer (the wire protocol), the
//! [`outbound`] sender, and three thin adapters: [`config`] loading,
//! the [`api`] control surface, and [`integrity`] checksum verification.

pub mod api;
pub mod config;
pub mod coordinator;
pub mod integrity;
pub mod metrics;
pub mod model;
pub mod outbound;
pub mod session;
pub mod store;
pub mod transfer;

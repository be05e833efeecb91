//! Continuous discovery of the TCP/UDP peers a host is talking to.
//!
//! `sockwatch` repeatedly runs an external connection-listing tool
//! (`lsof -i` by default), reduces its output to the remote side of every
//! established socket, deduplicates within each cycle, and hands batches to
//! the consumer over a stream that survives individual cycle failures.
//! Rendering those peers (console maps, geolocation, CLIs) is the
//! consumer's business, not this crate's.
//!
//! ```no_run
//! use sockwatch::{watch_peers_with_app, DiscoveryConfig};
//!
//! # async fn demo() {
//! let mut stream = watch_peers_with_app(DiscoveryConfig::default());
//! while let Some(outcome) = stream.recv().await {
//!     match outcome {
//!         Ok(peers) => println!("{} active peers", peers.len()),
//!         Err(e) if e.is_fatal() => {
//!             eprintln!("discovery over: {e}");
//!             break;
//!         }
//!         Err(e) => eprintln!("cycle failed: {e}"),
//!     }
//! }
//! # }
//! ```
pub mod discovery;
pub mod error;
pub mod exec;
pub mod extract;
pub mod types;

pub use discovery::{watch_peers, watch_peers_with_app, DiscoveryConfig, PeerStream};
pub use error::DiscoveryError;
pub use types::{PeerAddress, PeerWithApp};

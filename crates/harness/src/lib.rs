pub mod faults;
pub mod invariants;
pub mod tree;

pub use faults::{Fault, FaultyStore};
pub use invariants::{Violation, path_violations};
pub use tree::TestTree;

use tracing_subscriber::EnvFilter;

/// Route engine logs to the test writer. Honors `RUST_LOG`; safe to call
/// from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

//! Run identifier generation.
//!
//! Ids are `run-` plus eight lowercase hex characters. Uniqueness is the run
//! manager's responsibility, not the generator's.

use rand::Rng;

pub fn generate_run_id() -> String {
    let mut rng = rand::thread_rng();
    format!("run-{:08x}", rng.gen::<u32>())
}

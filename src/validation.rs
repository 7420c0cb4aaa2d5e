#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use anyhow::{bail, Result as AnyResult};

use crate::domain::{ResourceTargets, MEGABYTES_PER_GIGABYTE};
use crate::lib_mem::CHUNK_BYTES;

pub fn validate_targets(targets: &ResourceTargets) -> AnyResult<()> {
    // Extra memory on its own is not a load target.
    if targets.cpu_cores.is_none() && targets.memory_gigabytes.is_none() {
        bail!("at least one of --cpu or --memory must be set");
    }
    for (flag, gigabytes) in [
        ("--memory", targets.memory_gigabytes),
        ("--extra-memory", targets.extra_memory_gigabytes),
    ] {
        if let Some(gb) = gigabytes {
            let fits = (gb as usize)
                .checked_mul(MEGABYTES_PER_GIGABYTE)
                .and_then(|mb| mb.checked_mul(CHUNK_BYTES))
                .is_some();
            if !fits {
                bail!("{flag} {gb} GB does not fit in this platform's address space");
            }
        }
    }
    Ok(())
}

//! Build script for can-codec
//!
//! Forwards the target and host triples so the generated-code tests can ask
//! the `cc` crate for the matching system C and C++ compilers.

use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    for (var, exported) in [("TARGET", "CAN_CODEC_TARGET"), ("HOST", "CAN_CODEC_HOST")] {
        if let Ok(value) = env::var(var) {
            println!("cargo:rustc-env={}={}", exported, value);
        }
    }
}

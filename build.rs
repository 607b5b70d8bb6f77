//! Build script for koreografeye
//!
//! Embeds version and target triple for `koreografeye --version`.

use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    if let Ok(version) = env::var("CARGO_PKG_VERSION") {
        println!("cargo:rustc-env=KOREO_VERSION={}", version);
    }

    if let Ok(target) = env::var("TARGET") {
        println!("cargo:rustc-env=KOREO_TARGET={}", target);
    }
}

// from cbindgen docs and
// https://michael-f-bryan.github.io/rust-ffi-guide/cbindgen.html

extern crate cbindgen;

use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src/cffi.rs");
    let headers_enabled = env::var_os("CARGO_FEATURE_CFFI").is_some();
    if !headers_enabled { return; }
    let crate_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => dir,
        Err(_) => return
    };
    let package_name = env::var("CARGO_PKG_NAME").unwrap_or_else(|_| "panelblas".to_string());

    let output_file = target_dir(&crate_dir)
        .join(format!("{}.h", package_name))
        .display()
        .to_string();

    let bindings = cbindgen::Builder::new()
      .with_language(cbindgen::Language::C)
      .with_include_version(true)
      .with_include_guard("PANELBLAS_H")
      .with_crate(crate_dir)
      .generate();

    // Header generation failures only warn.
    match bindings {
        Ok(bindings) => { bindings.write_to_file(&output_file); }
        Err(err) => println!("cargo:warning=unable to generate C header: {}", err)
    }
}

fn target_dir(crate_dir: &str) -> PathBuf {
    if let Ok(target) = env::var("CARGO_TARGET_DIR") {
        PathBuf::from(target)
    } else {
        PathBuf::from(crate_dir).join("target")
    }
}

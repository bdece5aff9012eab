use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=DEVELOPER_DIR");

    // The vendored SQLCipher/OpenSSL build references compiler-rt symbols
    // (`__isPlatformVersionAtLeast`) that Xcode's clang does not link by
    // default.
    if std::env::var_os("CARGO_FEATURE_SQLCIPHER").is_none() {
        return;
    }
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("macos") {
        return;
    }

    let Some(runtime_dir) = clang_runtime_dir() else {
        println!("cargo:warning=clang runtime dir not found; relying on default link flags");
        return;
    };
    println!("cargo:rustc-link-search=native={runtime_dir}");
    println!("cargo:rustc-link-lib=clang_rt.osx");
}

fn clang_runtime_dir() -> Option<String> {
    let output = Command::new("xcrun")
        .args(["clang", "--print-runtime-dir"])
        .output()
        .ok()
        .filter(|output| output.status.success())?;
    let dir = String::from_utf8_lossy(&output.stdout).trim().to_owned();
    (!dir.is_empty()).then_some(dir)
}

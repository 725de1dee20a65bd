use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    let out = PathBuf::from(env::var_os("OUT_DIR").unwrap());

    // DMP firmware image (opaque vendor blob), staged so the binary can include_bytes! it
    let staged = out.join("dmp_firmware.bin");
    match env::var("DMP_FIRMWARE") {
        Ok(path) => {
            let image = fs::read(&path).unwrap_or_else(|e| panic!("reading {}: {}", path, e));
            fs::write(&staged, &image).unwrap();
            println!("cargo:rerun-if-changed={}", path);
            println!(
                "cargo:warning=Using DMP firmware from {} ({} bytes)",
                path,
                image.len()
            );
        }
        Err(_) => {
            fs::write(&staged, []).unwrap();
            if env::var_os("CARGO_FEATURE_RP2040").is_some() {
                println!("cargo:warning=DMP_FIRMWARE not set, staging an empty image");
            }
        }
    }
    println!("cargo:rerun-if-env-changed=DMP_FIRMWARE");

    // memory layout for cortex-m-rt
    if env::var_os("CARGO_FEATURE_RP2040").is_some() {
        fs::copy("memory.x", out.join("memory.x")).unwrap();
        println!("cargo:rustc-link-search={}", out.display());
        println!("cargo:rerun-if-changed=memory.x");
    }
}

// idf-log-bridge - Build Script
//
// Forwards the ESP-IDF build environment when targeting ESP-IDF.
// Host builds (tests, simulation) need nothing from here.

fn main() {
    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();

    if target_os == "espidf" {
        // ESP-IDF environment setup (MUST be first!)
        embuild::espidf::sysenv::output();
    }

    println!("cargo:rerun-if-changed=build.rs");
}

fn main() {
    // ESP-IDF environment is only needed for the Xtensa firmware build.
    // Host builds (tests, host-sim) skip it entirely.
    let target = std::env::var("TARGET").unwrap_or_default();
    if target.contains("xtensa") || target.contains("espidf") {
        embuild::espidf::sysenv::output();
    }
}

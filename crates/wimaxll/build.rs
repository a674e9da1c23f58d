// Build provenance for `wimaxll version --extended`.
fn main() {
    for (var, key) in [("TARGET", "WIMAXLL_BUILD_TARGET"), ("PROFILE", "WIMAXLL_BUILD_PROFILE")] {
        if let Ok(value) = std::env::var(var) {
            println!("cargo:rustc-env={key}={value}");
        }
        println!("cargo:rerun-if-env-changed={var}");
    }
}

// Bake the target triple and cargo profile into `skylink version --extended`.
fn main() {
    let baked = [
        ("TARGET", "SKYLINK_BUILD_TARGET"),
        ("PROFILE", "SKYLINK_BUILD_PROFILE"),
    ];
    for (var, key) in baked {
        if let Ok(value) = std::env::var(var) {
            println!("cargo:rustc-env={key}={value}");
        }
        println!("cargo:rerun-if-env-changed={var}");
    }
}
